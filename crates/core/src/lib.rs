//! `invoicedesk-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the invoicing model
//! and the render pipeline (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod value_object;

pub use error::{DomainError, DomainResult};
pub use id::{InvoiceId, RenderJobId};
pub use value_object::ValueObject;
