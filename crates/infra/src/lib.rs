//! Infrastructure layer: invoice data source, aggregation, renderer
//! supervision, artifact delivery and configuration.

pub mod aggregator;
pub mod config;
pub mod delivery;
pub mod error;
pub mod pipeline;
pub mod render;
pub mod source;

pub use aggregator::{DocumentAggregator, SupplierProfile};
pub use config::{AppConfig, ConfigError};
pub use delivery::Artifact;
pub use error::RenderError;
pub use pipeline::RenderPipeline;
pub use render::{ProcessRenderer, RenderJob, RenderJobKind, RenderOutcome, RenderSettings, Renderer, RendererCommand};
pub use source::{InMemoryInvoiceSource, InvoiceSource, PostgresInvoiceSource, SourceError};
