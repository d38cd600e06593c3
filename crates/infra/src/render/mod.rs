//! Render process supervision.

use std::sync::Arc;

use async_trait::async_trait;

pub mod job;
pub mod outcome;
pub mod process;

pub use job::{DEFAULT_RENDER_BUDGET, RenderJob, RenderJobKind, RenderSettings};
pub use outcome::{Diagnostics, RenderOutcome};
pub use process::{IntermediateFile, ProcessRenderer, RendererCommand};

/// Turns a normalized payload into an artifact file.
///
/// Implementations never retry and never return early without cleaning up
/// their own scratch files.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, job: &RenderJob) -> RenderOutcome;
}

#[async_trait]
impl<R: Renderer + ?Sized> Renderer for Arc<R> {
    async fn render(&self, job: &RenderJob) -> RenderOutcome {
        (**self).render(job).await
    }
}
