//! Image processing stage.
//!
//! A [`Processor`] is a synchronous, CPU-bound transform from one image to
//! another, driven by the request parameters. [`ProcessStage`] adapts any
//! processor into a pipeline [`Decorator`]: it runs the inner chain, then the
//! processor on tokio's blocking pool so decode/resize/encode work never
//! stalls the async workers.

mod encoder;

use std::sync::Arc;

use async_trait::async_trait;

use crate::artifact::Image;
use crate::error::ImageError;
use crate::handler::{Decorator, Handler};
use crate::params::Params;

pub use encoder::{
    ImageProcessor, OutputFormat, DEFAULT_QUALITY, MAX_DIMENSION, MAX_QUALITY, MIN_QUALITY,
};

/// Transforms an image according to request parameters.
pub trait Processor: Send + Sync {
    fn process(&self, image: Image, params: &Params) -> Result<Image, ImageError>;

    /// Name used as error context and in log spans.
    fn name(&self) -> &'static str;
}

/// Decorator applying a [`Processor`] to the inner handler's output.
///
/// Processor failures are prefixed with the processor name, keeping their
/// kind. A panicking processor surfaces as [`ImageError::Processing`].
pub struct ProcessStage<P> {
    processor: Arc<P>,
}

impl<P: Processor + 'static> ProcessStage<P> {
    pub fn new(processor: P) -> Self {
        Self {
            processor: Arc::new(processor),
        }
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }
}

#[async_trait]
impl<P: Processor + 'static> Decorator for ProcessStage<P> {
    async fn decorate(&self, params: &Params, inner: &dyn Handler) -> Result<Image, ImageError> {
        let image = inner.handle(params).await?;

        let processor = Arc::clone(&self.processor);
        let name = processor.name();
        let params = params.clone();

        tokio::task::spawn_blocking(move || processor.process(image, &params))
            .await
            .map_err(|e| ImageError::processing(format!("{} aborted: {}", name, e)))?
            .map_err(|e| e.context(name))
    }

    fn name(&self) -> &'static str {
        self.processor.name()
    }
}
