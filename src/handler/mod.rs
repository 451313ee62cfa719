//! Request handler composition.
//!
//! Every stage of the pipeline satisfies the same contract, [`Handler`]:
//! parameters in, image out. Stages come in two shapes:
//!
//! - [`Origin`]: produces an image from parameters alone (e.g. a source fetch)
//! - [`Decorator`]: wraps exactly one inner handler and may transform the
//!   parameters, transform the result, or short-circuit (e.g. a cache hit)
//!
//! A [`Pipeline`] is the explicit object graph tying them together:
//!
//! ```text
//! ┌────────────────────┐
//! │  CachingDecorator  │  outermost, added last
//! └─────────┬──────────┘
//!           ▼
//! ┌────────────────────┐
//! │    ProcessStage    │
//! └─────────┬──────────┘
//!           ▼
//! ┌────────────────────┐
//! │    SourceOrigin    │  innermost
//! └────────────────────┘
//! ```
//!
//! No stage knows what precedes or follows it; a decorator only ever sees
//! its inner handler as `&dyn Handler`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug_span, Instrument};

use crate::artifact::Image;
use crate::error::ImageError;
use crate::params::Params;

/// The uniform `params → image` contract.
///
/// Implementations must be safe to invoke concurrently with different
/// parameter sets, and must not retain the parameters or the produced image
/// beyond the call.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, params: &Params) -> Result<Image, ImageError>;
}

/// A stage that produces an image from parameters alone.
#[async_trait]
pub trait Origin: Send + Sync {
    async fn produce(&self, params: &Params) -> Result<Image, ImageError>;

    /// Stage name used in log spans.
    fn name(&self) -> &'static str {
        "origin"
    }
}

/// A stage wrapping one inner handler.
///
/// A decorator that fails must either return the inner error unchanged or add
/// context with [`ImageError::context`], which keeps the error kind.
#[async_trait]
pub trait Decorator: Send + Sync {
    async fn decorate(&self, params: &Params, inner: &dyn Handler) -> Result<Image, ImageError>;

    /// Stage name used in log spans.
    fn name(&self) -> &'static str {
        "decorator"
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// A chain of stages, built from the origin outwards.
///
/// # Example
///
/// ```ignore
/// let pipeline = Pipeline::origin(SourceOrigin::new(fetcher, HeaderDetector))
///     .wrap(ProcessStage::new(ImageProcessor::new()))
///     .wrap(CachingDecorator::new(key_generator, cache));
///
/// let image = pipeline.handle(&params).await?;
/// ```
pub enum Pipeline {
    /// The innermost stage
    Origin(Arc<dyn Origin>),

    /// A decorator and the chain it wraps
    Decorated {
        stage: Arc<dyn Decorator>,
        inner: Box<Pipeline>,
    },
}

impl Pipeline {
    /// Start a pipeline from an origin stage.
    pub fn origin(origin: impl Origin + 'static) -> Self {
        Pipeline::Origin(Arc::new(origin))
    }

    /// Start a pipeline from a shared origin stage.
    pub fn from_shared_origin(origin: Arc<dyn Origin>) -> Self {
        Pipeline::Origin(origin)
    }

    /// Wrap the current chain in a decorator, which becomes the outermost stage.
    pub fn wrap(self, stage: impl Decorator + 'static) -> Self {
        self.wrap_shared(Arc::new(stage))
    }

    /// Wrap the current chain in a shared decorator.
    pub fn wrap_shared(self, stage: Arc<dyn Decorator>) -> Self {
        Pipeline::Decorated {
            stage,
            inner: Box::new(self),
        }
    }

    /// Number of stages, origin included.
    pub fn depth(&self) -> usize {
        match self {
            Pipeline::Origin(_) => 1,
            Pipeline::Decorated { inner, .. } => 1 + inner.depth(),
        }
    }

    /// Stage names, outermost first.
    pub fn stage_names(&self) -> Vec<&'static str> {
        let mut names = Vec::with_capacity(self.depth());
        let mut current = self;
        loop {
            match current {
                Pipeline::Origin(origin) => {
                    names.push(origin.name());
                    return names;
                }
                Pipeline::Decorated { stage, inner } => {
                    names.push(stage.name());
                    current = &**inner;
                }
            }
        }
    }
}

#[async_trait]
impl Handler for Pipeline {
    async fn handle(&self, params: &Params) -> Result<Image, ImageError> {
        match self {
            Pipeline::Origin(origin) => {
                let span = debug_span!("stage", name = origin.name());
                origin.produce(params).instrument(span).await
            }
            Pipeline::Decorated { stage, inner } => {
                let span = debug_span!("stage", name = stage.name());
                stage.decorate(params, &**inner).instrument(span).await
            }
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}
