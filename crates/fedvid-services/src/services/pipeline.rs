//! Pipeline runner
//!
//! An ordered list of asynchronous steps threading one accumulating
//! context, short-circuiting on the first failure. Each step's
//! preconditions are the postconditions of the one before it, so steps
//! are never skipped or reordered by the runner; a step that is
//! conditional by design (e.g. tag resolution on update) decides
//! internally and still runs in its slot.
//!
//! On failure the runner returns the error and leaves the context — with
//! its still-open transaction — to the caller, which is responsible for
//! rolling back and undoing any external side effects.

use async_trait::async_trait;

use fedvid_core::AppError;

#[async_trait]
pub trait Step<C: Send>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &mut C) -> Result<(), AppError>;
}

pub struct Pipeline<C> {
    steps: Vec<Box<dyn Step<C>>>,
}

impl<C: Send> Pipeline<C> {
    pub fn new(steps: Vec<Box<dyn Step<C>>>) -> Self {
        Self { steps }
    }

    pub async fn run(&self, ctx: &mut C) -> Result<(), AppError> {
        for step in &self.steps {
            if let Err(err) = step.run(ctx).await {
                // Debug only: a conflict here is expected and will be retried.
                tracing::debug!(step = step.name(), error = %err, "pipeline step failed");
                return Err(err);
            }
        }

        Ok(())
    }
}
