//! Stage contract and its returned control-flow values

/// What a stage hands back to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome<D> {
    /// Stage ran; continue with the updated dto.
    Continue(D),
    /// Stage chose not to apply; continue with the dto it was given.
    SkipStage {
        /// Dto passed on to the next stage
        dto: D,
        /// Why the stage was skipped
        reason: String,
    },
    /// Stop the pipeline. No further stage runs.
    AbortPipeline {
        /// Why the pipeline stopped
        reason: String,
    },
}

impl<D> StageOutcome<D> {
    /// Skip with a reason.
    pub fn skip(dto: D, reason: impl Into<String>) -> Self {
        Self::SkipStage {
            dto,
            reason: reason.into(),
        }
    }

    /// Abort with a reason.
    pub fn abort(reason: impl Into<String>) -> Self {
        Self::AbortPipeline {
            reason: reason.into(),
        }
    }
}

/// Precondition check result, evaluated before [`Stage::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Preconditions hold.
    Ready,
    /// Skip this stage only.
    Skip(String),
    /// Stop the whole pipeline.
    Abort(String),
}

/// One step of a pipeline over a dto of type `D`.
pub trait Stage<D> {
    /// Name used in reports and logs.
    fn name(&self) -> &str;

    /// Check preconditions. Defaults to [`Readiness::Ready`].
    fn accept(&self, _dto: &D) -> Readiness {
        Readiness::Ready
    }

    /// Execute the stage.
    fn run(&mut self, dto: D) -> StageOutcome<D>;
}

/// Stage backed by a closure.
pub struct FnStage<F> {
    name: String,
    run: F,
}

impl<F> FnStage<F> {
    /// Wrap `run` under `name`.
    pub fn new(name: impl Into<String>, run: F) -> Self {
        Self {
            name: name.into(),
            run,
        }
    }
}

impl<D, F> Stage<D> for FnStage<F>
where
    F: FnMut(D) -> StageOutcome<D>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, dto: D) -> StageOutcome<D> {
        (self.run)(dto)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert_eq!(
            StageOutcome::skip(1, "nothing to do"),
            StageOutcome::SkipStage {
                dto: 1,
                reason: "nothing to do".to_string()
            }
        );
        assert_eq!(
            StageOutcome::<i32>::abort("no inputs"),
            StageOutcome::AbortPipeline {
                reason: "no inputs".to_string()
            }
        );
    }

    #[test]
    fn test_fn_stage_defaults_to_ready() {
        let mut stage = FnStage::new("double", |n: i32| StageOutcome::Continue(n * 2));
        assert_eq!(stage.name(), "double");
        assert_eq!(stage.accept(&3), Readiness::Ready);
        assert_eq!(stage.run(3), StageOutcome::Continue(6));
    }
}
