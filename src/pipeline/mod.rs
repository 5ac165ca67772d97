//! Stage orchestration
//!
//! A [`Pipeline`] runs its stages in order, threading one dto through them.
//! Each stage first reports [`Readiness`], then returns a [`StageOutcome`];
//! skip and abort are values the orchestrator matches on, never panics or
//! errors unwinding through it.
//!
//! ```text
//! accept -> Ready  -> run -> Continue(dto)           next stage
//!                         -> SkipStage { dto, .. }   next stage
//!                         -> AbortPipeline { .. }    stop
//!        -> Skip   -------------------------------> next stage
//!        -> Abort  -------------------------------> stop
//! ```
//!
//! Dataset extraction, splitting and export are stages supplied by the
//! embedding application; [`CachedTrainingStage`] is the one stage this
//! crate provides.

mod stage;
mod train;

pub use stage::{FnStage, Readiness, Stage, StageOutcome};
pub use train::{CachedTrainingStage, ModelSource, Trainer};

use crate::cache::{NullObserver, TracingObserver};

/// Something the orchestrator did.
#[derive(Debug, Clone, Copy)]
pub enum PipelineEvent<'a> {
    /// A stage passed its precondition check and is about to run.
    StageStarted {
        /// Stage name
        stage: &'a str,
    },
    /// A stage returned `Continue`.
    StageCompleted {
        /// Stage name
        stage: &'a str,
    },
    /// A stage was skipped, by `accept` or by `run`.
    StageSkipped {
        /// Stage name
        stage: &'a str,
        /// Skip reason
        reason: &'a str,
    },
    /// A stage stopped the pipeline.
    Aborted {
        /// Stage name
        stage: &'a str,
        /// Abort reason
        reason: &'a str,
    },
    /// Every stage ran or was skipped.
    Finished {
        /// Stages that completed
        completed: usize,
        /// Stages that were skipped
        skipped: usize,
    },
}

/// Receiver of pipeline events.
pub trait PipelineObserver: Send + Sync {
    /// Handle one event.
    fn on_event(&self, event: &PipelineEvent<'_>);
}

impl PipelineObserver for TracingObserver {
    fn on_event(&self, event: &PipelineEvent<'_>) {
        match *event {
            PipelineEvent::StageStarted { stage } => tracing::debug!(stage, "running stage"),
            PipelineEvent::StageCompleted { stage } => tracing::info!(stage, "stage completed"),
            PipelineEvent::StageSkipped { stage, reason } => {
                tracing::info!(stage, reason, "stage skipped");
            }
            PipelineEvent::Aborted { stage, reason } => {
                tracing::error!(stage, reason, "pipeline aborted");
            }
            PipelineEvent::Finished { completed, skipped } => {
                tracing::info!(completed, skipped, "pipeline finished");
            }
        }
    }
}

impl PipelineObserver for NullObserver {
    fn on_event(&self, _event: &PipelineEvent<'_>) {}
}

/// What happened during [`Pipeline::run`].
#[derive(Debug)]
pub struct PipelineReport<D> {
    /// Final dto; `None` when the pipeline was aborted
    pub dto: Option<D>,
    /// Names of stages that completed, in order
    pub completed: Vec<String>,
    /// Skipped stages with their reasons, in order
    pub skipped: Vec<(String, String)>,
    /// Aborting stage and reason
    pub aborted: Option<(String, String)>,
}

impl<D> PipelineReport<D> {
    /// Check whether a stage aborted the run.
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }
}

/// Ordered list of stages over a dto of type `D`.
pub struct Pipeline<D> {
    stages: Vec<Box<dyn Stage<D>>>,
    observer: Box<dyn PipelineObserver>,
}

impl<D> Default for Pipeline<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> std::fmt::Debug for Pipeline<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.stages.iter().map(|s| s.name()).collect();
        f.debug_struct("Pipeline").field("stages", &names).finish_non_exhaustive()
    }
}

impl<D> Pipeline<D> {
    /// Empty pipeline reporting through [`TracingObserver`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_observer(Box::new(TracingObserver))
    }

    /// Empty pipeline reporting through `observer`.
    #[must_use]
    pub fn with_observer(observer: Box<dyn PipelineObserver>) -> Self {
        Self {
            stages: Vec::new(),
            observer,
        }
    }

    /// Append a stage.
    #[must_use]
    pub fn stage(mut self, stage: impl Stage<D> + 'static) -> Self {
        self.push(stage);
        self
    }

    /// Append a stage in place.
    pub fn push(&mut self, stage: impl Stage<D> + 'static) {
        self.stages.push(Box::new(stage));
    }

    /// Get the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Check if there are no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage in order.
    pub fn run(&mut self, dto: D) -> PipelineReport<D> {
        let mut report = PipelineReport {
            dto: None,
            completed: Vec::new(),
            skipped: Vec::new(),
            aborted: None,
        };
        let mut dto = dto;

        for stage in &mut self.stages {
            let name = stage.name().to_string();

            match stage.accept(&dto) {
                Readiness::Ready => {}
                Readiness::Skip(reason) => {
                    self.observer.on_event(&PipelineEvent::StageSkipped {
                        stage: &name,
                        reason: &reason,
                    });
                    report.skipped.push((name, reason));
                    continue;
                }
                Readiness::Abort(reason) => {
                    self.observer.on_event(&PipelineEvent::Aborted {
                        stage: &name,
                        reason: &reason,
                    });
                    report.aborted = Some((name, reason));
                    return report;
                }
            }

            self.observer
                .on_event(&PipelineEvent::StageStarted { stage: &name });
            dto = match stage.run(dto) {
                StageOutcome::Continue(next) => {
                    self.observer
                        .on_event(&PipelineEvent::StageCompleted { stage: &name });
                    report.completed.push(name);
                    next
                }
                StageOutcome::SkipStage { dto, reason } => {
                    self.observer.on_event(&PipelineEvent::StageSkipped {
                        stage: &name,
                        reason: &reason,
                    });
                    report.skipped.push((name, reason));
                    dto
                }
                StageOutcome::AbortPipeline { reason } => {
                    self.observer.on_event(&PipelineEvent::Aborted {
                        stage: &name,
                        reason: &reason,
                    });
                    report.aborted = Some((name, reason));
                    return report;
                }
            };
        }

        self.observer.on_event(&PipelineEvent::Finished {
            completed: report.completed.len(),
            skipped: report.skipped.len(),
        });
        report.dto = Some(dto);
        report
    }
}
