//! Training stage that consults the model cache before training

use crate::cache::ModelCache;
use crate::descriptor::ArtifactDescriptor;
use crate::fingerprint::Fingerprint;
use crate::store::Artifact;
use crate::Result;

use super::stage::{Readiness, Stage, StageOutcome};

/// Framework-specific training behind [`CachedTrainingStage`].
pub trait Trainer<D> {
    /// Trained artifact type.
    type Model: Artifact;

    /// Preconditions on the dto. Defaults to [`Readiness::Ready`].
    fn accept(&self, _dto: &D) -> Readiness {
        Readiness::Ready
    }

    /// Describe the model that training `dto` would produce.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Serialization`] if the configuration cannot
    /// be described; the stage then trains without the cache.
    fn descriptor(&self, dto: &D) -> Result<ArtifactDescriptor>;

    /// Train a model on `dto`.
    ///
    /// # Errors
    ///
    /// Any failure aborts the pipeline.
    fn train(&mut self, dto: &D) -> anyhow::Result<Self::Model>;

    /// Hand the model to later stages.
    fn attach(&self, dto: D, model: Self::Model) -> D;
}

/// Where the last model produced by a [`CachedTrainingStage`] came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// Loaded from the cache.
    Cached(Fingerprint),
    /// Trained; `cached` holds the fingerprint it was stored under, if any.
    Trained {
        /// Fingerprint of the committed entry
        cached: Option<Fingerprint>,
    },
}

/// Stage that trains through a [`Trainer`], reusing cached models.
///
/// The cache is an optimization only: with no cache, or when any cache
/// call fails, the stage trains as if caching were disabled.
pub struct CachedTrainingStage<T> {
    name: String,
    trainer: T,
    cache: Option<ModelCache>,
    last_source: Option<ModelSource>,
}

impl<T> CachedTrainingStage<T> {
    /// Stage named `train` over `trainer`, optionally backed by `cache`.
    pub fn new(trainer: T, cache: Option<ModelCache>) -> Self {
        Self {
            name: "train".to_string(),
            trainer,
            cache,
            last_source: None,
        }
    }

    /// Rename the stage.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Get the trainer.
    pub const fn trainer(&self) -> &T {
        &self.trainer
    }

    /// Get the cache, if any.
    pub const fn cache(&self) -> Option<&ModelCache> {
        self.cache.as_ref()
    }

    /// Source of the model produced by the latest run.
    pub const fn last_source(&self) -> Option<&ModelSource> {
        self.last_source.as_ref()
    }

    /// Take the trainer and cache back.
    pub fn into_parts(self) -> (T, Option<ModelCache>) {
        (self.trainer, self.cache)
    }

    fn cached_fingerprint<D>(&self, dto: &D) -> Option<(ArtifactDescriptor, Fingerprint)>
    where
        T: Trainer<D>,
    {
        let cache = self.cache.as_ref()?;
        let described = self
            .trainer
            .descriptor(dto)
            .and_then(|descriptor| {
                let fingerprint = cache.compute_fingerprint(&descriptor)?;
                Ok((descriptor, fingerprint))
            });
        match described {
            Ok(described) => Some(described),
            Err(e) => {
                tracing::warn!(error = %e, "cannot fingerprint model, training without cache");
                None
            }
        }
    }
}

impl<D, T: Trainer<D>> Stage<D> for CachedTrainingStage<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn accept(&self, dto: &D) -> Readiness {
        self.trainer.accept(dto)
    }

    fn run(&mut self, dto: D) -> StageOutcome<D> {
        let keyed = self.cached_fingerprint(&dto);

        if let (Some(cache), Some((_, fingerprint))) = (&self.cache, &keyed) {
            if let Some(model) = cache.try_get::<T::Model>(fingerprint) {
                self.last_source = Some(ModelSource::Cached(fingerprint.clone()));
                return StageOutcome::Continue(self.trainer.attach(dto, model));
            }
        }

        let model = match self.trainer.train(&dto) {
            Ok(model) => model,
            Err(e) => return StageOutcome::abort(format!("training failed: {e:#}")),
        };

        let mut cached = None;
        if let (Some(cache), Some((descriptor, _))) = (self.cache.as_mut(), &keyed) {
            match cache.put(descriptor, &model) {
                Ok(fingerprint) => cached = Some(fingerprint),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to cache trained model");
                }
            }
        }
        self.last_source = Some(ModelSource::Trained { cached });
        StageOutcome::Continue(self.trainer.attach(dto, model))
    }
}
