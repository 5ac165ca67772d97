//! End-to-end pipeline runs with a cache-backed training stage
//!
//! extract -> split -> train (cached) -> export, run twice over one cache
//! root: the second run must not train.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use model_cache::cache::NullObserver;
use model_cache::config::CacheConfig;
use model_cache::descriptor::{ArtifactDescriptor, DataDescriptor, LayerDescriptor, TrainingConfig};
use model_cache::pipeline::{
    CachedTrainingStage, FnStage, Pipeline, Readiness, StageOutcome, Trainer,
};
use model_cache::store::SequentialModel;
use model_cache::ModelCache;
use tempfile::tempdir;

#[derive(Debug, Default)]
struct Dto {
    class_names: Vec<String>,
    split: Option<(usize, usize)>,
    model: Option<SequentialModel>,
    exported: bool,
}

struct ClassifierTrainer {
    trained: Arc<AtomicUsize>,
}

impl ClassifierTrainer {
    fn layers(dto: &Dto) -> Vec<LayerDescriptor> {
        vec![
            LayerDescriptor::new("Rescaling").with_param("scale", 1.0 / 255.0),
            LayerDescriptor::new("Dense")
                .with_param("units", dto.class_names.len())
                .with_param("activation", "softmax"),
        ]
    }
}

impl Trainer<Dto> for ClassifierTrainer {
    type Model = SequentialModel;

    fn accept(&self, dto: &Dto) -> Readiness {
        if dto.split.is_none() {
            Readiness::Abort("No data split available for training.".to_string())
        } else {
            Readiness::Ready
        }
    }

    fn descriptor(&self, dto: &Dto) -> model_cache::Result<ArtifactDescriptor> {
        let classes = u32::try_from(dto.class_names.len()).unwrap_or(u32::MAX);
        ArtifactDescriptor::from_serializable(
            Self::layers(dto),
            &TrainingConfig::default(),
            &DataDescriptor::new(classes, vec![64, 64, 3]),
        )
    }

    fn train(&mut self, dto: &Dto) -> anyhow::Result<SequentialModel> {
        self.trained.fetch_add(1, Ordering::SeqCst);
        Ok(SequentialModel::new("classifier", Self::layers(dto)).with_weights("dense/bias", vec![0.0; 10]))
    }

    fn attach(&self, mut dto: Dto, model: SequentialModel) -> Dto {
        dto.model = Some(model);
        dto
    }
}

fn pipeline(root: &std::path::Path, trained: &Arc<AtomicUsize>, with_split: bool) -> Pipeline<Dto> {
    let cache = ModelCache::open_with_observer(CacheConfig::new(root), Box::new(NullObserver)).unwrap();
    let trainer = ClassifierTrainer {
        trained: Arc::clone(trained),
    };

    Pipeline::with_observer(Box::new(NullObserver))
        .stage(FnStage::new("extract", |mut dto: Dto| {
            dto.class_names = (0..10).map(|i| format!("class_{i}")).collect();
            StageOutcome::Continue(dto)
        }))
        .stage(FnStage::new("split", move |mut dto: Dto| {
            if with_split {
                dto.split = Some((16_000, 4_000));
                StageOutcome::Continue(dto)
            } else {
                StageOutcome::skip(dto, "split disabled")
            }
        }))
        .stage(CachedTrainingStage::new(trainer, Some(cache)))
        .stage(FnStage::new("export", |mut dto: Dto| {
            dto.exported = dto.model.is_some();
            StageOutcome::Continue(dto)
        }))
}

#[test]
fn test_second_run_skips_training() {
    let dir = tempdir().unwrap();
    let trained = Arc::new(AtomicUsize::new(0));

    let first = pipeline(dir.path(), &trained, true).run(Dto::default());
    assert_eq!(first.completed, vec!["extract", "split", "train", "export"]);
    assert!(first.dto.as_ref().unwrap().exported);

    let second = pipeline(dir.path(), &trained, true).run(Dto::default());
    assert!(second.dto.as_ref().unwrap().exported);
    assert_eq!(second.dto.unwrap().model, first.dto.unwrap().model);

    assert_eq!(trained.load(Ordering::SeqCst), 1);
    assert_eq!(model_cache::admin::list_entries(dir.path()).len(), 1);
}

#[test]
fn test_missing_split_aborts_before_training() {
    let dir = tempdir().unwrap();
    let trained = Arc::new(AtomicUsize::new(0));

    let report = pipeline(dir.path(), &trained, false).run(Dto::default());

    assert!(report.is_aborted());
    assert_eq!(report.completed, vec!["extract"]);
    assert_eq!(report.skipped.len(), 1);
    let (stage, reason) = report.aborted.unwrap();
    assert_eq!(stage, "train");
    assert!(reason.contains("No data split"));
    assert_eq!(trained.load(Ordering::SeqCst), 0);
}
