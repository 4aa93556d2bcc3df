//! Model registry concurrency tests

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::*;
use sf_ml::separation::SeparationModel;
use sf_ml::{MlError, MlResult, ModelRegistry, RegistryConfig};

#[test]
fn test_concurrent_first_use_loads_once() {
    init_logging();

    let loads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loads);
    let registry = ModelRegistry::new(move |name: &str| -> MlResult<Arc<dyn SeparationModel>> {
        counter.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(50));
        Ok(Arc::new(GainSplitModel::four_stem(name, 16)))
    });

    let models: Vec<Arc<dyn SeparationModel>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| registry.get("shared").unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert!(models.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
}

#[test]
fn test_distinct_names_load_independently() {
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loads);
    let registry = ModelRegistry::new(move |name: &str| -> MlResult<Arc<dyn SeparationModel>> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(GainSplitModel::four_stem(name, 16)))
    });

    std::thread::scope(|scope| {
        for name in ["a", "b", "c", "a", "b", "c"] {
            let registry = &registry;
            scope.spawn(move || {
                assert_eq!(registry.get(name).unwrap().name(), name);
            });
        }
    });

    assert_eq!(loads.load(Ordering::SeqCst), 3);
    assert_eq!(registry.loaded_names(), vec!["a", "b", "c"]);
}

#[test]
fn test_concurrent_failure_is_shared() {
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loads);
    let registry = ModelRegistry::new(move |name: &str| -> MlResult<Arc<dyn SeparationModel>> {
        counter.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(20));
        Err(MlError::ModelLoadFailed {
            name: name.into(),
            reason: "corrupt weights".into(),
        })
    });

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                assert!(matches!(
                    registry.get("bad"),
                    Err(MlError::ModelLoadFailed { ref reason, .. }) if reason == "corrupt weights"
                ));
            });
        }
    });

    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[test]
fn test_onnx_registry_reports_missing_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = RegistryConfig {
        models_dir: dir.path().to_path_buf(),
        ..Default::default()
    };
    let registry = ModelRegistry::from_config(&config);

    let outcomes = registry.preload_config(&config);
    assert_eq!(outcomes.len(), 3);
    for (name, outcome) in &outcomes {
        assert!(
            matches!(outcome, Err(MlError::ModelLoadFailed { .. })),
            "{name} should fail to load"
        );
    }
    assert!(matches!(
        registry.get("mdx_extra"),
        Err(MlError::ModelNotFound { .. })
    ));
    assert!(registry.loaded_names().is_empty());
}
