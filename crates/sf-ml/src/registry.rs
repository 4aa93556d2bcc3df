//! Named model registry with single-flight loading
//!
//! Each name owns one `OnceLock` slot. The first caller for a name runs the
//! loader; concurrent callers block on the same slot and observe the same
//! outcome. Success and failure are both cached, so a broken model file is
//! reported once per process rather than retried on every request.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::config::RegistryConfig;
use crate::error::{MlError, MlResult};
use crate::inference::InferenceConfig;
use crate::separation::{ModelKind, OnnxSeparationModel, SeparationModel};

/// Produces a model for a registry name
pub trait ModelLoader: Send + Sync {
    /// `ModelNotFound` for names the loader does not know, `ModelLoadFailed` otherwise
    fn load(&self, name: &str) -> MlResult<Arc<dyn SeparationModel>>;
}

impl<F> ModelLoader for F
where
    F: Fn(&str) -> MlResult<Arc<dyn SeparationModel>> + Send + Sync,
{
    fn load(&self, name: &str) -> MlResult<Arc<dyn SeparationModel>> {
        self(name)
    }
}

/// Loads catalog models from `<models_dir>/<name>.onnx`
#[derive(Debug, Clone)]
pub struct OnnxModelLoader {
    pub models_dir: PathBuf,
    pub inference: InferenceConfig,
}

impl OnnxModelLoader {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
            inference: InferenceConfig::default(),
        }
    }

    pub fn model_path(&self, kind: ModelKind) -> PathBuf {
        self.models_dir.join(format!("{}.onnx", kind.name()))
    }
}

impl ModelLoader for OnnxModelLoader {
    fn load(&self, name: &str) -> MlResult<Arc<dyn SeparationModel>> {
        let kind = ModelKind::from_name(name).ok_or_else(|| MlError::ModelNotFound {
            name: name.to_string(),
        })?;

        let path = self.model_path(kind);
        if !path.exists() {
            return Err(MlError::ModelLoadFailed {
                name: name.to_string(),
                reason: format!("model file not found: {}", path.display()),
            });
        }

        let model = OnnxSeparationModel::load(kind, &path, &self.inference).map_err(|e| {
            MlError::ModelLoadFailed {
                name: name.to_string(),
                reason: e.to_string(),
            }
        })?;

        Ok(Arc::new(model))
    }
}

#[derive(Debug, Clone)]
enum LoadFailure {
    NotFound,
    Failed(String),
}

type Slot = Arc<OnceLock<Result<Arc<dyn SeparationModel>, LoadFailure>>>;

/// Registry of loaded separation models, shared by reference
pub struct ModelRegistry {
    loader: Box<dyn ModelLoader>,
    slots: RwLock<HashMap<String, Slot>>,
}

impl ModelRegistry {
    pub fn new<L: ModelLoader + 'static>(loader: L) -> Self {
        Self {
            loader: Box::new(loader),
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Registry over ONNX files in `config.models_dir`
    ///
    /// Nothing is loaded until `get` or `preload`.
    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::new(OnnxModelLoader::new(config.models_dir.clone()))
    }

    /// Resolve a model, loading it on first use
    pub fn get(&self, name: &str) -> MlResult<Arc<dyn SeparationModel>> {
        let slot = self.slot(name);
        let outcome = slot.get_or_init(|| self.load_outcome(name));

        match outcome {
            Ok(model) => Ok(Arc::clone(model)),
            Err(LoadFailure::NotFound) => Err(MlError::ModelNotFound {
                name: name.to_string(),
            }),
            Err(LoadFailure::Failed(reason)) => Err(MlError::ModelLoadFailed {
                name: name.to_string(),
                reason: reason.clone(),
            }),
        }
    }

    /// Register a ready model under its own name
    ///
    /// A name is settled once: inserting over a loaded, failed or inserted
    /// entry is `InvalidConfiguration` and leaves the existing entry in place.
    pub fn insert(&self, model: Arc<dyn SeparationModel>) -> MlResult<()> {
        let name = model.name().to_string();
        let slot = self.slot(&name);
        slot.set(Ok(model)).map_err(|_| {
            MlError::InvalidConfiguration(format!("model {} is already registered", name))
        })?;
        log::debug!("Registered model {}", name);
        Ok(())
    }

    /// Load every name now; returns one outcome per name, in order
    pub fn preload<S: AsRef<str>>(&self, names: &[S]) -> Vec<(String, MlResult<()>)> {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                (name.to_string(), self.get(name).map(|_| ()))
            })
            .collect()
    }

    /// Preload the models listed in a registry config
    pub fn preload_config(&self, config: &RegistryConfig) -> Vec<(String, MlResult<()>)> {
        let names: Vec<&str> = config.preload.iter().map(|k| k.name()).collect();
        self.preload(&names)
    }

    /// Names whose load succeeded, sorted
    pub fn loaded_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .slots
            .read()
            .iter()
            .filter(|(_, slot)| matches!(slot.get(), Some(Ok(_))))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    fn slot(&self, name: &str) -> Slot {
        if let Some(slot) = self.slots.read().get(name) {
            return Arc::clone(slot);
        }
        Arc::clone(self.slots.write().entry(name.to_string()).or_default())
    }

    fn load_outcome(&self, name: &str) -> Result<Arc<dyn SeparationModel>, LoadFailure> {
        match self.loader.load(name) {
            Ok(model) => {
                log::info!(
                    "Loaded model {} ({} sources, segment {} samples)",
                    name,
                    model.source_names().len(),
                    model.segment_length()
                );
                Ok(model)
            }
            Err(MlError::ModelNotFound { .. }) => {
                log::warn!("Unknown model {}", name);
                Err(LoadFailure::NotFound)
            }
            Err(e) => {
                log::warn!("Failed to load model {}: {}", name, e);
                Err(LoadFailure::Failed(match e {
                    MlError::ModelLoadFailed { reason, .. } => reason,
                    other => other.to_string(),
                }))
            }
        }
    }
}
