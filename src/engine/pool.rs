//! Model Pool Manager
//!
//! Resolves the model file of every cascade slot up front and compiles each
//! model lazily on first use. Compiled models stay cached for the lifetime
//! of the pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use openvino::{CompiledModel, Core, InferRequest};
use parking_lot::{Mutex, RwLock};
use tracing::info;

use crate::config::{InferenceConfig, ModelsConfig};
use crate::error::{CascadeError, Result};

use super::slot::ClassifierSlot;

/// Wrapper for OpenVINO Core that can be shared across threads
struct SafeCore(Core);

// SAFETY: the OpenVINO C++ core is thread-safe; the Rust handle is only ever
// used behind the pool's mutex.
unsafe impl Send for SafeCore {}

/// Compiled model shared between worker threads
///
/// The Rust bindings need `&mut CompiledModel` to create an infer request,
/// so access goes through a mutex. Requests themselves are per-call.
#[derive(Clone)]
pub struct SharedCompiledModel(Arc<Mutex<CompiledModel>>);

// SAFETY: CompiledModel wraps a thread-safe C++ object and every access is
// serialized through the mutex.
unsafe impl Send for SharedCompiledModel {}
unsafe impl Sync for SharedCompiledModel {}

impl SharedCompiledModel {
    pub fn create_infer_request(&self) -> std::result::Result<InferRequest, openvino::InferenceError> {
        self.0.lock().create_infer_request()
    }

    /// Dimensions of the model's single output port
    pub fn output_dims(&self) -> std::result::Result<Vec<i64>, openvino::InferenceError> {
        let port = self.0.lock().get_output()?;
        Ok(port.get_shape()?.get_dimensions().to_vec())
    }
}

/// Model pool with lazy loading, one cache entry per cascade slot
pub struct ModelPool {
    core: Mutex<SafeCore>,
    device: String,
    paths: Vec<PathBuf>,
    cache: Vec<RwLock<Option<SharedCompiledModel>>>,
}

impl ModelPool {
    /// Create a model pool, checking that every slot's model file exists
    pub fn new(inference: &InferenceConfig, models: &ModelsConfig) -> Result<Self> {
        let paths = resolve_model_paths(models)?;

        let core = Core::new().map_err(|e| {
            CascadeError::config(format!("failed to initialize OpenVINO runtime: {}", e))
        })?;

        info!(
            "Model pool ready: {} slots on device {}",
            ClassifierSlot::COUNT,
            inference.device
        );

        Ok(Self {
            core: Mutex::new(SafeCore(core)),
            device: inference.device.clone(),
            paths,
            cache: (0..ClassifierSlot::COUNT).map(|_| RwLock::new(None)).collect(),
        })
    }

    /// Device models are compiled for
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Model file for a slot
    pub fn model_path(&self, slot: ClassifierSlot) -> &Path {
        &self.paths[slot.ordinal()]
    }

    /// Get or compile the model for a slot
    pub fn get_model(&self, slot: ClassifierSlot) -> Result<SharedCompiledModel> {
        let cache = &self.cache[slot.ordinal()];

        if let Some(compiled) = cache.read().as_ref() {
            return Ok(compiled.clone());
        }

        let mut write_guard = cache.write();

        // Double-check after acquiring write lock
        if let Some(compiled) = write_guard.as_ref() {
            return Ok(compiled.clone());
        }

        let path = self.model_path(slot);
        info!("Loading model: {} from {}", slot, path.display());
        let start = Instant::now();

        let path_str = path.to_str().ok_or_else(|| {
            CascadeError::config(format!("model path is not valid UTF-8: {}", path.display()))
        })?;

        let compiled = {
            let mut core = self.core.lock();
            let model = core.0.read_model_from_file(path_str, "").map_err(|e| {
                CascadeError::config(format!(
                    "cannot read model {} from {}: {}",
                    slot,
                    path.display(),
                    e
                ))
            })?;
            core.0
                .compile_model(&model, self.device.as_str().into())
                .map_err(|e| {
                    CascadeError::config(format!(
                        "cannot compile model {} for device {}: {}",
                        slot, self.device, e
                    ))
                })?
        };
        let shared = SharedCompiledModel(Arc::new(Mutex::new(compiled)));

        info!("Model {} loaded in {:?}", slot, start.elapsed());

        *write_guard = Some(shared.clone());
        Ok(shared)
    }

    /// Class count of a slot's model, read from its output port
    pub fn output_classes(&self, slot: ClassifierSlot) -> Result<usize> {
        let dims = self.get_model(slot)?.output_dims().map_err(|e| {
            CascadeError::config(format!("cannot read output shape of model {}: {}", slot, e))
        })?;
        classes_from_dims(&dims).ok_or_else(|| {
            CascadeError::config(format!(
                "model {} has unusable output shape {:?}",
                slot, dims
            ))
        })
    }

    /// Compile every slot now instead of on first use
    pub fn preload(&self) -> Result<()> {
        for slot in ClassifierSlot::all() {
            self.get_model(slot)?;
        }
        Ok(())
    }

    pub fn is_loaded(&self, slot: ClassifierSlot) -> bool {
        self.cache[slot.ordinal()].read().is_some()
    }

    /// Load state of all slots, in cascade order
    pub fn get_status(&self) -> Vec<(ClassifierSlot, bool)> {
        ClassifierSlot::all()
            .into_iter()
            .map(|slot| (slot, self.is_loaded(slot)))
            .collect()
    }
}

/// Class count from a classifier output shape such as `[1, 7]`
pub fn classes_from_dims(dims: &[i64]) -> Option<usize> {
    match dims.last() {
        Some(&n) if n > 0 => usize::try_from(n).ok(),
        _ => None,
    }
}

/// Resolve and check every slot's model file, reporting all missing files at once
pub fn resolve_model_paths(models: &ModelsConfig) -> Result<Vec<PathBuf>> {
    let paths: Vec<PathBuf> = ClassifierSlot::all()
        .into_iter()
        .map(|slot| models.slot_path(slot))
        .collect();

    let missing: Vec<String> = paths
        .iter()
        .filter(|p| !p.is_file())
        .map(|p| p.display().to_string())
        .collect();

    if !missing.is_empty() {
        return Err(CascadeError::config(format!(
            "missing {} of {} model files: {}",
            missing.len(),
            ClassifierSlot::COUNT,
            missing.join(", ")
        )));
    }

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn models_config(dir: &Path) -> ModelsConfig {
        ModelsConfig {
            model_dir: dir.to_path_buf(),
            ..ModelsConfig::default()
        }
    }

    #[test]
    fn test_missing_models_rejected_before_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let result = ModelPool::new(&InferenceConfig::default(), &models_config(dir.path()));

        match result {
            Err(CascadeError::Configuration { message }) => {
                assert!(message.contains("missing 10 of 10"), "{}", message);
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("pool created without model files"),
        }
    }

    #[test]
    fn test_classes_from_dims() {
        assert_eq!(classes_from_dims(&[1, 3]), Some(3));
        assert_eq!(classes_from_dims(&[1, 1, 7]), Some(7));
        assert_eq!(classes_from_dims(&[2]), Some(2));
        assert_eq!(classes_from_dims(&[]), None);
        assert_eq!(classes_from_dims(&[1, 0]), None);
        assert_eq!(classes_from_dims(&[1, -1]), None);
    }

    #[test]
    fn test_resolve_reports_only_missing_slots() {
        let dir = tempfile::tempdir().unwrap();
        let models = models_config(dir.path());

        for slot in ClassifierSlot::all().into_iter().skip(1) {
            let path = models.slot_path(slot);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, b"").unwrap();
        }

        let err = resolve_model_paths(&models).unwrap_err().to_string();
        assert!(err.contains("missing 1 of 10"), "{}", err);
        assert!(err.contains("RES18_AUGU_MASK_FC"), "{}", err);

        let mask = models.slot_path(ClassifierSlot::Mask);
        std::fs::create_dir_all(mask.parent().unwrap()).unwrap();
        std::fs::write(&mask, b"").unwrap();

        let paths = resolve_model_paths(&models).unwrap();
        assert_eq!(paths.len(), ClassifierSlot::COUNT);
        assert_eq!(paths[0], mask);
    }
}
