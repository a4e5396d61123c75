//! Cascade inference configuration

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::engine::preprocess::{CLASSIFIER_INPUT_SIZE, DEFAULT_MEAN, DEFAULT_STD};
use crate::engine::slot::ClassifierSlot;
use crate::error::{CascadeError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub inference: InferenceConfig,
    pub models: ModelsConfig,
    pub data: DataConfig,
    pub output: OutputConfig,
    pub preprocess: PreprocessConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// OpenVINO device name, e.g. "CPU", "GPU" or "AUTO"
    pub device: String,
    pub batch_size: usize,
    /// Batches processed concurrently
    pub num_workers: usize,
}

/// Model files live at `<model_dir>/<prefix>_<SLOT_KEY>_<suffix>/<file_name>`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub model_dir: PathBuf,
    pub prefix: String,
    pub suffix: String,
    pub file_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub data_dir: PathBuf,
    pub data_folder: String,
    pub info_file: String,
    pub id_column: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub output_dir: PathBuf,
    pub file_name: String,
    pub label_column: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub input_width: u32,
    pub input_height: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load `path`, or the built-in defaults when the file does not exist
    pub fn load_or_default(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("{} not found, using default config", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))
    }

    pub fn default_path() -> &'static str {
        "config.toml"
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.inference.batch_size == 0 {
            return Err(CascadeError::config("inference.batch_size must be at least 1"));
        }
        if self.inference.num_workers == 0 {
            return Err(CascadeError::config("inference.num_workers must be at least 1"));
        }
        if self.inference.device.trim().is_empty() {
            return Err(CascadeError::config("inference.device must not be empty"));
        }
        if self.preprocess.input_width == 0 || self.preprocess.input_height == 0 {
            return Err(CascadeError::config("preprocess input size must be non-zero"));
        }
        if self.preprocess.std.iter().any(|s| s.is_nan() || *s <= 0.0) {
            return Err(CascadeError::config("preprocess.std values must be positive"));
        }
        if self.data.id_column.is_empty() || self.output.label_column.is_empty() {
            return Err(CascadeError::config("column names must not be empty"));
        }
        Ok(())
    }

    /// Directory holding the info CSV's images
    pub fn image_root(&self) -> PathBuf {
        self.data.data_dir.join(&self.data.data_folder)
    }

    pub fn info_path(&self) -> PathBuf {
        self.data.data_dir.join(&self.data.info_file)
    }

    pub fn output_path(&self) -> PathBuf {
        self.output.output_dir.join(&self.output.file_name)
    }
}

impl ModelsConfig {
    /// Model file for one cascade slot
    pub fn slot_path(&self, slot: ClassifierSlot) -> PathBuf {
        let mut dir = String::new();
        if !self.prefix.is_empty() {
            dir.push_str(&self.prefix);
            dir.push('_');
        }
        dir.push_str(&slot.key());
        if !self.suffix.is_empty() {
            dir.push('_');
            dir.push_str(&self.suffix);
        }
        self.model_dir.join(dir).join(&self.file_name)
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            device: "CPU".to_string(),
            batch_size: 1,
            num_workers: 4,
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("model"),
            prefix: "RES18_AUGU".to_string(),
            suffix: "FC".to_string(),
            file_name: "model.xml".to_string(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/opt/ml/input/data/eval"),
            data_folder: "images".to_string(),
            info_file: "info.csv".to_string(),
            id_column: "ImageID".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            file_name: "output.csv".to_string(),
            label_column: "ans".to_string(),
        }
    }
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            input_width: CLASSIFIER_INPUT_SIZE.0,
            input_height: CLASSIFIER_INPUT_SIZE.1,
            mean: DEFAULT_MEAN,
            std: DEFAULT_STD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::labels::{GenderState, MaskState};

    #[test]
    fn test_defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [inference]
            device = "GPU"
            batch_size = 16

            [models]
            model_dir = "/opt/ml/code/model"
            "#,
        )
        .unwrap();

        assert_eq!(config.inference.device, "GPU");
        assert_eq!(config.inference.batch_size, 16);
        assert_eq!(config.inference.num_workers, 4);
        assert_eq!(config.models.prefix, "RES18_AUGU");
        assert_eq!(config.output.label_column, "ans");
        assert_eq!(config.preprocess.input_height, 512);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.inference.device, "CPU");
        assert_eq!(config.models.prefix, "RES18_AUGU");
    }

    #[test]
    fn test_broken_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        std::fs::write(&path, "[inference\ndevice = \"GPU\"\n").unwrap();
        let err = Config::load_or_default(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("failed to load config"), "{:#}", err);

        std::fs::write(&path, "[inference]\nbatch_size = \"sixteen\"\n").unwrap();
        assert!(Config::load_or_default(&path).is_err());

        std::fs::write(&path, "[inference]\nbatch_size = 16\n").unwrap();
        let config = Config::load_or_default(&path).unwrap();
        assert_eq!(config.inference.batch_size, 16);
    }

    #[test]
    fn test_slot_path() {
        let models = ModelsConfig {
            model_dir: PathBuf::from("/models"),
            ..ModelsConfig::default()
        };
        let path = models.slot_path(ClassifierSlot::Age {
            mask: MaskState::NotWorn,
            gender: GenderState::Male,
        });
        assert_eq!(
            path,
            PathBuf::from("/models/RES18_AUGU_MASK2_GENDER0_AGEMOD10_FC/model.xml")
        );

        let bare = ModelsConfig {
            model_dir: PathBuf::from("/models"),
            prefix: String::new(),
            suffix: String::new(),
            file_name: "last.onnx".to_string(),
        };
        assert_eq!(
            bare.slot_path(ClassifierSlot::Mask),
            PathBuf::from("/models/MASK/last.onnx")
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.inference.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.preprocess.std = [0.2, 0.0, 0.2];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.inference.device = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_paths() {
        let mut config = Config::default();
        config.data.data_dir = PathBuf::from("/eval");
        config.output.output_dir = PathBuf::from("/out");
        assert_eq!(config.image_root(), PathBuf::from("/eval/images"));
        assert_eq!(config.info_path(), PathBuf::from("/eval/info.csv"));
        assert_eq!(config.output_path(), PathBuf::from("/out/output.csv"));
    }
}
