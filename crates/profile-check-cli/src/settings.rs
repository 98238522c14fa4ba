use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use profile_check_core::ClassifierConfig;
use serde::Deserialize;

const ENV_PREFIX: &str = "PROFILE_CHECK";

/// Runtime settings: defaults < config file < `PROFILE_CHECK_*` env < flags.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    pub model_path: PathBuf,
    pub profiles_dir: PathBuf,
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
    pub fake_threshold: f32,
    pub volume_threshold: usize,
    pub default_behavior: String,
}

/// Values supplied on the command line, applied last.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub model_path: Option<PathBuf>,
    pub profiles_dir: Option<PathBuf>,
    pub catalog_path: Option<PathBuf>,
}

impl Settings {
    pub fn load(config_path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let defaults = ClassifierConfig::default();
        let mut builder = Config::builder()
            .set_default("model_path", "models/profile_model.json")?
            .set_default("profiles_dir", "profiles")?
            .set_default("fake_threshold", f64::from(defaults.fake_threshold))?
            .set_default("volume_threshold", defaults.volume_threshold as i64)?
            .set_default("default_behavior", defaults.default_behavior)?;

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let mut settings: Settings = builder
            .build()
            .and_then(Config::try_deserialize)
            .with_context(|| match config_path {
                Some(path) => format!("failed to load settings from {}", path.display()),
                None => "failed to load settings".to_string(),
            })?;

        if let Some(model_path) = overrides.model_path {
            settings.model_path = model_path;
        }
        if let Some(profiles_dir) = overrides.profiles_dir {
            settings.profiles_dir = profiles_dir;
        }
        if let Some(catalog_path) = overrides.catalog_path {
            settings.catalog_path = Some(catalog_path);
        }
        Ok(settings)
    }

    pub fn classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig {
            fake_threshold: self.fake_threshold,
            volume_threshold: self.volume_threshold,
            default_behavior: self.default_behavior.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use proptest::prelude::*;
    use std::{env, fs, sync::Mutex};

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const ENV_KEYS: [&str; 6] = [
        "PROFILE_CHECK_MODEL_PATH",
        "PROFILE_CHECK_PROFILES_DIR",
        "PROFILE_CHECK_CATALOG_PATH",
        "PROFILE_CHECK_FAKE_THRESHOLD",
        "PROFILE_CHECK_VOLUME_THRESHOLD",
        "PROFILE_CHECK_DEFAULT_BEHAVIOR",
    ];

    fn with_clean_env<F: FnOnce()>(func: F) {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        for key in ENV_KEYS {
            env::remove_var(key);
        }
        func();
    }

    #[test]
    fn defaults_match_classifier_defaults() {
        with_clean_env(|| {
            let settings = Settings::load(None, Overrides::default()).unwrap();
            assert_eq!(settings.model_path, PathBuf::from("models/profile_model.json"));
            assert_eq!(settings.profiles_dir, PathBuf::from("profiles"));
            assert!(settings.catalog_path.is_none());
            assert_eq!(settings.classifier_config(), ClassifierConfig::default());
        });
    }

    #[test]
    fn file_then_env_then_flags() {
        with_clean_env(|| {
            let temp = tempfile::tempdir().unwrap();
            let path = temp.path().join("profile-check.toml");
            fs::write(
                &path,
                "fake_threshold = 0.8\nprofiles_dir = \"from-file\"\nvolume_threshold = 3\n",
            )
            .unwrap();
            env::set_var("PROFILE_CHECK_VOLUME_THRESHOLD", "9");

            let settings = Settings::load(
                Some(&path),
                Overrides {
                    model_path: Some("flag-model.json".into()),
                    ..Overrides::default()
                },
            )
            .unwrap();
            env::remove_var("PROFILE_CHECK_VOLUME_THRESHOLD");

            assert!((settings.fake_threshold - 0.8).abs() < f32::EPSILON);
            assert_eq!(settings.profiles_dir, PathBuf::from("from-file"));
            assert_eq!(settings.volume_threshold, 9);
            assert_eq!(settings.model_path, PathBuf::from("flag-model.json"));
        });
    }

    #[test]
    fn missing_config_file_errors() {
        with_clean_env(|| {
            let temp = tempfile::tempdir().unwrap();
            let path = temp.path().join("absent.toml");
            let err = Settings::load(Some(&path), Overrides::default()).unwrap_err();
            assert!(err.to_string().contains("failed to load settings"));
        });
    }

    proptest! {
        #[test]
        fn thresholds_survive_the_file_layer(threshold in 0.01f32..0.99f32, volume in 0usize..50) {
            let _guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let temp = tempfile::tempdir().unwrap();
            let path = temp.path().join("settings.json");
            fs::write(
                &path,
                serde_json::json!({
                    "fake_threshold": threshold,
                    "volume_threshold": volume,
                })
                .to_string(),
            )
            .unwrap();
            let settings = Settings::load(Some(&path), Overrides::default()).unwrap();
            prop_assert!((settings.fake_threshold - threshold).abs() < 1e-6);
            prop_assert_eq!(settings.volume_threshold, volume);
        }
    }
}
