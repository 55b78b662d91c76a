use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::app::TryOnSettings;
use crate::catalog::{default_entries, Catalog, CategoryEntry};
use crate::gesture::GestureConfig;
use crate::renderer::OverlayConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub catalog: Vec<CategoryEntry>,
    pub assets_dir: PathBuf,
    pub gesture: GestureSection,
    pub overlay: OverlaySection,
    pub models: ModelPaths,
    pub defaults: Defaults,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GestureSection {
    pub cooldown_ms: u64,
    pub threshold: f32,
    pub palm_toggles_try_all: bool,
    pub try_all_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OverlaySection {
    pub earring_width_ratio: f32,
    pub necklace_width_ratio: f32,
    pub necklace_drop_ratio: f32,
    pub flash_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelPaths {
    pub face_detection: PathBuf,
    pub face_mesh: PathBuf,
    pub hand_landmark: PathBuf,
    /// Minimum hand presence score.
    pub hand_score_threshold: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Defaults {
    pub mirror_mode: bool,
    pub show_hud: bool,
    pub hud_scale: u32,
    pub initial_category: Option<String>,
}

impl Default for GestureSection {
    fn default() -> Self {
        Self {
            cooldown_ms: 600,
            threshold: 0.12,
            palm_toggles_try_all: false,
            try_all_interval_ms: 1500,
        }
    }
}

impl Default for OverlaySection {
    fn default() -> Self {
        Self {
            earring_width_ratio: 0.25,
            necklace_width_ratio: 1.2,
            necklace_drop_ratio: 0.2,
            flash_ms: 250,
        }
    }
}

impl Default for ModelPaths {
    fn default() -> Self {
        Self {
            face_detection: PathBuf::from("models/face_detection.onnx"),
            face_mesh: PathBuf::from("models/face_mesh.onnx"),
            hand_landmark: PathBuf::from("models/hand_landmark.onnx"),
            hand_score_threshold: 0.5,
        }
    }
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            mirror_mode: true,
            show_hud: true,
            hud_scale: 2,
            initial_category: None,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            catalog: default_entries(),
            assets_dir: PathBuf::from("assets"),
            gesture: GestureSection::default(),
            overlay: OverlaySection::default(),
            models: ModelPaths::default(),
            defaults: Defaults::default(),
        }
    }
}

impl AppConfig {
    pub const DEFAULT_PATH: &'static str = "config.json";

    /// Load from `path`, falling back to defaults, and write the result back
    /// so newly added fields show up in the file.
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            // Missing fields take their defaults via #[serde(default)]
            match serde_json::from_str::<AppConfig>(&content) {
                Ok(c) => {
                    info!("Loaded configuration from {}", path.display());
                    c
                }
                Err(e) => {
                    warn!("Error parsing config {}: {}. Loading defaults.", path.display(), e);
                    Self::default()
                }
            }
        } else {
            info!("Configuration file not found. Creating default at {}", path.display());
            Self::default()
        };

        config.save(path)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Validate the catalog. Unknown or malformed categories stop startup here.
    pub fn build_catalog(&self) -> Result<Catalog> {
        let catalog = Catalog::new(&self.catalog).context("Invalid jewelry catalog in config")?;
        if let Some(initial) = &self.defaults.initial_category {
            catalog
                .resolve(initial)
                .context("defaults.initial_category is not in the catalog")?;
        }
        Ok(catalog)
    }

    pub fn settings(&self) -> TryOnSettings {
        TryOnSettings {
            gesture: GestureConfig {
                cooldown: Duration::from_millis(self.gesture.cooldown_ms),
                threshold: self.gesture.threshold,
                palm_enabled: self.gesture.palm_toggles_try_all,
            },
            overlay: OverlayConfig {
                earring_width_ratio: self.overlay.earring_width_ratio,
                necklace_width_ratio: self.overlay.necklace_width_ratio,
                necklace_drop_ratio: self.overlay.necklace_drop_ratio,
            },
            try_all_interval: Duration::from_millis(self.gesture.try_all_interval_ms),
            flash: Duration::from_millis(self.overlay.flash_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shipped_config_parses() {
        let config: AppConfig = serde_json::from_str(include_str!("../config.json")).unwrap();
        let catalog = config.build_catalog().unwrap();
        assert_eq!(catalog.len(), 4);
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{ "gesture": { "cooldown_ms": 1000 } }"#).unwrap();
        assert_eq!(config.gesture.cooldown_ms, 1000);
        assert_eq!(config.gesture.threshold, 0.12);
        assert_eq!(config.catalog, default_entries());

        let settings = config.settings();
        assert_eq!(settings.gesture.cooldown, Duration::from_millis(1000));
        assert_eq!(settings.overlay, OverlayConfig::default());
    }

    #[test]
    fn test_bad_catalog_fails_fast() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "catalog": [ { "id": "silver_rings", "count": 3 } ] }"#).unwrap();
        assert!(config.build_catalog().is_err());

        let config = AppConfig {
            defaults: Defaults { initial_category: Some("platinum_earrings".into()), ..Defaults::default() },
            ..AppConfig::default()
        };
        assert!(config.build_catalog().is_err());
    }

    #[test]
    fn test_load_writes_defaults() {
        let dir = std::env::temp_dir().join(format!("rusty_jewels_cfg_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        let _ = fs::remove_file(&path);

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());

        fs::write(&path, "{ not json").unwrap();
        assert_eq!(AppConfig::load(&path).unwrap(), AppConfig::default());
        let _ = fs::remove_dir_all(&dir);
    }
}
