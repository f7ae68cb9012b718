use crate::pixelate::Pixelation;
use crate::spawn::SpawnSettings;
use crate::spawn::placement::PlacementRules;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Every tunable of the effect. Missing keys in a config file fall back to
/// these defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub hand_confidence: f32,
    pub hand_padding: f32,
    pub hand_block: u32,

    pub eye_padding: f32,
    pub eye_block: u32,

    pub face_margin: f32,
    pub blink_threshold: f32,

    pub cooldown_frames: i32,
    pub spawn_delay_ms: u64,
    pub capture_padding: f32,
    pub max_spawned_eyes: Option<usize>,

    pub corner_chance: f64,
    pub corner_offset: f32,
    pub corner_jitter: f32,
    pub edge_offset: f32,
    pub edge_jitter: f32,

    pub seed: Option<u64>,
    pub show_ear: bool,
    pub display_width: u32,
    pub font_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hand_confidence: 0.10,
            hand_padding: 20.,
            hand_block: 18,
            eye_padding: 20.,
            eye_block: 15,
            face_margin: 40.,
            blink_threshold: 0.26,
            cooldown_frames: 20,
            spawn_delay_ms: 150,
            capture_padding: 20.,
            max_spawned_eyes: None,
            corner_chance: 0.2,
            corner_offset: 25.,
            corner_jitter: 25.,
            edge_offset: 20.,
            edge_jitter: 30.,
            seed: None,
            show_ear: false,
            display_width: 1080,
            font_path: PathBuf::from("/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf"),
        }
    }
}

impl Settings {
    /// Defaults, overlaid with the JSON file at `path` if given.
    pub fn load(path: Option<&Path>) -> Result<Settings> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                let settings = Self::from_json(&raw)
                    .with_context(|| format!("Invalid config {}", path.display()))?;
                debug!("Loaded settings from {}: {settings:?}", path.display());
                Ok(settings)
            }
            None => Ok(Settings::default()),
        }
    }

    pub fn from_json(raw: &str) -> Result<Settings> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn hand_pixelation(&self) -> Pixelation {
        Pixelation::new(self.hand_padding, self.hand_block)
    }

    pub fn eye_pixelation(&self) -> Pixelation {
        Pixelation::new(self.eye_padding, self.eye_block)
    }

    pub fn spawn(&self) -> SpawnSettings {
        SpawnSettings {
            cooldown_frames: self.cooldown_frames,
            delay: Duration::from_millis(self.spawn_delay_ms),
            capture_padding: self.capture_padding,
            max_eyes: self.max_spawned_eyes,
            placement: PlacementRules {
                corner_chance: self.corner_chance,
                corner_offset: self.corner_offset,
                corner_jitter: self.corner_jitter,
                edge_offset: self.edge_offset,
                edge_jitter: self.edge_jitter,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_components() {
        let settings = Settings::default();

        assert_eq!(settings.spawn(), SpawnSettings::default());
        assert_eq!(settings.hand_pixelation(), Pixelation::new(20., 18));
        assert_eq!(settings.eye_pixelation(), Pixelation::new(20., 15));
        assert_eq!(settings.blink_threshold, crate::blink::EAR_THRESHOLD);
    }

    #[test]
    fn test_partial_json() {
        let settings = Settings::from_json(r#"{"hand_block": 24, "max_spawned_eyes": 50, "seed": 9}"#)
            .unwrap();

        assert_eq!(settings.hand_block, 24);
        assert_eq!(settings.max_spawned_eyes, Some(50));
        assert_eq!(settings.seed, Some(9));
        assert_eq!(settings.eye_block, 15);
        assert_eq!(settings.cooldown_frames, 20);
    }

    #[test]
    fn test_bad_json() {
        assert!(Settings::from_json(r#"{"hand_block": "big"}"#).is_err());
    }

    #[test]
    fn test_load_without_file() {
        assert_eq!(Settings::load(None).unwrap(), Settings::default());
        assert!(Settings::load(Some(Path::new("/nonexistent/eyespawn.json"))).is_err());
    }
}
