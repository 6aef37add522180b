//! Output presets stored as JSON.
//!
//! A preset is a serialized [`OutputIntent`]; any field left out takes its
//! default, so `{"lightbar_color": {"r": 1.0, "g": 0.0, "b": 0.0}}` is valid.

use std::path::Path;

use tracing::info;

use crate::error::PresetError;
use crate::output::OutputIntent;

pub fn load(path: &Path) -> Result<OutputIntent, PresetError> {
    let text = std::fs::read_to_string(path).map_err(|source| PresetError::Io {
        path: path.to_owned(),
        source,
    })?;
    let intent = serde_json::from_str(&text).map_err(|source| PresetError::Parse {
        path: path.to_owned(),
        source,
    })?;
    info!("[PRESET] Loaded {}", path.display());
    Ok(intent)
}

pub fn save(path: &Path, intent: &OutputIntent) -> Result<(), PresetError> {
    let json = serde_json::to_string_pretty(intent).map_err(|source| PresetError::Encode {
        path: path.to_owned(),
        source,
    })?;
    std::fs::write(path, json).map_err(|source| PresetError::Write {
        path: path.to_owned(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::led::{LightbarBehavior, LightbarColor, PlayerLed};
    use crate::trigger::TriggerEffect;

    #[test]
    fn test_load_partial_preset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.json");
        std::fs::write(
            &path,
            r#"{
                "lightbar_behavior": "custom_color",
                "lightbar_color": {"r": 1.0, "g": 0.0, "b": 0.0},
                "r2_effect": {"type": "continuous", "start_position": 0.2, "force": 0.8}
            }"#,
        )
        .unwrap();

        let intent = load(&path).unwrap();
        assert_eq!(intent.lightbar_behavior, LightbarBehavior::CustomColor);
        assert_eq!(intent.lightbar_color, LightbarColor::new(1.0, 0.0, 0.0));
        assert_eq!(intent.r2_effect, TriggerEffect::continuous(0.2, 0.8));
        assert_eq!(intent.l2_effect, TriggerEffect::Default);
        assert_eq!(intent.player_led, PlayerLed::NONE);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.json");
        let intent = OutputIntent::default()
            .with_rumble(0.5, 0.25)
            .with_trigger_effects(TriggerEffect::Calibrate, TriggerEffect::vibrate(10, 0.5, 1.0, 1.0));
        save(&path, &intent).unwrap();
        assert_eq!(load(&path).unwrap(), intent);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, PresetError::Io { .. }));
    }

    #[test]
    fn test_save_reports_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("p.json");
        let err = save(&path, &OutputIntent::default()).unwrap_err();
        assert!(matches!(err, PresetError::Write { .. }));
        assert!(err.to_string().starts_with("failed to write preset"));
    }

    #[test]
    fn test_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load(&path), Err(PresetError::Parse { .. })));
    }
}
