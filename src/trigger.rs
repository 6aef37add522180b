//! Adaptive trigger effects.
//!
//! Every effect serializes into a fixed 10-byte segment of the output report:
//!
//! | Effect       | [0]  | [1]            | [2]              | [4..7]        | [9]       |
//! |--------------|------|----------------|------------------|---------------|-----------|
//! | `Default`    | 0x00 |                |                  |               |           |
//! | `Calibrate`  | 0xFC |                |                  |               |           |
//! | `Continuous` | 0x01 | start position | force            |               |           |
//! | `Section`    | 0x02 | start position | end position     |               |           |
//! | `Vibrate`    | 0x26 | 0xFF           | 0x02 if kept     | start/mid/end | frequency |
//!
//! Positions and forces are fractions in [0, 1], quantized on encode.

use serde::{Deserialize, Serialize};

use crate::convert::quantize;

/// Length of one encoded trigger effect.
pub const EFFECT_LEN: usize = 10;

const MODE_DEFAULT: u8 = 0x00;
const MODE_CONTINUOUS: u8 = 0x01;
const MODE_SECTION: u8 = 0x02;
const MODE_VIBRATE: u8 = 0x26;
const MODE_CALIBRATE: u8 = 0xFC;

/// A trigger resistance/vibration profile. Values are immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerEffect {
    /// No resistance.
    #[default]
    Default,
    /// Runs the trigger motor calibration sequence.
    Calibrate,
    /// Constant resistance from `start_position` to the end of travel.
    Continuous { start_position: f32, force: f32 },
    /// Resistance between `start_position` and `end_position`.
    Section { start_position: f32, end_position: f32 },
    /// Vibration with a force profile over the press.
    ///
    /// The start force covers roughly the first half of travel and the middle
    /// force the second half. `end_force` only applies once the trigger bottoms
    /// out, and only when `keep_effect` is set.
    Vibrate {
        frequency_hz: u8,
        start_force: f32,
        middle_force: f32,
        end_force: f32,
        #[serde(default = "keep_effect_default")]
        keep_effect: bool,
    },
}

fn keep_effect_default() -> bool {
    true
}

impl TriggerEffect {
    pub fn continuous(start_position: f32, force: f32) -> Self {
        Self::Continuous {
            start_position,
            force,
        }
    }

    pub fn section(start_position: f32, end_position: f32) -> Self {
        Self::Section {
            start_position,
            end_position,
        }
    }

    /// Vibration effect that keeps playing after a full press.
    pub fn vibrate(frequency_hz: u8, start_force: f32, middle_force: f32, end_force: f32) -> Self {
        Self::Vibrate {
            frequency_hz,
            start_force,
            middle_force,
            end_force,
            keep_effect: true,
        }
    }

    /// Mode byte written at offset 0 of the segment.
    pub fn mode(&self) -> u8 {
        match self {
            Self::Default => MODE_DEFAULT,
            Self::Calibrate => MODE_CALIBRATE,
            Self::Continuous { .. } => MODE_CONTINUOUS,
            Self::Section { .. } => MODE_SECTION,
            Self::Vibrate { .. } => MODE_VIBRATE,
        }
    }

    /// Encode into the 10-byte report segment. Unused positions stay zero.
    pub fn encode(&self) -> [u8; EFFECT_LEN] {
        let mut out = [0u8; EFFECT_LEN];
        out[0] = self.mode();
        match *self {
            Self::Default | Self::Calibrate => {}
            Self::Continuous {
                start_position,
                force,
            } => {
                out[1] = quantize(start_position);
                out[2] = quantize(force);
            }
            Self::Section {
                start_position,
                end_position,
            } => {
                out[1] = quantize(start_position);
                out[2] = quantize(end_position);
            }
            Self::Vibrate {
                frequency_hz,
                start_force,
                middle_force,
                end_force,
                keep_effect,
            } => {
                out[1] = 0xFF;
                if keep_effect {
                    out[2] = 0x02;
                }
                out[4] = quantize(start_force);
                out[5] = quantize(middle_force);
                out[6] = quantize(end_force);
                out[9] = frequency_hz;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_and_calibrate() {
        assert_eq!(TriggerEffect::Default.encode(), [0u8; 10]);
        let cal = TriggerEffect::Calibrate.encode();
        assert_eq!(cal[0], 0xFC);
        assert!(cal[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_vibrate_full_force() {
        let effect = TriggerEffect::vibrate(20, 1.0, 1.0, 1.0);
        assert_eq!(
            effect.encode(),
            [0x26, 0xFF, 0x02, 0x00, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 20]
        );
    }

    #[test]
    fn test_vibrate_without_keep() {
        let effect = TriggerEffect::Vibrate {
            frequency_hz: 200,
            start_force: 0.0,
            middle_force: 0.5,
            end_force: 2.0,
            keep_effect: false,
        };
        assert_eq!(
            effect.encode(),
            [0x26, 0xFF, 0x00, 0x00, 0x00, 0x80, 0xFF, 0x00, 0x00, 200]
        );
    }

    #[test]
    fn test_section_half_rounds_up() {
        assert_eq!(
            TriggerEffect::section(0.0, 0.5).encode(),
            [0x02, 0x00, 0x80, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_continuous_clamps() {
        assert_eq!(
            TriggerEffect::continuous(-1.0, 1.5).encode(),
            [0x01, 0x00, 0xFF, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_vibrate_json_defaults_keep_effect() {
        let json = r#"{"type":"vibrate","frequency_hz":10,"start_force":0.5,"middle_force":1.0,"end_force":1.0}"#;
        let effect: TriggerEffect = serde_json::from_str(json).unwrap();
        assert_eq!(effect, TriggerEffect::vibrate(10, 0.5, 1.0, 1.0));
    }
}
