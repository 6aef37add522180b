//! Mic LED, player LEDs and lightbar settings.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// Mic mute LED behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MicLed {
    #[default]
    Off,
    On,
    /// Slowly pulses between dim and bright.
    Pulse,
}

impl MicLed {
    pub fn code(self) -> u8 {
        match self {
            MicLed::Off => 0,
            MicLed::On => 1,
            MicLed::Pulse => 2,
        }
    }
}

/// Bitmask of the five player indicator LEDs, left to right.
///
/// Serialized as the raw bits; bits above the five LEDs are dropped on input.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct PlayerLed(u8);

impl From<u8> for PlayerLed {
    fn from(bits: u8) -> Self {
        Self::from_bits_truncate(bits)
    }
}

impl From<PlayerLed> for u8 {
    fn from(leds: PlayerLed) -> Self {
        leds.0
    }
}

impl PlayerLed {
    pub const NONE: Self = Self(0x00);
    pub const LEFT: Self = Self(0x01);
    pub const MIDDLE_LEFT: Self = Self(0x02);
    pub const MIDDLE: Self = Self(0x04);
    pub const MIDDLE_RIGHT: Self = Self(0x08);
    pub const RIGHT: Self = Self(0x10);

    pub const PLAYER_1: Self = Self::MIDDLE;
    pub const PLAYER_2: Self = Self(Self::MIDDLE_LEFT.0 | Self::MIDDLE_RIGHT.0);
    pub const PLAYER_3: Self = Self(Self::LEFT.0 | Self::MIDDLE.0 | Self::RIGHT.0);
    pub const PLAYER_4: Self =
        Self(Self::LEFT.0 | Self::MIDDLE_LEFT.0 | Self::MIDDLE_RIGHT.0 | Self::RIGHT.0);
    pub const ALL: Self = Self(0x1F);

    /// Build from raw bits, dropping anything above the five LED positions.
    pub const fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for PlayerLed {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for PlayerLed {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for PlayerLed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlayerLed({:#07b})", self.0)
    }
}

/// Player LED brightness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerLedBrightness {
    Low,
    Medium,
    #[default]
    High,
}

impl PlayerLedBrightness {
    pub fn code(self) -> u8 {
        match self {
            PlayerLedBrightness::Low => 0x02,
            PlayerLedBrightness::Medium => 0x01,
            PlayerLedBrightness::High => 0x00,
        }
    }
}

/// What the lightbar shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightbarBehavior {
    /// Firmware default: pulse blue, then stay on.
    #[default]
    PulseBlue,
    /// Fade out and show [`LightbarColor`].
    CustomColor,
}

impl LightbarBehavior {
    pub fn code(self) -> u8 {
        match self {
            LightbarBehavior::PulseBlue => 0x01,
            LightbarBehavior::CustomColor => 0x02,
        }
    }
}

/// Lightbar colour, each channel a fraction in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightbarColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl LightbarColor {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Colour from 8-bit channels.
    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    }
}

impl Default for LightbarColor {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_presets() {
        assert_eq!(PlayerLed::PLAYER_1.bits(), 0x04);
        assert_eq!(PlayerLed::PLAYER_2.bits(), 0x0A);
        assert_eq!(PlayerLed::PLAYER_3.bits(), 0x15);
        assert_eq!(PlayerLed::PLAYER_4.bits(), 0x1B);
        assert_eq!(PlayerLed::ALL.bits(), 0x1F);
    }

    #[test]
    fn test_player_led_combine() {
        let mut leds = PlayerLed::LEFT | PlayerLed::RIGHT;
        assert!(leds.contains(PlayerLed::LEFT));
        assert!(!leds.contains(PlayerLed::MIDDLE));
        leds |= PlayerLed::MIDDLE;
        assert_eq!(leds, PlayerLed::PLAYER_3);
        assert_eq!(PlayerLed::from_bits_truncate(0xFF), PlayerLed::ALL);
    }

    #[test]
    fn test_codes() {
        assert_eq!(MicLed::Pulse.code(), 2);
        assert_eq!(PlayerLedBrightness::Low.code(), 2);
        assert_eq!(PlayerLedBrightness::High.code(), 0);
        assert_eq!(LightbarBehavior::CustomColor.code(), 2);
    }

    #[test]
    fn test_default_color_is_blue() {
        assert_eq!(LightbarColor::default(), LightbarColor::new(0.0, 0.0, 1.0));
    }
}
