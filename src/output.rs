//! Output report building and transport framing.
//!
//! Payload layout (47 bytes, transport independent):
//!   [0x00..0x02] = feature enable mask (0xFF 0xF7)
//!   [0x02]       = right rumble
//!   [0x03]       = left rumble
//!   [0x08]       = mic LED
//!   [0x0A..0x14] = R2 trigger effect
//!   [0x15..0x1F] = L2 trigger effect
//!   [0x26]       = 0x03 (custom lightbar control + blue pulse)
//!   [0x29]       = lightbar behaviour
//!   [0x2A]       = player LED brightness
//!   [0x2B]       = 0x20 | player LED bits
//!   [0x2C..0x2F] = lightbar R, G, B
//!
//! Framing:
//!   USB:       [0x02] + payload, padded to the write buffer size
//!   Bluetooth: [0x31, 0x02] + payload ... CRC32(frame[0..74]) LE at [74..78]

use serde::{Deserialize, Serialize};

use crate::convert::quantize;
use crate::error::{Error, Result};
use crate::led::{LightbarBehavior, LightbarColor, MicLed, PlayerLed, PlayerLedBrightness};
use crate::mode::{IoMode, BT_REPORT_SIZE, USB_WRITE_SIZE};
use crate::trigger::{TriggerEffect, EFFECT_LEN};

pub const PAYLOAD_LEN: usize = 47;

const FEATURE_MASK: [u8; 2] = [0xFF, 0xF7];
const RIGHT_RUMBLE: usize = 0x02;
const LEFT_RUMBLE: usize = 0x03;
const MIC_LED: usize = 0x08;
const R2_EFFECT: usize = 0x0A;
const L2_EFFECT: usize = 0x15;
const LIGHTBAR_SETUP: usize = 0x26;
const LIGHTBAR_BEHAVIOR: usize = 0x29;
const PLAYER_BRIGHTNESS: usize = 0x2A;
const PLAYER_LEDS: usize = 0x2B;
const LIGHTBAR_RGB: usize = 0x2C;

/// Enables custom lightbar control and the uninterruptible blue pulse.
const LIGHTBAR_SETUP_FLAGS: u8 = 0x03;
/// Always set alongside the player LED bits.
const PLAYER_LED_ENABLE: u8 = 0x20;

const USB_REPORT_ID: u8 = 0x02;
const BT_REPORT_ID: u8 = 0x31;
const BT_REPORT_FLAG: u8 = 0x02;
const BT_CRC_OFFSET: usize = 74;

/// Everything the host can ask the controller to show or do.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputIntent {
    /// Left (low frequency) motor, 0..1.
    pub left_rumble: f32,
    /// Right (high frequency) motor, 0..1.
    pub right_rumble: f32,
    pub mic_led: MicLed,
    pub player_led: PlayerLed,
    pub player_led_brightness: PlayerLedBrightness,
    pub lightbar_behavior: LightbarBehavior,
    /// Only shown with [`LightbarBehavior::CustomColor`].
    pub lightbar_color: LightbarColor,
    pub r2_effect: TriggerEffect,
    pub l2_effect: TriggerEffect,
}

impl OutputIntent {
    pub fn with_rumble(mut self, left: f32, right: f32) -> Self {
        self.left_rumble = left;
        self.right_rumble = right;
        self
    }

    pub fn with_mic_led(mut self, mic_led: MicLed) -> Self {
        self.mic_led = mic_led;
        self
    }

    pub fn with_player_led(mut self, leds: PlayerLed, brightness: PlayerLedBrightness) -> Self {
        self.player_led = leds;
        self.player_led_brightness = brightness;
        self
    }

    /// Switch the lightbar to a custom colour.
    pub fn with_lightbar_color(mut self, color: LightbarColor) -> Self {
        self.lightbar_behavior = LightbarBehavior::CustomColor;
        self.lightbar_color = color;
        self
    }

    pub fn with_trigger_effects(mut self, l2: TriggerEffect, r2: TriggerEffect) -> Self {
        self.l2_effect = l2;
        self.r2_effect = r2;
        self
    }

    /// Encode the transport-independent 47-byte payload.
    pub fn build_payload(&self) -> [u8; PAYLOAD_LEN] {
        let mut buf = [0u8; PAYLOAD_LEN];

        buf[..2].copy_from_slice(&FEATURE_MASK);
        buf[RIGHT_RUMBLE] = quantize(self.right_rumble);
        buf[LEFT_RUMBLE] = quantize(self.left_rumble);
        buf[MIC_LED] = self.mic_led.code();

        buf[R2_EFFECT..R2_EFFECT + EFFECT_LEN].copy_from_slice(&self.r2_effect.encode());
        buf[L2_EFFECT..L2_EFFECT + EFFECT_LEN].copy_from_slice(&self.l2_effect.encode());

        buf[LIGHTBAR_SETUP] = LIGHTBAR_SETUP_FLAGS;
        buf[LIGHTBAR_BEHAVIOR] = self.lightbar_behavior.code();
        buf[PLAYER_BRIGHTNESS] = self.player_led_brightness.code();
        buf[PLAYER_LEDS] = PLAYER_LED_ENABLE | self.player_led.bits();

        buf[LIGHTBAR_RGB] = quantize(self.lightbar_color.r);
        buf[LIGHTBAR_RGB + 1] = quantize(self.lightbar_color.g);
        buf[LIGHTBAR_RGB + 2] = quantize(self.lightbar_color.b);

        buf
    }
}

/// Wrap a payload in the transport header (and CRC trailer for Bluetooth).
///
/// The frame is `write_buffer_size` bytes long.
pub fn frame_output_report(
    mode: IoMode,
    payload: &[u8; PAYLOAD_LEN],
    write_buffer_size: usize,
) -> Result<Vec<u8>> {
    let required = match mode {
        IoMode::Usb => USB_WRITE_SIZE,
        IoMode::Bluetooth => BT_REPORT_SIZE,
        IoMode::Unknown => return Err(Error::UnframeableMode(mode)),
    };
    if write_buffer_size < required {
        return Err(Error::WriteBufferTooSmall {
            mode,
            actual: write_buffer_size,
            required,
        });
    }

    let mut frame = vec![0u8; write_buffer_size];
    match mode {
        IoMode::Usb => {
            frame[0] = USB_REPORT_ID;
            frame[1..1 + PAYLOAD_LEN].copy_from_slice(payload);
        }
        _ => {
            frame[0] = BT_REPORT_ID;
            frame[1] = BT_REPORT_FLAG;
            frame[2..2 + PAYLOAD_LEN].copy_from_slice(payload);
            let crc = crc32fast::hash(&frame[..BT_CRC_OFFSET]);
            frame[BT_CRC_OFFSET..BT_CRC_OFFSET + 4].copy_from_slice(&crc.to_le_bytes());
        }
    }
    Ok(frame)
}
