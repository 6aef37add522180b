//! DualSense controller driver.
//!
//! Decodes input reports (sticks, triggers, buttons, touchpad, motion,
//! battery), encodes output reports (rumble, LEDs, lightbar, adaptive
//! triggers) for both USB and Bluetooth, and runs a polling worker that
//! exchanges one report pair per tick.

pub mod controller;
pub mod convert;
pub mod delta;
pub mod error;
pub mod input;
pub mod led;
pub mod mode;
pub mod output;
pub mod poller;
pub mod preset;
pub mod transport;
pub mod trigger;

pub use controller::{ControllerState, DualSense};
pub use delta::{ButtonDelta, ButtonTransition};
pub use error::{Error, PresetError, ReportError, Result};
pub use input::{BatteryStatus, Button, ButtonSet, InputSnapshot, Touch, Vec2, Vec3};
pub use led::{LightbarBehavior, LightbarColor, MicLed, PlayerLed, PlayerLedBrightness};
pub use mode::IoMode;
pub use output::{frame_output_report, OutputIntent};
pub use poller::{PollHandler, StateAndButtons};
pub use transport::hid::{enumerate_controllers, list_devices, HidTransport};
pub use transport::{DeviceDescriptor, Transfer, Transport, TransportError};
pub use trigger::TriggerEffect;
