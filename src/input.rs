//! Input report parsing.
//!
//! Layout of the input report once the transport header is stripped
//! (USB `0x01`, Bluetooth `0x31 xx`):
//!   [0..4]   = Left X, Left Y, Right X, Right Y (0x80 = centre, Y grows downward)
//!   [4]      = L2 analog
//!   [5]      = R2 analog
//!   [7]      = Square/Cross/Circle/Triangle (high nibble) | D-pad code (low nibble)
//!   [8]      = L1 R1 L2 R2 Create Menu L3 R3
//!   [9]      = Logo, Touchpad click, Mic
//!   [15..21] = Gyro X/Y/Z (i16 LE)
//!   [21..27] = Accelerometer X/Y/Z (i16 LE)
//!   [32..36] = Touch point 1
//!   [36..40] = Touch point 2
//!   [52]     = Battery
//!   [53]     = Misc status (headphones)

use std::fmt;
use std::ops::Neg;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::convert::{byte_to_signed, byte_to_unsigned, has_flag};
use crate::error::ReportError;
use crate::mode::IoMode;

/// Offset of a byte field within the de-framed report.
///
/// Some Bluetooth connections were once seen delivering a shuffled layout with
/// fields missing; `bluetooth` records where those fields landed. Every
/// connection currently reports the USB layout, so only `usb` is resolved.
#[derive(Debug, Clone, Copy)]
struct Field {
    usb: usize,
    #[allow(dead_code)]
    bluetooth: Option<usize>,
}

impl Field {
    const fn new(usb: usize, bluetooth: Option<usize>) -> Self {
        Self { usb, bluetooth }
    }

    fn resolve(self, _mode: IoMode) -> usize {
        self.usb
    }
}

const LEFT_STICK: (usize, usize) = (0, 1);
const RIGHT_STICK: (usize, usize) = (2, 3);
const L2_ANALOG: Field = Field::new(4, Some(7));
const R2_ANALOG: Field = Field::new(5, Some(8));
const BUTTONS_0: Field = Field::new(7, Some(4));
const BUTTONS_1: Field = Field::new(8, Some(5));
const BUTTONS_2: Field = Field::new(9, Some(6));
const MIC: Field = Field::new(9, None);
const GYRO: [Field; 3] = [
    Field::new(15, None),
    Field::new(17, None),
    Field::new(19, None),
];
const ACCEL: [Field; 3] = [
    Field::new(21, None),
    Field::new(23, None),
    Field::new(25, None),
];
const TOUCH_1: Field = Field::new(32, None);
const TOUCH_2: Field = Field::new(36, None);
const BATTERY: Field = Field::new(52, None);
const STATUS: Field = Field::new(53, None);

/// Smallest de-framed report the parser accepts.
pub const MIN_REPORT_LEN: usize = 54;

const USB_REPORT_ID: u8 = 0x01;
const BT_REPORT_ID: u8 = 0x31;

/// Strip the transport header byte(s) from a raw input report.
///
/// `0x01` (USB) drops one byte, `0x31` (Bluetooth) drops two; anything else
/// is passed through untouched.
pub fn strip_report_header(raw: &[u8]) -> &[u8] {
    let offset = match raw.first() {
        Some(&USB_REPORT_ID) => 1,
        Some(&BT_REPORT_ID) => 2,
        _ => 0,
    };
    raw.get(offset..).unwrap_or(&[])
}

/// A 2D vector. Sticks use +X right, +Y up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Unit vector in the same direction. A zero vector stays zero.
    pub fn normalize(&self) -> Self {
        let m = self.magnitude();
        if m == 0.0 {
            return *self;
        }
        Self::new(self.x / m, self.y / m)
    }
}

impl Neg for Vec2 {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

/// A 3D vector in raw sensor units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Unit vector in the same direction. A zero vector stays zero.
    pub fn normalize(&self) -> Self {
        let m = self.magnitude();
        if m == 0.0 {
            return *self;
        }
        Self::new(self.x / m, self.y / m, self.z / m)
    }
}

impl Neg for Vec3 {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// One of the two touchpad contacts. The pad is 1920x1080, 0-indexed.
///
/// When released, `x`/`y` hold the last position before release.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Touch {
    pub x: u16,
    pub y: u16,
    pub is_down: bool,
    /// Rolling counter, changes on every press and release.
    pub id: u8,
}

impl Touch {
    fn from_bytes(bytes: [u8; 4]) -> Self {
        let raw = u32::from_le_bytes(bytes);
        Self {
            x: ((raw & 0x000F_FF00) >> 8) as u16,
            y: ((raw & 0xFFF0_0000) >> 20) as u16,
            is_down: raw & 0x80 == 0,
            id: bytes[0],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatteryStatus {
    pub is_charging: bool,
    /// Set somewhere between levels 8 and 10, depending on overcharge protection.
    pub is_fully_charged: bool,
    /// 0..=10.
    pub level: u8,
}

impl BatteryStatus {
    fn from_byte(b: u8) -> Self {
        Self {
            is_charging: has_flag(b, 0x10),
            is_fully_charged: has_flag(b, 0x20),
            level: b & 0x0F,
        }
    }
}

/// Every tracked button. This list is the single source of truth for both
/// [`ButtonSet`] and [`ButtonDelta`](crate::delta::ButtonDelta).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Button {
    Square,
    Cross,
    Circle,
    Triangle,
    DPadUp,
    DPadRight,
    DPadDown,
    DPadLeft,
    L1,
    R1,
    L2,
    R2,
    Create,
    Menu,
    L3,
    R3,
    Logo,
    Touchpad,
    Mic,
}

/// Where a button's state comes from in the report.
enum ButtonSource {
    Flag(Field, u8),
    /// D-pad nibble values that count as pressed (diagonals count twice).
    DPad([u8; 3]),
}

impl Button {
    pub const COUNT: usize = 19;

    pub const ALL: [Button; Button::COUNT] = [
        Button::Square,
        Button::Cross,
        Button::Circle,
        Button::Triangle,
        Button::DPadUp,
        Button::DPadRight,
        Button::DPadDown,
        Button::DPadLeft,
        Button::L1,
        Button::R1,
        Button::L2,
        Button::R2,
        Button::Create,
        Button::Menu,
        Button::L3,
        Button::R3,
        Button::Logo,
        Button::Touchpad,
        Button::Mic,
    ];

    /// Position in [`Button::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }

    const fn bit(self) -> u32 {
        1 << (self as u32)
    }

    pub fn name(self) -> &'static str {
        match self {
            Button::Square => "square",
            Button::Cross => "cross",
            Button::Circle => "circle",
            Button::Triangle => "triangle",
            Button::DPadUp => "dpad_up",
            Button::DPadRight => "dpad_right",
            Button::DPadDown => "dpad_down",
            Button::DPadLeft => "dpad_left",
            Button::L1 => "l1",
            Button::R1 => "r1",
            Button::L2 => "l2",
            Button::R2 => "r2",
            Button::Create => "create",
            Button::Menu => "menu",
            Button::L3 => "l3",
            Button::R3 => "r3",
            Button::Logo => "logo",
            Button::Touchpad => "touchpad",
            Button::Mic => "mic",
        }
    }

    fn source(self) -> ButtonSource {
        match self {
            Button::Square => ButtonSource::Flag(BUTTONS_0, 0x10),
            Button::Cross => ButtonSource::Flag(BUTTONS_0, 0x20),
            Button::Circle => ButtonSource::Flag(BUTTONS_0, 0x40),
            Button::Triangle => ButtonSource::Flag(BUTTONS_0, 0x80),
            Button::DPadUp => ButtonSource::DPad([0, 1, 7]),
            Button::DPadRight => ButtonSource::DPad([1, 2, 3]),
            Button::DPadDown => ButtonSource::DPad([3, 4, 5]),
            Button::DPadLeft => ButtonSource::DPad([5, 6, 7]),
            Button::L1 => ButtonSource::Flag(BUTTONS_1, 0x01),
            Button::R1 => ButtonSource::Flag(BUTTONS_1, 0x02),
            Button::L2 => ButtonSource::Flag(BUTTONS_1, 0x04),
            Button::R2 => ButtonSource::Flag(BUTTONS_1, 0x08),
            Button::Create => ButtonSource::Flag(BUTTONS_1, 0x10),
            Button::Menu => ButtonSource::Flag(BUTTONS_1, 0x20),
            Button::L3 => ButtonSource::Flag(BUTTONS_1, 0x40),
            Button::R3 => ButtonSource::Flag(BUTTONS_1, 0x80),
            Button::Logo => ButtonSource::Flag(BUTTONS_2, 0x01),
            Button::Touchpad => ButtonSource::Flag(BUTTONS_2, 0x02),
            // Unreliable over the shuffled Bluetooth layout, hence its own field.
            Button::Mic => ButtonSource::Flag(MIC, 0x04),
        }
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pressed/released state of every [`Button`].
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ButtonSet(u32);

impl ButtonSet {
    pub fn get(&self, button: Button) -> bool {
        self.0 & button.bit() != 0
    }

    pub fn set(&mut self, button: Button, pressed: bool) {
        if pressed {
            self.0 |= button.bit();
        } else {
            self.0 &= !button.bit();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Pressed buttons, in [`Button::ALL`] order.
    pub fn pressed(&self) -> impl Iterator<Item = Button> + '_ {
        Button::ALL.into_iter().filter(|&b| self.get(b))
    }
}

impl fmt::Debug for ButtonSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.pressed()).finish()
    }
}

impl Serialize for ButtonSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Button::COUNT))?;
        for button in Button::ALL {
            map.serialize_entry(button.name(), &self.get(button))?;
        }
        map.end()
    }
}

/// Parsed, immutable view of one input report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InputSnapshot {
    left_stick: Vec2,
    right_stick: Vec2,
    l2: f32,
    r2: f32,
    buttons: ButtonSet,
    touch1: Touch,
    touch2: Touch,
    gyro: Vec3,
    accelerometer: Vec3,
    battery: BatteryStatus,
    headphones_connected: bool,
}

impl InputSnapshot {
    /// Parse a de-framed input report (see [`strip_report_header`]).
    ///
    /// Stick axes whose magnitude is below `dead_zone` read as exactly 0.
    pub fn parse(data: &[u8], mode: IoMode, dead_zone: f32) -> Result<Self, ReportError> {
        if data.len() < MIN_REPORT_LEN {
            return Err(ReportError::TooShort {
                len: data.len(),
                required: MIN_REPORT_LEN,
            });
        }
        let r = Reader { data, mode };

        let mut buttons = ButtonSet::default();
        for button in Button::ALL {
            let pressed = match button.source() {
                ButtonSource::Flag(field, mask) => has_flag(r.byte(field), mask),
                ButtonSource::DPad(codes) => codes.contains(&(r.byte(BUTTONS_0) & 0x0F)),
            };
            buttons.set(button, pressed);
        }

        // Gyro follows the left-hand rule on the wire; flip it to match the accelerometer.
        let gyro = -r.motion(GYRO);
        let accelerometer = r.motion(ACCEL);

        Ok(Self {
            left_stick: read_stick(data[LEFT_STICK.0], data[LEFT_STICK.1], dead_zone),
            right_stick: read_stick(data[RIGHT_STICK.0], data[RIGHT_STICK.1], dead_zone),
            l2: byte_to_unsigned(r.byte(L2_ANALOG)),
            r2: byte_to_unsigned(r.byte(R2_ANALOG)),
            buttons,
            touch1: Touch::from_bytes(r.word(TOUCH_1)),
            touch2: Touch::from_bytes(r.word(TOUCH_2)),
            gyro,
            accelerometer,
            battery: BatteryStatus::from_byte(r.byte(BATTERY)),
            headphones_connected: has_flag(r.byte(STATUS), 0x01),
        })
    }

    /// Left stick, each axis in [-1, 1]. +X right, +Y up.
    pub fn left_stick(&self) -> Vec2 {
        self.left_stick
    }

    /// Right stick, each axis in [-1, 1]. +X right, +Y up.
    pub fn right_stick(&self) -> Vec2 {
        self.right_stick
    }

    /// L2 analog travel in [0, 1].
    pub fn l2(&self) -> f32 {
        self.l2
    }

    /// R2 analog travel in [0, 1].
    pub fn r2(&self) -> f32 {
        self.r2
    }

    pub fn buttons(&self) -> ButtonSet {
        self.buttons
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        self.buttons.get(button)
    }

    pub fn touch1(&self) -> Touch {
        self.touch1
    }

    pub fn touch2(&self) -> Touch {
        self.touch2
    }

    /// Angular rate, right-hand rule relative to the accelerometer axes.
    /// Roughly zero at rest.
    pub fn gyro(&self) -> Vec3 {
        self.gyro
    }

    /// Linear acceleration. +X right, +Y behind the controller, +Z towards the
    /// USB port. Gravity alone reads about 8000.
    pub fn accelerometer(&self) -> Vec3 {
        self.accelerometer
    }

    pub fn battery(&self) -> BatteryStatus {
        self.battery
    }

    pub fn headphones_connected(&self) -> bool {
        self.headphones_connected
    }
}

/// Bounds are checked once in [`InputSnapshot::parse`]; every field offset is
/// below [`MIN_REPORT_LEN`].
struct Reader<'a> {
    data: &'a [u8],
    mode: IoMode,
}

impl Reader<'_> {
    fn byte(&self, field: Field) -> u8 {
        self.data[field.resolve(self.mode)]
    }

    fn word(&self, field: Field) -> [u8; 4] {
        let i = field.resolve(self.mode);
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    fn i16_le(&self, field: Field) -> i16 {
        let i = field.resolve(self.mode);
        i16::from_le_bytes([self.data[i], self.data[i + 1]])
    }

    /// Three i16 axes with X mirrored.
    fn motion(&self, axes: [Field; 3]) -> Vec3 {
        Vec3::new(
            -f32::from(self.i16_le(axes[0])),
            f32::from(self.i16_le(axes[1])),
            f32::from(self.i16_le(axes[2])),
        )
    }
}

fn read_stick(x: u8, y: u8, dead_zone: f32) -> Vec2 {
    let x = byte_to_signed(x);
    let y = -byte_to_signed(y);
    Vec2::new(apply_dead_zone(x, dead_zone), apply_dead_zone(y, dead_zone))
}

fn apply_dead_zone(v: f32, dead_zone: f32) -> f32 {
    if v.abs() < dead_zone {
        0.0
    } else {
        v
    }
}
