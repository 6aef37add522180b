//! Byte <-> float conversions shared by the input parser and output builder.

/// Map a raw axis byte onto [-1.0, 1.0].
///
/// The mapping is `(b / 255 - 0.5) * 2`, so the centre byte 0x80 lands slightly
/// above zero (~0.0039) rather than exactly on it.
#[inline]
pub fn byte_to_signed(b: u8) -> f32 {
    (b as f32 / 255.0 - 0.5) * 2.0
}

/// Map a raw byte onto [0.0, 1.0].
#[inline]
pub fn byte_to_unsigned(b: u8) -> f32 {
    b as f32 / 255.0
}

/// True when every bit of `mask` is set in `b`.
#[inline]
pub fn has_flag(b: u8, mask: u8) -> bool {
    (b & mask) == mask
}

/// Clamp `f` to [0.0, 1.0] and scale it to a byte, rounding half away from zero.
///
/// NaN quantizes to 0.
#[inline]
pub fn quantize(f: f32) -> u8 {
    if f.is_nan() {
        return 0;
    }
    (f.clamp(0.0, 1.0) * 255.0).round() as u8
}
