use std::fmt;

/// Signed 24.8 fixed-point number as carried on the wire.
///
/// The conversion from `f64` rounds to the nearest 1/256; only values already
/// on that grid survive a round trip unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fixed(i32);

impl Fixed {
    /// Number of fractional bits.
    pub const FRACTION_BITS: u32 = 8;

    const SCALE: f64 = 256.0;

    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(256);

    /// Wrap a raw wire value.
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// The raw wire value.
    pub const fn to_raw(self) -> i32 {
        self.0
    }

    /// Convert from a double, rounding to the nearest representable value.
    ///
    /// Values outside the Q24.8 range saturate.
    pub fn from_f64(value: f64) -> Self {
        Self((value * Self::SCALE).round() as i32)
    }

    pub fn to_f64(self) -> f64 {
        f64::from(self.0) / Self::SCALE
    }

    /// Exact conversion from an integer in the Q24.8 range.
    pub const fn from_int(value: i32) -> Self {
        Self(value.wrapping_shl(Self::FRACTION_BITS))
    }

    /// Integer part, rounded toward negative infinity.
    pub const fn to_int(self) -> i32 {
        self.0 >> Self::FRACTION_BITS
    }
}

impl From<f64> for Fixed {
    fn from(value: f64) -> Self {
        Self::from_f64(value)
    }
}

impl From<Fixed> for f64 {
    fn from(value: Fixed) -> Self {
        value.to_f64()
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}
