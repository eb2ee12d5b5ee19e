//! Scale factors applied to decoded values
//!
//! Studer devices report values in their own units, e.g. kW for power or V for
//! battery voltage. A [`Scale`] converts a decoded value into the unit a consumer
//! wants. Use `1000.0` to report kW as W, or `-1.0` to flip the sign of the
//! input active power so that export is negative.

/// Multiplier applied to a raw value after a successful decode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale(f32);

impl Default for Scale {
    /// Default to no scaling.
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Scale {
    pub const IDENTITY: Scale = Scale(1.0);

    pub const fn new(multiplier: f32) -> Self {
        Self(multiplier)
    }

    pub const fn multiplier(&self) -> f32 {
        self.0
    }

    /// NaN and infinite multipliers would poison every published value.
    pub fn is_valid(&self) -> bool {
        self.0.is_finite()
    }

    /// Convert a raw decoded value into the consumer's unit.
    ///
    /// No rounding is performed.
    #[inline]
    pub fn apply(&self, raw: f32) -> f32 {
        raw * self.0
    }
}

impl From<f32> for Scale {
    fn from(multiplier: f32) -> Self {
        Self(multiplier)
    }
}
