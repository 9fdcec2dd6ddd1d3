//! Unit-safe wrappers for the physical quantities of an array cable study.
//!
//! Array layouts mix planar coordinates in meters, cable lengths in
//! kilometers, cable ratings in amperes at a given voltage, and power in
//! megawatts. Raw `f64` values make it easy to price a cable by meters instead
//! of kilometers, so lengths and powers travel as newtypes.
//!
//! # Usage
//!
//! ```
//! use wac_core::units::{Amperes, Kilovolts, Meters, Megawatts};
//!
//! let span = Meters(1500.0);
//! assert!((span.to_kilometers().value() - 1.5).abs() < 1e-12);
//!
//! // Three-phase transfer capacity of a 400 A cable at 66 kV
//! let capacity = Megawatts::three_phase(Amperes(400.0), Kilovolts(66.0));
//! assert!((capacity.value() - 45.726).abs() < 1e-3);
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Sub};

/// Implements the arithmetic shared by every quantity type.
macro_rules! impl_unit_ops {
    ($type:ty, $unit_name:literal) => {
        impl Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl Sub for $type {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }

        impl Div<$type> for $type {
            type Output = f64;
            fn div(self, rhs: $type) -> Self::Output {
                self.0 / rhs.0
            }
        }

        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:.3} {}", self.0, $unit_name)
            }
        }

        impl $type {
            #[inline]
            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            /// Raw numeric value
            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }

            #[inline]
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }
        }

        impl std::iter::Sum for $type {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }
    };
}

/// Planar distance in meters (the coordinate system of unit positions).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Meters(pub f64);

impl_unit_ops!(Meters, "m");

/// Cable length in kilometers (the unit cable prices are quoted in).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Kilometers(pub f64);

impl_unit_ops!(Kilometers, "km");

/// Active power in megawatts.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Megawatts(pub f64);

impl_unit_ops!(Megawatts, "MW");

/// Cable current rating in amperes.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Amperes(pub f64);

impl_unit_ops!(Amperes, "A");

/// Line-to-line voltage in kilovolts.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Kilovolts(pub f64);

impl_unit_ops!(Kilovolts, "kV");

impl Meters {
    #[inline]
    pub fn to_kilometers(self) -> Kilometers {
        Kilometers(self.0 / 1000.0)
    }
}

impl Kilometers {
    #[inline]
    pub fn to_meters(self) -> Meters {
        Meters(self.0 * 1000.0)
    }
}

impl Megawatts {
    /// Balanced three-phase capacity: P = √3 · I · V (kV × A gives kW).
    #[inline]
    pub fn three_phase(current: Amperes, voltage: Kilovolts) -> Megawatts {
        Megawatts(3f64.sqrt() * current.0 * voltage.0 / 1000.0)
    }

    /// Round down to a whole number of `step` blocks.
    ///
    /// A cable carrying whole turbines is only useful up to the largest
    /// multiple of one turbine's output, so ratings are floored to that.
    /// A non-positive step leaves the value unchanged.
    pub fn floor_to_multiple(self, step: Megawatts) -> Megawatts {
        if step.0 <= 0.0 || !step.0.is_finite() {
            return self;
        }
        Megawatts((self.0 / step.0).floor() * step.0)
    }
}
