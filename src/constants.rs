//! # Constants and type definitions for Skyframe
//!
//! This module centralizes the **angular conversion factors**, **unit labels** and
//! **common type aliases** used throughout the `skyframe` library.
//!
//! ## Overview
//!
//! - Unit conversions (degrees ↔ radians, radians ↔ arcseconds)
//! - The default pixel scale of the survey camera, used to name aperture columns
//! - The AB magnitude zero point for fluxes in erg s⁻¹ cm⁻² Hz⁻¹
//! - The [`AngleUnit`] and [`SkyUnit`] enums selecting output units

use serde::{Deserialize, Serialize};

// -------------------------------------------------------------------------------------------------
// Unit conversions
// -------------------------------------------------------------------------------------------------

/// 2π, useful for wrapping right ascensions
pub const DPI: f64 = 2. * std::f64::consts::PI;

/// Degrees → radians
pub const RADEG: f64 = std::f64::consts::PI / 180.0;

/// Arcseconds → radians
pub const RADSEC: f64 = std::f64::consts::PI / 648000.0;

/// Radians → arcseconds
pub const ARCSEC_PER_RADIAN: f64 = 648000.0 / std::f64::consts::PI;

/// Default pixel scale of the stacked images, in arcseconds per pixel
pub const DEFAULT_PIXEL_SCALE: f64 = 0.168;

/// AB magnitude of a source of 1 erg s⁻¹ cm⁻² Hz⁻¹
pub const AB_ZERO_POINT: f64 = -48.6;

/// Name of the sentinel reference position borrowing the per-exposure default right ascension
pub const DEFAULT_RA: &str = "default_ra";

/// Name of the sentinel reference position borrowing the per-exposure default declination
pub const DEFAULT_DEC: &str = "default_dec";

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in degrees
pub type Degree = f64;
/// Angle in arcseconds
pub type ArcSec = f64;
/// Angle in radians
pub type Radian = f64;
/// Coordinate in pixels
pub type Pixel = f64;

// -------------------------------------------------------------------------------------------------
// Units
// -------------------------------------------------------------------------------------------------

/// Angular unit of the sky-frame tensors produced by the propagation library.
///
/// Quadratic quantities are scaled by the square (covariances, moments) or the
/// fourth power (moment covariances) of [`AngleUnit::per_radian`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AngleUnit {
    Radian,
    Degree,
    #[default]
    Arcsec,
}

impl AngleUnit {
    /// Number of units in one radian.
    pub fn per_radian(&self) -> f64 {
        match self {
            AngleUnit::Radian => 1.0,
            AngleUnit::Degree => 1.0 / RADEG,
            AngleUnit::Arcsec => ARCSEC_PER_RADIAN,
        }
    }

    /// Unit label written into the transformed fields.
    pub fn label(&self) -> &'static str {
        match self {
            AngleUnit::Radian => "rad",
            AngleUnit::Degree => "degree",
            AngleUnit::Arcsec => "arcsec",
        }
    }

    /// Label of the unit raised to `power`, e.g. `arcsec^2`.
    pub fn label_pow(&self, power: u32) -> String {
        match power {
            1 => self.label().to_string(),
            p => format!("{}^{p}", self.label()),
        }
    }
}

/// Unit of celestial coordinates returned by the forward projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkyUnit {
    Radian,
    #[default]
    Degree,
}
