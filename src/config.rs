//! # Transform configuration
//!
//! [`TransformConfig`] gathers the few knobs of a transform run. It derives
//! `serde` traits so a driver can embed it in its own configuration file.
//!
//! ```rust
//! use skyframe::config::TransformConfig;
//! use skyframe::constants::AngleUnit;
//!
//! let config = TransformConfig::default();
//! assert_eq!(config.output_unit, AngleUnit::Arcsec);
//! assert!(config.reduce_precision);
//! ```
use serde::{Deserialize, Serialize};

use crate::constants::AngleUnit;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Unit of sky-frame sizes, sigmas, covariances and moments.
    pub output_unit: AngleUnit,
    /// Truncate double precision fields to single precision in the terminal stage.
    pub reduce_precision: bool,
    /// Convert `Angle` fields from radians to degrees.
    pub convert_angles: bool,
}

impl Default for TransformConfig {
    fn default() -> Self {
        TransformConfig {
            output_unit: AngleUnit::Arcsec,
            reduce_precision: true,
            convert_angles: true,
        }
    }
}

impl TransformConfig {
    /// Same configuration with another output unit.
    pub fn with_output_unit(mut self, unit: AngleUnit) -> Self {
        self.output_unit = unit;
        self
    }
}
