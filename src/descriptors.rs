//! # Role descriptors
//!
//! Each measurement algorithm states, through an [`AlgorithmDescriptors`] value,
//! which of its source fields are positions, fluxes, shapes or uncertainties.
//! Descriptors only hold *names*: the source field names as they appear in the
//! catalog, the destination names written by the transform, and a
//! [`Reference`] telling where the sky position used to evaluate the Jacobian
//! comes from.
//!
//! Rename rules are applied last, so every name in a descriptor is the verbose
//! name of the source catalog.
use std::str::FromStr;

use crate::{
    constants::{DEFAULT_DEC, DEFAULT_RA},
    rename::RenameRule,
    skyframe_errors::SkyframeError,
};

/// Which components of an error tensor are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Validity {
    /// Every component is present and transformed.
    #[default]
    Full,
    /// Cross terms are absent on input and dropped on output.
    Diagonal,
    /// The whole tensor is discarded.
    None,
}

impl FromStr for Validity {
    type Err = SkyframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(Validity::Full),
            "diagonal" => Ok(Validity::Diagonal),
            "none" => Ok(Validity::None),
            other => Err(SkyframeError::UnsupportedValidity(other.to_string())),
        }
    }
}

/// Where the sky position of a tensor comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// The per-exposure default coordinates supplied by the driver.
    Default,
    /// The destination names of a position resolved by the positions pass.
    Position { ra: String, dec: String },
}

impl Reference {
    /// Reference to the position whose destination names are `<stem>_ra` / `<stem>_dec`.
    pub fn position(stem: &str) -> Self {
        Reference::Position {
            ra: format!("{stem}_ra"),
            dec: format!("{stem}_dec"),
        }
    }

    /// Name of the right ascension, also the key of the Jacobian cache.
    pub fn ra_name(&self) -> &str {
        match self {
            Reference::Default => DEFAULT_RA,
            Reference::Position { ra, .. } => ra,
        }
    }

    pub fn dec_name(&self) -> &str {
        match self {
            Reference::Default => DEFAULT_DEC,
            Reference::Position { dec, .. } => dec,
        }
    }
}

/// A pixel position `(x, y)` turned into a sky position `(ra, dec)` in degrees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionDesc {
    pub x: String,
    pub y: String,
    pub ra: String,
    pub dec: String,
}

impl PositionDesc {
    /// `<stem>_x`, `<stem>_y` → `<stem>_ra`, `<stem>_dec`.
    pub fn centroid(stem: &str) -> Self {
        PositionDesc {
            x: format!("{stem}_x"),
            y: format!("{stem}_y"),
            ra: format!("{stem}_ra"),
            dec: format!("{stem}_dec"),
        }
    }

    /// The reference naming the sky position produced by this descriptor.
    pub fn reference(&self) -> Reference {
        Reference::Position {
            ra: self.ra.clone(),
            dec: self.dec.clone(),
        }
    }
}

/// Covariance of a position, `(xx, xy, yy)` → `(11, 12, 22)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionErrDesc {
    pub xx: String,
    pub xy: String,
    pub yy: String,
    pub out_11: String,
    pub out_12: String,
    pub out_22: String,
    pub reference: Reference,
    pub validity: Validity,
}

/// Sigmas of a position, propagated as a diagonal covariance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionSigmaDesc {
    pub x_sigma: String,
    pub y_sigma: String,
    pub ra_sigma: String,
    pub dec_sigma: String,
    pub reference: Reference,
}

impl PositionSigmaDesc {
    /// `<stem>_xSigma`, `<stem>_ySigma` → `<stem>_raSigma`, `<stem>_decSigma`.
    pub fn centroid(stem: &str, reference: Reference) -> Self {
        PositionSigmaDesc {
            x_sigma: format!("{stem}_xSigma"),
            y_sigma: format!("{stem}_ySigma"),
            ra_sigma: format!("{stem}_raSigma"),
            dec_sigma: format!("{stem}_decSigma"),
            reference,
        }
    }
}

/// A length in pixels, converted in place with the local pixel scale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeDesc {
    pub size: String,
    pub reference: Reference,
}

/// Second moments of a light distribution, `(xx, yy, xy)` → `(11, 22, 12)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeDesc {
    pub xx: String,
    pub yy: String,
    pub xy: String,
    pub out_11: String,
    pub out_22: String,
    pub out_12: String,
    pub reference: Reference,
}

impl ShapeDesc {
    /// `<stem>_xx`, `<stem>_yy`, `<stem>_xy` → `<stem>_shape11`, `<stem>_shape22`, `<stem>_shape12`.
    pub fn moments(stem: &str, reference: Reference) -> Self {
        ShapeDesc {
            xx: format!("{stem}_xx"),
            yy: format!("{stem}_yy"),
            xy: format!("{stem}_xy"),
            out_11: format!("{stem}_shape11"),
            out_22: format!("{stem}_shape22"),
            out_12: format!("{stem}_shape12"),
            reference,
        }
    }
}

/// Covariance of second moments, six components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeErrDesc {
    pub xx_xx: String,
    pub xx_yy: String,
    pub yy_yy: String,
    pub xx_xy: String,
    pub yy_xy: String,
    pub xy_xy: String,
    pub out_11_11: String,
    pub out_11_22: String,
    pub out_22_22: String,
    pub out_11_12: String,
    pub out_22_12: String,
    pub out_12_12: String,
    pub reference: Reference,
    pub validity: Validity,
}

/// Sigmas of second moments, propagated as a diagonal moment covariance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeSigmaDesc {
    pub xx_sigma: String,
    pub yy_sigma: String,
    pub xy_sigma: String,
    pub out_11_sigma: String,
    pub out_22_sigma: String,
    pub out_12_sigma: String,
    pub reference: Reference,
}

impl ShapeSigmaDesc {
    /// `<stem>_xxSigma`… → `<stem>_shape11Sigma`….
    pub fn moments(stem: &str, reference: Reference) -> Self {
        ShapeSigmaDesc {
            xx_sigma: format!("{stem}_xxSigma"),
            yy_sigma: format!("{stem}_yySigma"),
            xy_sigma: format!("{stem}_xySigma"),
            out_11_sigma: format!("{stem}_shape11Sigma"),
            out_22_sigma: format!("{stem}_shape22Sigma"),
            out_12_sigma: format!("{stem}_shape12Sigma"),
            reference,
        }
    }
}

/// Reduced ellipticity `(e1, e2)`, transformed in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EllipticityDesc {
    pub e1: String,
    pub e2: String,
    pub reference: Reference,
}

/// A flux column; `mag` overrides the derived magnitude name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FluxDesc {
    pub flux: String,
    pub mag: Option<String>,
}

impl FluxDesc {
    pub fn new(flux: &str) -> Self {
        FluxDesc {
            flux: flux.to_string(),
            mag: None,
        }
    }
}

/// A flux uncertainty and the flux it belongs to; `magerr` overrides the derived name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FluxErrDesc {
    pub flux: String,
    pub fluxerr: String,
    pub magerr: Option<String>,
}

impl FluxErrDesc {
    pub fn new(flux: &str, fluxerr: &str) -> Self {
        FluxErrDesc {
            flux: flux.to_string(),
            fluxerr: fluxerr.to_string(),
            magerr: None,
        }
    }
}

/// Every role declared by one measurement algorithm.
#[derive(Debug, Clone, Default)]
pub struct AlgorithmDescriptors {
    pub positions: Vec<PositionDesc>,
    pub position_errs: Vec<PositionErrDesc>,
    pub position_sigmas: Vec<PositionSigmaDesc>,
    pub sizes: Vec<SizeDesc>,
    pub shapes: Vec<ShapeDesc>,
    pub shape_errs: Vec<ShapeErrDesc>,
    pub shape_sigmas: Vec<ShapeSigmaDesc>,
    pub ellipticities: Vec<EllipticityDesc>,
    pub fluxes: Vec<FluxDesc>,
    pub flux_errs: Vec<FluxErrDesc>,
    /// Keys of double precision fields kept as they are by the precision stage.
    pub double_precisions: Vec<String>,
    pub rename_rules: Vec<RenameRule>,
}

impl AlgorithmDescriptors {
    /// Keys exempt from single precision reduction: position sources and the explicit list.
    pub fn precision_exempt(&self) -> Vec<&str> {
        self.positions
            .iter()
            .flat_map(|p| [p.x.as_str(), p.y.as_str()])
            .chain(self.double_precisions.iter().map(String::as_str))
            .collect()
    }
}
