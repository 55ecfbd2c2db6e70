//! # Algorithm registry
//!
//! Maps every supported measurement algorithm to the prefix under which its
//! fields are stored in a catalog and to its [`AlgorithmDescriptors`].
//!
//! An [`Algorithm`] instance owns the fields of one algorithm, cut out of a
//! detector-exposure catalog, and runs the transform engine on them:
//!
//! ```rust
//! use skyframe::field::Field;
//! use skyframe::registry::{Algorithm, AlgorithmKind};
//! use skyframe::table::MeasurementTable;
//!
//! let mut catalog = MeasurementTable::new(1);
//! catalog.insert(Field::scalar("modelfit_CModel_flux", "", vec![1.0e-30_f64])).unwrap();
//!
//! let kind: AlgorithmKind = "modelfit_CModel".parse().unwrap();
//! let cmodel = Algorithm::cutout(kind, &mut catalog);
//! assert_eq!(cmodel.table().len(), 1);
//! assert!(catalog.is_empty());
//! ```
use std::{fmt, str::FromStr};

use itertools::iproduct;
use regex::Captures;
use tracing::debug;

use crate::{
    descriptors::{
        AlgorithmDescriptors, EllipticityDesc, FluxDesc, FluxErrDesc, PositionDesc,
        PositionSigmaDesc, Reference, ShapeDesc, ShapeSigmaDesc, SizeDesc,
    },
    engine::{transform_algorithm, TransformContext, TransformStage},
    export::{export_columns, ExportColumn},
    rename::{aperture_diameter, group, keep_match, RenameRule},
    skyframe_errors::SkyframeError,
    table::MeasurementTable,
};

/// Measurement algorithms with a transform description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmKind {
    SdssCentroid,
    GaussianCentroid,
    SdssShape,
    Blendedness,
    ShapeHsm,
    CModel,
    DoubleShapeletPsfApprox,
    Deblend,
    ConvolvedFlux,
    UndeblendedCircularApertureFlux,
    UndeblendedKronFlux,
    TransformedCentroid,
}

const CONVOLVED_SIZES: [&str; 4] = ["3_3", "4_5", "6_0", "kron"];
const CIRCULAR_APERTURES: [&str; 10] = [
    "3_0", "4_5", "6_0", "9_0", "12_0", "17_0", "25_0", "35_0", "50_0", "70_0",
];

impl AlgorithmKind {
    pub const ALL: [AlgorithmKind; 12] = [
        AlgorithmKind::SdssCentroid,
        AlgorithmKind::GaussianCentroid,
        AlgorithmKind::SdssShape,
        AlgorithmKind::Blendedness,
        AlgorithmKind::ShapeHsm,
        AlgorithmKind::CModel,
        AlgorithmKind::DoubleShapeletPsfApprox,
        AlgorithmKind::Deblend,
        AlgorithmKind::ConvolvedFlux,
        AlgorithmKind::UndeblendedCircularApertureFlux,
        AlgorithmKind::UndeblendedKronFlux,
        AlgorithmKind::TransformedCentroid,
    ];

    /// Name of the algorithm in the catalog schema.
    pub fn name(&self) -> &'static str {
        match self {
            AlgorithmKind::SdssCentroid => "base_SdssCentroid",
            AlgorithmKind::GaussianCentroid => "base_GaussianCentroid",
            AlgorithmKind::SdssShape => "base_SdssShape",
            AlgorithmKind::Blendedness => "base_Blendedness",
            AlgorithmKind::ShapeHsm => "ext_shapeHSM",
            AlgorithmKind::CModel => "modelfit_CModel",
            AlgorithmKind::DoubleShapeletPsfApprox => "modelfit_DoubleShapeletPsfApprox",
            AlgorithmKind::Deblend => "deblend",
            AlgorithmKind::ConvolvedFlux => "ext_convolved_ConvolvedFlux",
            AlgorithmKind::UndeblendedCircularApertureFlux => {
                "undeblended_base_CircularApertureFlux"
            }
            AlgorithmKind::UndeblendedKronFlux => "undeblended_ext_photometryKron_KronFlux",
            AlgorithmKind::TransformedCentroid => "base_TransformedCentroid",
        }
    }

    /// Prefix selecting the fields of the algorithm in a catalog.
    pub fn prefix(&self) -> String {
        format!("{}_", self.name())
    }

    /// Role descriptors of the algorithm.
    pub fn descriptors(&self) -> AlgorithmDescriptors {
        match self {
            AlgorithmKind::SdssCentroid => sdss_centroid(),
            AlgorithmKind::GaussianCentroid => AlgorithmDescriptors {
                positions: vec![PositionDesc::centroid("base_GaussianCentroid")],
                rename_rules: vec![RenameRule::template("base_", "")],
                ..Default::default()
            },
            AlgorithmKind::SdssShape => sdss_shape(),
            AlgorithmKind::Blendedness => blendedness(),
            AlgorithmKind::ShapeHsm => shape_hsm(),
            AlgorithmKind::CModel => cmodel(),
            AlgorithmKind::DoubleShapeletPsfApprox => double_shapelet_psf_approx(),
            AlgorithmKind::Deblend => AlgorithmDescriptors {
                positions: vec![PositionDesc::centroid("deblend_psfCenter")],
                fluxes: vec![FluxDesc {
                    flux: "deblend_psfFlux".to_string(),
                    mag: Some("deblend_psfMag".to_string()),
                }],
                ..Default::default()
            },
            AlgorithmKind::ConvolvedFlux => convolved_flux(),
            AlgorithmKind::UndeblendedCircularApertureFlux => undeblended_circular_aperture_flux(),
            AlgorithmKind::UndeblendedKronFlux => undeblended_kron_flux(),
            AlgorithmKind::TransformedCentroid => AlgorithmDescriptors {
                rename_rules: vec![RenameRule::template("base_", "")],
                ..Default::default()
            },
        }
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AlgorithmKind {
    type Err = SkyframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AlgorithmKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| SkyframeError::UnknownAlgorithm(s.to_string()))
    }
}

fn sdss_centroid() -> AlgorithmDescriptors {
    let centroid = PositionDesc::centroid("base_SdssCentroid");
    AlgorithmDescriptors {
        position_sigmas: vec![PositionSigmaDesc::centroid(
            "base_SdssCentroid",
            centroid.reference(),
        )],
        positions: vec![centroid],
        rename_rules: vec![RenameRule::template("base_", "")],
        ..Default::default()
    }
}

fn sdss_shape() -> AlgorithmDescriptors {
    let stem = "base_SdssShape";
    let position = PositionDesc::centroid(stem);
    let reference = position.reference();

    let mut shapes: Vec<ShapeDesc> = ["", "_psf"]
        .iter()
        .map(|infix| ShapeDesc::moments(&format!("{stem}{infix}"), reference.clone()))
        .collect();
    shapes.push(ShapeDesc {
        xx: format!("{stem}_flux_xx_Cov"),
        yy: format!("{stem}_flux_yy_Cov"),
        xy: format!("{stem}_flux_xy_Cov"),
        out_11: format!("{stem}_flux_shape11_Cov"),
        out_22: format!("{stem}_flux_shape22_Cov"),
        out_12: format!("{stem}_flux_shape12_Cov"),
        reference: reference.clone(),
    });

    AlgorithmDescriptors {
        positions: vec![position],
        fluxes: vec![FluxDesc::new("base_SdssShape_flux")],
        flux_errs: vec![FluxErrDesc::new("base_SdssShape_flux", "base_SdssShape_fluxSigma")],
        shapes,
        shape_sigmas: vec![ShapeSigmaDesc::moments(stem, reference)],
        rename_rules: vec![RenameRule::template("base_", "")],
        ..Default::default()
    }
}

fn blendedness() -> AlgorithmDescriptors {
    let combinations: Vec<(&str, &str)> =
        iproduct!(["raw", "abs"], ["child", "parent"]).collect();

    AlgorithmDescriptors {
        fluxes: combinations
            .iter()
            .map(|(kind, part)| FluxDesc::new(&format!("base_Blendedness_{kind}_flux_{part}")))
            .collect(),
        shapes: combinations
            .iter()
            .map(|(kind, part)| {
                ShapeDesc::moments(&format!("base_Blendedness_{kind}_{part}"), Reference::Default)
            })
            .collect(),
        rename_rules: vec![RenameRule::template("base_", "")],
        ..Default::default()
    }
}

fn shape_hsm() -> AlgorithmDescriptors {
    let stems = ["ext_shapeHSM_HsmPsfMoments", "ext_shapeHSM_HsmSourceMoments"];

    AlgorithmDescriptors {
        positions: stems.iter().map(|s| PositionDesc::centroid(s)).collect(),
        shapes: stems
            .iter()
            .map(|s| ShapeDesc::moments(s, Reference::position(s)))
            .collect(),
        ellipticities: vec![EllipticityDesc {
            e1: "ext_shapeHSM_HsmShapeRegauss_e1".to_string(),
            e2: "ext_shapeHSM_HsmShapeRegauss_e2".to_string(),
            reference: Reference::position("ext_shapeHSM_HsmSourceMoments"),
        }],
        rename_rules: vec![RenameRule::template("ext_shapeHSM_", "")],
        ..Default::default()
    }
}

fn cmodel() -> AlgorithmDescriptors {
    let models = ["_initial", "_exp", "_dev", ""];

    AlgorithmDescriptors {
        fluxes: iproduct!(models, ["", "_inner"])
            .map(|(model, region)| FluxDesc::new(&format!("modelfit_CModel{model}_flux{region}")))
            .collect(),
        flux_errs: models
            .iter()
            .map(|model| {
                FluxErrDesc::new(
                    &format!("modelfit_CModel{model}_flux"),
                    &format!("modelfit_CModel{model}_fluxSigma"),
                )
            })
            .collect(),
        rename_rules: vec![RenameRule::template("modelfit_", "")],
        ..Default::default()
    }
}

fn double_shapelet_psf_approx() -> AlgorithmDescriptors {
    let stems: Vec<String> = (0..2)
        .map(|i| format!("modelfit_DoubleShapeletPsfApprox_{i}"))
        .collect();

    AlgorithmDescriptors {
        positions: stems.iter().map(|s| PositionDesc::centroid(s)).collect(),
        shapes: stems
            .iter()
            .map(|s| ShapeDesc::moments(s, Reference::position(s)))
            .collect(),
        rename_rules: vec![RenameRule::template("modelfit_", "")],
        ..Default::default()
    }
}

fn convolved_aperture(caps: &Captures) -> String {
    let Some(diameter) = aperture_diameter(group(caps, 2), group(caps, 3)) else {
        return keep_match(caps);
    };
    format!("{}{}{}", group(caps, 1), diameter, group(caps, 4))
}

fn convolved_flux() -> AlgorithmDescriptors {
    let stems: Vec<String> = iproduct!(["0", "1", "2", "3"], CONVOLVED_SIZES)
        .map(|(seeing, size)| format!("ext_convolved_ConvolvedFlux_{seeing}_{size}"))
        .collect();

    AlgorithmDescriptors {
        sizes: vec![SizeDesc {
            size: "ext_convolved_ConvolvedFlux_seeing".to_string(),
            reference: Reference::Default,
        }],
        fluxes: stems
            .iter()
            .map(|s| FluxDesc::new(&format!("{s}_flux")))
            .collect(),
        flux_errs: stems
            .iter()
            .map(|s| FluxErrDesc::new(&format!("{s}_flux"), &format!("{s}_fluxSigma")))
            .collect(),
        rename_rules: vec![
            RenameRule::function(
                r"ext_convolved_(ConvolvedFlux_[0-9]+_)([0-9]+)_([0-9]+)(_)",
                convolved_aperture,
            ),
            RenameRule::template("ext_convolved_", ""),
        ],
        ..Default::default()
    }
}

fn circular_aperture(caps: &Captures) -> String {
    let Some(diameter) = aperture_diameter(group(caps, 3), group(caps, 4)) else {
        return keep_match(caps);
    };
    format!(
        "{}{}{}{}",
        group(caps, 1),
        group(caps, 2),
        diameter,
        group(caps, 5)
    )
}

fn undeblended_circular_aperture_flux() -> AlgorithmDescriptors {
    let stems: Vec<String> = CIRCULAR_APERTURES
        .iter()
        .map(|radius| format!("undeblended_base_CircularApertureFlux_{radius}"))
        .collect();

    AlgorithmDescriptors {
        fluxes: stems
            .iter()
            .map(|s| FluxDesc::new(&format!("{s}_flux")))
            .collect(),
        flux_errs: stems
            .iter()
            .map(|s| FluxErrDesc::new(&format!("{s}_flux"), &format!("{s}_fluxSigma")))
            .collect(),
        rename_rules: vec![
            RenameRule::function(
                r"(undeblended_)base_Circular(ApertureFlux_)([0-9]+)_([0-9]+)(_)",
                circular_aperture,
            ),
            RenameRule::template("undeblended_base_Circular", "undeblended_"),
        ],
        ..Default::default()
    }
}

fn undeblended_kron_flux() -> AlgorithmDescriptors {
    let stem = "undeblended_ext_photometryKron_KronFlux";

    AlgorithmDescriptors {
        sizes: ["radius", "radius_for_radius", "psf_radius"]
            .iter()
            .map(|size| SizeDesc {
                size: format!("{stem}_{size}"),
                reference: Reference::Default,
            })
            .collect(),
        fluxes: vec![FluxDesc::new(&format!("{stem}_flux"))],
        flux_errs: vec![FluxErrDesc::new(
            &format!("{stem}_flux"),
            &format!("{stem}_fluxSigma"),
        )],
        rename_rules: vec![RenameRule::template("undeblended_ext_photometryKron", "undeblended")],
        ..Default::default()
    }
}

/// The fields of one measurement algorithm and the roles they play.
#[derive(Debug, Clone)]
pub struct Algorithm {
    kind: AlgorithmKind,
    descriptors: AlgorithmDescriptors,
    table: MeasurementTable,
}

impl Algorithm {
    /// Move the fields of `kind` out of `catalog`.
    pub fn cutout(kind: AlgorithmKind, catalog: &mut MeasurementTable) -> Self {
        let table = catalog.cutout_subtable(&kind.prefix());
        debug!(algorithm = %kind, fields = table.len(), "cut out algorithm fields");

        Algorithm {
            kind,
            descriptors: kind.descriptors(),
            table,
        }
    }

    /// Cut out every registered algorithm present in `catalog`.
    ///
    /// Algorithms without any field in the catalog are skipped.
    pub fn cutout_all(catalog: &mut MeasurementTable) -> Vec<Algorithm> {
        AlgorithmKind::ALL
            .into_iter()
            .map(|kind| Algorithm::cutout(kind, catalog))
            .filter(|algorithm| !algorithm.table.is_empty())
            .collect()
    }

    pub fn kind(&self) -> AlgorithmKind {
        self.kind
    }

    pub fn descriptors(&self) -> &AlgorithmDescriptors {
        &self.descriptors
    }

    pub fn table(&self) -> &MeasurementTable {
        &self.table
    }

    pub fn into_table(self) -> MeasurementTable {
        self.table
    }

    /// Run the transform engine on the fields of the algorithm.
    ///
    /// Arguments
    /// ---------
    /// * `context`: the per-exposure transform context holding the projection and caches.
    ///
    /// See also
    /// ------------
    /// * [`transform_algorithm`] – the engine itself.
    pub fn transform(
        &mut self,
        context: &mut TransformContext,
    ) -> Result<TransformStage, SkyframeError> {
        debug!(algorithm = %self.kind, "transforming algorithm");
        transform_algorithm(&mut self.table, &self.descriptors, context)
    }

    /// Exported columns of the transformed fields, each name prefixed by `prefix`.
    pub fn export_columns(&self, prefix: &str) -> Result<Vec<ExportColumn>, SkyframeError> {
        export_columns(&self.table, &self.descriptors, prefix)
    }
}
