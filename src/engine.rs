//! # Transform engine
//!
//! [`transform_algorithm`] rewrites the fields of one measurement algorithm from
//! the pixel frame to the sky frame, driven only by the algorithm's
//! [`AlgorithmDescriptors`]. A run walks through the stages of
//! [`TransformStage`] in order:
//!
//! 1. **positions**: every position descriptor is projected to `(ra, dec)` in
//!    degrees; the result is memoized under the destination `ra` name so later
//!    descriptors can reference it.
//! 2. **tensors**: position errors and sigmas, sizes, shapes, shape errors and
//!    sigmas and ellipticities are propagated through the Jacobian at their
//!    reference position, then `Angle` fields are converted to degrees.
//! 3. **rename**: the rename rules of the algorithm shorten every field name.
//! 4. **precision**: double precision fields are narrowed to single precision,
//!    except the position sources, the explicit exemptions and angles.
//!
//! Fields keep the key they had in the source catalog for the whole run; only
//! [`Field::name`] changes. A table must be transformed once.
//!
//! The projection, the default coordinates and the caches live in a
//! [`TransformContext`] owned by the caller for one detector exposure.
use std::collections::HashMap;

use tracing::debug;

use crate::{
    config::TransformConfig,
    constants::{Degree, SkyUnit},
    descriptors::{AlgorithmDescriptors, PositionDesc, Reference, Validity},
    field::{Column, Field, FieldData},
    propagation::{MomentCovariance, WcsJacobian},
    rename::Renamer,
    skyframe_errors::SkyframeError,
    table::{DefaultCoord, MeasurementTable},
    wcs::Wcs,
};

/// Stages of one transform run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TransformStage {
    Untransformed,
    PositionsResolved,
    TensorsTransformed,
    Renamed,
    SinglePrecisionReduced,
}

/// Sky positions in degrees, one per object.
type SkyPositions = (Vec<Degree>, Vec<Degree>);

/// Projection, configuration and memoized positions and Jacobians of one exposure.
///
/// Positions and Jacobians are keyed by the name of the right ascension they
/// derive from; the driver-supplied default coordinates live under
/// [`DEFAULT_RA`](crate::constants::DEFAULT_RA).
#[derive(Debug, Clone)]
pub struct TransformContext {
    wcs: Wcs,
    config: TransformConfig,
    positions: HashMap<String, SkyPositions>,
    jacobians: HashMap<String, WcsJacobian>,
}

impl TransformContext {
    pub fn new(wcs: Wcs, config: TransformConfig) -> Self {
        TransformContext {
            wcs,
            config,
            positions: HashMap::new(),
            jacobians: HashMap::new(),
        }
    }

    /// Same context with default coordinates for descriptors without a position of their own.
    pub fn with_default_coord(mut self, coord: DefaultCoord) -> Self {
        self.set_default_coord(coord);
        self
    }

    pub fn set_default_coord(&mut self, coord: DefaultCoord) {
        let key = Reference::Default.ra_name().to_string();
        self.jacobians.remove(&key);
        self.positions.insert(key, (coord.ra, coord.dec));
    }

    /// Seed the Jacobian cache for the reference whose right ascension is named `ra_name`.
    pub fn insert_jacobian(&mut self, ra_name: &str, jacobian: WcsJacobian) {
        self.jacobians.insert(ra_name.to_string(), jacobian);
    }

    pub fn wcs(&self) -> &Wcs {
        &self.wcs
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    /// Number of Jacobians computed or seeded so far.
    pub fn cached_jacobians(&self) -> usize {
        self.jacobians.len()
    }

    fn resolve_position(
        &mut self,
        desc: &PositionDesc,
        table: &MeasurementTable,
    ) -> Result<SkyPositions, SkyframeError> {
        if let Some(position) = self.positions.get(&desc.ra) {
            return Ok(position.clone());
        }

        let x = table.float_values(&desc.x)?;
        let y = table.float_values(&desc.y)?;
        let position = self.wcs.pixel_to_sky(&x, &y, SkyUnit::Degree)?;
        self.positions.insert(desc.ra.clone(), position.clone());
        Ok(position)
    }

    fn position(&self, reference: &Reference) -> Result<&SkyPositions, SkyframeError> {
        self.positions
            .get(reference.ra_name())
            .ok_or_else(|| match reference {
                Reference::Default => SkyframeError::MissingDefaultCoord,
                Reference::Position { ra, .. } => SkyframeError::UnresolvedReference(ra.clone()),
            })
    }

    fn jacobian(
        &mut self,
        reference: &Reference,
        n_objects: usize,
    ) -> Result<&WcsJacobian, SkyframeError> {
        let key = reference.ra_name();

        if self.jacobians.contains_key(key) {
            debug!(reference = key, "jacobian cache hit");
        } else {
            debug!(reference = key, "jacobian cache miss");
            let (ra, dec) = self.position(reference)?;
            let jacobian = self.wcs.jacobian_at(ra, dec)?;
            self.jacobians.insert(key.to_string(), jacobian);
        }

        let jacobian = self
            .jacobians
            .get(key)
            .ok_or_else(|| SkyframeError::UnresolvedReference(key.to_string()))?;
        if jacobian.len() != n_objects {
            return Err(SkyframeError::LengthMismatch {
                name: key.to_string(),
                expected: n_objects,
                found: jacobian.len(),
            });
        }
        Ok(jacobian)
    }
}

struct Transformer<'a> {
    table: &'a mut MeasurementTable,
    descriptors: &'a AlgorithmDescriptors,
    context: &'a mut TransformContext,
    stage: TransformStage,
}

impl Transformer<'_> {
    fn advance(&mut self, next: TransformStage) {
        debug!(from = ?self.stage, to = ?next, fields = self.table.len(), "transform stage");
        self.stage = next;
    }

    /// Replace the field under `key` by a double precision scalar, keeping its documentation.
    fn store(
        &mut self,
        key: &str,
        name: &str,
        unit: &str,
        values: Vec<f64>,
    ) -> Result<(), SkyframeError> {
        let doc = self.table.get(key)?.doc.clone();
        let field = Field {
            name: name.to_string(),
            unit: unit.to_string(),
            doc,
            data: FieldData::Scalar(Column::Float64(values)),
        };
        self.table.replace(key, field)
    }

    fn values(&self, key: &str) -> Result<Vec<f64>, SkyframeError> {
        self.table.float_values(key)
    }

    fn jacobian(&mut self, reference: &Reference) -> Result<WcsJacobian, SkyframeError> {
        let n_objects = self.table.n_objects();
        self.context.jacobian(reference, n_objects).cloned()
    }

    fn check_fluxes(&self) -> Result<(), SkyframeError> {
        for desc in &self.descriptors.fluxes {
            self.table.get(&desc.flux)?;
        }
        for desc in &self.descriptors.flux_errs {
            self.table.get(&desc.flux)?;
            self.table.get(&desc.fluxerr)?;
        }
        Ok(())
    }

    fn transform_positions(&mut self) -> Result<(), SkyframeError> {
        let descriptors = self.descriptors;
        for desc in &descriptors.positions {
            let (ra, dec) = self.context.resolve_position(desc, self.table)?;
            self.store(&desc.x, &desc.ra, "degree", ra)?;
            self.store(&desc.y, &desc.dec, "degree", dec)?;
        }
        Ok(())
    }

    fn transform_position_errs(&mut self) -> Result<(), SkyframeError> {
        let unit = self.context.config.output_unit;
        let label = unit.label_pow(2);

        let descriptors = self.descriptors;
        for desc in &descriptors.position_errs {
            match desc.validity {
                Validity::Full => {
                    let jacobian = self.jacobian(&desc.reference)?;
                    let (c11, c12, c22) = jacobian.transform_covariance_full(
                        &self.values(&desc.xx)?,
                        &self.values(&desc.xy)?,
                        &self.values(&desc.yy)?,
                        unit,
                    )?;
                    self.store(&desc.xx, &desc.out_11, &label, c11)?;
                    self.store(&desc.xy, &desc.out_12, &label, c12)?;
                    self.store(&desc.yy, &desc.out_22, &label, c22)?;
                }
                Validity::Diagonal => {
                    let jacobian = self.jacobian(&desc.reference)?;
                    let (c11, c22) = jacobian.transform_covariance_diag(
                        &self.values(&desc.xx)?,
                        &self.values(&desc.yy)?,
                        unit,
                    )?;
                    self.store(&desc.xx, &desc.out_11, &label, c11)?;
                    self.store(&desc.yy, &desc.out_22, &label, c22)?;
                    self.table.remove(&desc.xy)?;
                }
                Validity::None => {
                    self.table
                        .pop_many(&[desc.xx.as_str(), desc.xy.as_str(), desc.yy.as_str()])?;
                }
            }
        }
        Ok(())
    }

    fn transform_position_sigmas(&mut self) -> Result<(), SkyframeError> {
        let unit = self.context.config.output_unit;

        let descriptors = self.descriptors;
        for desc in &descriptors.position_sigmas {
            let jacobian = self.jacobian(&desc.reference)?;
            let (s11, s22) = jacobian.transform_sigma_diag(
                &self.values(&desc.x_sigma)?,
                &self.values(&desc.y_sigma)?,
                unit,
            )?;
            self.store(&desc.x_sigma, &desc.ra_sigma, unit.label(), s11)?;
            self.store(&desc.y_sigma, &desc.dec_sigma, unit.label(), s22)?;
        }
        Ok(())
    }

    fn transform_sizes(&mut self) -> Result<(), SkyframeError> {
        let unit = self.context.config.output_unit;

        let descriptors = self.descriptors;
        for desc in &descriptors.sizes {
            let scale = self.jacobian(&desc.reference)?.pixel_scale(unit);
            let sizes: Vec<f64> = self
                .values(&desc.size)?
                .iter()
                .zip(&scale)
                .map(|(size, scale)| size * scale)
                .collect();
            let name = self.table.get(&desc.size)?.name.clone();
            self.store(&desc.size, &name, unit.label(), sizes)?;
        }
        Ok(())
    }

    fn transform_shapes(&mut self) -> Result<(), SkyframeError> {
        let unit = self.context.config.output_unit;
        let label = unit.label_pow(2);

        let descriptors = self.descriptors;
        for desc in &descriptors.shapes {
            let jacobian = self.jacobian(&desc.reference)?;
            let (m11, m22, m12) = jacobian.transform_moments(
                &self.values(&desc.xx)?,
                &self.values(&desc.yy)?,
                &self.values(&desc.xy)?,
                unit,
            )?;
            self.store(&desc.xx, &desc.out_11, &label, m11)?;
            self.store(&desc.yy, &desc.out_22, &label, m22)?;
            self.store(&desc.xy, &desc.out_12, &label, m12)?;
        }
        Ok(())
    }

    fn transform_shape_errs(&mut self) -> Result<(), SkyframeError> {
        let unit = self.context.config.output_unit;
        let label = unit.label_pow(4);

        let descriptors = self.descriptors;
        for desc in &descriptors.shape_errs {
            match desc.validity {
                Validity::Full => {
                    let jacobian = self.jacobian(&desc.reference)?;
                    let cov = MomentCovariance {
                        xx_xx: self.values(&desc.xx_xx)?,
                        xx_yy: self.values(&desc.xx_yy)?,
                        yy_yy: self.values(&desc.yy_yy)?,
                        xx_xy: self.values(&desc.xx_xy)?,
                        yy_xy: self.values(&desc.yy_xy)?,
                        xy_xy: self.values(&desc.xy_xy)?,
                    };
                    let sky = jacobian.transform_moment_covariance_full(&cov, unit)?;
                    self.store(&desc.xx_xx, &desc.out_11_11, &label, sky.xx_xx)?;
                    self.store(&desc.xx_yy, &desc.out_11_22, &label, sky.xx_yy)?;
                    self.store(&desc.yy_yy, &desc.out_22_22, &label, sky.yy_yy)?;
                    self.store(&desc.xx_xy, &desc.out_11_12, &label, sky.xx_xy)?;
                    self.store(&desc.yy_xy, &desc.out_22_12, &label, sky.yy_xy)?;
                    self.store(&desc.xy_xy, &desc.out_12_12, &label, sky.xy_xy)?;
                }
                Validity::Diagonal => {
                    let jacobian = self.jacobian(&desc.reference)?;
                    let (c11_11, c22_22, c12_12) = jacobian.transform_moment_covariance_diag(
                        &self.values(&desc.xx_xx)?,
                        &self.values(&desc.yy_yy)?,
                        &self.values(&desc.xy_xy)?,
                        unit,
                    )?;
                    self.store(&desc.xx_xx, &desc.out_11_11, &label, c11_11)?;
                    self.store(&desc.yy_yy, &desc.out_22_22, &label, c22_22)?;
                    self.store(&desc.xy_xy, &desc.out_12_12, &label, c12_12)?;
                    self.table.pop_many(&[
                        desc.xx_yy.as_str(),
                        desc.xx_xy.as_str(),
                        desc.yy_xy.as_str(),
                    ])?;
                }
                Validity::None => {
                    self.table.pop_many(&[
                        desc.xx_xx.as_str(),
                        desc.xx_yy.as_str(),
                        desc.yy_yy.as_str(),
                        desc.xx_xy.as_str(),
                        desc.yy_xy.as_str(),
                        desc.xy_xy.as_str(),
                    ])?;
                }
            }
        }
        Ok(())
    }

    fn transform_shape_sigmas(&mut self) -> Result<(), SkyframeError> {
        let unit = self.context.config.output_unit;
        let label = unit.label_pow(2);

        let descriptors = self.descriptors;
        for desc in &descriptors.shape_sigmas {
            let jacobian = self.jacobian(&desc.reference)?;
            let (s11, s22, s12) = jacobian.transform_moment_sigma_diag(
                &self.values(&desc.xx_sigma)?,
                &self.values(&desc.yy_sigma)?,
                &self.values(&desc.xy_sigma)?,
                unit,
            )?;
            self.store(&desc.xx_sigma, &desc.out_11_sigma, &label, s11)?;
            self.store(&desc.yy_sigma, &desc.out_22_sigma, &label, s22)?;
            self.store(&desc.xy_sigma, &desc.out_12_sigma, &label, s12)?;
        }
        Ok(())
    }

    fn transform_ellipticities(&mut self) -> Result<(), SkyframeError> {
        let squared = self.context.config.output_unit.label_pow(2);
        let label = format!("{squared} / {squared}");

        let descriptors = self.descriptors;
        for desc in &descriptors.ellipticities {
            let jacobian = self.jacobian(&desc.reference)?;
            let (e1, e2) =
                jacobian.transform_ellipticity(&self.values(&desc.e1)?, &self.values(&desc.e2)?)?;
            let name1 = self.table.get(&desc.e1)?.name.clone();
            let name2 = self.table.get(&desc.e2)?.name.clone();
            self.store(&desc.e1, &name1, &label, e1)?;
            self.store(&desc.e2, &name2, &label, e2)?;
        }
        Ok(())
    }

    fn transform_angles(&mut self) {
        for (_, field) in self.table.iter_mut() {
            if let FieldData::Angle(values) = &mut field.data {
                values.iter_mut().for_each(|v| *v = v.to_degrees());
                field.unit = "degree".to_string();
            }
        }
    }

    fn rename(&mut self) -> Result<(), SkyframeError> {
        let renamer = Renamer::new(&self.descriptors.rename_rules)?;
        for (_, field) in self.table.iter_mut() {
            field.name = renamer.rename(&field.name);
        }
        Ok(())
    }

    fn reduce_precision(&mut self) {
        let exempt = self.descriptors.precision_exempt();
        for (key, field) in self.table.iter_mut() {
            if !exempt.contains(&key) {
                field.data.to_single_precision();
            }
        }
    }

    fn run(mut self) -> Result<TransformStage, SkyframeError> {
        self.check_fluxes()?;
        self.transform_positions()?;
        self.advance(TransformStage::PositionsResolved);

        self.transform_position_errs()?;
        self.transform_position_sigmas()?;
        self.transform_sizes()?;
        self.transform_shapes()?;
        self.transform_shape_errs()?;
        self.transform_shape_sigmas()?;
        self.transform_ellipticities()?;
        if self.context.config.convert_angles {
            self.transform_angles();
        }
        self.advance(TransformStage::TensorsTransformed);

        self.rename()?;
        self.advance(TransformStage::Renamed);

        if self.context.config.reduce_precision {
            self.reduce_precision();
            self.advance(TransformStage::SinglePrecisionReduced);
        }
        Ok(self.stage)
    }
}

/// Transform the fields of one algorithm in place.
///
/// Arguments
/// ---------
/// * `table`: the fields of the algorithm, keyed by their source catalog names.
/// * `descriptors`: the roles of those fields.
/// * `context`: projection, configuration and caches of the exposure.
///
/// Return
/// ----------
/// * `Ok(stage)`: the last stage reached, [`TransformStage::Renamed`] when precision
///   reduction is disabled and [`TransformStage::SinglePrecisionReduced`] otherwise.
/// * `Err(SkyframeError::MissingField)`: a descriptor names a field absent from `table`.
/// * `Err(SkyframeError::UnresolvedReference)`: a reference position was not produced
///   by any position descriptor.
/// * `Err(SkyframeError::MissingDefaultCoord)`: a descriptor borrows the default
///   position and the context has none.
///
/// See also
/// ------------
/// * [`crate::registry::Algorithm::transform`] – the same run on a registered algorithm.
pub fn transform_algorithm(
    table: &mut MeasurementTable,
    descriptors: &AlgorithmDescriptors,
    context: &mut TransformContext,
) -> Result<TransformStage, SkyframeError> {
    Transformer {
        table,
        descriptors,
        context,
        stage: TransformStage::Untransformed,
    }
    .run()
}

#[cfg(test)]
mod engine_test {
    use approx::assert_relative_eq;
    use nalgebra::Matrix2;

    use super::*;
    use crate::{
        constants::AngleUnit,
        descriptors::{EllipticityDesc, PositionErrDesc, SizeDesc},
        wcs::ProjectionParams,
    };

    fn wcs() -> Wcs {
        let scale = (0.2_f64 / 3600.0).to_radians();
        Wcs::new(ProjectionParams {
            crpix: [100.0, 100.0],
            crval: [30.0_f64.to_radians(), -10.0_f64.to_radians()],
            cd: [[-scale, 0.0], [0.0, scale]],
            crpix_a: [0.0, 0.0],
            crval_a: [0.0, 0.0],
        })
    }

    fn diagonal_err(validity: Validity) -> PositionErrDesc {
        PositionErrDesc {
            xx: "c_xx".to_string(),
            xy: "c_xy".to_string(),
            yy: "c_yy".to_string(),
            out_11: "c_11".to_string(),
            out_12: "c_12".to_string(),
            out_22: "c_22".to_string(),
            reference: Reference::Default,
            validity,
        }
    }

    fn error_table() -> MeasurementTable {
        MeasurementTable::from_fields(
            2,
            [
                Field::scalar("c_xx", "pixel^2", vec![4.0_f64, 1.0]),
                Field::scalar("c_xy", "pixel^2", vec![0.0_f64, 0.0]),
                Field::scalar("c_yy", "pixel^2", vec![9.0_f64, 1.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_diagonal_error_drops_cross_term() {
        let config = TransformConfig::default().with_output_unit(AngleUnit::Radian);
        let mut context = TransformContext::new(wcs(), config);
        context.insert_jacobian("default_ra", WcsJacobian::uniform(Matrix2::new(2.0, 0.0, 0.0, 2.0), 2));

        let mut table = error_table();
        let descriptors = AlgorithmDescriptors {
            position_errs: vec![diagonal_err(Validity::Diagonal)],
            ..Default::default()
        };
        let stage = transform_algorithm(&mut table, &descriptors, &mut context).unwrap();

        assert_eq!(stage, TransformStage::SinglePrecisionReduced);
        assert!(!table.contains("c_xy"));
        assert_eq!(table.float_values("c_xx").unwrap(), vec![16.0, 4.0]);
        assert_eq!(table.float_values("c_yy").unwrap(), vec![36.0, 4.0]);
        assert_eq!(table.get("c_yy").unwrap().name, "c_22");
        assert_eq!(table.get("c_yy").unwrap().unit, "rad^2");
    }

    #[test]
    fn test_none_validity_consumes_inputs() {
        let mut context = TransformContext::new(wcs(), TransformConfig::default());
        let mut table = error_table();
        let descriptors = AlgorithmDescriptors {
            position_errs: vec![diagonal_err(Validity::None)],
            ..Default::default()
        };
        transform_algorithm(&mut table, &descriptors, &mut context).unwrap();
        assert!(table.is_empty());
        assert_eq!(context.cached_jacobians(), 0);
    }

    #[test]
    fn test_missing_default_coord() {
        let mut context = TransformContext::new(wcs(), TransformConfig::default());
        let mut table = error_table();
        let descriptors = AlgorithmDescriptors {
            position_errs: vec![diagonal_err(Validity::Full)],
            ..Default::default()
        };
        assert_eq!(
            transform_algorithm(&mut table, &descriptors, &mut context),
            Err(SkyframeError::MissingDefaultCoord)
        );
    }

    #[test]
    fn test_unresolved_reference() {
        let mut context = TransformContext::new(wcs(), TransformConfig::default());
        let mut table = MeasurementTable::from_fields(
            1,
            [Field::scalar("s_radius", "pixel", vec![3.0_f64])],
        )
        .unwrap();
        let descriptors = AlgorithmDescriptors {
            sizes: vec![SizeDesc {
                size: "s_radius".to_string(),
                reference: Reference::position("s"),
            }],
            ..Default::default()
        };
        assert_eq!(
            transform_algorithm(&mut table, &descriptors, &mut context),
            Err(SkyframeError::UnresolvedReference("s_ra".to_string()))
        );
    }

    #[test]
    fn test_sizes_share_one_jacobian() {
        let coord = DefaultCoord {
            ra: vec![30.0],
            dec: vec![-10.0],
        };
        let mut context =
            TransformContext::new(wcs(), TransformConfig::default()).with_default_coord(coord);
        let mut table = MeasurementTable::from_fields(
            1,
            [
                Field::scalar("k_radius", "pixel", vec![5.0_f64]),
                Field::scalar("k_psf_radius", "pixel", vec![2.5_f64]),
            ],
        )
        .unwrap();
        let descriptors = AlgorithmDescriptors {
            sizes: ["k_radius", "k_psf_radius"]
                .iter()
                .map(|s| SizeDesc {
                    size: s.to_string(),
                    reference: Reference::Default,
                })
                .collect(),
            ..Default::default()
        };
        transform_algorithm(&mut table, &descriptors, &mut context).unwrap();

        assert_eq!(context.cached_jacobians(), 1);
        let radius = table.get("k_radius").unwrap();
        assert_eq!(radius.unit, "arcsec");
        assert_eq!(radius.data, FieldData::Scalar(Column::Float32(vec![1.0])));
        assert_relative_eq!(
            table.float_values("k_psf_radius").unwrap()[0],
            0.5,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_ellipticity_keeps_name() {
        let coord = DefaultCoord {
            ra: vec![30.0],
            dec: vec![-10.0],
        };
        let mut context =
            TransformContext::new(wcs(), TransformConfig::default()).with_default_coord(coord);
        let mut table = MeasurementTable::from_fields(
            1,
            [
                Field::scalar("h_e1", "", vec![0.3_f64]),
                Field::scalar("h_e2", "", vec![0.1_f64]),
            ],
        )
        .unwrap();
        let descriptors = AlgorithmDescriptors {
            ellipticities: vec![EllipticityDesc {
                e1: "h_e1".to_string(),
                e2: "h_e2".to_string(),
                reference: Reference::Default,
            }],
            ..Default::default()
        };
        transform_algorithm(&mut table, &descriptors, &mut context).unwrap();

        // CD1_1 < 0 mirrors the x axis: e1 is kept, e2 flips sign
        let e1 = table.get("h_e1").unwrap();
        assert_eq!(e1.name, "h_e1");
        assert_eq!(e1.unit, "arcsec^2 / arcsec^2");
        assert_relative_eq!(table.float_values("h_e1").unwrap()[0], 0.3, epsilon = 1e-6);
        assert_relative_eq!(table.float_values("h_e2").unwrap()[0], -0.1, epsilon = 1e-6);
    }

    #[test]
    fn test_angles_to_degrees_in_double_precision() {
        let mut context = TransformContext::new(wcs(), TransformConfig::default());
        let mut table = MeasurementTable::from_fields(
            1,
            [Field::angle("h_theta", vec![std::f64::consts::FRAC_PI_2])],
        )
        .unwrap();
        transform_algorithm(&mut table, &AlgorithmDescriptors::default(), &mut context).unwrap();

        let theta = table.get("h_theta").unwrap();
        assert_eq!(theta.unit, "degree");
        match &theta.data {
            FieldData::Angle(values) => assert_relative_eq!(values[0], 90.0, epsilon = 1e-12),
            other => panic!("angle became {}", other.kind_name()),
        }
    }

    #[test]
    fn test_missing_flux_field() {
        let mut context = TransformContext::new(wcs(), TransformConfig::default());
        let mut table = MeasurementTable::new(1);
        let descriptors = AlgorithmDescriptors {
            fluxes: vec![crate::descriptors::FluxDesc::new("f_flux")],
            ..Default::default()
        };
        assert_eq!(
            transform_algorithm(&mut table, &descriptors, &mut context),
            Err(SkyframeError::MissingField("f_flux".to_string()))
        );
    }
}
