mod common;

use approx::assert_relative_eq;
use nalgebra::Matrix2;
use skyframe::config::TransformConfig;
use skyframe::constants::{AngleUnit, ARCSEC_PER_RADIAN};
use skyframe::descriptors::{
    AlgorithmDescriptors, PositionDesc, PositionErrDesc, Reference, ShapeDesc, ShapeErrDesc,
    Validity,
};
use skyframe::engine::{transform_algorithm, TransformContext, TransformStage};
use skyframe::field::{Column, FieldData};
use skyframe::propagation::WcsJacobian;
use skyframe::rename::RenameRule;
use skyframe::skyframe_errors::SkyframeError;
use skyframe::table::DefaultCoord;

use crate::common::{
    assert_all_close, is_single_precision, patch_wcs, plain_wcs, scalar, table, values,
    REFERENCE_PIXEL,
};

fn position_err(stem: &str, reference: Reference, validity: Validity) -> PositionErrDesc {
    PositionErrDesc {
        xx: format!("{stem}_xxCov"),
        xy: format!("{stem}_xyCov"),
        yy: format!("{stem}_yyCov"),
        out_11: format!("{stem}_raraCov"),
        out_12: format!("{stem}_radecCov"),
        out_22: format!("{stem}_decdecCov"),
        reference,
        validity,
    }
}

fn shape_err(stem: &str, reference: Reference, validity: Validity) -> ShapeErrDesc {
    ShapeErrDesc {
        xx_xx: format!("{stem}_xx_xx"),
        xx_yy: format!("{stem}_xx_yy"),
        yy_yy: format!("{stem}_yy_yy"),
        xx_xy: format!("{stem}_xx_xy"),
        yy_xy: format!("{stem}_yy_xy"),
        xy_xy: format!("{stem}_xy_xy"),
        out_11_11: format!("{stem}_11_11"),
        out_11_22: format!("{stem}_11_22"),
        out_22_22: format!("{stem}_22_22"),
        out_11_12: format!("{stem}_11_12"),
        out_22_12: format!("{stem}_22_12"),
        out_12_12: format!("{stem}_12_12"),
        reference,
        validity,
    }
}

#[test]
fn diagonal_position_error_under_magnification() {
    let config = TransformConfig::default().with_output_unit(AngleUnit::Radian);
    let mut context = TransformContext::new(plain_wcs(1.0e-6), config);
    context.insert_jacobian(
        "default_ra",
        WcsJacobian::uniform(Matrix2::new(2.0, 0.0, 0.0, 2.0), 1),
    );

    let mut fields = table(vec![
        scalar("m_xxCov", &[4.0]),
        scalar("m_xyCov", &[0.0]),
        scalar("m_yyCov", &[9.0]),
    ]);
    let descriptors = AlgorithmDescriptors {
        position_errs: vec![position_err("m", Reference::Default, Validity::Diagonal)],
        ..Default::default()
    };
    transform_algorithm(&mut fields, &descriptors, &mut context).unwrap();

    assert_eq!(values(&fields, "m_xxCov"), vec![16.0]);
    assert_eq!(values(&fields, "m_yyCov"), vec![36.0]);
    assert!(!fields.contains("m_xyCov"));
    assert_eq!(fields.len(), 2);
}

#[test]
fn position_and_full_errors_run_to_terminal_state() {
    let (x0, y0) = REFERENCE_PIXEL;
    let mut context = TransformContext::new(patch_wcs(), TransformConfig::default());

    let mut source = table(vec![
        scalar("alg_x", &[x0, x0 + 100.0]),
        scalar("alg_y", &[y0, y0 - 50.0]),
        scalar("alg_xxCov", &[1.0, 2.0]),
        scalar("alg_xyCov", &[0.1, -0.2]),
        scalar("alg_yyCov", &[1.5, 0.5]),
        scalar("alg_xx", &[3.0, 2.0]),
        scalar("alg_yy", &[2.0, 2.5]),
        scalar("alg_xy", &[0.5, 0.0]),
        scalar("alg_xx_xx", &[0.2, 0.3]),
        scalar("alg_xx_yy", &[0.01, 0.02]),
        scalar("alg_yy_yy", &[0.25, 0.3]),
        scalar("alg_xx_xy", &[0.0, 0.01]),
        scalar("alg_yy_xy", &[0.02, 0.0]),
        scalar("alg_xy_xy", &[0.1, 0.15]),
    ]);
    let position = PositionDesc::centroid("alg");
    let descriptors = AlgorithmDescriptors {
        position_errs: vec![position_err("alg", position.reference(), Validity::Full)],
        shapes: vec![ShapeDesc::moments("alg", position.reference())],
        shape_errs: vec![shape_err("alg", position.reference(), Validity::Full)],
        positions: vec![position],
        ..Default::default()
    };

    let mut algorithm = source.cutout_subtable("alg_");
    let stage = transform_algorithm(&mut algorithm, &descriptors, &mut context).unwrap();

    assert_eq!(stage, TransformStage::SinglePrecisionReduced);
    assert!(source.ensure_consumed().is_ok());
    assert_eq!(context.cached_jacobians(), 1);

    let names: Vec<(&str, &str)> = algorithm
        .iter()
        .map(|(_, f)| (f.name.as_str(), f.unit.as_str()))
        .collect();
    assert_eq!(
        names,
        [
            ("alg_ra", "degree"),
            ("alg_dec", "degree"),
            ("alg_raracov", "arcsec^2"),
            ("alg_radeccov", "arcsec^2"),
            ("alg_decdeccov", "arcsec^2"),
            ("alg_shape11", "arcsec^2"),
            ("alg_shape22", "arcsec^2"),
            ("alg_shape12", "arcsec^2"),
            ("alg_11_11", "arcsec^4"),
            ("alg_11_22", "arcsec^4"),
            ("alg_22_22", "arcsec^4"),
            ("alg_11_12", "arcsec^4"),
            ("alg_22_12", "arcsec^4"),
            ("alg_12_12", "arcsec^4"),
        ]
    );

    // the reference pixel lands on the reference sky position
    let ra = values(&algorithm, "alg_x");
    let dec = values(&algorithm, "alg_y");
    assert_relative_eq!(ra[0], 150.0, epsilon = 1e-10);
    assert_relative_eq!(dec[0], 2.0, epsilon = 1e-10);
    assert!(ra[1] < 150.0 && dec[1] < 2.0);
    assert!(!is_single_precision(&algorithm, "alg_x"));

    // at the reference point the Jacobian is the CD matrix: 0.168"/pixel, x mirrored
    let pixel_scale = 4.66666666666667e-05 * 3600.0;
    let scale2 = pixel_scale * pixel_scale;
    assert_relative_eq!(values(&algorithm, "alg_xxCov")[0], scale2, max_relative = 1e-6);
    assert_relative_eq!(values(&algorithm, "alg_xyCov")[0], -0.1 * scale2, max_relative = 1e-6);
    assert_relative_eq!(values(&algorithm, "alg_yyCov")[0], 1.5 * scale2, max_relative = 1e-6);
    assert_relative_eq!(
        values(&algorithm, "alg_xx_xx")[0],
        0.2 * scale2 * scale2,
        max_relative = 1e-6
    );
    assert_relative_eq!(
        values(&algorithm, "alg_yy_xy")[0],
        -0.02 * scale2 * scale2,
        max_relative = 1e-6
    );
    assert!(is_single_precision(&algorithm, "alg_xx_xx"));
}

#[test]
fn precision_exemptions_are_kept_double() {
    let coord = DefaultCoord {
        ra: vec![45.0],
        dec: vec![10.0],
    };
    let mut context =
        TransformContext::new(plain_wcs(1.0e-6), TransformConfig::default()).with_default_coord(coord);

    let mut fields = table(vec![
        scalar("s_a_xx", &[1.0]),
        scalar("s_a_yy", &[1.0]),
        scalar("s_a_xy", &[0.123456789012345]),
        scalar("s_b_xx", &[1.0]),
        scalar("s_b_yy", &[1.0]),
        scalar("s_b_xy", &[0.123456789012345]),
    ]);
    let descriptors = AlgorithmDescriptors {
        shapes: vec![
            ShapeDesc::moments("s_a", Reference::Default),
            ShapeDesc::moments("s_b", Reference::Default),
        ],
        double_precisions: ["s_b_xx", "s_b_yy", "s_b_xy"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        ..Default::default()
    };
    transform_algorithm(&mut fields, &descriptors, &mut context).unwrap();

    assert!(is_single_precision(&fields, "s_a_xy"));
    assert!(!is_single_precision(&fields, "s_b_xy"));
    match &fields.get("s_a_xy").unwrap().data {
        FieldData::Scalar(Column::Float32(_)) => {}
        other => panic!("expected a float32 scalar, found {other:?}"),
    }
}

#[test]
fn precision_stage_can_be_disabled() {
    let config = TransformConfig {
        reduce_precision: false,
        ..Default::default()
    };
    let mut context = TransformContext::new(plain_wcs(1.0e-6), config);
    let mut fields = table(vec![scalar("n_value", &[1.0])]);
    let descriptors = AlgorithmDescriptors {
        rename_rules: vec![RenameRule::template("n_", "")],
        ..Default::default()
    };

    let stage = transform_algorithm(&mut fields, &descriptors, &mut context).unwrap();
    assert_eq!(stage, TransformStage::Renamed);
    assert!(!is_single_precision(&fields, "n_value"));
    assert_eq!(fields.get("n_value").unwrap().name, "value");
}

#[test]
fn output_unit_scales_tensors() {
    let scale = 1.0e-6;
    let coord = DefaultCoord {
        ra: vec![45.0],
        dec: vec![10.0],
    };
    let descriptors = AlgorithmDescriptors {
        position_errs: vec![position_err("u", Reference::Default, Validity::Full)],
        ..Default::default()
    };
    let fields = || {
        table(vec![
            scalar("u_xxCov", &[2.0]),
            scalar("u_xyCov", &[0.0]),
            scalar("u_yyCov", &[2.0]),
        ])
    };

    let mut in_radians = fields();
    let mut context = TransformContext::new(
        plain_wcs(scale),
        TransformConfig::default().with_output_unit(AngleUnit::Radian),
    )
    .with_default_coord(coord.clone());
    transform_algorithm(&mut in_radians, &descriptors, &mut context).unwrap();

    let mut in_arcsec = fields();
    let mut context =
        TransformContext::new(plain_wcs(scale), TransformConfig::default()).with_default_coord(coord);
    transform_algorithm(&mut in_arcsec, &descriptors, &mut context).unwrap();

    assert_eq!(in_radians.get("u_xxCov").unwrap().unit, "rad^2");
    let expected: Vec<f64> = values(&in_radians, "u_xxCov")
        .iter()
        .map(|v| v * ARCSEC_PER_RADIAN * ARCSEC_PER_RADIAN)
        .collect();
    assert_all_close(&values(&in_arcsec, "u_xxCov"), &expected, 1e-6);
}

#[test]
fn malformed_descriptor_is_reported() {
    let mut context = TransformContext::new(plain_wcs(1.0e-6), TransformConfig::default());
    let mut fields = table(vec![scalar("p_x", &[1.0])]);
    let descriptors = AlgorithmDescriptors {
        positions: vec![PositionDesc::centroid("p")],
        ..Default::default()
    };

    assert_eq!(
        transform_algorithm(&mut fields, &descriptors, &mut context),
        Err(SkyframeError::MissingField("p_y".to_string()))
    );
}

#[test]
fn default_coord_length_must_match_table() {
    let coord = DefaultCoord {
        ra: vec![45.0, 46.0],
        dec: vec![10.0, 11.0],
    };
    let mut context =
        TransformContext::new(plain_wcs(1.0e-6), TransformConfig::default()).with_default_coord(coord);
    let mut fields = table(vec![
        scalar("d_xxCov", &[1.0]),
        scalar("d_xyCov", &[0.0]),
        scalar("d_yyCov", &[1.0]),
    ]);
    let descriptors = AlgorithmDescriptors {
        position_errs: vec![position_err("d", Reference::Default, Validity::Full)],
        ..Default::default()
    };

    assert_eq!(
        transform_algorithm(&mut fields, &descriptors, &mut context),
        Err(SkyframeError::LengthMismatch {
            name: "default_ra".to_string(),
            expected: 1,
            found: 2
        })
    );
}
