#![allow(dead_code)]

use approx::assert_relative_eq;
use skyframe::constants::AB_ZERO_POINT;
use skyframe::field::{Field, FieldData};
use skyframe::table::MeasurementTable;
use skyframe::wcs::{ProjectionParams, Wcs};

/// Header of a 0.168"/pixel patch anchored in a larger mosaic.
pub const PATCH_HEADER: &str = "\
SIMPLE  =                    T
CTYPE1  = 'RA---TAN'
CTYPE2  = 'DEC--TAN'
CRPIX1  =              18000.0 / Pixel coordinate of reference point
CRPIX2  =              18000.0 / Pixel coordinate of reference point
CRVAL1  =                150.0 / [deg] Coordinate value at reference point
CRVAL2  =                  2.0 / [deg] Coordinate value at reference point
CD1_1   = -4.66666666666667E-05
CD2_2   =  4.66666666666667E-05
CRPIX1A =                  1.0
CRPIX2A =                  1.0
CRVAL1A =              16000.0
CRVAL2A =              16000.0
COMMENT anchored at patch (4, 4)
END";

/// Pixel of the patch header whose sky position is its reference point.
pub const REFERENCE_PIXEL: (f64, f64) = (33999.0, 33999.0);

pub fn patch_wcs() -> Wcs {
    Wcs::from_header(PATCH_HEADER).unwrap()
}

/// Projection with `scale` radians per pixel, no rotation, reference at pixel (0, 0).
pub fn plain_wcs(scale: f64) -> Wcs {
    Wcs::new(ProjectionParams {
        crpix: [0.0, 0.0],
        crval: [45.0_f64.to_radians(), 10.0_f64.to_radians()],
        cd: [[scale, 0.0], [0.0, scale]],
        crpix_a: [0.0, 0.0],
        crval_a: [0.0, 0.0],
    })
}

pub fn scalar(name: &str, values: &[f64]) -> Field {
    Field::scalar(name, "", values.to_vec())
}

pub fn table(fields: Vec<Field>) -> MeasurementTable {
    let n_objects = fields.first().map_or(0, Field::len);
    MeasurementTable::from_fields(n_objects, fields).unwrap()
}

/// Values of a transformed scalar field widened to `f64`.
pub fn values(table: &MeasurementTable, key: &str) -> Vec<f64> {
    table.float_values(key).unwrap()
}

pub fn is_single_precision(table: &MeasurementTable, key: &str) -> bool {
    match &table.get(key).unwrap().data {
        FieldData::Angle(_) => false,
        data => !data.has_double(),
    }
}

pub fn assert_all_close(actual: &[f64], expected: &[f64], max_relative: f64) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert_relative_eq!(a, e, max_relative = max_relative);
    }
}

/// Flux of an AB magnitude, in erg s⁻¹ cm⁻² Hz⁻¹.
pub fn ab_flux(mag: f64) -> f64 {
    10f64.powf(-(mag - AB_ZERO_POINT) / 2.5)
}
