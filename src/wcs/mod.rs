//! # Projection model
//!
//! This module implements the gnomonic (TAN) world coordinate system attached to
//! each detector-exposure catalog:
//!
//! - [`ProjectionParams`]: the parameter bundle (reference pixel, reference sky
//!   position, CD matrix and the "A" mosaic anchor), built directly or from a
//!   FITS-style header through [`ProjectionParams::from_header`].
//! - [`Wcs`]: the projection itself, with the forward map
//!   [`Wcs::pixel_to_sky`] and the local derivative [`Wcs::jacobian_at`].
//!
//! Pixel coordinates are expressed in the mosaic "A" frame: the pixel offset fed
//! to the CD matrix is `x + CRPIX1A - CRVAL1A - CRPIX1` (and likewise for `y`).
//!
//! ## Jacobian
//!
//! The Jacobian is built from the orthonormal tangential bases `(e₁, e₂)` of the
//! sphere at the query point `t` and at the reference point `t₀`:
//!
//! ```text
//! dSky/dIWC = (t·t₀) [ e₁·e₁₀  e₁·e₂₀ ]
//!                    [ e₂·e₁₀  e₂·e₂₀ ]
//! dSky/dPix = dSky/dIWC · CD
//! ```
//!
//! which is the exact derivative of the gnomonic deprojection, evaluated in closed
//! form for whole arrays of objects.
//!
//! ## Example
//!
//! ```rust
//! use skyframe::constants::SkyUnit;
//! use skyframe::wcs::{ProjectionParams, Wcs};
//!
//! let scale = (0.168_f64 / 3600.0).to_radians();
//! let params = ProjectionParams {
//!     crpix: [1000.0, 1000.0],
//!     crval: [150.0_f64.to_radians(), 2.0_f64.to_radians()],
//!     cd: [[-scale, 0.0], [0.0, scale]],
//!     crpix_a: [0.0, 0.0],
//!     crval_a: [0.0, 0.0],
//! };
//! let wcs = Wcs::new(params);
//! let (ra, dec) = wcs.pixel_to_sky_point(1000.0, 1000.0, SkyUnit::Degree);
//! assert!((ra - 150.0).abs() < 1e-12 && (dec - 2.0).abs() < 1e-12);
//! ```
pub mod header;

use nalgebra::{Matrix2, Vector3};
use serde::{Deserialize, Serialize};

use crate::{
    constants::{Degree, Pixel, Radian, SkyUnit, RADEG},
    propagation::WcsJacobian,
    skyframe_errors::SkyframeError,
};
use header::{parse_header, HeaderCards};

/// Parameters of one gnomonic projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectionParams {
    /// Reference pixel (`CRPIX1`, `CRPIX2`), 1-indexed.
    pub crpix: [Pixel; 2],
    /// Reference sky position (`CRVAL1`, `CRVAL2`) in radians.
    pub crval: [Radian; 2],
    /// Pixel → intermediate world coordinate matrix in radians per pixel.
    pub cd: [[Radian; 2]; 2],
    /// Reference pixel of the mosaic "A" frame (`CRPIX1A`, `CRPIX2A`).
    pub crpix_a: [Pixel; 2],
    /// Value of the "A" frame at its reference pixel (`CRVAL1A`, `CRVAL2A`).
    pub crval_a: [Pixel; 2],
}

fn mandatory(cards: &HeaderCards, key: &str) -> Result<f64, SkyframeError> {
    cards
        .get(key)
        .copied()
        .ok_or_else(|| SkyframeError::MissingHeaderKey(key.to_string()))
}

impl ProjectionParams {
    /// Build the parameters from already parsed header cards.
    ///
    /// `CRVALn` and `CDi_j` are read in degrees and stored in radians.
    /// Absent `CDi_j` entries default to zero, every other key is mandatory.
    pub fn from_cards(cards: &HeaderCards) -> Result<Self, SkyframeError> {
        let cd = |key: &str| cards.get(key).copied().unwrap_or(0.0) * RADEG;

        Ok(ProjectionParams {
            crpix: [mandatory(cards, "CRPIX1")?, mandatory(cards, "CRPIX2")?],
            crval: [
                mandatory(cards, "CRVAL1")? * RADEG,
                mandatory(cards, "CRVAL2")? * RADEG,
            ],
            cd: [[cd("CD1_1"), cd("CD1_2")], [cd("CD2_1"), cd("CD2_2")]],
            crpix_a: [mandatory(cards, "CRPIX1A")?, mandatory(cards, "CRPIX2A")?],
            crval_a: [mandatory(cards, "CRVAL1A")?, mandatory(cards, "CRVAL2A")?],
        })
    }

    /// Parse a header text blob and build the parameters.
    pub fn from_header(header: &str) -> Result<Self, SkyframeError> {
        Self::from_cards(&parse_header(header)?)
    }
}

/// Unit vector of a sky position together with its local tangential basis.
///
/// * `t`: unit vector pointing to `(ra, dec)`
/// * `e1`: unit vector along `dt/dra`
/// * `e2`: unit vector along `dt/ddec`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TangentialBasis {
    pub e1: Vector3<f64>,
    pub e2: Vector3<f64>,
    pub t: Vector3<f64>,
}

impl TangentialBasis {
    /// Tangential basis at `(ra, dec)` given in radians.
    pub fn at(ra: Radian, dec: Radian) -> Self {
        let (sin_ra, cos_ra) = ra.sin_cos();
        let (sin_dec, cos_dec) = dec.sin_cos();

        TangentialBasis {
            e1: Vector3::new(-sin_ra, cos_ra, 0.0),
            e2: Vector3::new(-cos_ra * sin_dec, -sin_ra * sin_dec, cos_dec),
            t: Vector3::new(cos_ra * cos_dec, sin_ra * cos_dec, sin_dec),
        }
    }
}

/// Gnomonic world coordinate system of one detector-exposure.
#[derive(Debug, Clone, PartialEq)]
pub struct Wcs {
    params: ProjectionParams,
    cd: Matrix2<f64>,
    reference: TangentialBasis,
}

impl Wcs {
    pub fn new(params: ProjectionParams) -> Self {
        let cd = Matrix2::new(
            params.cd[0][0],
            params.cd[0][1],
            params.cd[1][0],
            params.cd[1][1],
        );
        let reference = TangentialBasis::at(params.crval[0], params.crval[1]);
        Wcs {
            params,
            cd,
            reference,
        }
    }

    /// Build the projection from a FITS-style header blob.
    pub fn from_header(header: &str) -> Result<Self, SkyframeError> {
        Ok(Self::new(ProjectionParams::from_header(header)?))
    }

    pub fn params(&self) -> &ProjectionParams {
        &self.params
    }

    /// Pixel → intermediate world coordinate matrix, radians per pixel.
    pub fn cd(&self) -> &Matrix2<f64> {
        &self.cd
    }

    fn at_pole(&self) -> bool {
        self.params.crval[1] == 90.0 * RADEG
    }

    /// Forward projection of a single pixel position.
    ///
    /// Arguments
    /// ---------
    /// * `x`, `y`: pixel coordinates in the mosaic "A" frame.
    /// * `unit`: unit of the returned coordinates. In degrees the right ascension
    ///   is wrapped to `[0, 360)`.
    ///
    /// Return
    /// ----------
    /// * `(ra, dec)` in the requested unit.
    pub fn pixel_to_sky_point(&self, x: Pixel, y: Pixel, unit: SkyUnit) -> (f64, f64) {
        let p = &self.params;

        // pixel => intermediate world coordinates
        let px = x + p.crpix_a[0] - p.crval_a[0] - p.crpix[0];
        let py = y + p.crpix_a[1] - p.crval_a[1] - p.crpix[1];
        let iwc = self.cd * nalgebra::Vector2::new(px, py);
        let (mut u, mut v) = (iwc[0], iwc[1]);

        // native longitude of the celestial pole is 180° except at the pole itself
        if !self.at_pole() {
            u = -u;
            v = -v;
        }

        // intermediate world coordinates => native spherical coordinates
        let r = u.hypot(v);
        let (sin_phi, cos_phi) = if r <= 0.0 {
            (0.0, 1.0)
        } else {
            (u / r, -v / r)
        };
        let inv_r1 = 1.0 / r.hypot(1.0);
        let sin_theta = inv_r1;
        let cos_theta = r * inv_r1;

        // native spherical => celestial spherical
        let (sin_crv2, cos_crv2) = p.crval[1].sin_cos();
        let a = sin_theta * cos_crv2 - cos_theta * sin_crv2 * cos_phi;
        let b = -cos_theta * sin_phi;

        let ra = if a == 0.0 && b == 0.0 {
            0.0
        } else {
            p.crval[0] + b.atan2(a)
        };
        let sin_dec = (sin_theta * sin_crv2 + cos_theta * cos_crv2 * cos_phi).clamp(-1.0, 1.0);
        let dec = sin_dec.asin();

        match unit {
            SkyUnit::Radian => (ra, dec),
            SkyUnit::Degree => ((ra / RADEG).rem_euclid(360.0), dec / RADEG),
        }
    }

    /// Forward projection of arrays of pixel positions.
    ///
    /// Return
    /// ----------
    /// * `Ok((ra, dec))`: one sky position per object, in the requested unit.
    /// * `Err(SkyframeError::LengthMismatch)`: `x` and `y` differ in length.
    pub fn pixel_to_sky(
        &self,
        x: &[Pixel],
        y: &[Pixel],
        unit: SkyUnit,
    ) -> Result<(Vec<f64>, Vec<f64>), SkyframeError> {
        if x.len() != y.len() {
            return Err(SkyframeError::LengthMismatch {
                name: "y".to_string(),
                expected: x.len(),
                found: y.len(),
            });
        }

        Ok(x.iter()
            .zip(y)
            .map(|(&x, &y)| self.pixel_to_sky_point(x, y, unit))
            .unzip())
    }

    /// Jacobian `d(sky)/d(pixel)` of the forward map at a single sky position in radians.
    ///
    /// The sky frame is the tangent plane at the query point, with its first axis
    /// along increasing right ascension and its second along increasing declination.
    pub fn jacobian_matrix_at(&self, ra: Radian, dec: Radian) -> Matrix2<f64> {
        let here = TangentialBasis::at(ra, dec);
        let there = &self.reference;

        let t_t0 = here.t.dot(&there.t);
        let sky_per_iwc = Matrix2::new(
            here.e1.dot(&there.e1),
            here.e1.dot(&there.e2),
            here.e2.dot(&there.e1),
            here.e2.dot(&there.e2),
        ) * t_t0;

        sky_per_iwc * self.cd
    }

    /// Jacobian of the forward map at each `(ra, dec)` given in degrees.
    ///
    /// Return
    /// ----------
    /// * `Ok(WcsJacobian)`: one 2×2 matrix per object.
    /// * `Err(SkyframeError::LengthMismatch)`: `ra` and `dec` differ in length.
    ///
    /// See also
    /// ------------
    /// * [`WcsJacobian`] – the tensor propagation operations.
    pub fn jacobian_at(
        &self,
        ra: &[Degree],
        dec: &[Degree],
    ) -> Result<WcsJacobian, SkyframeError> {
        if ra.len() != dec.len() {
            return Err(SkyframeError::LengthMismatch {
                name: "dec".to_string(),
                expected: ra.len(),
                found: dec.len(),
            });
        }

        Ok(WcsJacobian::new(
            ra.iter()
                .zip(dec)
                .map(|(&ra, &dec)| self.jacobian_matrix_at(ra * RADEG, dec * RADEG))
                .collect(),
        ))
    }
}

#[cfg(test)]
mod wcs_test {
    use super::*;
    use crate::constants::DPI;
    use approx::assert_relative_eq;

    fn wrap_ra(ra: Radian) -> Radian {
        ra.rem_euclid(DPI)
    }

    fn test_params() -> ProjectionParams {
        let scale = (0.168_f64 / 3600.0).to_radians();
        let angle = 0.3_f64;
        let (s, c) = angle.sin_cos();
        ProjectionParams {
            crpix: [18000.0, 18000.0],
            crval: [150.0_f64.to_radians(), 30.0_f64.to_radians()],
            cd: [[-scale * c, scale * s], [scale * s, scale * c]],
            crpix_a: [1.0, 1.0],
            crval_a: [12000.0, 12000.0],
        }
    }

    // reference pixel expressed in "A" coordinates
    fn reference_pixel(p: &ProjectionParams) -> (f64, f64) {
        (
            p.crpix[0] - p.crpix_a[0] + p.crval_a[0],
            p.crpix[1] - p.crpix_a[1] + p.crval_a[1],
        )
    }

    #[test]
    fn test_reference_pixel_maps_to_reference_sky() {
        let params = test_params();
        let wcs = Wcs::new(params);
        let (x0, y0) = reference_pixel(&params);

        let (ra, dec) = wcs.pixel_to_sky_point(x0, y0, SkyUnit::Radian);
        assert_relative_eq!(ra, params.crval[0], epsilon = 1e-15);
        assert_relative_eq!(dec, params.crval[1], epsilon = 1e-15);

        let (ra, dec) = wcs.pixel_to_sky_point(x0, y0, SkyUnit::Degree);
        assert_relative_eq!(ra, 150.0, epsilon = 1e-12);
        assert_relative_eq!(dec, 30.0, epsilon = 1e-12);
    }

    #[test]
    fn test_forward_matches_gnomonic_deprojection() {
        let params = test_params();
        let wcs = Wcs::new(params);
        let (x0, y0) = reference_pixel(&params);
        let reference = TangentialBasis::at(params.crval[0], params.crval[1]);

        for &(dx, dy) in &[(3000.0, -2000.0), (-15000.0, 8000.0), (0.0, 12000.0)] {
            let iwc = wcs.cd() * nalgebra::Vector2::new(dx, dy);
            let w = reference.t + reference.e1 * iwc[0] + reference.e2 * iwc[1];
            let w = w.normalize();
            let expected_dec = w[2].asin();
            let expected_ra = wrap_ra(w[1].atan2(w[0]));

            let (ra, dec) = wcs.pixel_to_sky_point(x0 + dx, y0 + dy, SkyUnit::Radian);
            assert_relative_eq!(wrap_ra(ra), expected_ra, epsilon = 1e-12);
            assert_relative_eq!(dec, expected_dec, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_pole_reference_keeps_native_longitude() {
        // with CRVAL2 exactly at +90° the native longitude is not flipped: the
        // field comes out turned by a half turn in right ascension compared with
        // the gnomonic deprojection, and with a reference just below the pole
        let mut params = test_params();
        params.crval[1] = 90.0 * RADEG;
        let wcs = Wcs::new(params);
        let (x0, y0) = reference_pixel(&params);
        let reference = TangentialBasis::at(params.crval[0], params.crval[1]);

        let mut below = params;
        below.crval[1] = 89.9999 * RADEG;
        let below = Wcs::new(below);

        for &(dx, dy) in &[(3000.0, 2000.0), (-15000.0, 8000.0), (0.0, -12000.0)] {
            let iwc = wcs.cd() * nalgebra::Vector2::new(dx, dy);
            let w = (reference.t + reference.e1 * iwc[0] + reference.e2 * iwc[1]).normalize();

            let (ra, dec) = wcs.pixel_to_sky_point(x0 + dx, y0 + dy, SkyUnit::Radian);
            assert_relative_eq!(dec, w[2].asin(), epsilon = 1e-12);
            assert_relative_eq!(
                wrap_ra(ra),
                wrap_ra(w[1].atan2(w[0]) + std::f64::consts::PI),
                epsilon = 1e-9
            );

            let (ra_below, _) = below.pixel_to_sky_point(x0 + dx, y0 + dy, SkyUnit::Radian);
            assert_relative_eq!(
                wrap_ra(ra - ra_below),
                std::f64::consts::PI,
                epsilon = 1e-2
            );
        }
    }

    #[test]
    fn test_degree_output_is_wrapped() {
        let mut params = test_params();
        params.crval[0] = 0.0;
        let wcs = Wcs::new(params);
        let (x0, y0) = reference_pixel(&params);

        // CD1_1 < 0: increasing x decreases the right ascension
        let (ra, _) = wcs.pixel_to_sky_point(x0 + 5000.0, y0, SkyUnit::Degree);
        assert!((0.0..360.0).contains(&ra));
        assert!(ra > 300.0);
    }

    #[test]
    fn test_jacobian_at_reference_is_cd() {
        let params = test_params();
        let wcs = Wcs::new(params);
        let ra = params.crval[0].to_degrees();
        let dec = params.crval[1].to_degrees();

        let jacobian = wcs.jacobian_at(&[ra], &[dec]).unwrap();
        let j = jacobian.get(0).unwrap();
        for i in 0..2 {
            for k in 0..2 {
                assert_relative_eq!(j[(i, k)], params.cd[i][k], max_relative = 1e-12);
            }
        }
    }

    #[test]
    fn test_jacobian_matches_finite_differences() {
        let params = test_params();
        let wcs = Wcs::new(params);
        let (x0, y0) = reference_pixel(&params);
        let (x, y) = (x0 + 9000.0, y0 - 6000.0);
        let h = 0.5;

        let (ra, dec) = wcs.pixel_to_sky_point(x, y, SkyUnit::Radian);
        let j = wcs.jacobian_matrix_at(ra, dec);

        let sky = |x: f64, y: f64| wcs.pixel_to_sky_point(x, y, SkyUnit::Radian);
        let (ra_px, dec_px) = sky(x + h, y);
        let (ra_mx, dec_mx) = sky(x - h, y);
        let (ra_py, dec_py) = sky(x, y + h);
        let (ra_my, dec_my) = sky(x, y - h);

        let cos_dec = dec.cos();
        let j11 = (ra_px - ra_mx) * cos_dec / (2.0 * h);
        let j21 = (dec_px - dec_mx) / (2.0 * h);
        let j12 = (ra_py - ra_my) * cos_dec / (2.0 * h);
        let j22 = (dec_py - dec_my) / (2.0 * h);

        assert_relative_eq!(j[(0, 0)], j11, max_relative = 1e-5);
        assert_relative_eq!(j[(0, 1)], j12, max_relative = 1e-5);
        assert_relative_eq!(j[(1, 0)], j21, max_relative = 1e-5);
        assert_relative_eq!(j[(1, 1)], j22, max_relative = 1e-5);
    }

    #[test]
    fn test_length_mismatch() {
        let wcs = Wcs::new(test_params());
        let err = wcs.pixel_to_sky(&[1.0, 2.0], &[1.0], SkyUnit::Degree);
        assert_eq!(
            err,
            Err(SkyframeError::LengthMismatch {
                name: "y".to_string(),
                expected: 2,
                found: 1
            })
        );
        assert!(wcs.jacobian_at(&[1.0], &[]).is_err());
    }

    #[test]
    fn test_from_header() {
        let header = "\
CRPIX1  = 18000.0
CRPIX2  = 18000.0
CRVAL1  = 150.0
CRVAL2  = 30.0
CD1_1   = -4.6666666666667E-05
CD2_2   = 4.6666666666667E-05
CRPIX1A = 1.0
CRPIX2A = 1.0
CRVAL1A = 12000.0
CRVAL2A = 12000.0
END";
        let params = ProjectionParams::from_header(header).unwrap();
        assert_eq!(params.crpix, [18000.0, 18000.0]);
        assert_relative_eq!(params.crval[0], 150.0_f64.to_radians());
        assert_eq!(params.cd[0][1], 0.0);
        assert_eq!(params.cd[1][0], 0.0);
        assert_relative_eq!(params.cd[1][1], 4.6666666666667e-05 * RADEG);
        assert_eq!(params.crval_a, [12000.0, 12000.0]);

        let err = ProjectionParams::from_header("CRPIX1 = 1.0").unwrap_err();
        assert_eq!(err, SkyframeError::MissingHeaderKey("CRPIX2".to_string()));
    }
}
