//! # Tensor propagation library
//!
//! Stateless operations carrying pixel-frame statistics into the sky frame through a
//! [`WcsJacobian`] `J = d(sky)/d(pixel)`, evaluated independently for every object:
//!
//! | Operation | Input (pixel frame) | Transform |
//! |-----------|---------------------|-----------|
//! | [`WcsJacobian::pixel_scale`] | - | `sqrt(|det J|)` |
//! | [`WcsJacobian::transform_covariance_full`] | position covariance | `J C Jᵀ` |
//! | [`WcsJacobian::transform_covariance_diag`] | diagonal covariance | `J diag(C) Jᵀ`, diagonal kept |
//! | [`WcsJacobian::transform_sigma_diag`] | position sigmas | square, diagonal path, square root |
//! | [`WcsJacobian::transform_moments`] | second moments | `J M Jᵀ` |
//! | [`WcsJacobian::transform_moment_covariance_full`] | moment covariance | `C'ᵢⱼₖₗ = Jᵢₘ Jⱼₙ Jₖₒ Jₗₚ Cₘₙₒₚ` |
//! | [`WcsJacobian::transform_moment_covariance_diag`] | moment variances | same, cross terms zero |
//! | [`WcsJacobian::transform_moment_sigma_diag`] | moment sigmas | square, diagonal path, square root |
//! | [`WcsJacobian::transform_ellipticity`] | `(e1, e2)` | through implicit moments |
//!
//! The Jacobian is expressed in radians per pixel. Every quadratic output is scaled
//! by the requested [`AngleUnit`] raised to the order of the tensor: `unit²` for
//! covariances and moments, `unit⁴` for moment covariances.
//!
//! All input slices must hold exactly one value per object of the Jacobian;
//! otherwise the operations return [`SkyframeError::LengthMismatch`].
use nalgebra::Matrix2;

use crate::{constants::AngleUnit, skyframe_errors::SkyframeError};

/// Local linear map from pixel offsets to sky tangent-plane offsets, one matrix per object.
#[derive(Debug, Clone, PartialEq)]
pub struct WcsJacobian {
    matrices: Vec<Matrix2<f64>>,
}

/// The six independent components of the covariance of a second-moment tensor.
///
/// Naming follows the pixel frame (`xx_xy` is `Cov(Ixx, Ixy)`); in the sky frame the
/// same slots hold `11_11`, `11_22`, `22_22`, `11_12`, `22_12` and `12_12`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MomentCovariance {
    pub xx_xx: Vec<f64>,
    pub xx_yy: Vec<f64>,
    pub yy_yy: Vec<f64>,
    pub xx_xy: Vec<f64>,
    pub yy_xy: Vec<f64>,
    pub xy_xy: Vec<f64>,
}

/// Rank-4 covariance `C[m][n][o][p] = Cov(I[m][n], I[o][p])`.
type Rank4 = [[[[f64; 2]; 2]; 2]; 2];

/// Index of the moment component `I[m][n]`: 0 → xx, 1 → yy, 2 → xy.
const MOMENT_SLOT: [[usize; 2]; 2] = [[0, 2], [2, 1]];

fn expand_rank4(cov: &[[f64; 3]; 3]) -> Rank4 {
    let mut c = [[[[0.0; 2]; 2]; 2]; 2];
    for m in 0..2 {
        for n in 0..2 {
            for o in 0..2 {
                for p in 0..2 {
                    c[m][n][o][p] = cov[MOMENT_SLOT[m][n]][MOMENT_SLOT[o][p]];
                }
            }
        }
    }
    c
}

fn contract_rank4(j: &Matrix2<f64>, c: &Rank4, i: usize, k: usize, l: usize, q: usize) -> f64 {
    let mut acc = 0.0;
    for m in 0..2 {
        for n in 0..2 {
            for o in 0..2 {
                for p in 0..2 {
                    acc += j[(i, m)] * j[(k, n)] * j[(l, o)] * j[(q, p)] * c[m][n][o][p];
                }
            }
        }
    }
    acc
}

/// Reduced ellipticity `(e1, e2)` of a second-moment tensor.
///
/// `e = (a² - b²) / (a² + b²)`, `e1 = e cos 2θ`, `e2 = e sin 2θ`.
pub fn ellipticity_from_moments(xx: f64, yy: f64, xy: f64) -> (f64, f64) {
    let trace = xx + yy;
    ((xx - yy) / trace, 2.0 * xy / trace)
}

impl WcsJacobian {
    pub fn new(matrices: Vec<Matrix2<f64>>) -> Self {
        WcsJacobian { matrices }
    }

    /// The same matrix for `n` objects.
    pub fn uniform(matrix: Matrix2<f64>, n: usize) -> Self {
        WcsJacobian {
            matrices: vec![matrix; n],
        }
    }

    /// Build the Jacobian from one array per matrix entry.
    pub fn from_entries(j11: &[f64], j12: &[f64], j21: &[f64], j22: &[f64]) -> Self {
        WcsJacobian {
            matrices: itertools::izip!(j11, j12, j21, j22)
                .map(|(&a, &b, &c, &d)| Matrix2::new(a, b, c, d))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Matrix2<f64>> {
        self.matrices.get(index).copied()
    }

    pub fn matrices(&self) -> &[Matrix2<f64>] {
        &self.matrices
    }

    /// Per-object inverse, `None` if any matrix is singular.
    pub fn try_inverse(&self) -> Option<WcsJacobian> {
        self.matrices
            .iter()
            .map(|m| m.try_inverse())
            .collect::<Option<Vec<_>>>()
            .map(WcsJacobian::new)
    }

    fn check_len(&self, component: &str, len: usize) -> Result<(), SkyframeError> {
        if len != self.matrices.len() {
            return Err(SkyframeError::LengthMismatch {
                name: component.to_string(),
                expected: self.matrices.len(),
                found: len,
            });
        }
        Ok(())
    }

    /// Size of a pixel on the sky, `sqrt(|J11 J22 - J12 J21|)`, in `unit`.
    pub fn pixel_scale(&self, unit: AngleUnit) -> Vec<f64> {
        let factor = unit.per_radian();
        self.matrices
            .iter()
            .map(|j| j.determinant().abs().sqrt() * factor)
            .collect()
    }

    /// Propagate a full position covariance `[[xx, xy], [xy, yy]]`.
    ///
    /// Return
    /// ----------
    /// * `(c11, c12, c22)` of `J C Jᵀ` in `unit²`.
    pub fn transform_covariance_full(
        &self,
        xx: &[f64],
        xy: &[f64],
        yy: &[f64],
        unit: AngleUnit,
    ) -> Result<(Vec<f64>, Vec<f64>, Vec<f64>), SkyframeError> {
        self.check_len("xx", xx.len())?;
        self.check_len("xy", xy.len())?;
        self.check_len("yy", yy.len())?;
        let factor = unit.per_radian().powi(2);

        let mut c11 = Vec::with_capacity(xx.len());
        let mut c12 = Vec::with_capacity(xx.len());
        let mut c22 = Vec::with_capacity(xx.len());
        for (j, (&xx, &xy, &yy)) in self.matrices.iter().zip(itertools::izip!(xx, xy, yy)) {
            let c = j * Matrix2::new(xx, xy, xy, yy) * j.transpose();
            c11.push(c[(0, 0)] * factor);
            c12.push(c[(0, 1)] * factor);
            c22.push(c[(1, 1)] * factor);
        }
        Ok((c11, c12, c22))
    }

    /// Propagate a covariance whose cross term is exactly zero.
    ///
    /// Only the diagonal of `J diag(xx, yy) Jᵀ` is returned; the caller drops the
    /// sky-frame cross term altogether.
    pub fn transform_covariance_diag(
        &self,
        xx: &[f64],
        yy: &[f64],
        unit: AngleUnit,
    ) -> Result<(Vec<f64>, Vec<f64>), SkyframeError> {
        self.check_len("xx", xx.len())?;
        self.check_len("yy", yy.len())?;
        let factor = unit.per_radian().powi(2);

        Ok(self
            .matrices
            .iter()
            .zip(xx.iter().zip(yy))
            .map(|(j, (&xx, &yy))| {
                let c11 = j[(0, 0)] * j[(0, 0)] * xx + j[(0, 1)] * j[(0, 1)] * yy;
                let c22 = j[(1, 0)] * j[(1, 0)] * xx + j[(1, 1)] * j[(1, 1)] * yy;
                (c11 * factor, c22 * factor)
            })
            .unzip())
    }

    /// Propagate independent position sigmas; the result is in `unit`.
    pub fn transform_sigma_diag(
        &self,
        xsigma: &[f64],
        ysigma: &[f64],
        unit: AngleUnit,
    ) -> Result<(Vec<f64>, Vec<f64>), SkyframeError> {
        let xx: Vec<f64> = xsigma.iter().map(|s| s * s).collect();
        let yy: Vec<f64> = ysigma.iter().map(|s| s * s).collect();
        let (c11, c22) = self.transform_covariance_diag(&xx, &yy, unit)?;
        Ok((
            c11.into_iter().map(f64::sqrt).collect(),
            c22.into_iter().map(f64::sqrt).collect(),
        ))
    }

    /// Propagate a second-moment (shape) tensor.
    ///
    /// `I' = ∫ I(p) J p pᵀ Jᵀ det(J) d²p / ∫ I(p) det(J) d²p = J I Jᵀ`
    ///
    /// Return
    /// ----------
    /// * `(m11, m22, m12)` in `unit²`.
    pub fn transform_moments(
        &self,
        xx: &[f64],
        yy: &[f64],
        xy: &[f64],
        unit: AngleUnit,
    ) -> Result<(Vec<f64>, Vec<f64>, Vec<f64>), SkyframeError> {
        let (m11, m12, m22) = self.transform_covariance_full(xx, xy, yy, unit)?;
        Ok((m11, m22, m12))
    }

    /// Propagate the full covariance of a second-moment tensor, in `unit⁴`.
    pub fn transform_moment_covariance_full(
        &self,
        cov: &MomentCovariance,
        unit: AngleUnit,
    ) -> Result<MomentCovariance, SkyframeError> {
        let n = cov.xx_xx.len();
        for (component, values) in [
            ("xx_xx", &cov.xx_xx),
            ("xx_yy", &cov.xx_yy),
            ("yy_yy", &cov.yy_yy),
            ("xx_xy", &cov.xx_xy),
            ("yy_xy", &cov.yy_xy),
            ("xy_xy", &cov.xy_xy),
        ] {
            self.check_len(component, values.len())?;
        }
        let factor = unit.per_radian().powi(4);

        let mut out = MomentCovariance {
            xx_xx: Vec::with_capacity(n),
            xx_yy: Vec::with_capacity(n),
            yy_yy: Vec::with_capacity(n),
            xx_xy: Vec::with_capacity(n),
            yy_xy: Vec::with_capacity(n),
            xy_xy: Vec::with_capacity(n),
        };
        for (i, j) in self.matrices.iter().enumerate() {
            // rows/columns ordered as (xx, yy, xy)
            let c = expand_rank4(&[
                [cov.xx_xx[i], cov.xx_yy[i], cov.xx_xy[i]],
                [cov.xx_yy[i], cov.yy_yy[i], cov.yy_xy[i]],
                [cov.xx_xy[i], cov.yy_xy[i], cov.xy_xy[i]],
            ]);
            out.xx_xx.push(contract_rank4(j, &c, 0, 0, 0, 0) * factor);
            out.xx_yy.push(contract_rank4(j, &c, 0, 0, 1, 1) * factor);
            out.yy_yy.push(contract_rank4(j, &c, 1, 1, 1, 1) * factor);
            out.xx_xy.push(contract_rank4(j, &c, 0, 0, 0, 1) * factor);
            out.yy_xy.push(contract_rank4(j, &c, 0, 1, 1, 1) * factor);
            out.xy_xy.push(contract_rank4(j, &c, 0, 1, 0, 1) * factor);
        }
        Ok(out)
    }

    /// Propagate moment variances assuming every cross-component covariance is zero.
    ///
    /// Return
    /// ----------
    /// * `(c11_11, c22_22, c12_12)` in `unit⁴`.
    pub fn transform_moment_covariance_diag(
        &self,
        xx_xx: &[f64],
        yy_yy: &[f64],
        xy_xy: &[f64],
        unit: AngleUnit,
    ) -> Result<(Vec<f64>, Vec<f64>, Vec<f64>), SkyframeError> {
        self.check_len("xx_xx", xx_xx.len())?;
        self.check_len("yy_yy", yy_yy.len())?;
        self.check_len("xy_xy", xy_xy.len())?;
        let factor = unit.per_radian().powi(4);

        let mut c11_11 = Vec::with_capacity(xx_xx.len());
        let mut c22_22 = Vec::with_capacity(xx_xx.len());
        let mut c12_12 = Vec::with_capacity(xx_xx.len());
        for (j, (&a, &b, &c)) in self
            .matrices
            .iter()
            .zip(itertools::izip!(xx_xx, yy_yy, xy_xy))
        {
            let c = expand_rank4(&[[a, 0.0, 0.0], [0.0, b, 0.0], [0.0, 0.0, c]]);
            c11_11.push(contract_rank4(j, &c, 0, 0, 0, 0) * factor);
            c22_22.push(contract_rank4(j, &c, 1, 1, 1, 1) * factor);
            c12_12.push(contract_rank4(j, &c, 0, 1, 0, 1) * factor);
        }
        Ok((c11_11, c22_22, c12_12))
    }

    /// Propagate independent moment sigmas; the result is in `unit²`.
    pub fn transform_moment_sigma_diag(
        &self,
        xxsigma: &[f64],
        yysigma: &[f64],
        xysigma: &[f64],
        unit: AngleUnit,
    ) -> Result<(Vec<f64>, Vec<f64>, Vec<f64>), SkyframeError> {
        let square = |s: &[f64]| s.iter().map(|s| s * s).collect::<Vec<_>>();
        let sqrt = |v: Vec<f64>| v.into_iter().map(f64::sqrt).collect::<Vec<_>>();

        let (c11_11, c22_22, c12_12) = self.transform_moment_covariance_diag(
            &square(xxsigma),
            &square(yysigma),
            &square(xysigma),
            unit,
        )?;
        Ok((sqrt(c11_11), sqrt(c22_22), sqrt(c12_12)))
    }

    /// Propagate a reduced ellipticity `(e1, e2)`.
    ///
    /// The pair is turned into the moment tensor `(1 + e1, 1 - e1, e2)`, transformed
    /// with [`WcsJacobian::transform_moments`] and reduced back, so the absolute scale
    /// of the Jacobian does not matter.
    pub fn transform_ellipticity(
        &self,
        e1: &[f64],
        e2: &[f64],
    ) -> Result<(Vec<f64>, Vec<f64>), SkyframeError> {
        let xx: Vec<f64> = e1.iter().map(|e| 1.0 + e).collect();
        let yy: Vec<f64> = e1.iter().map(|e| 1.0 - e).collect();
        let (m11, m22, m12) = self.transform_moments(&xx, &yy, e2, AngleUnit::Radian)?;

        Ok(itertools::izip!(m11, m22, m12)
            .map(|(m11, m22, m12)| ellipticity_from_moments(m11, m22, m12))
            .unzip())
    }
}
