//! # Nonlinear least-squares curve fitting
//!
//! A small Levenberg–Marquardt solver shared by the two models of the crate:
//!
//! * [`drift_diffusion`] – `MSD(t) = D·t + V²·t²`, fitted to MSD curves;
//! * [`gaussian`] – `a·exp(-(x-μ)²/(2σ²))`, fitted to velocity histograms.
//!
//! ## Algorithm
//! -----------------
//! Weighted residuals `r_i = (f(x_i; p) - y_i) / σ_i` are minimised by damped Gauss–Newton
//! steps solving `(JᵀJ + λ·diag(JᵀJ)) δ = -Jᵀr` with a Cholesky factorization (nalgebra).
//! λ shrinks tenfold after an accepted step and grows tenfold after a rejected one.
//! Convergence follows the MINPACK criteria:
//!
//! * relative cost reduction of an accepted step `≤ ftol`,
//! * step length `‖δ‖ ≤ xtol·(‖p‖ + xtol)`,
//! * gradient `‖Jᵀr‖∞ ≤ gtol`,
//! * or an exact fit (zero cost).
//!
//! Exhausting the iteration budget, non-finite residuals, or a model whose Jacobian vanishes
//! away from an exact fit are reported as [`MotilityError::FitNonConvergence`].
//!
//! ## Uncertainties
//! -----------------
//! The covariance is `(JᵀJ)⁻¹ · χ²/(n - p)` at the solution, i.e. sigmas are treated as
//! *relative* weights. With no degree of freedom left, or a singular `JᵀJ`, every entry of
//! the covariance is `+∞`. Standard errors are the square roots of its diagonal.
use nalgebra::{DMatrix, DVector};

use crate::motility_errors::MotilityError;

pub mod drift_diffusion;
pub mod gaussian;

const INITIAL_DAMPING: f64 = 1e-3;
const MIN_DAMPING: f64 = 1e-12;
const MAX_DAMPING: f64 = 1e16;

/// A parametric model `y = f(x; p)` with analytic partial derivatives.
pub trait CurveModel {
    fn n_params(&self) -> usize;

    fn value(&self, x: f64, params: &[f64]) -> f64;

    /// Write `∂f/∂p_j (x; p)` into `out[j]`.
    fn partials(&self, x: f64, params: &[f64], out: &mut [f64]);
}

/// Tolerances of [`levenberg_marquardt`].
#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
    /// Iteration budget; `None` means `200 · (n_params + 1)`.
    pub max_iterations: Option<usize>,
}

impl Default for FitOptions {
    fn default() -> Self {
        FitOptions {
            ftol: 1.49012e-8,
            xtol: 1.49012e-8,
            gtol: 0.0,
            max_iterations: None,
        }
    }
}

/// Outcome of a converged fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub parameters: Vec<f64>,
    /// `sqrt(diag(covariance))`.
    pub std_errors: Vec<f64>,
    pub covariance: DMatrix<f64>,
    /// Weighted residual sum of squares at the solution.
    pub chi_square: f64,
    pub n_points: usize,
    pub iterations: usize,
}

impl FitResult {
    /// Degrees of freedom, `n_points - n_params`.
    pub fn dof(&self) -> usize {
        self.n_points - self.parameters.len()
    }

    /// `χ² / dof`, undefined without degree of freedom.
    pub fn reduced_chi_square(&self) -> Option<f64> {
        match self.dof() {
            0 => None,
            dof => Some(self.chi_square / dof as f64),
        }
    }

    /// Correlation coefficient between parameters `i` and `j`.
    pub fn correlation(&self, i: usize, j: usize) -> Option<f64> {
        let n = self.parameters.len();
        if i >= n || j >= n {
            return None;
        }
        let (si, sj) = (self.std_errors[i], self.std_errors[j]);
        if !(si.is_finite() && sj.is_finite()) || si <= 0.0 || sj <= 0.0 {
            return None;
        }
        Some(self.covariance[(i, j)] / (si * sj))
    }
}

/// Number of leading points kept by a `clip` fraction of an `n`-point curve.
#[inline]
pub fn clip_count(n: usize, clip: f64) -> usize {
    ((n as f64) * clip).floor() as usize
}

/// Fit `model` to `(xs, ys)` by Levenberg–Marquardt.
///
/// Arguments
/// -----------------
/// * `model`: The parametric model.
/// * `xs`, `ys`: Data points (same length).
/// * `sigma`: Optional per-point uncertainties; residuals are divided by them.
/// * `p0`: Initial guess, one entry per model parameter.
/// * `options`: Tolerances and iteration budget.
///
/// Return
/// ----------
/// * `Ok(FitResult)` on convergence.
/// * `Err(MotilityError::InsufficientData)` with fewer points than parameters.
/// * `Err(MotilityError::InvalidAnalysisParameter)` on inconsistent lengths or non-positive sigmas.
/// * `Err(MotilityError::FitNonConvergence)` when the solver cannot meet its tolerances.
pub fn levenberg_marquardt<M: CurveModel>(
    model: &M,
    xs: &[f64],
    ys: &[f64],
    sigma: Option<&[f64]>,
    p0: &[f64],
    options: &FitOptions,
) -> Result<FitResult, MotilityError> {
    let n = xs.len();
    let k = model.n_params();

    if ys.len() != n || p0.len() != k || sigma.is_some_and(|s| s.len() != n) {
        return Err(MotilityError::InvalidAnalysisParameter(
            "fit inputs have inconsistent lengths".into(),
        ));
    }
    if n < k {
        return Err(MotilityError::InsufficientData(format!(
            "{n} points cannot determine {k} parameters"
        )));
    }
    let weights: Vec<f64> = match sigma {
        Some(s) => {
            if !s.iter().all(|&v| v.is_finite() && v > 0.0) {
                return Err(MotilityError::InvalidAnalysisParameter(
                    "fit sigmas must be finite and strictly positive".into(),
                ));
            }
            s.iter().map(|v| 1.0 / v).collect()
        }
        None => vec![1.0; n],
    };

    let residuals = |p: &DVector<f64>| -> DVector<f64> {
        DVector::from_iterator(
            n,
            (0..n).map(|i| (model.value(xs[i], p.as_slice()) - ys[i]) * weights[i]),
        )
    };
    let jacobian = |p: &DVector<f64>| -> DMatrix<f64> {
        let mut jac = DMatrix::zeros(n, k);
        let mut row = vec![0.0; k];
        for i in 0..n {
            model.partials(xs[i], p.as_slice(), &mut row);
            for (c, d) in row.iter().enumerate() {
                jac[(i, c)] = d * weights[i];
            }
        }
        jac
    };

    let max_iterations = options.max_iterations.unwrap_or(200 * (k + 1));

    let mut p = DVector::from_column_slice(p0);
    let mut r = residuals(&p);
    let mut cost = r.norm_squared();
    if !cost.is_finite() {
        return Err(MotilityError::FitNonConvergence {
            iterations: 0,
            reason: "non-finite residuals at the initial guess".into(),
        });
    }

    let mut jac = jacobian(&p);
    let mut lambda = INITIAL_DAMPING;
    let mut iterations = 0;
    let mut converged = cost == 0.0;

    while !converged {
        if iterations >= max_iterations {
            return Err(MotilityError::FitNonConvergence {
                iterations,
                reason: "iteration budget exhausted".into(),
            });
        }
        iterations += 1;

        let jt = jac.transpose();
        let jtj = &jt * &jac;
        let grad = &jt * &r;

        if grad.amax() <= options.gtol {
            if jac.amax() == 0.0 {
                return Err(MotilityError::FitNonConvergence {
                    iterations,
                    reason: "model is insensitive to its parameters around the current guess"
                        .into(),
                });
            }
            break;
        }

        let mut damped = jtj.clone();
        for c in 0..k {
            damped[(c, c)] += lambda * jtj[(c, c)].max(f64::EPSILON);
        }
        let Some(chol) = damped.cholesky() else {
            lambda *= 10.0;
            if lambda > MAX_DAMPING {
                return Err(MotilityError::FitNonConvergence {
                    iterations,
                    reason: "damped normal equations stay singular".into(),
                });
            }
            continue;
        };

        let delta = chol.solve(&(-grad));
        let small_step = delta.norm() <= options.xtol * (p.norm() + options.xtol);
        let candidate = &p + &delta;
        let r_new = residuals(&candidate);
        let cost_new = r_new.norm_squared();

        if cost_new.is_finite() && cost_new <= cost {
            let previous = cost;
            p = candidate;
            r = r_new;
            cost = cost_new;
            jac = jacobian(&p);
            lambda = (lambda / 10.0).max(MIN_DAMPING);

            converged = cost == 0.0 || previous - cost <= options.ftol * previous || small_step;
        } else if small_step {
            // no representable improvement left around p
            converged = true;
        } else {
            lambda *= 10.0;
            if lambda > MAX_DAMPING {
                return Err(MotilityError::FitNonConvergence {
                    iterations,
                    reason: "no descent direction found".into(),
                });
            }
        }
    }

    if !p.iter().all(|v| v.is_finite()) {
        return Err(MotilityError::FitNonConvergence {
            iterations,
            reason: "non-finite parameters".into(),
        });
    }

    let covariance = covariance(&jac, cost, n, k);
    let std_errors = covariance
        .diagonal()
        .iter()
        .map(|v| v.max(0.0).sqrt())
        .collect();

    Ok(FitResult {
        parameters: p.iter().copied().collect(),
        std_errors,
        covariance,
        chi_square: cost,
        n_points: n,
        iterations,
    })
}

fn covariance(jac: &DMatrix<f64>, cost: f64, n: usize, k: usize) -> DMatrix<f64> {
    let undetermined = DMatrix::from_element(k, k, f64::INFINITY);
    if n == k {
        return undetermined;
    }
    let jtj = jac.transpose() * jac;
    match jtj.try_inverse() {
        Some(inv) => inv * (cost / (n - k) as f64),
        None => undetermined,
    }
}

#[cfg(test)]
mod fitting_test {
    use super::*;
    use approx::assert_relative_eq;

    /// y = a + b·x
    struct Line;

    impl CurveModel for Line {
        fn n_params(&self) -> usize {
            2
        }
        fn value(&self, x: f64, p: &[f64]) -> f64 {
            p[0] + p[1] * x
        }
        fn partials(&self, x: f64, _p: &[f64], out: &mut [f64]) {
            out[0] = 1.0;
            out[1] = x;
        }
    }

    /// y = exp(k·x)
    struct Exponential;

    impl CurveModel for Exponential {
        fn n_params(&self) -> usize {
            1
        }
        fn value(&self, x: f64, p: &[f64]) -> f64 {
            (p[0] * x).exp()
        }
        fn partials(&self, x: f64, p: &[f64], out: &mut [f64]) {
            out[0] = x * (p[0] * x).exp();
        }
    }

    #[test]
    fn test_line_exact() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [1.0, 3.0, 5.0, 7.0];
        let fit = levenberg_marquardt(&Line, &xs, &ys, None, &[0.0, 0.0], &FitOptions::default())
            .unwrap();

        assert_relative_eq!(fit.parameters[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(fit.parameters[1], 2.0, epsilon = 1e-6);
        assert_eq!(fit.dof(), 2);
    }

    #[test]
    fn test_line_least_squares_and_errors() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [0.1, 0.9, 2.1, 2.9];
        let fit = levenberg_marquardt(&Line, &xs, &ys, None, &[1.0, 1.0], &FitOptions::default())
            .unwrap();

        // closed form: slope = Sxy / Sxx = 4.8 / 5, intercept = 1.5 - 1.5 * slope
        assert_relative_eq!(fit.parameters[1], 0.96, epsilon = 1e-6);
        assert_relative_eq!(fit.parameters[0], 0.06, epsilon = 1e-6);
        assert!(fit.std_errors.iter().all(|s| s.is_finite() && *s > 0.0));
        assert!(fit.correlation(0, 1).unwrap() < 0.0);
    }

    #[test]
    fn test_two_points_have_undetermined_errors() {
        let fit = levenberg_marquardt(
            &Line,
            &[1.0, 2.0],
            &[2.0, 3.0],
            None,
            &[0.0, 0.0],
            &FitOptions::default(),
        )
        .unwrap();
        assert_relative_eq!(fit.parameters[1], 1.0, epsilon = 1e-6);
        assert!(fit.std_errors.iter().all(|s| s.is_infinite()));
        assert!(fit.reduced_chi_square().is_none());
    }

    #[test]
    fn test_nonlinear_model() {
        let xs: Vec<f64> = (0..10).map(|i| i as f64 * 0.1).collect();
        let ys: Vec<f64> = xs.iter().map(|x| (0.7 * x).exp()).collect();
        let fit =
            levenberg_marquardt(&Exponential, &xs, &ys, None, &[0.0], &FitOptions::default())
                .unwrap();
        assert_relative_eq!(fit.parameters[0], 0.7, epsilon = 1e-6);
    }

    #[test]
    fn test_sigma_weights_points() {
        // The outlier at x = 3 is heavily down-weighted
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [0.0, 1.0, 2.0, 10.0];
        let sigma = [1.0, 1.0, 1.0, 1e6];
        let fit = levenberg_marquardt(
            &Line,
            &xs,
            &ys,
            Some(&sigma),
            &[1.0, 1.0],
            &FitOptions::default(),
        )
        .unwrap();
        assert_relative_eq!(fit.parameters[1], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_input_errors() {
        let opts = FitOptions::default();
        assert!(matches!(
            levenberg_marquardt(&Line, &[1.0], &[1.0], None, &[0.0, 0.0], &opts),
            Err(MotilityError::InsufficientData(_))
        ));
        assert!(matches!(
            levenberg_marquardt(&Line, &[1.0, 2.0], &[1.0], None, &[0.0, 0.0], &opts),
            Err(MotilityError::InvalidAnalysisParameter(_))
        ));
        assert!(matches!(
            levenberg_marquardt(
                &Line,
                &[1.0, 2.0],
                &[1.0, 2.0],
                Some(&[1.0, 0.0]),
                &[0.0, 0.0],
                &opts
            ),
            Err(MotilityError::InvalidAnalysisParameter(_))
        ));
    }

    #[test]
    fn test_non_finite_data_does_not_converge() {
        let err = levenberg_marquardt(
            &Line,
            &[0.0, 1.0, 2.0],
            &[0.0, f64::NAN, 2.0],
            None,
            &[0.0, 0.0],
            &FitOptions::default(),
        )
        .unwrap_err();
        assert!(err.is_fit_failure());
    }

    #[test]
    fn test_clip_count() {
        assert_eq!(clip_count(10, 0.5), 5);
        assert_eq!(clip_count(9, 0.5), 4);
        assert_eq!(clip_count(7, 1.0), 7);
        assert_eq!(clip_count(3, 0.1), 0);
    }
}
