//! ARIMA(1,1,1) without a constant term.
//!
//! The series is differenced once and an ARMA(1,1) model
//!   w_t = phi * w_{t-1} + e_t + theta * e_{t-1}
//! is fitted to the differences by conditional sum of squares (e_0 = 0).
//! Both coefficients are kept inside (-1, 1) by optimizing tanh-transformed
//! parameters with Nelder–Mead.

use crate::error::ForecastError;

/// Shortest series (before differencing) that the model will fit.
pub const MIN_OBSERVATIONS: usize = 4;

const COEF_BOUND: f64 = 0.99;
const MAX_ITER: usize = 1000;
const F_TOL: f64 = 1e-10;
const INITIAL_STEP: f64 = 0.5;

/// A fitted ARIMA(1,1,1) model.
#[derive(Debug, Clone, PartialEq)]
pub struct Arima111 {
    pub phi: f64,
    pub theta: f64,
    /// Residual variance of the fitted differences.
    pub sigma2: f64,
    pub iterations: usize,
    last_level: f64,
    last_diff: f64,
    last_resid: f64,
}

impl Arima111 {
    /// Fit the model to `series`.
    pub fn fit(series: &[f64]) -> Result<Self, ForecastError> {
        if series.len() < MIN_OBSERVATIONS {
            return Err(ForecastError::TooShort {
                len: series.len(),
                min: MIN_OBSERVATIONS,
            });
        }
        if series.iter().any(|x| !x.is_finite()) {
            return Err(ForecastError::NonFinite);
        }

        let diffs: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();
        let objective = |p: [f64; 2]| {
            let (phi, theta) = coefficients(p);
            css(&diffs, phi, theta).0
        };

        let (best, _, iterations) = nelder_mead(objective, [0.0, 0.0])?;
        let (phi, theta) = coefficients(best);
        let (sum_sq, last_resid) = css(&diffs, phi, theta);
        let sigma2 = sum_sq / (diffs.len() - 1) as f64;

        let model = Self {
            phi,
            theta,
            sigma2,
            iterations,
            last_level: series[series.len() - 1],
            last_diff: diffs[diffs.len() - 1],
            last_resid,
        };
        if !(model.phi.is_finite() && model.theta.is_finite() && model.sigma2.is_finite()) {
            return Err(ForecastError::NonFinite);
        }
        tracing::debug!(phi, theta, sigma2, iterations, "fitted ARIMA(1,1,1)");
        Ok(model)
    }

    /// Point forecasts for the next `steps` periods on the original scale.
    pub fn forecast(&self, steps: usize) -> Result<Vec<f64>, ForecastError> {
        let mut out = Vec::with_capacity(steps);
        let mut level = self.last_level;
        let mut diff = self.last_diff;
        for step in 0..steps {
            diff = if step == 0 {
                self.phi * diff + self.theta * self.last_resid
            } else {
                self.phi * diff
            };
            level += diff;
            if !level.is_finite() {
                return Err(ForecastError::NonFinite);
            }
            out.push(level);
        }
        Ok(out)
    }
}

fn coefficients(p: [f64; 2]) -> (f64, f64) {
    (COEF_BOUND * p[0].tanh(), COEF_BOUND * p[1].tanh())
}

/// Conditional sum of squared residuals and the final residual.
fn css(diffs: &[f64], phi: f64, theta: f64) -> (f64, f64) {
    let mut prev_resid = 0.0;
    let mut sum_sq = 0.0;
    for t in 1..diffs.len() {
        let resid = diffs[t] - phi * diffs[t - 1] - theta * prev_resid;
        sum_sq += resid * resid;
        prev_resid = resid;
    }
    (sum_sq, prev_resid)
}

/// Minimize a function of two variables. Returns the best point, its value and
/// the iterations used.
fn nelder_mead<F>(f: F, start: [f64; 2]) -> Result<([f64; 2], f64, usize), ForecastError>
where
    F: Fn([f64; 2]) -> f64,
{
    let mut simplex = [
        start,
        [start[0] + INITIAL_STEP, start[1]],
        [start[0], start[1] + INITIAL_STEP],
    ];
    let mut values = simplex.map(&f);

    for iter in 0..MAX_ITER {
        let mut order = [0usize, 1, 2];
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
        simplex = order.map(|i| simplex[i]);
        values = order.map(|i| values[i]);

        if !values[0].is_finite() {
            return Err(ForecastError::NonFinite);
        }
        if (values[2] - values[0]).abs() <= F_TOL * (1.0 + values[0].abs()) {
            return Ok((simplex[0], values[0], iter));
        }

        let centroid = [
            (simplex[0][0] + simplex[1][0]) / 2.0,
            (simplex[0][1] + simplex[1][1]) / 2.0,
        ];
        let toward = |coef: f64| {
            [
                centroid[0] + coef * (simplex[2][0] - centroid[0]),
                centroid[1] + coef * (simplex[2][1] - centroid[1]),
            ]
        };

        let reflected = toward(-1.0);
        let f_reflected = f(reflected);

        if f_reflected < values[0] {
            let expanded = toward(-2.0);
            let f_expanded = f(expanded);
            if f_expanded < f_reflected {
                simplex[2] = expanded;
                values[2] = f_expanded;
            } else {
                simplex[2] = reflected;
                values[2] = f_reflected;
            }
        } else if f_reflected < values[1] {
            simplex[2] = reflected;
            values[2] = f_reflected;
        } else {
            let contracted = if f_reflected < values[2] {
                toward(-0.5)
            } else {
                toward(0.5)
            };
            let f_contracted = f(contracted);
            if f_contracted < f_reflected.min(values[2]) {
                simplex[2] = contracted;
                values[2] = f_contracted;
            } else {
                for i in 1..3 {
                    simplex[i] = [
                        simplex[0][0] + 0.5 * (simplex[i][0] - simplex[0][0]),
                        simplex[0][1] + 0.5 * (simplex[i][1] - simplex[0][1]),
                    ];
                    values[i] = f(simplex[i]);
                }
            }
        }
    }

    Err(ForecastError::NonConvergence(MAX_ITER))
}
