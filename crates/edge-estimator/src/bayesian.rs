use decision_core::clamp_unit;
use serde::{Deserialize, Serialize};

const MAX_ITERATIONS: usize = 200;
const EPSILON: f64 = 1e-10;
const TINY: f64 = 1e-300;

const LANCZOS_COEFFICIENTS: [f64; 6] = [
    76.18009172947146,
    -86.50532032941677,
    24.01409824083091,
    -1.231739572450155,
    0.001208650973866179,
    -0.000005395239384953,
];

/// Posterior probability that a setup's true win rate beats a threshold.
///
/// With a uniform Beta(1, 1) prior and `w` wins / `l` losses observed, the
/// posterior is Beta(w + 1, l + 1), so
///
///   P(p > t) = 1 - I_t(w + 1, l + 1)
///
/// where I is the regularized incomplete beta function, evaluated with
/// Lentz's continued fraction and a Lanczos log-gamma.
#[derive(Debug, Clone, Copy, Default)]
pub struct BayesianEdgeEstimator;

impl BayesianEdgeEstimator {
    pub fn new() -> Self {
        Self
    }

    /// `P(true win rate > threshold)`; always within [0, 1].
    ///
    /// Negative counts give 0.0, threshold <= 0 gives 1.0, threshold >= 1 gives 0.0.
    pub fn posterior_probability(&self, win_count: i64, loss_count: i64, threshold: f64) -> f64 {
        if win_count < 0 || loss_count < 0 || threshold.is_nan() {
            return 0.0;
        }
        if threshold <= 0.0 {
            return 1.0;
        }
        if threshold >= 1.0 {
            return 0.0;
        }

        let a = win_count as f64 + 1.0;
        let b = loss_count as f64 + 1.0;
        clamp_unit(1.0 - regularized_incomplete_beta(threshold, a, b))
    }
}

/// Regularized incomplete beta function I_x(a, b) for a, b > 0.
pub fn regularized_incomplete_beta(x: f64, a: f64, b: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    // The continued fraction converges quickly only below this point
    if x > (a + 1.0) / (a + b + 2.0) {
        return 1.0 - regularized_incomplete_beta(1.0 - x, b, a);
    }

    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln()
        - a.ln();
    let value = ln_front.exp() * beta_continued_fraction(x, a, b);
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Modified Lentz evaluation of the incomplete beta continued fraction.
fn beta_continued_fraction(x: f64, a: f64, b: f64) -> f64 {
    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;

    let mut c = 1.0;
    let mut d = floor_tiny(1.0 - qab * x / qap).recip();
    let mut h = d;

    for m in 1..=MAX_ITERATIONS {
        let m = m as f64;
        let m2 = 2.0 * m;

        // even step
        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = floor_tiny(1.0 + aa * d).recip();
        c = floor_tiny(1.0 + aa / c);
        h *= d * c;

        // odd step
        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = floor_tiny(1.0 + aa * d).recip();
        c = floor_tiny(1.0 + aa / c);
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < EPSILON {
            break;
        }
    }

    h
}

fn floor_tiny(value: f64) -> f64 {
    if value.abs() < TINY {
        TINY
    } else {
        value
    }
}

/// ln Γ(x) for x > 0, six-term Lanczos approximation.
pub fn ln_gamma(x: f64) -> f64 {
    let mut y = x;
    let tmp = x + 5.5;
    let tmp = tmp - (x + 0.5) * tmp.ln();

    let mut series = 1.000000000190015;
    for coefficient in LANCZOS_COEFFICIENTS {
        y += 1.0;
        series += coefficient / y;
    }

    -tmp + (2.5066282746310005 * series / x).ln()
}

/// Outcome of the edge gate policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeVerdict {
    Allow,
    Watch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeAssessment {
    pub verdict: EdgeVerdict,
    /// None when the sample is too small to evaluate
    pub posterior: Option<f64>,
    pub sample_count: u64,
    pub reason: String,
}

/// Gate built on the estimator: too few samples is not evidence against a
/// setup, otherwise the posterior must clear `posterior_confidence`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeGatePolicy {
    pub min_samples: u64,
    pub win_rate_threshold: f64,
    pub posterior_confidence: f64,
}

impl Default for EdgeGatePolicy {
    fn default() -> Self {
        Self {
            min_samples: 20,
            win_rate_threshold: 0.52,
            posterior_confidence: 0.70,
        }
    }
}

impl EdgeGatePolicy {
    pub fn evaluate(&self, win_count: u64, loss_count: u64) -> EdgeAssessment {
        let sample_count = win_count.saturating_add(loss_count);
        if sample_count < self.min_samples {
            return EdgeAssessment {
                verdict: EdgeVerdict::Allow,
                posterior: None,
                sample_count,
                reason: format!(
                    "Insufficient samples ({} < {}), edge unproven",
                    sample_count, self.min_samples
                ),
            };
        }

        let posterior = BayesianEdgeEstimator::new().posterior_probability(
            to_count(win_count),
            to_count(loss_count),
            self.win_rate_threshold,
        );
        let verdict = if posterior >= self.posterior_confidence {
            EdgeVerdict::Allow
        } else {
            EdgeVerdict::Watch
        };

        EdgeAssessment {
            verdict,
            posterior: Some(posterior),
            sample_count,
            reason: format!(
                "P(winRate>{:.2})={:.3} over {} samples (need {:.2})",
                self.win_rate_threshold, posterior, sample_count, self.posterior_confidence
            ),
        }
    }
}

fn to_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
