//! Model selection across shapes by information criterion.
//!
//! For every surviving fit with `n` observations, SSE and `p` curve
//! parameters we count the residual variance as an extra parameter
//! (`k = p + 1`) and compute:
//!
//! - `LL = −n/2 · (ln 2π + 1 + ln(max(SSE/n, 1e-12)))`
//! - `AIC = −2LL + 2k`
//! - `AICc = AIC + 2k(k+1)/(n − k − 1)` (+∞ when `n − k − 1 ≤ 0`)
//! - `BIC = −2LL + k·ln n`
//!
//! Selection rules:
//! 1. Failed and disqualified shapes take no part in the ranking
//! 2. Rank ascending on the chosen criterion with a stable sort
//! 3. Ties keep canonical shape order (the [`ModelSet`] iteration order), so
//!    the result does not depend on the order shapes were requested in

use serde::Serialize;

use crate::domain::{Criterion, FittedModel, GrowthShape, ModelSet};
use crate::error::GrowthError;

/// Lower bound on the residual variance inside the log-likelihood.
const MIN_VARIANCE: f64 = 1e-12;

/// Information criteria of one surviving fit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelScore {
    pub shape: GrowthShape,
    pub n: usize,
    pub k: usize,
    pub sse: f64,
    pub log_lik: f64,
    pub aic: f64,
    pub aicc: f64,
    pub bic: f64,
    /// Difference to the best value of the ranking criterion.
    pub delta: f64,
    /// Akaike-style weight `exp(−Δ/2) / Σ exp(−Δ/2)`.
    pub weight: f64,
}

impl ModelScore {
    pub fn from_fit(fit: &FittedModel) -> Self {
        let n = fit.n;
        let k = fit.shape().param_count() + 1;
        let nf = n as f64;
        let kf = k as f64;

        let variance = (fit.sse / nf).max(MIN_VARIANCE);
        let log_lik = -0.5 * nf * ((2.0 * std::f64::consts::PI).ln() + 1.0 + variance.ln());
        let aic = -2.0 * log_lik + 2.0 * kf;
        let aicc = if n > k + 1 {
            aic + 2.0 * kf * (kf + 1.0) / (nf - kf - 1.0)
        } else {
            f64::INFINITY
        };
        let bic = -2.0 * log_lik + kf * nf.ln();

        Self {
            shape: fit.shape(),
            n,
            k,
            sse: fit.sse,
            log_lik,
            aic,
            aicc,
            bic,
            delta: 0.0,
            weight: 0.0,
        }
    }

    pub fn value(&self, criterion: Criterion) -> f64 {
        match criterion {
            Criterion::Aicc => self.aicc,
            Criterion::Aic => self.aic,
            Criterion::Bic => self.bic,
        }
    }
}

/// Ranked comparison of the surviving fits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub criterion: Criterion,
    /// Best first.
    pub ranking: Vec<ModelScore>,
}

impl Selection {
    pub fn best(&self) -> GrowthShape {
        self.ranking[0].shape
    }
}

/// Score every successful outcome, in canonical shape order.
pub fn model_table(models: &ModelSet) -> Vec<ModelScore> {
    models
        .values()
        .filter_map(|outcome| outcome.fit())
        .map(ModelScore::from_fit)
        .collect()
}

/// Rank the surviving fits and pick the best one.
///
/// Fails with [`GrowthError::AllModelsFailed`] when no shape survived.
pub fn select_model(models: &ModelSet, criterion: Criterion) -> Result<Selection, GrowthError> {
    let mut ranking = model_table(models);
    if ranking.is_empty() {
        return Err(GrowthError::AllModelsFailed {
            attempted: models.keys().copied().collect(),
        });
    }

    ranking.sort_by(|a, b| a.value(criterion).total_cmp(&b.value(criterion)));

    let best = ranking[0].value(criterion);
    for score in &mut ranking {
        let v = score.value(criterion);
        // Equal values (including two infinities) are a zero difference.
        score.delta = if v == best { 0.0 } else { v - best };
    }
    let total: f64 = ranking.iter().map(|s| (-0.5 * s.delta).exp()).sum();
    for score in &mut ranking {
        score.weight = (-0.5 * score.delta).exp() / total;
    }

    Ok(Selection { criterion, ranking })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        FitFailure, FitOutcome, LagParams, LinearParams, SegmentDiagnostics, SegmentStats,
        ShapeParams, StartStrategy,
    };
    use assert_matches::assert_matches;
    use nalgebra::DMatrix;

    fn outcome(params: ShapeParams, sse: f64, n: usize) -> FitOutcome {
        let k = params.shape().param_count();
        FitOutcome::Success {
            fit: FittedModel {
                params,
                covariance: DMatrix::zeros(k, k),
                fitted: vec![0.0; n],
                sse,
                n,
                iterations: 1,
                evaluations: 1,
                strategy: StartStrategy::Heuristic,
            },
            segments: SegmentDiagnostics {
                pre: None,
                exp: SegmentStats { n, r2: 1.0 },
                post: None,
            },
        }
    }

    fn linear(sse: f64, n: usize) -> FitOutcome {
        outcome(ShapeParams::Linear(LinearParams { a: 0.0, b: 1.0 }), sse, n)
    }

    fn lag(sse: f64, n: usize) -> FitOutcome {
        outcome(
            ShapeParams::Lag(LagParams {
                a: 0.0,
                b: 1.0,
                b1: 1.0,
            }),
            sse,
            n,
        )
    }

    #[test]
    fn criteria_follow_closed_forms() {
        let fit = linear(2.0, 10);
        let score = ModelScore::from_fit(fit.fit().unwrap());
        let ll = -5.0 * ((2.0 * std::f64::consts::PI).ln() + 1.0 + 0.2f64.ln());
        assert_eq!(score.k, 3);
        assert!((score.log_lik - ll).abs() < 1e-12);
        assert!((score.aic - (-2.0 * ll + 6.0)).abs() < 1e-12);
        assert!((score.aicc - (score.aic + 24.0 / 6.0)).abs() < 1e-12);
        assert!((score.bic - (-2.0 * ll + 3.0 * 10f64.ln())).abs() < 1e-12);
    }

    #[test]
    fn aicc_is_infinite_when_underdetermined() {
        let fit = lag(0.5, 5);
        let score = ModelScore::from_fit(fit.fit().unwrap());
        assert_eq!(score.aicc, f64::INFINITY);
        assert!(score.aic.is_finite());
    }

    #[test]
    fn lower_criterion_wins_and_weights_sum_to_one() {
        let mut models = ModelSet::new();
        models.insert(GrowthShape::Linear, linear(5.0, 20));
        models.insert(GrowthShape::Lag, lag(0.1, 20));
        let sel = select_model(&models, Criterion::Aicc).unwrap();
        assert_eq!(sel.best(), GrowthShape::Lag);
        assert_eq!(sel.ranking[0].delta, 0.0);
        assert!(sel.ranking[1].delta > 0.0);
        let total: f64 = sel.ranking.iter().map(|s| s.weight).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn ties_resolve_in_canonical_order() {
        // Identical criteria across shapes with the same k.
        let mut models = ModelSet::new();
        models.insert(
            GrowthShape::Floor,
            outcome(
                ShapeParams::Floor(crate::domain::FloorParams {
                    a: 0.0,
                    b: -1.0,
                    b2: 1.0,
                }),
                1.0,
                12,
            ),
        );
        models.insert(GrowthShape::Lag, lag(1.0, 12));
        let sel = select_model(&models, Criterion::Bic).unwrap();
        assert_eq!(sel.best(), GrowthShape::Lag);
        assert_eq!(sel.ranking[1].shape, GrowthShape::Floor);
        assert!((sel.ranking[0].weight - 0.5).abs() < 1e-12);
    }

    #[test]
    fn failures_are_excluded() {
        let mut models = ModelSet::new();
        models.insert(GrowthShape::Linear, linear(5.0, 20));
        models.insert(
            GrowthShape::Lag,
            FitOutcome::Failure {
                failure: FitFailure::SingularGradient { attempts: 1 },
            },
        );
        let sel = select_model(&models, Criterion::Aicc).unwrap();
        assert_eq!(sel.ranking.len(), 1);
        assert_eq!(sel.best(), GrowthShape::Linear);
    }

    #[test]
    fn nothing_left_is_fatal() {
        let mut models = ModelSet::new();
        models.insert(
            GrowthShape::Floor,
            FitOutcome::Failure {
                failure: FitFailure::SingularGradient { attempts: 1 },
            },
        );
        let err = select_model(&models, Criterion::Aicc).unwrap_err();
        assert_matches!(err, GrowthError::AllModelsFailed { ref attempted } if attempted == &[GrowthShape::Floor]);
        assert_eq!(err.exit_code(), 4);
    }
}
