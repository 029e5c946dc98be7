use crate::data::Batch;
use crate::error::Result;
use crate::model::PdeNet;
use burn::prelude::Backend;
use serde::Serialize;

/// 厳密解に対する相対誤差。
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ErrorMetrics {
    /// `‖u - û‖₂ / ‖u‖₂`
    pub l2: f64,
    /// `‖u - û‖₁ / ‖u‖₁`
    pub l1: f64,
}

pub fn relative_l2(pred: &[f64], exact: &[f64]) -> f64 {
    let diff: f64 = pred.iter().zip(exact).map(|(p, e)| (e - p).powi(2)).sum();
    let norm: f64 = exact.iter().map(|e| e * e).sum();
    diff.sqrt() / norm.sqrt()
}

pub fn relative_l1(pred: &[f64], exact: &[f64]) -> f64 {
    let diff: f64 = pred.iter().zip(exact).map(|(p, e)| (e - p).abs()).sum();
    let norm: f64 = exact.iter().map(|e| e.abs()).sum();
    diff / norm
}

/// テストデータ上でモデルを評価します。
pub fn evaluate<B: Backend, M: PdeNet<B>>(
    model: &M,
    test: &Batch<B>,
    exact: &[f64],
) -> Result<ErrorMetrics> {
    let pred = predict_host(model, test)?;
    Ok(ErrorMetrics {
        l2: relative_l2(&pred, exact),
        l1: relative_l1(&pred, exact),
    })
}

/// 予測値をホスト側の`f64`配列として取り出します。
pub fn predict_host<B: Backend, M: PdeNet<B>>(model: &M, batch: &Batch<B>) -> Result<Vec<f64>> {
    let values = model
        .predict(&batch.coords)
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()?;
    Ok(values.into_iter().map(f64::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_prediction_has_zero_error() {
        let exact = [1.0, -2.0, 3.0];
        assert_eq!(relative_l2(&exact, &exact), 0.0);
        assert_eq!(relative_l1(&exact, &exact), 0.0);
    }

    #[test]
    fn zero_prediction_has_unit_error() {
        let exact = [3.0, -4.0];
        let zero = [0.0, 0.0];
        assert!((relative_l2(&zero, &exact) - 1.0).abs() < 1e-15);
        assert!((relative_l1(&zero, &exact) - 1.0).abs() < 1e-15);
    }

    #[test]
    fn hand_computed_errors() {
        let exact = [3.0, 4.0];
        let pred = [3.0, 3.0];
        // ‖(0, 1)‖₂ / 5, ‖(0, 1)‖₁ / 7
        assert!((relative_l2(&pred, &exact) - 0.2).abs() < 1e-15);
        assert!((relative_l1(&pred, &exact) - 1.0 / 7.0).abs() < 1e-15);
    }
}
