//! PDE残差・初期条件・境界条件の損失。

use crate::config::ResidualMethod;
use crate::data::{Batch, TrainBatch};
use crate::equation::Problem;
use crate::model::PdeNet;
use burn::nn::loss::{MseLoss, Reduction};
use burn::prelude::Backend;
use burn::tensor::Tensor;
use rand::Rng;
use rand::seq::index;

/// 残差に含める空間次元の選び方。
#[derive(Debug, Clone, Copy)]
pub struct DimensionSampler {
    pub method: ResidualMethod,
    pub batch_size: usize,
}

impl DimensionSampler {
    pub fn new(method: ResidualMethod, batch_size: usize) -> Self {
        Self { method, batch_size }
    }

    /// 使う軸とスケール係数を返します。
    ///
    /// SDGDでは`axes`から`batch_size`個を非復元抽出し、和を`n / batch_size`倍して
    /// ラプラシアンの不偏推定量にします。
    pub fn sample<R: Rng>(&self, axes: &[usize], rng: &mut R) -> (Vec<usize>, f64) {
        match self.method {
            ResidualMethod::Full => (axes.to_vec(), 1.0),
            ResidualMethod::Sdgd => {
                let amount = self.batch_size.min(axes.len());
                let chosen = index::sample(rng, axes.len(), amount)
                    .into_iter()
                    .map(|i| axes[i])
                    .collect();
                (chosen, axes.len() as f64 / amount.max(1) as f64)
            }
        }
    }
}

/// 損失の内訳。`total`は残りの3項の和です。
#[derive(Debug, Clone)]
pub struct LossBreakdown<B: Backend> {
    pub total: Tensor<B, 1>,
    pub residual: Tensor<B, 1>,
    pub initial: Tensor<B, 1>,
    pub boundary: Tensor<B, 1>,
}

/// 物理損失を計算します。
///
/// コロケーション点での残差の二乗平均誤差です。2階微分は抽出した軸ごとに
/// [`PdeNet::second_derivative`]で求めます。
pub fn physics_loss<B: Backend, M: PdeNet<B>, R: Rng>(
    model: &M,
    problem: &Problem,
    collocation: &Batch<B>,
    sampler: &DimensionSampler,
    rng: &mut R,
) -> Tensor<B, 1> {
    let coords = &collocation.coords;
    let u = model.predict(coords);
    let (axes, scale) = sampler.sample(&problem.spatial_axes(), rng);
    let laplacian = axes
        .iter()
        .fold(Tensor::zeros_like(&u), |acc, &axis| {
            acc + model.second_derivative(coords, axis)
        })
        .mul_scalar(scale);
    let u_tt = problem
        .time_axis()
        .map(|axis| model.second_derivative(coords, axis));
    let residual = problem.residual(u, u_tt, laplacian, collocation.values.clone());
    MseLoss::new().forward(residual.clone(), Tensor::zeros_like(&residual), Reduction::Mean)
}

fn data_loss<B: Backend, M: PdeNet<B>>(model: &M, batch: &Batch<B>) -> Tensor<B, 1> {
    let pred = model.predict(&batch.coords);
    MseLoss::new().forward(pred, batch.values.clone(), Reduction::Mean)
}

/// 残差・初期条件・境界条件（各面の平均）の損失を合計します。
pub fn total_loss<B: Backend, M: PdeNet<B>, R: Rng>(
    model: &M,
    problem: &Problem,
    batch: &TrainBatch<B>,
    sampler: &DimensionSampler,
    rng: &mut R,
) -> LossBreakdown<B> {
    let device = batch.collocation.values.device();
    let residual = physics_loss(model, problem, &batch.collocation, sampler, rng);
    let initial = match &batch.initial {
        Some(initial) => data_loss(model, initial),
        None => Tensor::zeros([1], &device),
    };
    let boundary = if batch.boundary.is_empty() {
        Tensor::zeros([1], &device)
    } else {
        let n_faces = batch.boundary.len() as f64;
        batch
            .boundary
            .iter()
            .fold(Tensor::zeros([1], &device), |acc, face| {
                acc + data_loss(model, face)
            })
            .div_scalar(n_faces)
    };
    LossBreakdown {
        total: residual.clone() + initial.clone() + boundary.clone(),
        residual,
        initial,
        boundary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EquationKind, TrainingConfig};
    use crate::equation::KleinGordon;
    use crate::model::{Coords, PdeNet};
    use burn::backend::NdArray;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    type TestBackend = NdArray<f64>;

    /// 厳密解をそのまま返すネットワーク。2階微分も解析的に与えます。
    struct ExactKleinGordon {
        k: f64,
    }

    impl PdeNet<TestBackend> for ExactKleinGordon {
        fn input_dim(&self) -> usize {
            3
        }

        fn predict(&self, coords: &Coords<TestBackend>) -> Tensor<TestBackend, 2> {
            let p = coords.clone().into_points();
            let n = p.dims()[0];
            let t = p.clone().slice([0..n, 0..1]);
            let x = p.clone().slice([0..n, 1..2]);
            let y = p.slice([0..n, 2..3]);
            let kt = t.mul_scalar(self.k);
            (x.clone() + y.clone()) * kt.clone().cos() + x * y * kt.sin()
        }

        fn second_derivative(
            &self,
            coords: &Coords<TestBackend>,
            axis: usize,
        ) -> Tensor<TestBackend, 2> {
            let u = self.predict(coords);
            if axis == 0 {
                u.mul_scalar(-self.k * self.k)
            } else {
                Tensor::zeros_like(&u)
            }
        }
    }

    fn scalar(t: Tensor<TestBackend, 1>) -> f64 {
        t.into_data().to_vec::<f64>().unwrap()[0]
    }

    #[test]
    fn full_method_uses_every_axis() {
        let mut rng = StdRng::seed_from_u64(0);
        let sampler = DimensionSampler::new(ResidualMethod::Full, 1);
        assert_eq!(sampler.sample(&[1, 2, 3], &mut rng), (vec![1, 2, 3], 1.0));
    }

    #[test]
    fn sdgd_samples_distinct_axes_and_rescales() {
        let mut rng = StdRng::seed_from_u64(0);
        let sampler = DimensionSampler::new(ResidualMethod::Sdgd, 2);
        let axes: Vec<usize> = (0..10).collect();
        for _ in 0..20 {
            let (chosen, scale) = sampler.sample(&axes, &mut rng);
            assert_eq!(chosen.len(), 2);
            assert_ne!(chosen[0], chosen[1]);
            assert!(chosen.iter().all(|a| axes.contains(a)));
            assert_eq!(scale, 5.0);
        }
    }

    #[test]
    fn exact_solution_has_negligible_loss() {
        let mut rng = StdRng::seed_from_u64(3);
        let config = TrainingConfig::new().with_equation(EquationKind::KleinGordon3d);
        let problem = Problem::from_config(&config, &mut rng);
        let train = KleinGordon { spatial: 2, k: config.k }.sample_train(6, &mut rng);
        let batch = train.to_device::<TestBackend>(&Default::default());
        let model = ExactKleinGordon { k: config.k };
        let sampler = DimensionSampler::new(ResidualMethod::Sdgd, 1);
        let loss = total_loss(&model, &problem, &batch, &sampler, &mut rng);
        // 座標はf32に丸められるため厳密に0にはなりません
        assert!(scalar(loss.total) < 1e-8);
    }

    #[test]
    fn wrong_solution_is_penalised_everywhere() {
        struct Zero;
        impl PdeNet<TestBackend> for Zero {
            fn input_dim(&self) -> usize {
                3
            }
            fn predict(&self, coords: &Coords<TestBackend>) -> Tensor<TestBackend, 2> {
                let p = coords.clone().into_points();
                Tensor::zeros([p.dims()[0], 1], &p.device())
            }
            fn second_derivative(
                &self,
                coords: &Coords<TestBackend>,
                _axis: usize,
            ) -> Tensor<TestBackend, 2> {
                self.predict(coords)
            }
        }
        let mut rng = StdRng::seed_from_u64(5);
        let kg = KleinGordon { spatial: 2, k: 2.0 };
        let problem = Problem::KleinGordon(kg.clone());
        let batch = kg.sample_train(4, &mut rng).to_device::<TestBackend>(&Default::default());
        let sampler = DimensionSampler::new(ResidualMethod::Full, 1);
        let loss = total_loss(&Zero, &problem, &batch, &sampler, &mut rng);
        assert!(scalar(loss.residual.clone()) > 0.0);
        assert!(scalar(loss.initial.clone()) > 0.0);
        assert!(scalar(loss.boundary.clone()) > 0.0);
        let sum = scalar(loss.residual) + scalar(loss.initial) + scalar(loss.boundary);
        assert!((scalar(loss.total) - sum).abs() < 1e-12);
    }
}
