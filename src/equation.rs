//! 厳密解を持つ偏微分方程式と、学習・評価用データの生成。
//!
//! 乱数はすべて呼び出し側の`StdRng`から引くため、同じシードからは同じデータが
//! 再現されます。

use crate::config::{EquationKind, TrainingConfig};
use crate::data::{HostCoords, Sampled, TestSet, TrainSet};
use burn::prelude::Backend;
use burn::tensor::Tensor;
use rand::Rng;
use rand::rngs::StdRng;
use rand_distr::StandardNormal;

/// `d`次元球 `|x| ≤ R` 上のポアソン方程式 `Δu = f`。
///
/// 厳密解は `u = (R² - |x|²) · Σ_i c_i sin(x_i + cos x_{i+1} + x_{i+1} cos x_i)` で、
/// 球面上で0になります。
#[derive(Debug, Clone, PartialEq)]
pub struct Poisson {
    pub dim: usize,
    pub radius: f64,
    /// 標準正規分布から引いた`d - 1`個の係数
    pub coeffs: Vec<f64>,
}

impl Poisson {
    pub fn new(dim: usize, radius: f64, rng: &mut StdRng) -> Self {
        let coeffs = (0..dim.saturating_sub(1))
            .map(|_| rng.sample::<f64, _>(StandardNormal))
            .collect();
        Self {
            dim,
            radius,
            coeffs,
        }
    }

    fn inner(x: &[f64], i: usize) -> f64 {
        x[i] + x[i + 1].cos() + x[i + 1] * x[i].cos()
    }

    pub fn exact(&self, x: &[f64]) -> f64 {
        let u1 = self.radius * self.radius - x.iter().map(|v| v * v).sum::<f64>();
        let u2: f64 = self
            .coeffs
            .iter()
            .enumerate()
            .map(|(i, c)| c * Self::inner(x, i).sin())
            .sum();
        u1 * u2
    }

    /// `f = Δu` を積の微分 `Δ(u₁u₂) = u₁Δu₂ + 2∇u₁·∇u₂ + u₂Δu₁` で計算します。
    pub fn forcing(&self, x: &[f64]) -> f64 {
        let d = x.len();
        let u1 = self.radius * self.radius - x.iter().map(|v| v * v).sum::<f64>();
        let mut u2 = 0.0;
        let mut du2 = vec![0.0; d];
        let mut d2u2 = vec![0.0; d];
        for (i, c) in self.coeffs.iter().enumerate() {
            let (a, b) = (x[i], x[i + 1]);
            let g = Self::inner(x, i);
            let (sin_g, cos_g) = g.sin_cos();
            u2 += c * sin_g;
            // ∂g/∂x_i, ∂²g/∂x_i²
            let ga = 1.0 - b * a.sin();
            let gaa = -b * a.cos();
            // ∂g/∂x_{i+1}, ∂²g/∂x_{i+1}²
            let gb = -b.sin() + a.cos();
            let gbb = -b.cos();
            du2[i] += c * cos_g * ga;
            du2[i + 1] += c * cos_g * gb;
            d2u2[i] += -c * sin_g * ga * ga + c * cos_g * gaa;
            d2u2[i + 1] += -c * sin_g * gb * gb + c * cos_g * gbb;
        }
        (0..d)
            .map(|j| u1 * d2u2[j] + 2.0 * (-2.0 * x[j]) * du2[j] + u2 * -2.0)
            .sum()
    }

    /// 方向を正規化したガウス乱数、半径を`U(0, R)`として球内の点を引きます。
    pub fn sample_ball(&self, n: usize, rng: &mut StdRng) -> HostCoords {
        let mut data = Vec::with_capacity(n * self.dim);
        for _ in 0..n {
            let direction: Vec<f64> = (0..self.dim)
                .map(|_| rng.sample::<f64, _>(StandardNormal))
                .collect();
            let norm = direction.iter().map(|v| v * v).sum::<f64>().sqrt().max(f64::MIN_POSITIVE);
            let r = rng.random::<f64>() * self.radius;
            data.extend(direction.iter().map(|v| v / norm * r));
        }
        HostCoords::Points {
            dim: self.dim,
            data,
        }
    }
}

/// クライン-ゴルドン方程式 `u_tt - Δu + u² = f`。
///
/// 入力は`(t, x_1, …, x_n)`で、`t ∈ [0, 10]`、空間は`[-1, 1]ⁿ`です。厳密解は
/// `u = (Σ x_i) cos kt + (Π x_i) sin kt`、ソース項は`f = u² - k²u`です。
#[derive(Debug, Clone, PartialEq)]
pub struct KleinGordon {
    /// 空間次元（2または3）
    pub spatial: usize,
    pub k: f64,
}

impl KleinGordon {
    pub const T_MAX: f64 = 10.0;

    pub fn exact(&self, p: &[f64]) -> f64 {
        let t = p[0];
        let sum: f64 = p[1..].iter().sum();
        let prod: f64 = p[1..].iter().product();
        sum * (self.k * t).cos() + prod * (self.k * t).sin()
    }

    pub fn source(&self, p: &[f64]) -> f64 {
        let u = self.exact(p);
        u * u - self.k * self.k * u
    }

    fn axis_range(axis: usize) -> (f64, f64) {
        if axis == 0 {
            (0.0, Self::T_MAX)
        } else {
            (-1.0, 1.0)
        }
    }

    /// 各軸`nc`点の一様乱数から、コロケーション格子・初期面・境界面を作ります。
    pub fn sample_train(&self, nc: usize, rng: &mut StdRng) -> TrainSet {
        let axes: Vec<Vec<f64>> = (0..=self.spatial)
            .map(|a| {
                let (lo, hi) = Self::axis_range(a);
                (0..nc).map(|_| rng.random_range(lo..hi)).collect()
            })
            .collect();

        let collocation = Sampled::from_fn(HostCoords::Grid(axes.clone()), |p| self.source(p));

        let mut initial_axes = axes.clone();
        initial_axes[0] = vec![0.0];
        let initial = Sampled::from_fn(HostCoords::Grid(initial_axes), |p| self.exact(p));

        let mut boundary = Vec::with_capacity(2 * self.spatial);
        for a in 1..=self.spatial {
            for side in [-1.0, 1.0] {
                let mut face = axes.clone();
                face[a] = vec![side];
                boundary.push(Sampled::from_fn(HostCoords::Grid(face), |p| self.exact(p)));
            }
        }

        TrainSet {
            collocation,
            initial: Some(initial),
            boundary,
        }
    }

    /// 各軸`nc_test`点の等間隔格子上の厳密解。
    pub fn test_set(&self, nc_test: usize) -> TestSet {
        let axes = (0..=self.spatial)
            .map(|a| {
                let (lo, hi) = Self::axis_range(a);
                linspace(lo, hi, nc_test)
            })
            .collect();
        Sampled::from_fn(HostCoords::Grid(axes), |p| self.exact(p))
    }
}

/// `[lo, hi]`を`n`点で等分割します。
pub fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![lo],
        _ => (0..n)
            .map(|i| lo + (hi - lo) * i as f64 / (n - 1) as f64)
            .collect(),
    }
}

/// 描画用の2次元断面。
#[derive(Debug, Clone)]
pub struct Slice {
    pub samples: Sampled,
    /// 断面の横軸・縦軸の範囲
    pub extent: [(f64, f64); 2],
    pub labels: [&'static str; 2],
    pub resolution: usize,
}

/// 学習対象の問題。
#[derive(Debug, Clone, PartialEq)]
pub enum Problem {
    Poisson(Poisson),
    KleinGordon(KleinGordon),
}

impl Problem {
    /// 設定から問題を作ります。ポアソン方程式の係数は`rng`から引きます。
    pub fn from_config(config: &TrainingConfig, rng: &mut StdRng) -> Self {
        match config.equation {
            EquationKind::Poisson => Problem::Poisson(Poisson::new(config.dim, config.radius, rng)),
            EquationKind::KleinGordon3d => Problem::KleinGordon(KleinGordon {
                spatial: 2,
                k: config.k,
            }),
            EquationKind::KleinGordon4d => Problem::KleinGordon(KleinGordon {
                spatial: 3,
                k: config.k,
            }),
        }
    }

    pub fn input_dim(&self) -> usize {
        match self {
            Problem::Poisson(p) => p.dim,
            Problem::KleinGordon(kg) => kg.spatial + 1,
        }
    }

    pub fn time_axis(&self) -> Option<usize> {
        match self {
            Problem::Poisson(_) => None,
            Problem::KleinGordon(_) => Some(0),
        }
    }

    /// ラプラシアンを構成する軸。
    pub fn spatial_axes(&self) -> Vec<usize> {
        match self {
            Problem::Poisson(p) => (0..p.dim).collect(),
            Problem::KleinGordon(kg) => (1..=kg.spatial).collect(),
        }
    }

    pub fn exact(&self, p: &[f64]) -> f64 {
        match self {
            Problem::Poisson(poisson) => poisson.exact(p),
            Problem::KleinGordon(kg) => kg.exact(p),
        }
    }

    pub fn sample_train(&self, config: &TrainingConfig, rng: &mut StdRng) -> TrainSet {
        match self {
            Problem::Poisson(poisson) => {
                let coords = poisson.sample_ball(config.n_f, rng);
                TrainSet {
                    collocation: Sampled::from_fn(coords, |x| poisson.forcing(x)),
                    initial: None,
                    boundary: Vec::new(),
                }
            }
            Problem::KleinGordon(kg) => kg.sample_train(config.nc, rng),
        }
    }

    pub fn test_set(&self, config: &TrainingConfig, rng: &mut StdRng) -> TestSet {
        match self {
            Problem::Poisson(poisson) => {
                let coords = poisson.sample_ball(config.n_test, rng);
                Sampled::from_fn(coords, |x| poisson.exact(x))
            }
            Problem::KleinGordon(kg) => kg.test_set(config.nc_test),
        }
    }

    /// 最初の2つの空間軸を動かし、残りの軸を固定した断面。時間は区間の中央に固定します。
    pub fn slice(&self, resolution: usize) -> Slice {
        let (axes, extent, labels) = match self {
            Problem::Poisson(p) => {
                let r = p.radius;
                let mut axes = vec![vec![0.0]; p.dim];
                axes[0] = linspace(-r, r, resolution);
                axes[1] = linspace(-r, r, resolution);
                (axes, [(-r, r), (-r, r)], ["x1", "x2"])
            }
            Problem::KleinGordon(kg) => {
                let mut axes = vec![vec![0.0]; kg.spatial + 1];
                axes[0] = vec![KleinGordon::T_MAX / 2.0];
                axes[1] = linspace(-1.0, 1.0, resolution);
                axes[2] = linspace(-1.0, 1.0, resolution);
                (axes, [(-1.0, 1.0), (-1.0, 1.0)], ["x", "y"])
            }
        };
        Slice {
            samples: Sampled::from_fn(HostCoords::Grid(axes), |p| self.exact(p)),
            extent,
            labels,
            resolution,
        }
    }

    /// 残差を組み立てます。`laplacian`は（SDGDでは抽出・再スケール済みの）2階微分の和です。
    pub fn residual<B: Backend>(
        &self,
        u: Tensor<B, 2>,
        u_tt: Option<Tensor<B, 2>>,
        laplacian: Tensor<B, 2>,
        source: Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        match self {
            Problem::Poisson(_) => laplacian - source,
            Problem::KleinGordon(_) => {
                let u_tt = u_tt.unwrap_or_else(|| Tensor::zeros_like(&u));
                u_tt - laplacian + u.powf_scalar(2.0) - source
            }
        }
    }
}
