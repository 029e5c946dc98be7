//! 分離型PINN（SPINN）。
//!
//! 入力の軸ごとに独立したMLP `f_a: ℝ → ℝʳ` を持ち、出力を
//! `u(x_1, …, x_d) = Σ_r Π_a f_a(x_a)_r` の低ランクテンソル分解で表します。
//! 格子入力では各軸のサンプル数`n_a`に対してサブネットワークを`n_a`回評価する
//! だけで`Π n_a`点の予測が得られます。

use crate::jet::Jet;
use crate::model::{Coords, Mlp, MlpConfig, PdeNet};
use burn::config::Config;
use burn::module::Module;
use burn::prelude::Backend;
use burn::tensor::Tensor;

#[derive(Config, Debug)]
pub struct SeparableNetConfig {
    pub n_axes: usize,
    #[config(default = 64)]
    pub d_hidden: usize,
    #[config(default = 4)]
    pub n_layers: usize,
    #[config(default = 32)]
    pub rank: usize,
    #[config(default = false)]
    pub modified: bool,
}

impl SeparableNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SeparableNet<B> {
        let body = MlpConfig::new(1, self.rank)
            .with_d_hidden(self.d_hidden)
            .with_n_layers(self.n_layers)
            .with_modified(self.modified);
        SeparableNet {
            bodies: (0..self.n_axes).map(|_| body.init(device)).collect(),
        }
    }
}

#[derive(Module, Debug)]
pub struct SeparableNet<B: Backend> {
    bodies: Vec<Mlp<B>>,
}

impl<B: Backend> SeparableNet<B> {
    /// 軸ごとの特徴量`[n_a, r]`。
    fn features(&self, coords: &Coords<B>) -> Vec<Tensor<B, 2>> {
        self.bodies
            .iter()
            .enumerate()
            .map(|(a, body)| body.forward(coords.axis(a)))
            .collect()
    }
}

/// ランク方向の和を取って特徴量を結合します。
///
/// 格子なら外積（出力は行優先で`Π n_a`点）、点の並びなら要素ごとの積です。
fn contract<B: Backend>(features: Vec<Tensor<B, 2>>, grid: bool) -> Tensor<B, 2> {
    let mut acc = features[0].clone();
    for feature in features.into_iter().skip(1) {
        acc = if grid {
            let [m, rank] = acc.dims();
            let [n, _] = feature.dims();
            acc.unsqueeze_dim::<3>(1)
                .mul(feature.unsqueeze_dim::<3>(0))
                .reshape([m * n, rank])
        } else {
            acc.mul(feature)
        };
    }
    acc.sum_dim(1)
}

impl<B: Backend> PdeNet<B> for SeparableNet<B> {
    fn input_dim(&self) -> usize {
        self.bodies.len()
    }

    fn predict(&self, coords: &Coords<B>) -> Tensor<B, 2> {
        let grid = matches!(coords, Coords::Grid(_));
        contract(self.features(coords), grid)
    }

    /// `u`は各`f_a`について線形なので、`f_axis`をその2階微分に置き換えて縮約します。
    fn second_derivative(&self, coords: &Coords<B>, axis: usize) -> Tensor<B, 2> {
        let grid = matches!(coords, Coords::Grid(_));
        let mut features = self.features(coords);
        let jet = self.bodies[axis].forward_jet(Jet::seed_ones(coords.axis(axis)));
        features[axis] = jet.curvature;
        contract(features, grid)
    }
}
