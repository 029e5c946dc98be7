//! 連結型の分離PINN（SPINN-D）。
//!
//! 軸ごとのサブネットワークの特徴量を先頭から順に
//! `h ← tanh(W_k [h; f_k])` と結合し、最後に線形層でスカラーを出力します。
//! 格子構造を利用しないため、任意の点の並びに対して評価します。

use crate::jet::Jet;
use crate::model::{Coords, Mlp, MlpConfig, PdeNet};
use burn::config::Config;
use burn::module::Module;
use burn::nn::{Initializer, Linear, LinearConfig, Tanh};
use burn::prelude::Backend;
use burn::tensor::Tensor;

#[derive(Config, Debug)]
pub struct ChainedNetConfig {
    pub n_axes: usize,
    #[config(default = 64)]
    pub d_hidden: usize,
    #[config(default = 4)]
    pub n_layers: usize,
    #[config(default = false)]
    pub modified: bool,
}

impl ChainedNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ChainedNet<B> {
        let body = MlpConfig::new(1, self.d_hidden)
            .with_d_hidden(self.d_hidden)
            .with_n_layers(self.n_layers)
            .with_modified(self.modified);
        let linear = |d_in: usize, d_out: usize| {
            LinearConfig::new(d_in, d_out)
                .with_initializer(Initializer::XavierNormal { gain: 1.0 })
                .init(device)
        };
        ChainedNet {
            bodies: (0..self.n_axes).map(|_| body.init(device)).collect(),
            combines: (1..self.n_axes)
                .map(|_| linear(2 * self.d_hidden, self.d_hidden))
                .collect(),
            head: linear(self.d_hidden, 1),
            activation: Tanh::new(),
        }
    }
}

#[derive(Module, Debug)]
pub struct ChainedNet<B: Backend> {
    bodies: Vec<Mlp<B>>,
    combines: Vec<Linear<B>>,
    head: Linear<B>,
    activation: Tanh,
}

impl<B: Backend> ChainedNet<B> {
    pub fn forward(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let coords = Coords::Points(points);
        let feature = |a: usize| self.activation.forward(self.bodies[a].forward(coords.axis(a)));
        let mut acc = feature(0);
        for (a, combine) in self.combines.iter().enumerate() {
            let joined = Tensor::cat(vec![acc, feature(a + 1)], 1);
            acc = self.activation.forward(combine.forward(joined));
        }
        self.head.forward(acc)
    }

    /// `axis`列だけに微分方向を与えて[`Jet`]を伝播させます。
    pub fn forward_jet(&self, points: Tensor<B, 2>, axis: usize) -> Jet<B> {
        let coords = Coords::Points(points);
        let feature = |a: usize| {
            let x = coords.axis(a);
            if a == axis {
                self.bodies[a].forward_jet(Jet::seed_ones(x)).tanh()
            } else {
                Jet::constant(self.activation.forward(self.bodies[a].forward(x)))
            }
        };
        let mut acc = feature(0);
        for (a, combine) in self.combines.iter().enumerate() {
            acc = Jet::cat(vec![acc, feature(a + 1)], 1).linear(combine).tanh();
        }
        acc.linear(&self.head)
    }
}

impl<B: Backend> PdeNet<B> for ChainedNet<B> {
    fn input_dim(&self) -> usize {
        self.bodies.len()
    }

    fn predict(&self, coords: &Coords<B>) -> Tensor<B, 2> {
        self.forward(coords.clone().into_points())
    }

    fn second_derivative(&self, coords: &Coords<B>, axis: usize) -> Tensor<B, 2> {
        self.forward_jet(coords.clone().into_points(), axis).curvature
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::{TestBackend, assert_second_derivative, tensor, to_vec};

    fn net(n_axes: usize) -> ChainedNet<TestBackend> {
        ChainedNetConfig::new(n_axes)
            .with_d_hidden(6)
            .with_n_layers(3)
            .init(&Default::default())
    }

    #[test]
    fn output_is_one_column() {
        let net = net(4);
        let out = net.predict(&Coords::Points(tensor(&[0.1; 20], [5, 4])));
        assert_eq!(out.dims(), [5, 1]);
        assert_eq!(net.input_dim(), 4);
    }

    #[test]
    fn second_derivative_matches_finite_differences() {
        let net = net(3);
        for axis in 0..3 {
            assert_second_derivative(&net, &[0.3, -0.7, 0.25], axis);
        }
    }

    #[test]
    fn jet_value_equals_forward() {
        let net = net(3);
        let x = tensor(&[0.1, 0.2, 0.3, -0.4, -0.5, -0.6], [2, 3]);
        let plain = to_vec(net.forward(x.clone()));
        let jet = to_vec(net.forward_jet(x, 2).value);
        for (a, b) in plain.iter().zip(jet.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }
}
