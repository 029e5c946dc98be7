use crate::jet::Jet;
use burn::config::Config;
use burn::module::Module;
use burn::nn::{Initializer, Linear, LinearConfig, Tanh};
use burn::prelude::Backend;
use burn::tensor::Tensor;

/// ネットワークへの入力座標。
///
/// `Grid`は軸ごとのサンプル`[n_a, 1]`のテンソル積格子を表し、点は
/// 行優先（`ij`インデックス）で並びます。点数は`Π n_a`です。
#[derive(Debug, Clone)]
pub enum Coords<B: Backend> {
    Points(Tensor<B, 2>),
    Grid(Vec<Tensor<B, 2>>),
}

impl<B: Backend> Coords<B> {
    /// 点の総数。
    pub fn len(&self) -> usize {
        match self {
            Coords::Points(points) => points.dims()[0],
            Coords::Grid(axes) => axes.iter().map(|axis| axis.dims()[0]).product(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dim(&self) -> usize {
        match self {
            Coords::Points(points) => points.dims()[1],
            Coords::Grid(axes) => axes.len(),
        }
    }

    /// `axis`番目の座標を`[n, 1]`で取り出します。格子の場合は軸のサンプルそのものです。
    pub fn axis(&self, axis: usize) -> Tensor<B, 2> {
        match self {
            Coords::Points(points) => {
                let n = points.dims()[0];
                points.clone().slice([0..n, axis..axis + 1])
            }
            Coords::Grid(axes) => axes[axis].clone(),
        }
    }

    /// 格子を明示的な点の並び`[N, d]`に展開します。
    pub fn into_points(self) -> Tensor<B, 2> {
        match self {
            Coords::Points(points) => points,
            Coords::Grid(axes) => {
                let sizes: Vec<usize> = axes.iter().map(|axis| axis.dims()[0]).collect();
                let total: usize = sizes.iter().product();
                let columns = axes
                    .into_iter()
                    .enumerate()
                    .map(|(a, axis)| {
                        let outer: usize = sizes[..a].iter().product();
                        let inner: usize = sizes[a + 1..].iter().product();
                        axis.reshape([1, sizes[a], 1])
                            .repeat_dim(0, outer)
                            .repeat_dim(2, inner)
                            .reshape([total, 1])
                    })
                    .collect();
                Tensor::cat(columns, 1)
            }
        }
    }
}

/// PDEの解を近似するネットワークの共通インターフェース。
pub trait PdeNet<B: Backend> {
    /// 入力座標の次元。
    fn input_dim(&self) -> usize;

    /// 各点での予測値`[N, 1]`。
    fn predict(&self, coords: &Coords<B>) -> Tensor<B, 2>;

    /// `axis`方向の2階偏微分`∂²u/∂x_axis²`を`[N, 1]`で返します。
    fn second_derivative(&self, coords: &Coords<B>, axis: usize) -> Tensor<B, 2>;
}

/// [`Mlp`]の設定。
#[derive(Config, Debug)]
pub struct MlpConfig {
    pub d_input: usize,
    pub d_output: usize,
    #[config(default = 64)]
    pub d_hidden: usize,
    /// 出力層を含む全結合層の数
    #[config(default = 4)]
    pub n_layers: usize,
    #[config(default = false)]
    pub modified: bool,
}

impl MlpConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Mlp<B> {
        let linear = |d_in: usize, d_out: usize| {
            LinearConfig::new(d_in, d_out)
                .with_initializer(Initializer::XavierNormal { gain: 1.0 })
                .init(device)
        };
        let n_hidden = self.n_layers.max(2) - 1;
        let mut hidden = Vec::with_capacity(n_hidden);
        hidden.push(linear(self.d_input, self.d_hidden));
        for _ in 1..n_hidden {
            hidden.push(linear(self.d_hidden, self.d_hidden));
        }
        let gate = self.modified.then(|| Gate {
            u: linear(self.d_input, self.d_hidden),
            v: linear(self.d_input, self.d_hidden),
        });
        Mlp {
            hidden,
            gate,
            head: linear(self.d_hidden, self.d_output),
            activation: Tanh::new(),
        }
    }
}

/// 修正MLPのゲート`U = tanh(W_u x)`, `V = tanh(W_v x)`。
#[derive(Module, Debug)]
pub struct Gate<B: Backend> {
    u: Linear<B>,
    v: Linear<B>,
}

/// tanhを活性化関数とする多層パーセプトロン（MLP）。
///
/// 座標を入力とし、その点における物理量uを予測します。`gate`を持つ場合は
/// 隠れ層ごとに`H ← (1 - Z)⊙U + Z⊙V`と混合する修正MLPとして振る舞います。
#[derive(Module, Debug)]
pub struct Mlp<B: Backend> {
    hidden: Vec<Linear<B>>,
    gate: Option<Gate<B>>,
    head: Linear<B>,
    activation: Tanh,
}

impl<B: Backend> Mlp<B> {
    /// モデルの順伝播を実行します。
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = match &self.gate {
            None => {
                let mut x = input;
                for linear in &self.hidden {
                    x = self.activation.forward(linear.forward(x));
                }
                x
            }
            Some(gate) => {
                let u = self.activation.forward(gate.u.forward(input.clone()));
                let v = self.activation.forward(gate.v.forward(input.clone()));
                let mut h = self.activation.forward(self.hidden[0].forward(input));
                for linear in &self.hidden[1..] {
                    let z = self.activation.forward(linear.forward(h));
                    h = z.clone().neg().add_scalar(1.0).mul(u.clone()) + z.mul(v.clone());
                }
                h
            }
        };
        self.head.forward(x)
    }

    /// [`Jet`]を伝播させる順伝播。
    pub fn forward_jet(&self, input: Jet<B>) -> Jet<B> {
        let x = match &self.gate {
            None => {
                let mut x = input;
                for linear in &self.hidden {
                    x = x.linear(linear).tanh();
                }
                x
            }
            Some(gate) => {
                let u = input.clone().linear(&gate.u).tanh();
                let v = input.clone().linear(&gate.v).tanh();
                let mut h = input.linear(&self.hidden[0]).tanh();
                for linear in &self.hidden[1..] {
                    let z = h.linear(linear).tanh();
                    h = z.clone().one_minus().mul(u.clone()).add(z.mul(v.clone()));
                }
                h
            }
        };
        x.linear(&self.head)
    }

    pub fn d_input(&self) -> usize {
        self.hidden[0].weight.val().dims()[0]
    }
}

impl<B: Backend> PdeNet<B> for Mlp<B> {
    fn input_dim(&self) -> usize {
        self.d_input()
    }

    fn predict(&self, coords: &Coords<B>) -> Tensor<B, 2> {
        self.forward(coords.clone().into_points())
    }

    fn second_derivative(&self, coords: &Coords<B>, axis: usize) -> Tensor<B, 2> {
        let jet = Jet::seed(coords.clone().into_points(), axis);
        self.forward_jet(jet).curvature
    }
}
