//! 2階までの前進モード自動微分（テイラー展開の伝播）。
//!
//! 入力を方向`v`に沿って`x + h v`と動かしたときの出力を`h`の2次まで追跡します。
//! `curvature`はヘッセ行列とベクトルの積`vᵀ H v`に等しく、ヘッセ行列全体を
//! 作らずにPDE残差の2階微分項を得られます。
//!
//! 各演算はburnのテンソル演算だけで構成されるため、`Autodiff`バックエンド上では
//! ここで得た2階微分からパラメータへの逆伝播がそのまま行えます。

use burn::nn::Linear;
use burn::prelude::Backend;
use burn::tensor::Tensor;
use burn::tensor::activation::tanh;

/// 値・1階方向微分・2階方向微分の組。形状はすべて`[n, k]`です。
#[derive(Debug, Clone)]
pub struct Jet<B: Backend> {
    pub value: Tensor<B, 2>,
    pub tangent: Tensor<B, 2>,
    pub curvature: Tensor<B, 2>,
}

impl<B: Backend> Jet<B> {
    /// 微分方向に依存しない定数として扱います。
    pub fn constant(value: Tensor<B, 2>) -> Self {
        let tangent = Tensor::zeros_like(&value);
        let curvature = Tensor::zeros_like(&value);
        Self {
            value,
            tangent,
            curvature,
        }
    }

    /// 入力`[n, d]`の`axis`列を単位ベクトル方向として種を設定します。
    pub fn seed(value: Tensor<B, 2>, axis: usize) -> Self {
        let [_, d] = value.dims();
        let mut direction = vec![0.0f32; d];
        direction[axis] = 1.0;
        let direction = Tensor::<B, 1>::from_floats(direction.as_slice(), &value.device())
            .reshape([1, d]);
        let tangent = Tensor::ones_like(&value).mul(direction);
        let curvature = Tensor::zeros_like(&value);
        Self {
            value,
            tangent,
            curvature,
        }
    }

    /// 全成分の接ベクトルを1にします。1列の入力（軸ごとのサブネットワーク）向けです。
    pub fn seed_ones(value: Tensor<B, 2>) -> Self {
        let tangent = Tensor::ones_like(&value);
        let curvature = Tensor::zeros_like(&value);
        Self {
            value,
            tangent,
            curvature,
        }
    }

    /// 全結合層。バイアスは微分項に寄与しません。
    pub fn linear(self, layer: &Linear<B>) -> Self {
        let weight = layer.weight.val();
        Self {
            value: layer.forward(self.value),
            tangent: self.tangent.matmul(weight.clone()),
            curvature: self.curvature.matmul(weight),
        }
    }

    pub fn tanh(self) -> Self {
        let y = tanh(self.value);
        // d/dv tanh = 1 - y², d²/dv² tanh = -2y(1 - y²)
        let dy = y.clone().powf_scalar(2.0).neg().add_scalar(1.0);
        let ddy = y.clone().mul(dy.clone()).mul_scalar(-2.0);
        let tangent = dy.clone().mul(self.tangent.clone());
        let curvature = dy
            .mul(self.curvature)
            .add(ddy.mul(self.tangent.powf_scalar(2.0)));
        Self {
            value: y,
            tangent,
            curvature,
        }
    }

    /// 要素ごとの積。2階の項には交差項`2 t₁ t₂`が入ります。
    pub fn mul(self, other: Self) -> Self {
        let value = self.value.clone().mul(other.value.clone());
        let tangent = self
            .tangent
            .clone()
            .mul(other.value.clone())
            .add(self.value.clone().mul(other.tangent.clone()));
        let curvature = self
            .curvature
            .mul(other.value)
            .add(self.tangent.mul(other.tangent).mul_scalar(2.0))
            .add(self.value.mul(other.curvature));
        Self {
            value,
            tangent,
            curvature,
        }
    }

    pub fn add(self, other: Self) -> Self {
        Self {
            value: self.value.add(other.value),
            tangent: self.tangent.add(other.tangent),
            curvature: self.curvature.add(other.curvature),
        }
    }

    /// `1 - x`
    pub fn one_minus(self) -> Self {
        Self {
            value: self.value.neg().add_scalar(1.0),
            tangent: self.tangent.neg(),
            curvature: self.curvature.neg(),
        }
    }

    /// 指定した次元で連結します。
    pub fn cat(jets: Vec<Self>, dim: usize) -> Self {
        let mut values = Vec::with_capacity(jets.len());
        let mut tangents = Vec::with_capacity(jets.len());
        let mut curvatures = Vec::with_capacity(jets.len());
        for jet in jets {
            values.push(jet.value);
            tangents.push(jet.tangent);
            curvatures.push(jet.curvature);
        }
        Self {
            value: Tensor::cat(values, dim),
            tangent: Tensor::cat(tangents, dim),
            curvature: Tensor::cat(curvatures, dim),
        }
    }
}
