//! ホスト側で生成した座標と目標値、およびデバイス上のテンソルへの変換。

use crate::model::Coords;
use burn::prelude::Backend;
use burn::tensor::Tensor;

/// ホスト側の座標。値は`f64`で保持し、テンソル化の際に`f32`へ変換します。
#[derive(Debug, Clone, PartialEq)]
pub enum HostCoords {
    /// 行優先で並んだ`[n, dim]`の点列
    Points { dim: usize, data: Vec<f64> },
    /// 軸ごとのサンプルから成るテンソル積格子
    Grid(Vec<Vec<f64>>),
}

impl HostCoords {
    pub fn len(&self) -> usize {
        match self {
            HostCoords::Points { dim, data } => data.len() / (*dim).max(1),
            HostCoords::Grid(axes) => axes.iter().map(Vec::len).product(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dim(&self) -> usize {
        match self {
            HostCoords::Points { dim, .. } => *dim,
            HostCoords::Grid(axes) => axes.len(),
        }
    }

    /// 各点に`f`を適用した値を、点の並び順（格子なら行優先）で返します。
    pub fn map_points<F: FnMut(&[f64]) -> f64>(&self, mut f: F) -> Vec<f64> {
        match self {
            HostCoords::Points { dim, data } => data.chunks(*dim).map(f).collect(),
            HostCoords::Grid(axes) => {
                let total = self.len();
                if total == 0 {
                    return Vec::new();
                }
                let mut values = Vec::with_capacity(total);
                let mut index = vec![0usize; axes.len()];
                let mut point: Vec<f64> = axes.iter().map(|axis| axis[0]).collect();
                for _ in 0..total {
                    values.push(f(&point));
                    // 最後の軸から桁上がりさせます
                    for a in (0..axes.len()).rev() {
                        index[a] += 1;
                        if index[a] < axes[a].len() {
                            point[a] = axes[a][index[a]];
                            break;
                        }
                        index[a] = 0;
                        point[a] = axes[a][0];
                    }
                }
                values
            }
        }
    }

    pub fn to_device<B: Backend>(&self, device: &B::Device) -> Coords<B> {
        match self {
            HostCoords::Points { dim, data } => {
                Coords::Points(column_tensor(data, device).reshape([self.len(), *dim]))
            }
            HostCoords::Grid(axes) => Coords::Grid(
                axes.iter()
                    .map(|axis| column_tensor(axis, device))
                    .collect(),
            ),
        }
    }
}

/// `[n, 1]`の列テンソルを作ります。
pub fn column_tensor<B: Backend>(values: &[f64], device: &B::Device) -> Tensor<B, 2> {
    let floats: Vec<f32> = values.iter().map(|&v| v as f32).collect();
    Tensor::<B, 1>::from_floats(floats.as_slice(), device).reshape([values.len(), 1])
}

/// 座標とその点での目標値（境界値・初期値・ソース項）。
#[derive(Debug, Clone)]
pub struct Sampled {
    pub coords: HostCoords,
    pub values: Vec<f64>,
}

impl Sampled {
    /// 座標から目標値を計算して作ります。
    pub fn from_fn<F: FnMut(&[f64]) -> f64>(coords: HostCoords, f: F) -> Self {
        let values = coords.map_points(f);
        Self { coords, values }
    }

    pub fn to_device<B: Backend>(&self, device: &B::Device) -> Batch<B> {
        Batch {
            coords: self.coords.to_device(device),
            values: column_tensor(&self.values, device),
        }
    }
}

/// 1回の学習ステップで使う点群。
#[derive(Debug, Clone)]
pub struct TrainSet {
    /// 残差を評価する点と、その点でのソース項
    pub collocation: Sampled,
    pub initial: Option<Sampled>,
    /// 境界の各面
    pub boundary: Vec<Sampled>,
}

impl TrainSet {
    pub fn to_device<B: Backend>(&self, device: &B::Device) -> TrainBatch<B> {
        TrainBatch {
            collocation: self.collocation.to_device(device),
            initial: self.initial.as_ref().map(|s| s.to_device(device)),
            boundary: self.boundary.iter().map(|s| s.to_device(device)).collect(),
        }
    }
}

/// 厳密解と比較する評価用の点群。
pub type TestSet = Sampled;

/// デバイス上の座標と目標値`[N, 1]`。
#[derive(Debug, Clone)]
pub struct Batch<B: Backend> {
    pub coords: Coords<B>,
    pub values: Tensor<B, 2>,
}

#[derive(Debug, Clone)]
pub struct TrainBatch<B: Backend> {
    pub collocation: Batch<B>,
    pub initial: Option<Batch<B>>,
    pub boundary: Vec<Batch<B>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn grid_points_follow_row_major_order() {
        let coords = HostCoords::Grid(vec![vec![1.0, 2.0], vec![10.0, 20.0, 30.0]]);
        assert_eq!(coords.len(), 6);
        let sums = coords.map_points(|p| p[0] + p[1]);
        assert_eq!(sums, vec![11.0, 21.0, 31.0, 12.0, 22.0, 32.0]);
    }

    #[test]
    fn host_and_device_grids_agree() {
        let coords = HostCoords::Grid(vec![vec![0.5, 1.5], vec![-1.0, 0.0], vec![3.0]]);
        let host = coords.map_points(|p| p[0] * 100.0 + p[1] * 10.0 + p[2]);
        let device = coords
            .to_device::<NdArray<f32>>(&Default::default())
            .into_points()
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        for (i, value) in host.iter().enumerate() {
            let p = &device[i * 3..i * 3 + 3];
            let expected = p[0] as f64 * 100.0 + p[1] as f64 * 10.0 + p[2] as f64;
            assert!((value - expected).abs() < 1e-4);
        }
    }

    #[test]
    fn points_len_and_dim() {
        let coords = HostCoords::Points {
            dim: 3,
            data: vec![0.0; 12],
        };
        assert_eq!(coords.len(), 4);
        assert_eq!(coords.dim(), 3);
        let batch = Sampled::from_fn(coords, |p| p.len() as f64)
            .to_device::<NdArray<f32>>(&Default::default());
        assert_eq!(batch.values.dims(), [4, 1]);
        assert_eq!(batch.coords.len(), 4);
    }
}
