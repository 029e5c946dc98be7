use crate::error::PinnError;
use crate::model::MlpConfig;
use crate::spinn::SeparableNetConfig;
use crate::spinn_d::ChainedNetConfig;
use burn::config::Config;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// 解く偏微分方程式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum EquationKind {
    /// `d`次元球上のポアソン方程式 `Δu = f`
    Poisson,
    /// 3次元 (t, x, y) のクライン-ゴルドン方程式
    KleinGordon3d,
    /// 4次元 (t, x, y, z) のクライン-ゴルドン方程式
    KleinGordon4d,
}

impl EquationKind {
    pub fn name(self) -> &'static str {
        match self {
            EquationKind::Poisson => "poisson",
            EquationKind::KleinGordon3d => "klein_gordon3d",
            EquationKind::KleinGordon4d => "klein_gordon4d",
        }
    }
}

/// ネットワークの種類。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum ModelKind {
    /// 全座標を連結して入力する通常のMLP
    Pinn,
    /// 軸ごとのサブネットワークをランク和の外積で結合する分離型PINN
    Spinn,
    /// 軸ごとのサブネットワークを連結と全結合で順に結合する分離型PINN
    SpinnD,
}

impl ModelKind {
    pub fn name(self) -> &'static str {
        match self {
            ModelKind::Pinn => "pinn",
            ModelKind::Spinn => "spinn",
            ModelKind::SpinnD => "spinn_d",
        }
    }
}

/// MLP本体の構造。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum MlpKind {
    Mlp,
    /// ゲート付きの修正MLP
    Modified,
}

/// 残差の2階微分項の計算方法。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum ResidualMethod {
    /// すべての空間次元の2階微分を計算します
    Full,
    /// 各ステップで空間次元を`batch_size`個だけ抽出します（SDGD）
    Sdgd,
}

/// 学習率スケジュール。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum Schedule {
    Constant,
    /// `lr · (1 - epoch / epochs)` で線形に減衰させます
    Linear,
}

impl Schedule {
    /// `step`回目（0始まり）の更新で使う学習率を返します。
    pub fn learning_rate(self, base: f64, step: usize, total: usize) -> f64 {
        match self {
            Schedule::Constant => base,
            Schedule::Linear => base * (1.0 - step as f64 / total.max(1) as f64),
        }
    }
}

/// 学習の設定。結果ディレクトリに`config.json`として保存され、推論時に再利用されます。
#[derive(Config, Debug)]
pub struct TrainingConfig {
    #[config(default = "EquationKind::Poisson")]
    pub equation: EquationKind,
    #[config(default = "ModelKind::Pinn")]
    pub model: ModelKind,
    #[config(default = "MlpKind::Mlp")]
    pub mlp: MlpKind,
    /// ポアソン方程式の次元
    #[config(default = 3)]
    pub dim: usize,
    #[config(default = 64)]
    pub features: usize,
    /// 出力層を含む全結合層の数
    #[config(default = 4)]
    pub n_layers: usize,
    /// 分離型PINNのランク
    #[config(default = 32)]
    pub rank: usize,
    #[config(default = 1e-3)]
    pub lr: f64,
    #[config(default = 1000)]
    pub epochs: usize,
    #[config(default = 0)]
    pub seed: u64,
    /// クライン-ゴルドン方程式の各軸のコロケーション点数
    #[config(default = 16)]
    pub nc: usize,
    /// クライン-ゴルドン方程式の各軸のテスト点数
    #[config(default = 32)]
    pub nc_test: usize,
    /// ポアソン方程式のコロケーション点数
    #[config(default = 1000)]
    pub n_f: usize,
    /// ポアソン方程式のテスト点数
    #[config(default = 20000)]
    pub n_test: usize,
    #[config(default = 1.0)]
    pub radius: f64,
    /// クライン-ゴルドン方程式の厳密解の時間周波数
    #[config(default = 2.0)]
    pub k: f64,
    #[config(default = "ResidualMethod::Sdgd")]
    pub method: ResidualMethod,
    /// SDGDで抽出する空間次元の数
    #[config(default = 1)]
    pub batch_size: usize,
    #[config(default = "Schedule::Linear")]
    pub schedule: Schedule,
    #[config(default = 1)]
    pub resample_every: usize,
    #[config(default = 100)]
    pub log_every: usize,
    /// 0のとき途中経過の解の描画を行いません
    #[config(default = 0)]
    pub plot_every: usize,
}

impl TrainingConfig {
    /// 入力座標の次元（時間軸を含む）。
    pub fn input_dim(&self) -> usize {
        match self.equation {
            EquationKind::Poisson => self.dim,
            EquationKind::KleinGordon3d => 3,
            EquationKind::KleinGordon4d => 4,
        }
    }

    /// 2階微分を取る空間次元の数。
    pub fn spatial_dim(&self) -> usize {
        match self.equation {
            EquationKind::Poisson => self.dim,
            EquationKind::KleinGordon3d => 2,
            EquationKind::KleinGordon4d => 3,
        }
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        let invalid = |msg: String| Err(PinnError::InvalidConfig(msg));
        if self.equation == EquationKind::Poisson && self.dim < 2 {
            return invalid(format!("ポアソン方程式の次元は2以上が必要です (dim={})", self.dim));
        }
        if self.n_layers < 2 {
            return invalid(format!("n_layersは2以上が必要です (n_layers={})", self.n_layers));
        }
        if self.mlp == MlpKind::Modified && self.n_layers < 3 {
            return invalid(format!(
                "修正MLPのゲートを使うにはn_layersが3以上必要です (n_layers={})",
                self.n_layers
            ));
        }
        if self.features == 0 || self.rank == 0 {
            return invalid("featuresとrankは1以上が必要です".to_string());
        }
        if self.epochs == 0 || self.log_every == 0 || self.resample_every == 0 {
            return invalid("epochs, log_every, resample_everyは1以上が必要です".to_string());
        }
        if self.batch_size == 0 || self.batch_size > self.spatial_dim() {
            return invalid(format!(
                "batch_sizeは1以上{}以下が必要です (batch_size={})",
                self.spatial_dim(),
                self.batch_size
            ));
        }
        match self.equation {
            EquationKind::Poisson if self.n_f == 0 || self.n_test == 0 => {
                return invalid("n_fとn_testは1以上が必要です".to_string());
            }
            EquationKind::KleinGordon3d | EquationKind::KleinGordon4d
                if self.nc == 0 || self.nc_test < 2 =>
            {
                return invalid("ncは1以上、nc_testは2以上が必要です".to_string());
            }
            _ => {}
        }
        if !(self.radius > 0.0) || !(self.lr > 0.0) {
            return invalid("radiusとlrは正の値が必要です".to_string());
        }
        Ok(())
    }

    /// 結果ディレクトリ名。設定の主要な値を含めます。
    pub fn run_name(&self) -> String {
        let data = match self.equation {
            EquationKind::Poisson => format!("dim{}_nf{}", self.dim, self.n_f),
            _ => format!("nc{}_k{}", self.nc, self.k),
        };
        let mlp = match self.mlp {
            MlpKind::Mlp => "mlp",
            MlpKind::Modified => "modified_mlp",
        };
        let method = match self.method {
            ResidualMethod::Full => "full".to_string(),
            ResidualMethod::Sdgd => format!("sdgd{}", self.batch_size),
        };
        format!(
            "{data}_{mlp}_l{}_f{}_r{}_lr{}_e{}_{method}_s{}",
            self.n_layers, self.features, self.rank, self.lr, self.epochs, self.seed
        )
    }

    /// 通常のPINN用のMLP設定。
    pub fn pinn_config(&self) -> MlpConfig {
        MlpConfig::new(self.input_dim(), 1)
            .with_d_hidden(self.features)
            .with_n_layers(self.n_layers)
            .with_modified(self.mlp == MlpKind::Modified)
    }

    pub fn spinn_config(&self) -> SeparableNetConfig {
        SeparableNetConfig::new(self.input_dim())
            .with_d_hidden(self.features)
            .with_n_layers(self.n_layers)
            .with_rank(self.rank)
            .with_modified(self.mlp == MlpKind::Modified)
    }

    pub fn spinn_d_config(&self) -> ChainedNetConfig {
        ChainedNetConfig::new(self.input_dim())
            .with_d_hidden(self.features)
            .with_n_layers(self.n_layers)
            .with_modified(self.mlp == MlpKind::Modified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(TrainingConfig::new().validate().is_ok());
    }

    #[test]
    fn config_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = TrainingConfig::new()
            .with_equation(EquationKind::KleinGordon4d)
            .with_model(ModelKind::SpinnD)
            .with_method(ResidualMethod::Full)
            .with_lr(5e-4);
        config.save(&path).unwrap();
        let loaded = TrainingConfig::load(&path).unwrap();
        assert_eq!(loaded.equation, EquationKind::KleinGordon4d);
        assert_eq!(loaded.model, ModelKind::SpinnD);
        assert_eq!(loaded.run_name(), config.run_name());
        assert!(loaded.validate().is_ok());
    }

    #[test]
    fn batch_size_is_bounded_by_spatial_dims() {
        let config = TrainingConfig::new()
            .with_equation(EquationKind::KleinGordon3d)
            .with_batch_size(3);
        assert!(matches!(
            config.validate(),
            Err(PinnError::InvalidConfig(_))
        ));
        assert!(config.with_batch_size(2).validate().is_ok());
    }

    #[test]
    fn poisson_needs_two_dimensions() {
        let config = TrainingConfig::new().with_dim(1).with_batch_size(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn modified_mlp_needs_a_gated_layer() {
        let config = TrainingConfig::new()
            .with_mlp(MlpKind::Modified)
            .with_n_layers(2);
        assert!(matches!(
            config.validate(),
            Err(PinnError::InvalidConfig(_))
        ));
        assert!(config.with_n_layers(3).validate().is_ok());
        let plain = TrainingConfig::new().with_n_layers(2);
        assert!(plain.validate().is_ok());
    }

    #[test]
    fn linear_schedule_decays_to_zero() {
        let s = Schedule::Linear;
        assert_eq!(s.learning_rate(1e-3, 0, 100), 1e-3);
        assert!((s.learning_rate(1e-3, 50, 100) - 5e-4).abs() < 1e-15);
        assert_eq!(Schedule::Constant.learning_rate(1e-3, 99, 100), 1e-3);
    }

    #[test]
    fn run_name_reflects_method() {
        let config = TrainingConfig::new().with_method(ResidualMethod::Full);
        assert!(config.run_name().contains("_full_"));
        let config = config.with_method(ResidualMethod::Sdgd).with_batch_size(2);
        assert!(config.run_name().contains("_sdgd2_"));
    }
}
