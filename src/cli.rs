use crate::config::{
    EquationKind, MlpKind, ModelKind, ResidualMethod, Schedule, TrainingConfig,
};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// clapでコマンドラインの構造を定義します。
#[derive(Parser, Debug)]
#[command(author, version, about = "Separable physics-informed neural networks with Burn", long_about = None)]
pub struct Cli {
    /// ログレベル (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// 実行するサブコマンドを定義します（train または eval）。
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// モデルを学習し、結果をディレクトリに保存します
    Train(TrainArgs),
    /// 保存されたモデルをテストデータで評価します
    Eval(EvalArgs),
}

#[derive(Args, Debug)]
pub struct EvalArgs {
    /// `train`が出力した結果ディレクトリ
    #[arg(long)]
    pub dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[arg(long, value_enum, default_value_t = EquationKind::Poisson)]
    pub equation: EquationKind,
    #[arg(long, value_enum, default_value_t = ModelKind::Pinn)]
    pub model: ModelKind,
    #[arg(long, value_enum, default_value_t = MlpKind::Mlp)]
    pub mlp: MlpKind,
    /// ポアソン方程式の次元
    #[arg(long, default_value_t = 3)]
    pub dim: usize,
    /// 隠れ層の幅
    #[arg(long, default_value_t = 64)]
    pub features: usize,
    #[arg(long, default_value_t = 4)]
    pub n_layers: usize,
    /// 分離型PINNのランク
    #[arg(long, default_value_t = 32)]
    pub rank: usize,
    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,
    #[arg(long, default_value_t = 1000)]
    pub epochs: usize,
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
    /// クライン-ゴルドン方程式の各軸のコロケーション点数
    #[arg(long, default_value_t = 16)]
    pub nc: usize,
    #[arg(long, default_value_t = 32)]
    pub nc_test: usize,
    /// ポアソン方程式のコロケーション点数
    #[arg(long, default_value_t = 1000)]
    pub n_f: usize,
    #[arg(long, default_value_t = 20000)]
    pub n_test: usize,
    #[arg(long, default_value_t = 1.0)]
    pub radius: f64,
    #[arg(long, default_value_t = 2.0)]
    pub k: f64,
    #[arg(long, value_enum, default_value_t = ResidualMethod::Sdgd)]
    pub method: ResidualMethod,
    /// SDGDで1ステップに抽出する空間次元の数
    #[arg(long, default_value_t = 1)]
    pub batch_size: usize,
    #[arg(long, value_enum, default_value_t = Schedule::Linear)]
    pub schedule: Schedule,
    /// 省略時はポアソン方程式で1、クライン-ゴルドン方程式で100
    #[arg(long)]
    pub resample_every: Option<usize>,
    #[arg(long, default_value_t = 100)]
    pub log_every: usize,
    /// 0のとき途中経過の解を描画しません
    #[arg(long, default_value_t = 0)]
    pub plot_every: usize,
    /// 結果を保存するルートディレクトリ
    #[arg(long, default_value = "results")]
    pub out: PathBuf,
}

impl TrainArgs {
    pub fn into_config(self) -> TrainingConfig {
        let resample_every = self.resample_every.unwrap_or(match self.equation {
            EquationKind::Poisson => 1,
            EquationKind::KleinGordon3d | EquationKind::KleinGordon4d => 100,
        });
        TrainingConfig::new()
            .with_equation(self.equation)
            .with_model(self.model)
            .with_mlp(self.mlp)
            .with_dim(self.dim)
            .with_features(self.features)
            .with_n_layers(self.n_layers)
            .with_rank(self.rank)
            .with_lr(self.lr)
            .with_epochs(self.epochs)
            .with_seed(self.seed)
            .with_nc(self.nc)
            .with_nc_test(self.nc_test)
            .with_n_f(self.n_f)
            .with_n_test(self.n_test)
            .with_radius(self.radius)
            .with_k(self.k)
            .with_method(self.method)
            .with_batch_size(self.batch_size)
            .with_schedule(self.schedule)
            .with_resample_every(resample_every)
            .with_log_every(self.log_every)
            .with_plot_every(self.plot_every)
    }
}
