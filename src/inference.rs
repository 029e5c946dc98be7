use crate::config::{ModelKind, TrainingConfig};
use crate::equation::Problem;
use crate::error::{PinnError, Result};
use crate::metrics::{ErrorMetrics, evaluate};
use crate::model::PdeNet;
use crate::training::check_input_dim;
use crate::{CONFIG_FILENAME, PARAMS_FILENAME};
use burn::backend::NdArray;
use burn::config::Config;
use burn::module::Module;
use burn::prelude::Backend;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::info;

type MyBackend = NdArray<f32>;

/// 保存済みモデルの評価結果。
#[derive(Debug, Clone)]
pub struct EvalReport {
    pub config: TrainingConfig,
    pub metrics: ErrorMetrics,
    pub n_test: usize,
    pub elapsed: Duration,
}

fn require(path: PathBuf) -> Result<PathBuf> {
    if path.exists() {
        Ok(path)
    } else {
        Err(PinnError::MissingArtifact { path })
    }
}

/// `eval`サブコマンドを実行します。
///
/// 結果ディレクトリから設定とパラメータを読み込み、学習時と同じシードで
/// テストデータを再生成して誤差を計算します。
pub fn run(dir: &Path) -> Result<EvalReport> {
    let config_path = require(dir.join(CONFIG_FILENAME))?;
    let params_path = require(dir.join(PARAMS_FILENAME))?;
    let config = TrainingConfig::load(&config_path)?;
    config.validate()?;

    let device = Default::default();
    info!("推論を実行します - バックエンド: NdArray (CPU)");
    info!("保存済みモデルを '{}' からロード中...", params_path.display());
    let start = Instant::now();
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    let (metrics, n_test) = match config.model {
        ModelKind::Pinn => {
            let model = config
                .pinn_config()
                .init::<MyBackend>(&device)
                .load_file(&params_path, &recorder, &device)?;
            evaluate_on_test_set(&model, &config, &device)?
        }
        ModelKind::Spinn => {
            let model = config
                .spinn_config()
                .init::<MyBackend>(&device)
                .load_file(&params_path, &recorder, &device)?;
            evaluate_on_test_set(&model, &config, &device)?
        }
        ModelKind::SpinnD => {
            let model = config
                .spinn_d_config()
                .init::<MyBackend>(&device)
                .load_file(&params_path, &recorder, &device)?;
            evaluate_on_test_set(&model, &config, &device)?
        }
    };
    let elapsed = start.elapsed();

    info!(
        "推論が完了しました。テスト点数: {}, l2: {:.8}, l1: {:.8}",
        n_test, metrics.l2, metrics.l1
    );
    info!("=> 推論時間: {:.2?}", elapsed);

    Ok(EvalReport {
        config,
        metrics,
        n_test,
        elapsed,
    })
}

/// 学習時と同じ乱数列でテストデータを作り直して評価します。
pub fn evaluate_on_test_set<B: Backend, M: PdeNet<B>>(
    model: &M,
    config: &TrainingConfig,
    device: &B::Device,
) -> Result<(ErrorMetrics, usize)> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let problem = Problem::from_config(config, &mut rng);
    check_input_dim(model, &problem)?;
    let test_set = problem.test_set(config, &mut rng);
    let test_batch = test_set.to_device::<B>(device);
    let metrics = evaluate(model, &test_batch, &test_set.values)?;
    Ok((metrics, test_set.values.len()))
}
