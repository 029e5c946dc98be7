use crate::config::{ModelKind, TrainingConfig};
use crate::data::Batch;
use crate::equation::{Problem, Slice};
use crate::error::{PinnError, Result};
use crate::metrics::{evaluate, predict_host};
use crate::model::PdeNet;
use crate::pinn::{DimensionSampler, total_loss};
use crate::plot::{plot_loss_history, plot_solution};
use crate::report::{
    CsvLog, HISTORY_FILENAME, HistoryRow, LOG_FILENAME, LogRow, SUMMARY_FILENAME, TrainingSummary,
    write_csv, write_summary,
};
use crate::{CONFIG_FILENAME, LOSS_PLOT_FILENAME, PARAMS_FILENAME, SOLUTION_PLOT_FILENAME};
use burn::backend::{Autodiff, NdArray};
use burn::config::Config;
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::Backend;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::ElementConversion;
use burn::tensor::backend::AutodiffBackend;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

type MyBackend = Autodiff<NdArray<f32>>;

/// 解の断面を描くときの各軸の点数
const PLOT_RESOLUTION: usize = 50;

/// 結果ディレクトリ `<root>/<equation>/<model>/<run_name>`。
pub fn result_dir(root: &Path, config: &TrainingConfig) -> PathBuf {
    root.join(config.equation.name())
        .join(config.model.name())
        .join(config.run_name())
}

/// `train`サブコマンドを実行します。
///
/// 設定に応じたネットワークを作り、CPU (NdArray) 上で学習して結果を`out_dir`に保存します。
pub fn run(config: &TrainingConfig, out_dir: &Path) -> Result<TrainingSummary> {
    config.validate()?;
    let device = Default::default();
    MyBackend::seed(config.seed);

    match config.model {
        ModelKind::Pinn => {
            let model = config.pinn_config().init::<MyBackend>(&device);
            train(model, config, out_dir, &device)
        }
        ModelKind::Spinn => {
            let model = config.spinn_config().init::<MyBackend>(&device);
            train(model, config, out_dir, &device)
        }
        ModelKind::SpinnD => {
            let model = config.spinn_d_config().init::<MyBackend>(&device);
            train(model, config, out_dir, &device)
        }
    }
}

/// `epoch`（1始まり）の開始時に学習データを引き直すかどうか。
///
/// 最初のエポックは初期データをそのまま使います。
pub fn resamples_at(epoch: usize, resample_every: usize) -> bool {
    epoch > 1 && resample_every > 0 && epoch % resample_every == 0
}

/// ネットワークの入力次元が問題の座標次元と一致するか確認します。
pub fn check_input_dim<B: Backend, M: PdeNet<B>>(model: &M, problem: &Problem) -> Result<()> {
    if model.input_dim() == problem.input_dim() {
        Ok(())
    } else {
        Err(PinnError::InvalidConfig(format!(
            "ネットワークの入力次元 {} が問題の次元 {} と一致しません",
            model.input_dim(),
            problem.input_dim()
        )))
    }
}

/// 学習ループ本体。
pub fn train<B, M>(
    mut model: M,
    config: &TrainingConfig,
    out_dir: &Path,
    device: &B::Device,
) -> Result<TrainingSummary>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + PdeNet<B>,
    M::InnerModule: PdeNet<B::InnerBackend>,
{
    fs::create_dir_all(out_dir)?;
    config.save(out_dir.join(CONFIG_FILENAME))?;

    // --- データセットの準備 ---
    let mut rng = StdRng::seed_from_u64(config.seed);
    let problem = Problem::from_config(config, &mut rng);
    let test_set = problem.test_set(config, &mut rng);
    let test_batch = test_set.to_device::<B::InnerBackend>(device);
    let slice = problem.slice(PLOT_RESOLUTION);
    let slice_batch = slice.samples.to_device::<B::InnerBackend>(device);
    check_input_dim(&model, &problem)?;
    let mut batch = problem.sample_train(config, &mut rng).to_device::<B>(device);
    let sampler = DimensionSampler::new(config.method, config.batch_size);

    let num_params = model.num_params();
    info!(
        "問題: {}, モデル: {}, パラメータ数: {}, テスト点数: {}",
        config.equation.name(),
        config.model.name(),
        num_params,
        test_set.values.len()
    );

    // --- オプティマイザの初期化 ---
    let mut optim = AdamConfig::new().init();

    let mut log = CsvLog::create(&out_dir.join(LOG_FILENAME))?;
    let initial = evaluate(&model.valid(), &test_batch, &test_set.values)?;
    info!("初期化: l2: {:e}, l1: {:e}", initial.l2, initial.l1);
    let mut history = vec![HistoryRow {
        epoch: 0,
        loss: f64::NAN,
        l2: initial.l2,
        l1: initial.l1,
    }];
    let mut epochs_hist = Vec::new();
    let mut total_loss_hist = Vec::new();
    let mut phys_loss_hist = Vec::new();

    let mut best_loss = f64::INFINITY;
    let mut best_l2 = initial.l2;
    let mut last_loss = f64::NAN;
    let mut last_metrics = initial;

    let training_start = Instant::now();
    let mut timed_start = None;

    info!("学習を開始します - バックエンド: NdArray (CPU)");

    // --- 学習ループ ---
    for epoch in 1..=config.epochs {
        if epoch == 2 {
            // 初回のエポックは計測から除きます
            timed_start = Some(Instant::now());
        }
        if resamples_at(epoch, config.resample_every) {
            batch = problem.sample_train(config, &mut rng).to_device::<B>(device);
            debug!("エポック{epoch}: 学習データを再サンプリングしました");
        }

        let losses = total_loss(&model, &problem, &batch, &sampler, &mut rng);
        let loss_val = losses.total.clone().into_scalar().elem::<f64>();
        let residual_val = losses.residual.clone().into_scalar().elem::<f64>();
        last_loss = loss_val;
        if !loss_val.is_finite() {
            warn!("エポック{epoch}: 損失が有限値ではありません ({loss_val})");
        }

        let lr = config.schedule.learning_rate(config.lr, epoch - 1, config.epochs);
        let grads = losses.total.backward();
        let grads = GradientsParams::from_grads(grads, &model);
        model = optim.step(lr, model, grads);

        if epoch % 10 == 0 && loss_val < best_loss {
            best_loss = loss_val;
            best_l2 = evaluate(&model.valid(), &test_batch, &test_set.values)?.l2;
        }

        if epoch % config.log_every == 0 || epoch == config.epochs {
            let metrics = evaluate(&model.valid(), &test_batch, &test_set.values)?;
            last_metrics = metrics;
            info!(
                "[Epoch {}/{}] total loss: {:.8}, l2: {:.8}, l1: {:.8}, best l2: {:.8}",
                epoch, config.epochs, loss_val, metrics.l2, metrics.l1, best_l2
            );
            log.write(&LogRow {
                epoch,
                loss: loss_val,
                residual: residual_val,
                initial: losses.initial.into_scalar().elem::<f64>(),
                boundary: losses.boundary.into_scalar().elem::<f64>(),
                lr,
                l2: metrics.l2,
                l1: metrics.l1,
                best_l2,
            })?;
            history.push(HistoryRow {
                epoch,
                loss: loss_val,
                l2: metrics.l2,
                l1: metrics.l1,
            });
            epochs_hist.push(epoch);
            total_loss_hist.push(loss_val);
            phys_loss_hist.push(residual_val);
        }

        if config.plot_every > 0 && epoch % config.plot_every == 0 {
            let path = out_dir.join(format!("solution_{epoch}.png"));
            save_solution_plot(&model.valid(), &slice, &slice_batch, &path, epoch)?;
        }
    }

    let runtime = timed_start.unwrap_or(training_start).elapsed().as_secs_f64();
    let timed_epochs = config.epochs.saturating_sub(1).max(1);
    let ms_per_iter = runtime / timed_epochs as f64 * 1000.0;
    info!("学習が完了しました。");
    info!("=> 学習時間: {:.2}秒 ({:.2}ms/iter)", runtime, ms_per_iter);

    // --- 結果の保存と描画 ---
    write_csv(&out_dir.join(HISTORY_FILENAME), &history)?;
    match plot_loss_history(
        &out_dir.join(LOSS_PLOT_FILENAME),
        &epochs_hist,
        &total_loss_hist,
        &phys_loss_hist,
    ) {
        Ok(()) => info!("=> 損失グラフを '{}' に保存しました。", LOSS_PLOT_FILENAME),
        Err(e) => warn!("損失グラフを保存できませんでした: {e}"),
    }
    save_solution_plot(
        &model.valid(),
        &slice,
        &slice_batch,
        &out_dir.join(SOLUTION_PLOT_FILENAME),
        config.epochs,
    )?;

    info!("学習済みモデルを保存中...");
    model.save_file(
        out_dir.join(PARAMS_FILENAME),
        &NamedMpkFileRecorder::<FullPrecisionSettings>::new(),
    )?;
    info!("=> モデルを '{}' に保存しました。", out_dir.join(PARAMS_FILENAME).display());

    let summary = TrainingSummary {
        equation: config.equation.name().to_string(),
        model: config.model.name().to_string(),
        num_params,
        epochs: config.epochs,
        final_loss: last_loss,
        final_l2: last_metrics.l2,
        final_l1: last_metrics.l1,
        best_l2,
        runtime_secs: runtime,
        ms_per_iter,
    };
    write_summary(&out_dir.join(SUMMARY_FILENAME), &summary)?;
    Ok(summary)
}

fn save_solution_plot<B: Backend, M: PdeNet<B>>(
    model: &M,
    slice: &Slice,
    slice_batch: &Batch<B>,
    path: &Path,
    epoch: usize,
) -> Result<()> {
    let pred = predict_host(model, slice_batch)?;
    // 描画の失敗（フォントが無い環境など）では学習を止めません
    match plot_solution(path, slice, &pred, &format!("epoch {epoch}")) {
        Ok(()) => debug!("解の断面を '{}' に保存しました。", path.display()),
        Err(e) => warn!("解の断面を保存できませんでした: {e}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equation::KleinGordon;
    use crate::model::MlpConfig;

    #[test]
    fn resampling_happens_on_multiples_only() {
        let epochs: Vec<usize> = (1..=12).filter(|&e| resamples_at(e, 4)).collect();
        assert_eq!(epochs, vec![4, 8, 12]);
        let every: Vec<usize> = (1..=4).filter(|&e| resamples_at(e, 1)).collect();
        assert_eq!(every, vec![2, 3, 4]);
    }

    #[test]
    fn mismatched_network_is_rejected() {
        let device = Default::default();
        let problem = Problem::KleinGordon(KleinGordon { spatial: 3, k: 2.0 });
        let wrong = MlpConfig::new(3, 1).init::<NdArray<f32>>(&device);
        assert!(matches!(
            check_input_dim(&wrong, &problem),
            Err(PinnError::InvalidConfig(_))
        ));
        let right = MlpConfig::new(4, 1).init::<NdArray<f32>>(&device);
        assert!(check_input_dim(&right, &problem).is_ok());
    }
}
