use spinn::config::{EquationKind, MlpKind, ModelKind, ResidualMethod, Schedule, TrainingConfig};
use spinn::error::PinnError;
use spinn::report::{HISTORY_FILENAME, LOG_FILENAME, SUMMARY_FILENAME};
use spinn::{
    CONFIG_FILENAME, LOSS_PLOT_FILENAME, PARAMS_FILENAME, SOLUTION_PLOT_FILENAME, inference,
    training,
};
use std::path::Path;

fn small_poisson() -> TrainingConfig {
    TrainingConfig::new()
        .with_equation(EquationKind::Poisson)
        .with_dim(3)
        .with_features(8)
        .with_n_layers(2)
        .with_n_f(32)
        .with_n_test(64)
        .with_epochs(3)
        .with_log_every(1)
}

fn small_klein_gordon(model: ModelKind) -> TrainingConfig {
    TrainingConfig::new()
        .with_equation(EquationKind::KleinGordon3d)
        .with_model(model)
        .with_features(8)
        .with_n_layers(2)
        .with_rank(4)
        .with_nc(4)
        .with_nc_test(4)
        .with_epochs(2)
        .with_log_every(1)
        .with_resample_every(100)
}

fn assert_artifacts(dir: &Path) {
    for name in [
        CONFIG_FILENAME,
        PARAMS_FILENAME,
        LOG_FILENAME,
        HISTORY_FILENAME,
        SUMMARY_FILENAME,
        LOSS_PLOT_FILENAME,
        SOLUTION_PLOT_FILENAME,
    ] {
        assert!(dir.join(name).exists(), "{name} was not written");
    }
}

#[test]
fn poisson_pinn_trains_and_evaluates() {
    let root = tempfile::tempdir().unwrap();
    let config = small_poisson();
    let dir = training::result_dir(root.path(), &config);
    let summary = training::run(&config, &dir).unwrap();

    assert_artifacts(&dir);
    assert_eq!(summary.epochs, 3);
    assert!(summary.final_loss.is_finite());
    assert!(summary.final_l2.is_finite() && summary.final_l2 > 0.0);
    assert!(summary.best_l2.is_finite());

    let history = std::fs::read_to_string(dir.join(HISTORY_FILENAME)).unwrap();
    // ヘッダ + 初期評価 + 3エポック
    assert_eq!(history.lines().count(), 5);

    let report = inference::run(&dir).unwrap();
    assert_eq!(report.n_test, 64);
    assert!((report.metrics.l2 - summary.final_l2).abs() <= 1e-5 * summary.final_l2.max(1.0));
    assert!((report.metrics.l1 - summary.final_l1).abs() <= 1e-5 * summary.final_l1.max(1.0));
}

#[test]
fn klein_gordon_models_train_and_reload() {
    for model in [ModelKind::Pinn, ModelKind::Spinn, ModelKind::SpinnD] {
        let root = tempfile::tempdir().unwrap();
        let config = small_klein_gordon(model);
        let dir = training::result_dir(root.path(), &config);
        let summary = training::run(&config, &dir).unwrap();
        assert_artifacts(&dir);
        assert!(summary.final_loss.is_finite(), "{model:?}");
        assert!(summary.num_params > 0);

        let report = inference::run(&dir).unwrap();
        assert_eq!(report.n_test, 4usize.pow(3));
        assert_eq!(report.config.model, model);
        assert!(
            (report.metrics.l2 - summary.final_l2).abs() <= 1e-5 * summary.final_l2.max(1.0),
            "{model:?}: {} vs {}",
            report.metrics.l2,
            summary.final_l2
        );
    }
}

/// 結果のCSVから指定した列を取り出します。
fn csv_column(path: &Path, name: &str) -> Vec<f64> {
    let text = std::fs::read_to_string(path).unwrap();
    let mut lines = text.lines();
    let header: Vec<&str> = lines.next().unwrap().split(',').collect();
    let index = header.iter().position(|h| *h == name).unwrap();
    lines
        .map(|line| line.split(',').nth(index).unwrap().parse().unwrap())
        .collect()
}

#[test]
fn poisson_separable_models_train_with_sdgd() {
    for model in [ModelKind::Spinn, ModelKind::SpinnD] {
        let root = tempfile::tempdir().unwrap();
        let config = small_poisson()
            .with_model(model)
            .with_dim(6)
            .with_rank(4)
            .with_method(ResidualMethod::Sdgd)
            .with_batch_size(2);
        let dir = training::result_dir(root.path(), &config);
        let summary = training::run(&config, &dir).unwrap();
        assert_artifacts(&dir);
        assert!(summary.final_loss.is_finite(), "{model:?}");
        assert!(summary.final_l2.is_finite(), "{model:?}");

        let report = inference::run(&dir).unwrap();
        assert_eq!(report.n_test, 64);
        assert_eq!(report.config.dim, 6);
        assert!(
            (report.metrics.l2 - summary.final_l2).abs() <= 1e-5 * summary.final_l2.max(1.0),
            "{model:?}: {} vs {}",
            report.metrics.l2,
            summary.final_l2
        );
    }
}

#[test]
fn klein_gordon4d_modified_spinn_plots_every_epoch() {
    let root = tempfile::tempdir().unwrap();
    let config = TrainingConfig::new()
        .with_equation(EquationKind::KleinGordon4d)
        .with_model(ModelKind::Spinn)
        .with_mlp(MlpKind::Modified)
        .with_features(8)
        .with_n_layers(3)
        .with_rank(4)
        .with_nc(3)
        .with_nc_test(3)
        .with_batch_size(2)
        .with_epochs(2)
        .with_log_every(1)
        .with_plot_every(1)
        .with_resample_every(100);
    let dir = training::result_dir(root.path(), &config);
    let summary = training::run(&config, &dir).unwrap();
    assert_artifacts(&dir);
    assert!(summary.final_loss.is_finite());
    for epoch in [1, 2] {
        let path = dir.join(format!("solution_{epoch}.png"));
        assert!(path.exists(), "{} was not written", path.display());
    }

    let report = inference::run(&dir).unwrap();
    assert_eq!(report.n_test, 3usize.pow(4));
}

#[test]
fn linear_schedule_reaches_the_optimizer() {
    let root = tempfile::tempdir().unwrap();
    let config = small_poisson()
        .with_lr(1e-2)
        .with_epochs(4)
        .with_schedule(Schedule::Linear);
    let dir = root.path().join("linear");
    training::run(&config, &dir).unwrap();
    let lrs = csv_column(&dir.join(LOG_FILENAME), "lr");
    let expected = [1e-2, 7.5e-3, 5e-3, 2.5e-3];
    assert_eq!(lrs.len(), expected.len());
    for (lr, want) in lrs.iter().zip(expected) {
        assert!((lr - want).abs() < 1e-12, "{lr} vs {want}");
    }

    let dir = root.path().join("constant");
    training::run(&config.with_schedule(Schedule::Constant), &dir).unwrap();
    let lrs = csv_column(&dir.join(LOG_FILENAME), "lr");
    assert!(lrs.iter().all(|&lr| lr == 1e-2));
}

#[test]
fn result_dir_encodes_equation_and_model() {
    let config = small_klein_gordon(ModelKind::Spinn);
    let dir = training::result_dir(Path::new("results"), &config);
    assert!(dir.starts_with("results/klein_gordon3d/spinn"));
    assert!(dir.ends_with(config.run_name()));
}

#[test]
fn invalid_config_is_rejected_before_training() {
    let root = tempfile::tempdir().unwrap();
    let config = small_klein_gordon(ModelKind::Spinn).with_batch_size(5);
    let dir = root.path().join("never");
    assert!(matches!(
        training::run(&config, &dir),
        Err(PinnError::InvalidConfig(_))
    ));
    assert!(!dir.exists());
}

#[test]
fn loss_decreases_on_fixed_batch() {
    let root = tempfile::tempdir().unwrap();
    let config = small_poisson()
        .with_features(16)
        .with_n_f(128)
        .with_lr(1e-2)
        .with_epochs(60)
        .with_resample_every(1000)
        .with_method(ResidualMethod::Full)
        .with_schedule(Schedule::Constant);
    let dir = root.path().join("run");
    training::run(&config, &dir).unwrap();

    let history = std::fs::read_to_string(dir.join(HISTORY_FILENAME)).unwrap();
    let losses: Vec<f64> = history
        .lines()
        .skip(2)
        .map(|line| line.split(',').nth(1).unwrap().parse().unwrap())
        .collect();
    assert_eq!(losses.len(), 60);
    assert!(
        losses[losses.len() - 1] < losses[0],
        "loss did not decrease: {} -> {}",
        losses[0],
        losses[losses.len() - 1]
    );
}
