//! 学習ログ・履歴・サマリーのファイル出力。

use crate::error::Result;
use csv::Writer;
use serde::Serialize;
use std::fs::File;
use std::path::Path;

/// ログのCSVファイル名
pub const LOG_FILENAME: &str = "log.csv";
/// 評価ごとの履歴のCSVファイル名
pub const HISTORY_FILENAME: &str = "history.csv";
pub const SUMMARY_FILENAME: &str = "summary.json";

/// `log_every`エポックごとに書き出す1行。
#[derive(Debug, Clone, Serialize)]
pub struct LogRow {
    pub epoch: usize,
    pub loss: f64,
    pub residual: f64,
    pub initial: f64,
    pub boundary: f64,
    /// このエポックの更新で使った学習率
    pub lr: f64,
    pub l2: f64,
    pub l1: f64,
    pub best_l2: f64,
}

/// 損失と誤差の推移。エポック0は初期化直後の評価です。
#[derive(Debug, Clone, Serialize)]
pub struct HistoryRow {
    pub epoch: usize,
    pub loss: f64,
    pub l2: f64,
    pub l1: f64,
}

/// 学習終了時のサマリー。
#[derive(Debug, Clone, Serialize)]
pub struct TrainingSummary {
    pub equation: String,
    pub model: String,
    pub num_params: usize,
    pub epochs: usize,
    pub final_loss: f64,
    pub final_l2: f64,
    pub final_l1: f64,
    pub best_l2: f64,
    /// 最初のエポックを除いた学習時間（秒）
    pub runtime_secs: f64,
    pub ms_per_iter: f64,
}

/// 1行ずつ追記してフラッシュするCSVロガー。既存のファイルは上書きします。
pub struct CsvLog {
    writer: Writer<File>,
}

impl CsvLog {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self {
            writer: Writer::from_path(path)?,
        })
    }

    pub fn write<T: Serialize>(&mut self, row: &T) -> Result<()> {
        self.writer.serialize(row)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// 行の並びをまとめてCSVに書き出します。
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_summary(path: &Path, summary: &TrainingSummary) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, summary)?;
    Ok(())
}
