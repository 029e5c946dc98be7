use std::path::PathBuf;
use thiserror::Error;

/// このクレート全体で使う`Result`の別名です。
pub type Result<T> = std::result::Result<T, PinnError>;

/// 学習・推論・入出力で発生するエラー。
#[derive(Debug, Error)]
pub enum PinnError {
    /// コマンドライン引数や設定値の組み合わせが不正です。
    #[error("設定が不正です: {0}")]
    InvalidConfig(String),

    /// 推論に必要なファイルが見つかりません。
    #[error("ファイル '{path}' が見つかりません。最初に 'train' コマンドで学習してください。")]
    MissingArtifact { path: PathBuf },

    #[error("入出力エラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSVエラー: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSONエラー: {0}")]
    Json(#[from] serde_json::Error),

    /// モデルの保存・読み込みに失敗しました。
    #[error("レコーダーエラー: {0}")]
    Record(#[from] burn::record::RecorderError),

    /// テンソルからホスト側の配列への変換に失敗しました。
    #[error("テンソルデータの変換に失敗しました: {0}")]
    TensorData(String),

    /// グラフ描画に失敗しました。
    #[error("描画エラー: {0}")]
    Plot(String),
}

impl From<burn::tensor::DataError> for PinnError {
    fn from(err: burn::tensor::DataError) -> Self {
        PinnError::TensorData(format!("{err:?}"))
    }
}

impl From<burn::config::ConfigError> for PinnError {
    fn from(err: burn::config::ConfigError) -> Self {
        PinnError::InvalidConfig(format!("{err:?}"))
    }
}
