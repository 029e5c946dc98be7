//! # 分離型 物理情報ニューラルネットワーク (SPINN) ライブラリ
//!
//! `burn` フレームワークを使用して、高次元のポアソン方程式とクライン-ゴルドン方程式を
//! PINN・SPINNで解くための主要なコンポーネントを提供します。
//!
//! 2階微分は前進モードのテイラー展開 ([`jet::Jet`]) で計算するため、
//! パラメータに関する逆伝播は`Autodiff`バックエンドにそのまま任せられます。

pub mod cli;
pub mod config;
pub mod data;
pub mod equation;
pub mod error;
pub mod inference;
pub mod jet;
pub mod metrics;
pub mod model;
pub mod pinn;
pub mod plot;
pub mod report;
pub mod spinn;
pub mod spinn_d;
pub mod training;

/// 学習済みパラメータのファイル名
pub const PARAMS_FILENAME: &str = "params.mpk";
/// 学習設定のファイル名
pub const CONFIG_FILENAME: &str = "config.json";
pub const LOSS_PLOT_FILENAME: &str = "loss.png";
pub const SOLUTION_PLOT_FILENAME: &str = "solution.png";
