//! # 円柱周り流れの物理情報ニューラルネットワーク (PINN) ライブラリ
//!
//! `burn` フレームワークを使用して、物理情報ニューラルネットワーク（PINN）を構築し、
//! 矩形チャネル内に置かれた円柱周りの2次元非定常 Navier-Stokes 流れ (Re=100) を
//! 近似するための主要なコンポーネントを提供します。

pub mod cli;
pub mod conditions;
pub mod config;
pub mod error;
pub mod geometry;
pub mod inference;
pub mod loss;
pub mod model;
pub mod pde;
pub mod reference;
pub mod training;
pub mod vtk;

pub use config::ExperimentConfig;
pub use error::{PinnError, Result};

/// モデルを保存するファイル名
pub const MODEL_FILENAME: &str = "pinn_model.mpk";
/// 学習時の設定を保存するファイル名
pub const CONFIG_FILENAME: &str = "config.json";
pub const LOSS_HISTORY_FILENAME: &str = "loss_history.json";
pub const LOSS_GRAPH_FILENAME: &str = "loss_graph.png";
/// 最終時刻の結果を書き出すファイル名（拡張子 `.vtk` は自動で付与）
pub const RESULT_FILENAME: &str = "result";
