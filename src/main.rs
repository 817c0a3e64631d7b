//! # 円柱周り流れの物理情報ニューラルネットワーク (PINN)
//!
//! `burn` フレームワークを使用して、円柱周りの2次元非定常 Navier-Stokes 流れを
//! 物理情報ニューラルネットワーク（PINN）で近似します。
//!
//! ## 使い方
//!
//! ### 学習
//! ```bash
//! cargo run --release -- train --config config.json
//! ```
//!
//! ### 推論（最終時刻の結果を `artifacts/result.vtk` に出力）
//! ```bash
//! cargo run --release -- infer
//! ```
//!
//! ### 既定の設定の出力
//! ```bash
//! cargo run --release -- config --output config.json
//! ```

use anyhow::Context;
use clap::Parser;
use cylinder_pinn::ExperimentConfig;
use cylinder_pinn::cli::{Cli, Commands};
use cylinder_pinn::inference::{self, InferBackend};
use cylinder_pinn::training::{self, TrainBackend};
use tracing_subscriber::{EnvFilter, fmt};

/// プログラムのエントリーポイント。
///
/// コマンドライン引数を解析し、各サブコマンドの処理に振り分けます。
fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Train { config, epochs } => {
            let mut experiment = match &config {
                Some(path) => ExperimentConfig::load(path)
                    .with_context(|| format!("設定ファイル '{}' を読み込めません", path.display()))?,
                None => ExperimentConfig::default(),
            };
            if let Some(epochs) = epochs {
                experiment.solver.num_epoch = epochs;
            }
            let device = Default::default();
            let report = training::run::<TrainBackend>(&experiment, &cli.artifact_dir, &device)
                .context("学習に失敗しました")?;
            if let Some(last) = report.final_loss() {
                println!("=> 最終損失: {:.6} (エポック {})", last.total, last.epoch);
            }
            println!("=> 学習時間: {:.2}秒", report.duration_secs);
        }
        Commands::Infer { reference } => {
            let device = Default::default();
            let output =
                inference::run::<InferBackend>(&cli.artifact_dir, reference.as_deref(), &device)
                    .context("推論に失敗しました")?;
            println!("=> 結果を '{}' に保存しました。", output.result_path.display());
            if let Some(error) = output.reference_error {
                println!("MSE_u: {}", error.mse_u);
                println!("MSE_v: {}", error.mse_v);
            }
        }
        Commands::Config { output } => {
            let experiment = ExperimentConfig::default();
            match output {
                Some(path) => {
                    experiment.save(&path)?;
                    println!("=> 既定の設定を '{}' に保存しました。", path.display());
                }
                None => println!("{}", experiment.to_json()?),
            }
        }
    }

    Ok(())
}
