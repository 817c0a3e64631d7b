use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// clapでコマンドラインの構造を定義します。
#[derive(Parser, Debug)]
#[command(author, version, about = "A Physics-Informed Neural Network (PINN) for the flow around a cylinder with Burn", long_about = None)]
pub struct Cli {
    /// ログの詳細度 (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// モデルや結果を保存するディレクトリ
    #[arg(long, default_value = "artifacts", global = true)]
    pub artifact_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

/// 実行するサブコマンドを定義します。
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// PINNモデルを学習し、結果をファイルに保存します
    ///
    /// 方程式点は毎エポック `solver.eq_batch_size` 点だけ無作為に使います。
    /// `null` を指定すると全点を使いますが、既定の点数ではメモリを大きく消費します。
    Train {
        /// 設定ファイル (JSON)。省略時は既定の設定を使用します
        #[arg(long)]
        config: Option<PathBuf>,
        /// 設定ファイルのエポック数を上書きします
        #[arg(long)]
        epochs: Option<usize>,
    },
    /// 保存されたPINNモデルを使い、最終時刻の結果をVTKファイルに書き出します
    Infer {
        /// 最終時刻の流速 (u v) を1行ずつ並べた参照解ファイル
        #[arg(long)]
        reference: Option<PathBuf>,
    },
    /// 既定の設定をJSONで出力します
    Config {
        /// 出力先。省略時は標準出力に書き出します
        #[arg(long)]
        output: Option<PathBuf>,
    },
}
