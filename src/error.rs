use burn::record::RecorderError;
use thiserror::Error;

/// ライブラリ全体で使用するエラー型。
#[derive(Debug, Error)]
pub enum PinnError {
    /// 設定値が不正
    #[error("設定が不正です: {0}")]
    InvalidConfig(String),

    /// 学習済みモデルが存在しない
    #[error("モデルファイル '{0}' が見つかりません。最初に 'train' コマンドでモデルを学習・保存してください。")]
    ModelNotFound(String),

    #[error("入出力エラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSONの処理に失敗しました: {0}")]
    Json(#[from] serde_json::Error),

    /// モデルの保存・読み込みに失敗
    #[error("モデルレコードの処理に失敗しました: {0}")]
    Recorder(#[from] RecorderError),

    /// テンソルからのデータ取り出しに失敗
    #[error("テンソルデータの変換に失敗しました: {0}")]
    Tensor(String),

    #[error("結果の書き出しに失敗しました: {0}")]
    Export(String),

    /// 参照解との比較に失敗
    #[error("参照データが不正です: {0}")]
    Reference(String),
}

pub type Result<T> = std::result::Result<T, PinnError>;
