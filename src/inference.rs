use crate::config::ExperimentConfig;
use crate::error::{PinnError, Result};
use crate::loss::rows_to_tensor;
use crate::model::FcNet;
use crate::reference::{VelocityError, load_reference, velocity_mse};
use crate::vtk::save_vtk_points;
use crate::{CONFIG_FILENAME, MODEL_FILENAME, RESULT_FILENAME};
use burn::backend::NdArray;
use burn::module::Module;
use burn::prelude::Backend;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use std::path::{Path, PathBuf};
use std::time::Instant;

pub type InferBackend = NdArray<f32>;

/// 一度に順伝播する点の数
const EVAL_CHUNK: usize = 8192;

/// 推論結果。
#[derive(Debug, Clone)]
pub struct InferenceOutput {
    pub result_path: PathBuf,
    /// 最終時刻の各点における (u, v, p)
    pub last_moment: Vec<[f32; 3]>,
    pub reference_error: Option<VelocityError>,
}

fn existing_model_path(artifact_dir: &Path) -> Result<PathBuf> {
    let model_path = artifact_dir.join(MODEL_FILENAME);
    if !model_path.exists() {
        return Err(PinnError::ModelNotFound(model_path.display().to_string()));
    }
    Ok(model_path)
}

/// 保存済みのモデルを読み込みます。
pub fn load_model<B: Backend>(
    config: &ExperimentConfig,
    artifact_dir: &Path,
    device: &B::Device,
) -> Result<FcNet<B>> {
    let model_path = existing_model_path(artifact_dir)?;
    tracing::info!(path = %model_path.display(), "保存済みモデルをロード中");
    let model = config.model.init::<B>(device).load_file(
        model_path,
        &NamedMpkFileRecorder::<FullPrecisionSettings>::new(),
        device,
    )?;
    Ok(model)
}

/// 全点でネットワークを評価し、各点の (u, v, p) を返します。
pub fn solution<B: Backend>(
    model: &FcNet<B>,
    points: &[[f32; 3]],
    device: &B::Device,
) -> Result<Vec<[f32; 3]>> {
    let mut values = Vec::with_capacity(points.len());
    for chunk in points.chunks(EVAL_CHUNK) {
        let output = model.forward(rows_to_tensor(chunk, device));
        let flat = output
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| PinnError::Tensor(format!("{:?}", e)))?;
        values.extend(flat.chunks_exact(3).map(|c| [c[0], c[1], c[2]]));
    }
    Ok(values)
}

/// `infer`サブコマンドを実行します。
///
/// 学習時の設定から点群を再構築し、最終時刻の結果をVTKファイルに書き出します。
/// `reference` を指定した場合は最終時刻の流速を参照解と比較します。
pub fn run<B: Backend>(
    artifact_dir: &Path,
    reference: Option<&Path>,
    device: &B::Device,
) -> Result<InferenceOutput> {
    existing_model_path(artifact_dir)?;
    let config = ExperimentConfig::load(artifact_dir.join(CONFIG_FILENAME))?;

    let inference_start = Instant::now();
    let model = load_model::<B>(&config, artifact_dir, device)?;
    let geo = config.discretize()?;

    let rslt = solution(&model, &geo.points, device)?;
    let last_moment = rslt[rslt.len() - geo.space_domain_size..].to_vec();
    tracing::info!(
        domain_size = geo.domain_size(),
        space_domain_size = geo.space_domain_size,
        duration = ?inference_start.elapsed(),
        "推論が完了しました"
    );

    let result_path = save_vtk_points(
        artifact_dir.join(RESULT_FILENAME),
        geo.last_slice(),
        &last_moment,
    )?;
    tracing::info!(path = %result_path.display(), "結果を保存しました");

    let reference_error = match reference {
        Some(path) => {
            let rows = load_reference(path)?;
            let error = velocity_mse(&last_moment, &rows)?;
            tracing::info!(mse_u = error.mse_u, mse_v = error.mse_v, "参照解との誤差");
            Some(error)
        }
        None => None,
    };

    Ok(InferenceOutput {
        result_path,
        last_moment,
        reference_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FcNetConfig;

    #[test]
    fn solution_spans_chunks_in_order() {
        let device = Default::default();
        let model = FcNetConfig {
            num_layers: 2,
            hidden_size: 4,
            ..Default::default()
        }
        .init::<InferBackend>(&device);
        let points: Vec<[f32; 3]> = (0..EVAL_CHUNK + 5)
            .map(|i| [0.0, i as f32 * 1e-4, 0.0])
            .collect();

        let values = solution(&model, &points, &device).unwrap();
        assert_eq!(values.len(), points.len());

        let single = solution(&model, &points[EVAL_CHUNK + 2..EVAL_CHUNK + 3], &device).unwrap();
        for (a, b) in values[EVAL_CHUNK + 2].iter().zip(&single[0]) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn missing_model_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = run::<InferBackend>(dir.path(), None, &Default::default()).unwrap_err();
        assert!(matches!(err, PinnError::ModelNotFound(_)));
    }
}
