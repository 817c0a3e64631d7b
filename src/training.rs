use crate::config::ExperimentConfig;
use crate::conditions::{Conditions, mask_weights};
use crate::error::{PinnError, Result};
use crate::geometry::Discretization;
use crate::loss::{L2Loss, LossTerms, TrainingBatch, rows_to_tensor};
use crate::{CONFIG_FILENAME, LOSS_GRAPH_FILENAME, LOSS_HISTORY_FILENAME, MODEL_FILENAME};
use burn::backend::{Autodiff, NdArray};
use burn::module::Module;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::ElementConversion;
use burn::tensor::backend::AutodiffBackend;
use plotters::prelude::*;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::Path;
use std::time::Instant;

pub type TrainBackend = Autodiff<NdArray<f32>>;

/// 記録したエポックにおける各損失の値。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossRecord {
    pub epoch: usize,
    pub total: f32,
    pub equation: f32,
    pub boundary: f32,
    pub initial: f32,
}

impl LossRecord {
    fn from_terms<B: AutodiffBackend>(epoch: usize, terms: &LossTerms<B>) -> Self {
        let value = |t: &burn::tensor::Tensor<B, 1>| t.clone().into_scalar().elem::<f32>();
        Self {
            epoch,
            total: value(&terms.total),
            equation: value(&terms.equation),
            boundary: value(&terms.boundary),
            initial: value(&terms.initial),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub history: Vec<LossRecord>,
    pub duration_secs: f64,
}

impl TrainingReport {
    pub fn final_loss(&self) -> Option<&LossRecord> {
        self.history.last()
    }
}

/// 境界・初期条件を付与した学習用の点群。
#[derive(Debug, Clone)]
pub struct Problem {
    pub geo: Discretization,
    pub eq_points: Vec<[f32; 3]>,
    pub bc_points: Vec<[f32; 3]>,
    pub bc_values: Vec<[f32; 3]>,
    pub bc_weights: Vec<[f32; 3]>,
    pub ic_points: Vec<[f32; 3]>,
    pub ic_values: Vec<[f32; 3]>,
    pub ic_weights: Vec<[f32; 3]>,
}

impl Problem {
    /// 離散化と境界・初期条件の生成を行います。
    pub fn build(config: &ExperimentConfig) -> Result<Self> {
        config.validate()?;
        let geo = config.discretize()?;
        let conditions = Conditions::new(&config.geometry, config.inlet_velocity, config.bc_weight)
            .with_ic_inlet_velocity(config.ic_inlet_velocity);

        let bc_values = conditions.gen_bc(&geo.points, &geo.bc_index);
        let mut bc_weights = conditions.gen_bc_weight(&geo.points, &geo.bc_index);
        mask_weights(&mut bc_weights, &config.check_dims);

        let ic_values = conditions.gen_ic(&geo.points, &geo.ic_index);
        let mut ic_weights = vec![[config.loss.ic_weight; 3]; ic_values.len()];
        mask_weights(&mut ic_weights, &config.check_dims);

        Ok(Self {
            eq_points: geo.select(&geo.eq_index),
            bc_points: geo.select(&geo.bc_index),
            ic_points: geo.select(&geo.ic_index),
            geo,
            bc_values,
            bc_weights,
            ic_values,
            ic_weights,
        })
    }

    /// 方程式点から `size` 点を重複なく無作為に選びます。
    pub fn sample_eq_points<R: Rng>(&self, size: usize, rng: &mut R) -> Vec<[f32; 3]> {
        let size = size.min(self.eq_points.len());
        index::sample(rng, self.eq_points.len(), size)
            .into_iter()
            .map(|i| self.eq_points[i])
            .collect()
    }

    pub fn to_batch<B: AutodiffBackend>(&self, device: &B::Device) -> TrainingBatch<B> {
        TrainingBatch {
            eq_coords: rows_to_tensor(&self.eq_points, device),
            bc_coords: rows_to_tensor(&self.bc_points, device),
            bc_values: rows_to_tensor(&self.bc_values, device),
            bc_weights: rows_to_tensor(&self.bc_weights, device),
            ic_coords: rows_to_tensor(&self.ic_points, device),
            ic_values: rows_to_tensor(&self.ic_values, device),
            ic_weights: rows_to_tensor(&self.ic_weights, device),
        }
    }
}

/// `train`サブコマンドを実行します。
///
/// 学習済みモデル、設定、損失履歴、損失グラフを `artifact_dir` に保存します。
pub fn run<B: AutodiffBackend>(
    config: &ExperimentConfig,
    artifact_dir: &Path,
    device: &B::Device,
) -> Result<TrainingReport> {
    fs::create_dir_all(artifact_dir)?;
    B::seed(config.seed);

    // --- データセットの準備 ---
    let problem = Problem::build(config)?;
    let mut batch = problem.to_batch::<B>(device);
    let mut rng = StdRng::seed_from_u64(config.seed);
    let eq_batch_size = config
        .solver
        .eq_batch_size
        .filter(|&size| size < problem.eq_points.len());
    tracing::info!(
        reynolds = config.reynolds_number(),
        eq = problem.eq_points.len(),
        eq_batch = eq_batch_size.unwrap_or(problem.eq_points.len()),
        bc = problem.bc_points.len(),
        ic = problem.ic_points.len(),
        "学習データを準備しました"
    );

    // --- モデルとオプティマイザの初期化 ---
    let mut model = config.model.init::<B>(device);
    let mut optim = AdamConfig::new().init();
    let loss = L2Loss::new(config.pde.clone(), config.loss.clone());
    let solver = &config.solver;

    let mut history = Vec::new();
    let training_start = Instant::now();

    tracing::info!(epochs = solver.num_epoch, "学習を開始します (Navier-Stokes, 円柱周り流れ)");

    // --- 学習ループ ---
    for epoch in 1..=solver.num_epoch {
        if let Some(size) = eq_batch_size {
            batch.eq_coords = rows_to_tensor(&problem.sample_eq_points(size, &mut rng), device);
        }
        let terms = loss.compute(&model, &batch);

        if epoch % solver.log_interval == 0 || epoch == solver.num_epoch {
            let record = LossRecord::from_terms(epoch, &terms);
            if !record.total.is_finite() {
                return Err(PinnError::Tensor(format!(
                    "エポック {} で損失が有限値ではなくなりました: {}",
                    epoch, record.total
                )));
            }
            tracing::info!(
                epoch,
                total = record.total,
                equation = record.equation,
                boundary = record.boundary,
                initial = record.initial,
                "損失"
            );
            history.push(record);
        }

        let grads = terms.total.backward();
        let grads = GradientsParams::from_grads(grads, &model);
        model = optim.step(solver.learning_rate, model, grads);
    }
    let training_duration = training_start.elapsed();
    tracing::info!(duration = ?training_duration, "学習が完了しました");

    // --- 結果の保存と描画 ---
    let report = TrainingReport {
        history,
        duration_secs: training_duration.as_secs_f64(),
    };
    config.save(artifact_dir.join(CONFIG_FILENAME))?;
    serde_json::to_writer_pretty(
        File::create(artifact_dir.join(LOSS_HISTORY_FILENAME))?,
        &report,
    )?;

    if solver.plot_loss {
        save_loss_graph(&report.history, &artifact_dir.join(LOSS_GRAPH_FILENAME));
    }

    let model_path = artifact_dir.join(MODEL_FILENAME);
    model.save_file(
        model_path.clone(),
        &NamedMpkFileRecorder::<FullPrecisionSettings>::new(),
    )?;
    tracing::info!(path = %model_path.display(), "モデルを保存しました");

    Ok(report)
}

/// 損失グラフを保存します。描画に失敗した場合は警告を出して `false` を返します。
fn save_loss_graph(history: &[LossRecord], path: &Path) -> bool {
    match plot_loss_history(history, path) {
        Ok(()) => {
            tracing::info!(path = %path.display(), "損失グラフを保存しました");
            true
        }
        Err(e) => {
            tracing::warn!("グラフの描画に失敗しました: {}", e);
            false
        }
    }
}

/// 学習過程の損失をグラフとしてPNGファイルに出力します。
fn plot_loss_history(
    history: &[LossRecord],
    path: &Path,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let log = |v: f32| v.max(f32::MIN_POSITIVE).log10();
    let series: [(&str, RGBColor, fn(&LossRecord) -> f32); 4] = [
        ("Total Loss", RED, |r| r.total),
        ("Equation Loss", BLUE, |r| r.equation),
        ("Boundary Loss", GREEN, |r| r.boundary),
        ("Initial Loss", MAGENTA, |r| r.initial),
    ];

    let logs = history
        .iter()
        .flat_map(|r| series.iter().map(move |(_, _, f)| log(f(r))));
    let (min_log, max_log) = logs.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !min_log.is_finite() || !max_log.is_finite() {
        return Err("損失履歴が空です".into());
    }
    let first_epoch = history.first().map_or(0, |r| r.epoch);
    let last_epoch = history.last().map_or(1, |r| r.epoch).max(first_epoch + 1);

    let root = BitMapBackend::new(path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Loss History", ("sans-serif", 40).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(first_epoch..last_epoch, (min_log - 0.5)..(max_log + 0.5))?;
    chart
        .configure_mesh()
        .y_desc("Loss (log10 scale)")
        .x_desc("Epoch")
        .draw()?;
    for (label, color, value) in series {
        chart
            .draw_series(LineSeries::new(
                history.iter().map(|r| (r.epoch, log(value(r)))),
                &color,
            ))?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }
    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::SamplingConfig;

    fn tiny_config() -> ExperimentConfig {
        let mut config = ExperimentConfig::default();
        config.sampling = SamplingConfig {
            time_nsteps: 3,
            space_point_size: 30,
            space_nsteps: [6, 4],
            cylinder_nsteps: 6,
        };
        config
    }

    #[test]
    fn problem_targets_match_point_sets() {
        let config = tiny_config();
        let problem = Problem::build(&config).unwrap();
        assert_eq!(problem.bc_values.len(), problem.bc_points.len());
        assert_eq!(problem.bc_weights.len(), problem.bc_points.len());
        assert_eq!(problem.ic_values.len(), problem.ic_points.len());
        assert_eq!(problem.ic_weights.len(), problem.ic_points.len());
        assert_eq!(problem.eq_points.len(), 2 * 30);

        // 流入境界の点だけが u = 2.5 を持つ
        for (p, v) in problem.bc_points.iter().zip(&problem.bc_values) {
            let expected = if (p[1] + 0.2).abs() < 1e-4 { 2.5 } else { 0.0 };
            assert_eq!(v[0], expected);
        }
    }

    fn tiny_training_config() -> ExperimentConfig {
        let mut config = tiny_config();
        config.model.num_layers = 3;
        config.model.hidden_size = 8;
        config.solver.num_epoch = 3;
        config.solver.log_interval = 1;
        config
    }

    #[test]
    fn training_writes_loss_graph() {
        let dir = tempfile::tempdir().unwrap();
        let config = tiny_training_config();
        let report = run::<TrainBackend>(&config, dir.path(), &Default::default()).unwrap();
        assert_eq!(report.history.len(), 3);
        assert!(dir.path().join(LOSS_GRAPH_FILENAME).exists());
    }

    #[test]
    fn empty_history_cannot_be_plotted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOSS_GRAPH_FILENAME);
        assert!(plot_loss_history(&[], &path).is_err());
        assert!(!save_loss_graph(&[], &path));
        assert!(!path.exists());
    }

    #[test]
    fn plot_failure_does_not_fail_training() {
        let dir = tempfile::tempdir().unwrap();
        // 書き込み先がディレクトリなのでPNGの出力だけが失敗する
        fs::create_dir(dir.path().join(LOSS_GRAPH_FILENAME)).unwrap();
        let config = tiny_training_config();
        let report = run::<TrainBackend>(&config, dir.path(), &Default::default()).unwrap();
        assert_eq!(report.final_loss().unwrap().epoch, 3);
        assert!(dir.path().join(MODEL_FILENAME).exists());
    }

    #[test]
    fn sampled_eq_points_are_distinct_members() {
        let problem = Problem::build(&tiny_config()).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let sample = problem.sample_eq_points(10, &mut rng);
        assert_eq!(sample.len(), 10);
        for p in &sample {
            assert!(problem.eq_points.contains(p));
        }
        let mut unique = sample.clone();
        unique.sort_by(|a, b| a.partial_cmp(b).unwrap());
        unique.dedup();
        assert_eq!(unique.len(), 10);

        // 全点数を超える指定は全点に切り詰める
        assert_eq!(problem.sample_eq_points(1000, &mut rng).len(), problem.eq_points.len());
    }

    #[test]
    fn mini_batch_training_runs() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = tiny_training_config();
        config.solver.eq_batch_size = Some(16);
        config.solver.plot_loss = false;
        let report = run::<TrainBackend>(&config, dir.path(), &Default::default()).unwrap();
        assert!(report.history.iter().all(|r| r.total.is_finite()));
    }

    #[test]
    fn ic_inlet_velocity_can_be_disabled() {
        let mut config = tiny_config();
        config.ic_inlet_velocity = false;
        let problem = Problem::build(&config).unwrap();
        assert!(problem.ic_values.iter().all(|v| *v == [0.0; 3]));
    }

    #[test]
    fn unchecked_dims_get_zero_weight() {
        let mut config = tiny_config();
        config.check_dims = vec![0, 1];
        let problem = Problem::build(&config).unwrap();
        assert!(problem.bc_weights.iter().all(|w| w[2] == 0.0));
        assert!(problem.ic_weights.iter().all(|w| w[2] == 0.0 && w[0] == 1.0));
    }
}
