//! 実験全体の設定。
//!
//! すべてのセクションは `#[serde(default)]` を持つため、JSONファイルでは
//! 変更したい項目だけを書けば残りは既定値（Re=100 の円柱周り流れ）になります。

use crate::error::{PinnError, Result};
use crate::geometry::{Discretization, GeometryConfig, SamplingConfig, sampling_discretize};
use crate::loss::LossConfig;
use crate::model::FcNetConfig;
use crate::pde::NavierStokes;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// 学習ループ（ソルバー）の設定。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub num_epoch: usize,
    pub learning_rate: f64,
    /// 損失履歴を記録・ログ出力する間隔（エポック数）
    pub log_interval: usize,
    /// 損失グラフをPNGで出力するかどうか
    pub plot_loss: bool,
    /// エポックごとに無作為抽出する方程式点の数。`None` なら全点を使うフルバッチ学習
    pub eq_batch_size: Option<usize>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            num_epoch: 100,
            learning_rate: 1e-3,
            log_interval: 10,
            plot_loss: true,
            eq_batch_size: Some(8192),
        }
    }
}

/// 1回の学習・推論で使用する設定一式。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// サンプリングと重み初期化に使用する乱数シード
    pub seed: u64,
    /// 流入境界での流速 U
    pub inlet_velocity: f32,
    /// 境界条件の既定の損失重み
    pub bc_weight: f32,
    /// 初期条件で流入列に流速 U を与えるかどうか（false なら全点静止）
    pub ic_inlet_velocity: bool,
    /// 境界・初期条件で拘束する出力成分 (0: u, 1: v, 2: p)
    pub check_dims: Vec<usize>,
    pub geometry: GeometryConfig,
    pub sampling: SamplingConfig,
    pub pde: NavierStokes,
    pub model: FcNetConfig,
    pub loss: LossConfig,
    pub solver: SolverConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            inlet_velocity: 2.5,
            bc_weight: 0.8,
            ic_inlet_velocity: true,
            check_dims: vec![0, 1, 2],
            geometry: GeometryConfig::default(),
            sampling: SamplingConfig::default(),
            pde: NavierStokes::default(),
            model: FcNetConfig::default(),
            loss: LossConfig::default(),
            solver: SolverConfig::default(),
        }
    }
}

impl ExperimentConfig {
    /// JSONファイルから設定を読み込み、検証します。
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// 設定を整形済みJSONとして保存します。
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// レイノルズ数 Re = ρUD/ν
    pub fn reynolds_number(&self) -> f32 {
        self.pde.rho * self.inlet_velocity * 2.0 * self.geometry.cylinder_radius / self.pde.nu
    }

    /// シードから領域の離散化を構築します。同じ設定からは常に同じ点群が得られます。
    pub fn discretize(&self) -> Result<Discretization> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        sampling_discretize(&self.geometry, &self.sampling, &mut rng)
    }

    pub fn validate(&self) -> Result<()> {
        self.geometry.validate()?;
        self.sampling.validate()?;
        self.pde.validate()?;
        self.model.validate()?;
        self.loss.validate()?;

        if self.check_dims.is_empty() {
            return Err(PinnError::InvalidConfig(
                "check_dims が空です".to_string(),
            ));
        }
        if let Some(&dim) = self.check_dims.iter().find(|&&d| d >= self.model.num_outs) {
            return Err(PinnError::InvalidConfig(format!(
                "check_dims の成分 {} が出力次元 {} を超えています",
                dim, self.model.num_outs
            )));
        }
        if self.model.num_ins != 3 || self.model.num_outs != 3 {
            return Err(PinnError::InvalidConfig(
                "ネットワークの入出力は (t, x, y) -> (u, v, p) の3次元である必要があります".to_string(),
            ));
        }
        if self.solver.num_epoch == 0 || self.solver.log_interval == 0 {
            return Err(PinnError::InvalidConfig(
                "num_epoch と log_interval は1以上である必要があります".to_string(),
            ));
        }
        if self.solver.eq_batch_size == Some(0) {
            return Err(PinnError::InvalidConfig(
                "eq_batch_size は1以上である必要があります".to_string(),
            ));
        }
        if !(self.solver.learning_rate > 0.0) {
            return Err(PinnError::InvalidConfig(format!(
                "learning_rate は正の値である必要があります: {}",
                self.solver.learning_rate
            )));
        }
        Ok(())
    }
}
