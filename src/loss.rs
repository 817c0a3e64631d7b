//! 方程式・境界条件・初期条件の損失を合成した L2 損失。

use crate::error::{PinnError, Result};
use crate::model::FcNet;
use crate::pde::NavierStokes;
use burn::prelude::Backend;
use burn::tensor::{Tensor, TensorData};
use serde::{Deserialize, Serialize};

/// 各項の損失をまとめる方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisMethod {
    /// 各項の和
    Sum,
    /// 各項を並べたベクトルの2-ノルム
    Norm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LossConfig {
    pub eq_weight: f32,
    pub ic_weight: f32,
    pub synthesis_method: SynthesisMethod,
    /// 微分の中心差分に使う刻み幅
    pub fd_step: f32,
}

impl Default for LossConfig {
    fn default() -> Self {
        Self {
            eq_weight: 0.01,
            ic_weight: 1.0,
            synthesis_method: SynthesisMethod::Norm,
            fd_step: 5e-3,
        }
    }
}

impl LossConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.fd_step > 0.0) {
            return Err(PinnError::InvalidConfig(format!(
                "fd_step は正の値である必要があります: {}",
                self.fd_step
            )));
        }
        if self.eq_weight < 0.0 || self.ic_weight < 0.0 {
            return Err(PinnError::InvalidConfig(
                "損失の重みは0以上である必要があります".to_string(),
            ));
        }
        Ok(())
    }
}

/// 学習に使う点群と目標値をテンソルにまとめたもの。
#[derive(Clone)]
pub struct TrainingBatch<B: Backend> {
    pub eq_coords: Tensor<B, 2>,
    pub bc_coords: Tensor<B, 2>,
    pub bc_values: Tensor<B, 2>,
    pub bc_weights: Tensor<B, 2>,
    pub ic_coords: Tensor<B, 2>,
    pub ic_values: Tensor<B, 2>,
    pub ic_weights: Tensor<B, 2>,
}

/// `[N][3]` の行列を `[N, 3]` のテンソルに変換します。
pub fn rows_to_tensor<B: Backend>(rows: &[[f32; 3]], device: &B::Device) -> Tensor<B, 2> {
    let flat: Vec<f32> = rows.iter().flatten().copied().collect();
    Tensor::from_data(TensorData::new(flat, [rows.len(), 3]), device)
}

/// 1ステップ分の損失。`total` が最適化対象です。
#[derive(Clone)]
pub struct LossTerms<B: Backend> {
    pub equation: Tensor<B, 1>,
    pub boundary: Tensor<B, 1>,
    pub initial: Tensor<B, 1>,
    pub total: Tensor<B, 1>,
}

/// 重み付き二乗誤差の平均
fn weighted_mse<B: Backend>(
    pred: Tensor<B, 2>,
    target: Tensor<B, 2>,
    weights: Tensor<B, 2>,
) -> Tensor<B, 1> {
    let diff = pred - target;
    (diff.clone() * diff * weights).mean()
}

#[derive(Debug, Clone)]
pub struct L2Loss {
    pde: NavierStokes,
    config: LossConfig,
}

impl L2Loss {
    pub fn new(pde: NavierStokes, config: LossConfig) -> Self {
        Self { pde, config }
    }

    pub fn compute<B: Backend>(&self, model: &FcNet<B>, batch: &TrainingBatch<B>) -> LossTerms<B> {
        let residual = self.pde.residuals(
            |coords| model.forward(coords),
            batch.eq_coords.clone(),
            self.config.fd_step,
        );
        let equation = (residual.clone() * residual)
            .mean()
            .mul_scalar(self.config.eq_weight);

        let boundary = weighted_mse(
            model.forward(batch.bc_coords.clone()),
            batch.bc_values.clone(),
            batch.bc_weights.clone(),
        );
        let initial = weighted_mse(
            model.forward(batch.ic_coords.clone()),
            batch.ic_values.clone(),
            batch.ic_weights.clone(),
        );

        let total = synthesize(
            self.config.synthesis_method,
            [equation.clone(), boundary.clone(), initial.clone()],
        );
        LossTerms {
            equation,
            boundary,
            initial,
            total,
        }
    }
}

fn synthesize<B: Backend>(method: SynthesisMethod, terms: [Tensor<B, 1>; 3]) -> Tensor<B, 1> {
    let stacked = Tensor::cat(terms.to_vec(), 0);
    match method {
        SynthesisMethod::Sum => stacked.sum(),
        SynthesisMethod::Norm => (stacked.clone() * stacked).sum().sqrt(),
    }
}
