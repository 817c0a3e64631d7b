use crate::error::{PinnError, Result};
use burn::module::Module;
use burn::nn::{Linear, LinearConfig, Tanh};
use burn::prelude::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

/// 全結合ネットワークの構成。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FcNetConfig {
    pub num_ins: usize,
    pub num_outs: usize,
    /// 線形層の総数（入力層と出力層を含む）
    pub num_layers: usize,
    pub hidden_size: usize,
}

impl Default for FcNetConfig {
    fn default() -> Self {
        Self {
            num_ins: 3,
            num_outs: 3,
            num_layers: 10,
            hidden_size: 50,
        }
    }
}

impl FcNetConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_layers < 2 {
            return Err(PinnError::InvalidConfig(format!(
                "num_layers は2以上である必要があります: {}",
                self.num_layers
            )));
        }
        if self.num_ins == 0 || self.num_outs == 0 || self.hidden_size == 0 {
            return Err(PinnError::InvalidConfig(
                "ネットワークの各次元は1以上である必要があります".to_string(),
            ));
        }
        Ok(())
    }

    /// 新しいモデルを初期化します。
    pub fn init<B: Backend>(&self, device: &B::Device) -> FcNet<B> {
        let mut linears = Vec::with_capacity(self.num_layers);
        linears.push(LinearConfig::new(self.num_ins, self.hidden_size).init(device));
        for _ in 1..(self.num_layers - 1) {
            linears.push(LinearConfig::new(self.hidden_size, self.hidden_size).init(device));
        }
        linears.push(LinearConfig::new(self.hidden_size, self.num_outs).init(device));
        FcNet {
            linears,
            activation: Tanh::new(),
        }
    }
}

/// PINNの本体となるニューラルネットワークモデル。
///
/// 座標(t, x, y)を入力とし、その点における流速(u, v)と圧力pを予測する
/// 多層パーセプトロン（MLP）です。
#[derive(Module, Debug)]
pub struct FcNet<B: Backend> {
    linears: Vec<Linear<B>>,
    activation: Tanh,
}

impl<B: Backend> FcNet<B> {
    /// モデルの順伝播を実行します。
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let (last, hidden) = self
            .linears
            .split_last()
            .expect("FcNet always has at least two layers");
        let mut x = input;
        for linear in hidden {
            x = linear.forward(x);
            x = self.activation.forward(x);
        }
        last.forward(x)
    }

    pub fn num_layers(&self) -> usize {
        self.linears.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn builds_requested_depth_and_output_shape() {
        let device = Default::default();
        let config = FcNetConfig {
            num_layers: 4,
            hidden_size: 8,
            ..Default::default()
        };
        let model = config.init::<TestBackend>(&device);
        assert_eq!(model.num_layers(), 4);

        let input = Tensor::<TestBackend, 2>::zeros([5, 3], &device);
        assert_eq!(model.forward(input).dims(), [5, 3]);
    }

    #[test]
    fn default_matches_ten_layers_of_fifty() {
        let config = FcNetConfig::default();
        assert_eq!((config.num_layers, config.hidden_size), (10, 50));
        config.validate().unwrap();
    }

    #[test]
    fn rejects_single_layer() {
        let config = FcNetConfig {
            num_layers: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
