//! 2次元非圧縮性 Navier-Stokes 方程式の残差。
//!
//! burn の自動微分では `grad()` が内部バックエンドのテンソルを返すため、
//! 入力座標に関する2階微分を計算グラフ上に残すことができません。
//! そこでネットワーク出力の中心差分で微分を評価し、残差をパラメータに関して
//! 微分可能なまま保ちます。ステンシルの7点は1回の順伝播でまとめて評価します。

use crate::error::{PinnError, Result};
use burn::prelude::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

const T: usize = 0;
const X: usize = 1;
const Y: usize = 2;

/// 非圧縮性 Navier-Stokes 方程式。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavierStokes {
    /// 動粘性係数
    pub nu: f32,
    /// 密度
    pub rho: f32,
    pub time_dependent: bool,
}

impl Default for NavierStokes {
    fn default() -> Self {
        Self {
            nu: 1e-3,
            rho: 1.0,
            time_dependent: true,
        }
    }
}

/// 1つの出力成分について、ステンシルから得た値と微分。
struct Derivatives<B: Backend> {
    value: Tensor<B, 2>,
    d_t: Option<Tensor<B, 2>>,
    d_x: Tensor<B, 2>,
    d_y: Tensor<B, 2>,
    d_xx: Tensor<B, 2>,
    d_yy: Tensor<B, 2>,
}

/// ステンシル各点でのネットワーク出力 [N, 3]。
struct StencilOutputs<B: Backend> {
    center: Tensor<B, 2>,
    time: Option<(Tensor<B, 2>, Tensor<B, 2>)>,
    x: (Tensor<B, 2>, Tensor<B, 2>),
    y: (Tensor<B, 2>, Tensor<B, 2>),
}

impl<B: Backend> StencilOutputs<B> {
    fn component(&self, k: usize, step: f32) -> Derivatives<B> {
        let col = |t: &Tensor<B, 2>| {
            let n = t.dims()[0];
            t.clone().slice([0..n, k..k + 1])
        };
        let value = col(&self.center);
        let (x_plus, x_minus) = (col(&self.x.0), col(&self.x.1));
        let (y_plus, y_minus) = (col(&self.y.0), col(&self.y.1));
        let inv_2h = 1.0 / (2.0 * step);
        let inv_h2 = 1.0 / (step * step);

        let d_t = self
            .time
            .as_ref()
            .map(|(plus, minus)| (col(plus) - col(minus)).mul_scalar(inv_2h));
        let d_x = (x_plus.clone() - x_minus.clone()).mul_scalar(inv_2h);
        let d_y = (y_plus.clone() - y_minus.clone()).mul_scalar(inv_2h);
        let d_xx = (x_plus + x_minus - value.clone().mul_scalar(2.0)).mul_scalar(inv_h2);
        let d_yy = (y_plus + y_minus - value.clone().mul_scalar(2.0)).mul_scalar(inv_h2);

        Derivatives {
            value,
            d_t,
            d_x,
            d_y,
            d_xx,
            d_yy,
        }
    }
}

/// `axis` 列だけを `delta` ずらした座標を返します。
fn shifted<B: Backend>(coords: &Tensor<B, 2>, axis: usize, delta: f32) -> Tensor<B, 2> {
    let [n, d] = coords.dims();
    let columns: Vec<Tensor<B, 2>> = (0..d)
        .map(|i| {
            let column = coords.clone().slice([0..n, i..i + 1]);
            if i == axis {
                column.add_scalar(delta)
            } else {
                column
            }
        })
        .collect();
    Tensor::cat(columns, 1)
}

impl NavierStokes {
    pub fn validate(&self) -> Result<()> {
        if !(self.nu > 0.0) || !(self.rho > 0.0) {
            return Err(PinnError::InvalidConfig(format!(
                "nu と rho は正の値である必要があります: nu={}, rho={}",
                self.nu, self.rho
            )));
        }
        Ok(())
    }

    /// 座標 `[N, 3]` (t, x, y) における残差 `[N, 3]` を計算します。
    ///
    /// 列はそれぞれ x方向運動量、y方向運動量、連続の式です。
    /// `forward` は (t, x, y) から (u, v, p) への写像で、通常はネットワークの順伝播です。
    pub fn residuals<B, F>(&self, forward: F, coords: Tensor<B, 2>, step: f32) -> Tensor<B, 2>
    where
        B: Backend,
        F: Fn(Tensor<B, 2>) -> Tensor<B, 2>,
    {
        let n = coords.dims()[0];
        let mut stencil = vec![
            coords.clone(),
            shifted(&coords, X, step),
            shifted(&coords, X, -step),
            shifted(&coords, Y, step),
            shifted(&coords, Y, -step),
        ];
        if self.time_dependent {
            stencil.push(shifted(&coords, T, step));
            stencil.push(shifted(&coords, T, -step));
        }
        let blocks = stencil.len();
        let output = forward(Tensor::cat(stencil, 0));
        let outs = output.dims()[1];
        let block = |i: usize| output.clone().slice([i * n..(i + 1) * n, 0..outs]);

        let outputs = StencilOutputs {
            center: block(0),
            x: (block(1), block(2)),
            y: (block(3), block(4)),
            time: (blocks == 7).then(|| (block(5), block(6))),
        };

        let u = outputs.component(0, step);
        let v = outputs.component(1, step);
        let p = outputs.component(2, step);

        let inv_rho = 1.0 / self.rho;
        let momentum = |c: &Derivatives<B>, p_grad: &Tensor<B, 2>| {
            let convection =
                u.value.clone() * c.d_x.clone() + v.value.clone() * c.d_y.clone();
            let diffusion = (c.d_xx.clone() + c.d_yy.clone()).mul_scalar(self.nu);
            let steady = convection + p_grad.clone().mul_scalar(inv_rho) - diffusion;
            match &c.d_t {
                Some(d_t) => d_t.clone() + steady,
                None => steady,
            }
        };

        let momentum_x = momentum(&u, &p.d_x);
        let momentum_y = momentum(&v, &p.d_y);
        let continuity = u.d_x.clone() + v.d_y.clone();

        Tensor::cat(vec![momentum_x, momentum_y, continuity], 1)
    }
}
