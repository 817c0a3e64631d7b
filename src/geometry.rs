//! 計算領域（円柱を含む矩形チャネル × 時間区間）とサンプリングによる離散化。

use crate::conditions::EDGE_TOLERANCE;
use crate::error::{PinnError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// 時間依存の矩形領域と、その内部に置かれた円柱。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    pub time_origin: f32,
    pub time_extent: f32,
    pub x_range: [f32; 2],
    pub y_range: [f32; 2],
    pub cylinder_center: [f32; 2],
    pub cylinder_radius: f32,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            time_origin: 0.0,
            time_extent: 1.0,
            x_range: [-0.2, 0.6],
            y_range: [-0.2, 0.2],
            cylinder_center: [0.0, 0.0],
            cylinder_radius: 0.02,
        }
    }
}

impl GeometryConfig {
    /// 点 (x, y) が矩形の内側かつ円柱の外側にあるかを判定します。
    pub fn contains(&self, x: f32, y: f32) -> bool {
        let [x_min, x_max] = self.x_range;
        let [y_min, y_max] = self.y_range;
        let dx = x - self.cylinder_center[0];
        let dy = y - self.cylinder_center[1];
        (x_min..=x_max).contains(&x)
            && (y_min..=y_max).contains(&y)
            && dx * dx + dy * dy > self.cylinder_radius * self.cylinder_radius
    }

    /// チャネル中心線の y 座標
    pub fn centerline(&self) -> f32 {
        0.5 * (self.y_range[0] + self.y_range[1])
    }

    /// チャネルの半幅
    pub fn half_height(&self) -> f32 {
        0.5 * (self.y_range[1] - self.y_range[0])
    }

    pub fn validate(&self) -> Result<()> {
        let [x_min, x_max] = self.x_range;
        let [y_min, y_max] = self.y_range;
        let [cx, cy] = self.cylinder_center;
        let r = self.cylinder_radius;
        if !(self.time_extent > 0.0) {
            return Err(PinnError::InvalidConfig(format!(
                "time_extent は正の値である必要があります: {}",
                self.time_extent
            )));
        }
        if !(x_max > x_min) || !(y_max > y_min) {
            return Err(PinnError::InvalidConfig(format!(
                "矩形領域の範囲が不正です: x={:?}, y={:?}",
                self.x_range, self.y_range
            )));
        }
        // 円柱表面の点は辺の判定から EDGE_TOLERANCE 以上離す
        let margin = EDGE_TOLERANCE;
        if !(r > 0.0)
            || cx - r <= x_min + margin
            || cx + r >= x_max - margin
            || cy - r <= y_min + margin
            || cy + r >= y_max - margin
        {
            return Err(PinnError::InvalidConfig(format!(
                "円柱 (中心 {:?}, 半径 {}) が矩形領域の辺から {} 以上離れていません",
                self.cylinder_center, r, margin
            )));
        }
        Ok(())
    }
}

/// サンプリング離散化の設定。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// 時間方向の断面数（始点と終点を含む）
    pub time_nsteps: usize,
    /// 内部にランダムに配置する点の数
    pub space_point_size: usize,
    /// 矩形境界の分割数 [x方向, y方向]
    pub space_nsteps: [usize; 2],
    /// 円柱表面に配置する点の数
    pub cylinder_nsteps: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            time_nsteps: 50,
            space_point_size: 5000,
            space_nsteps: [101, 101],
            cylinder_nsteps: 100,
        }
    }
}

impl SamplingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.time_nsteps < 2 {
            return Err(PinnError::InvalidConfig(format!(
                "time_nsteps は2以上である必要があります: {}",
                self.time_nsteps
            )));
        }
        if self.space_nsteps.iter().any(|&n| n < 2) {
            return Err(PinnError::InvalidConfig(format!(
                "space_nsteps の各成分は2以上である必要があります: {:?}",
                self.space_nsteps
            )));
        }
        if self.space_point_size == 0 {
            return Err(PinnError::InvalidConfig(
                "space_point_size は1以上である必要があります".to_string(),
            ));
        }
        Ok(())
    }
}

/// 離散化された時空間の点群。
///
/// 各点は `[t, x, y]` で、時間断面ごとに空間点を並べた時間優先の順序です。
/// 最後の `space_domain_size` 行が最終時刻の断面になります。
#[derive(Debug, Clone)]
pub struct Discretization {
    pub points: Vec<[f32; 3]>,
    /// 初期時刻の全空間点
    pub ic_index: Vec<usize>,
    /// 2番目以降の時刻の境界点
    pub bc_index: Vec<usize>,
    /// 2番目以降の時刻の内部点（方程式の残差を評価する点）
    pub eq_index: Vec<usize>,
    /// 1時刻あたりの空間点数
    pub space_domain_size: usize,
}

impl Discretization {
    pub fn domain_size(&self) -> usize {
        self.points.len()
    }

    /// 最終時刻の断面に属する点
    pub fn last_slice(&self) -> &[[f32; 3]] {
        &self.points[self.points.len() - self.space_domain_size..]
    }

    pub fn select(&self, index: &[usize]) -> Vec<[f32; 3]> {
        index.iter().map(|&i| self.points[i]).collect()
    }
}

/// `n` 個の等間隔な値を `[start, end]` に生成します（両端を含む）。
fn linspace(start: f32, end: f32, n: usize) -> Vec<f32> {
    if n == 1 {
        return vec![start];
    }
    (0..n)
        .map(|i| start + (end - start) * i as f32 / (n - 1) as f32)
        .collect()
}

fn boundary_points(geometry: &GeometryConfig, sampling: &SamplingConfig) -> Vec<[f32; 2]> {
    let [x_min, x_max] = geometry.x_range;
    let [y_min, y_max] = geometry.y_range;
    let [nx, ny] = sampling.space_nsteps;
    let mut points = Vec::with_capacity(2 * nx + 2 * ny + sampling.cylinder_nsteps);

    // 上下の辺は角を含み、左右の辺は角を除く
    for x in linspace(x_min, x_max, nx) {
        points.push([x, y_min]);
        points.push([x, y_max]);
    }
    let ys = linspace(y_min, y_max, ny);
    for &y in &ys[1..ny - 1] {
        points.push([x_min, y]);
        points.push([x_max, y]);
    }

    let [cx, cy] = geometry.cylinder_center;
    let r = geometry.cylinder_radius;
    for i in 0..sampling.cylinder_nsteps {
        let theta = 2.0 * PI * i as f32 / sampling.cylinder_nsteps as f32;
        points.push([cx + r * theta.cos(), cy + r * theta.sin()]);
    }
    points
}

fn interior_points<R: Rng>(
    geometry: &GeometryConfig,
    count: usize,
    rng: &mut R,
) -> Vec<[f32; 2]> {
    let [x_min, x_max] = geometry.x_range;
    let [y_min, y_max] = geometry.y_range;
    let mut points = Vec::with_capacity(count);
    while points.len() < count {
        let x = rng.random_range(x_min..x_max);
        let y = rng.random_range(y_min..y_max);
        if geometry.contains(x, y) {
            points.push([x, y]);
        }
    }
    points
}

/// 領域をサンプリングにより離散化します。
///
/// 境界点は等間隔、内部点は一様乱数で配置し、それらを各時間断面に複製します。
pub fn sampling_discretize<R: Rng>(
    geometry: &GeometryConfig,
    sampling: &SamplingConfig,
    rng: &mut R,
) -> Result<Discretization> {
    geometry.validate()?;
    sampling.validate()?;

    let boundary = boundary_points(geometry, sampling);
    let interior = interior_points(geometry, sampling.space_point_size, rng);
    let n_boundary = boundary.len();
    let space: Vec<[f32; 2]> = boundary.into_iter().chain(interior).collect();
    let space_domain_size = space.len();

    let times = linspace(
        geometry.time_origin,
        geometry.time_origin + geometry.time_extent,
        sampling.time_nsteps,
    );

    let mut points = Vec::with_capacity(times.len() * space_domain_size);
    let mut ic_index = Vec::with_capacity(space_domain_size);
    let mut bc_index = Vec::with_capacity((times.len() - 1) * n_boundary);
    let mut eq_index = Vec::with_capacity((times.len() - 1) * (space_domain_size - n_boundary));
    for (step, &t) in times.iter().enumerate() {
        for (j, &[x, y]) in space.iter().enumerate() {
            let id = points.len();
            points.push([t, x, y]);
            if step == 0 {
                ic_index.push(id);
            } else if j < n_boundary {
                bc_index.push(id);
            } else {
                eq_index.push(id);
            }
        }
    }

    tracing::debug!(
        domain_size = points.len(),
        space_domain_size,
        ic = ic_index.len(),
        bc = bc_index.len(),
        eq = eq_index.len(),
        "サンプリング離散化が完了しました"
    );

    Ok(Discretization {
        points,
        ic_index,
        bc_index,
        eq_index,
        space_domain_size,
    })
}
