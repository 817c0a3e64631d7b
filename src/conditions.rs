//! 境界条件・初期条件の目標値と損失重みの生成。
//!
//! 境界点は座標がどの辺に近いかで分類し、辺ごとに固定の (u, v, p) を割り当てます。

use crate::geometry::GeometryConfig;

/// 辺の判定に使う許容誤差
pub const EDGE_TOLERANCE: f32 = 1e-4;

/// 境界点が属する辺
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Inlet,
    Outlet,
    Side,
    Cylinder,
}

/// 辺ごとの境界点の数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeCounts {
    pub inlet: usize,
    pub outlet: usize,
    pub side: usize,
    pub cylinder: usize,
}

/// 境界・初期条件の生成器。
#[derive(Debug, Clone)]
pub struct Conditions {
    x_range: [f32; 2],
    y_range: [f32; 2],
    centerline: f32,
    half_height: f32,
    inlet_velocity: f32,
    weight: f32,
    ic_inlet_velocity: bool,
}

impl Conditions {
    pub fn new(geometry: &GeometryConfig, inlet_velocity: f32, weight: f32) -> Self {
        Self {
            x_range: geometry.x_range,
            y_range: geometry.y_range,
            centerline: geometry.centerline(),
            half_height: geometry.half_height(),
            inlet_velocity,
            weight,
            ic_inlet_velocity: true,
        }
    }

    /// 初期条件で流入列に流速 U を与えるかどうかを設定します。
    pub fn with_ic_inlet_velocity(mut self, enabled: bool) -> Self {
        self.ic_inlet_velocity = enabled;
        self
    }

    /// `[t, x, y]` の点がどの辺に属するかを判定します。
    ///
    /// 流入・流出が側壁より優先されるため、角の点は流入・流出として扱われます。
    pub fn classify(&self, point: &[f32; 3]) -> Edge {
        let [_, x, y] = *point;
        if (x - self.x_range[0]).abs() < EDGE_TOLERANCE {
            Edge::Inlet
        } else if (x - self.x_range[1]).abs() < EDGE_TOLERANCE {
            Edge::Outlet
        } else if (y - self.y_range[1]).abs() < EDGE_TOLERANCE
            || (y - self.y_range[0]).abs() < EDGE_TOLERANCE
        {
            Edge::Side
        } else {
            Edge::Cylinder
        }
    }

    pub fn edge_counts(&self, points: &[[f32; 3]], index: &[usize]) -> EdgeCounts {
        let mut counts = EdgeCounts::default();
        for &id in index {
            match self.classify(&points[id]) {
                Edge::Inlet => counts.inlet += 1,
                Edge::Outlet => counts.outlet += 1,
                Edge::Side => counts.side += 1,
                Edge::Cylinder => counts.cylinder += 1,
            }
        }
        counts
    }

    /// 境界点ごとの目標値 (u, v, p) を生成します。
    ///
    /// 流入では一様流速、流出では圧力0、側壁と円柱では滑りなし条件です。
    pub fn gen_bc(&self, points: &[[f32; 3]], bc_index: &[usize]) -> Vec<[f32; 3]> {
        let counts = self.edge_counts(points, bc_index);
        tracing::debug!(
            inlet = counts.inlet,
            outlet = counts.outlet,
            side = counts.side,
            cylinder = counts.cylinder,
            "境界点を分類しました"
        );
        bc_index
            .iter()
            .map(|&id| match self.classify(&points[id]) {
                Edge::Inlet => [self.inlet_velocity, 0.0, 0.0],
                Edge::Outlet | Edge::Side | Edge::Cylinder => [0.0, 0.0, 0.0],
            })
            .collect()
    }

    /// 境界点ごとの損失重みを生成します。
    ///
    /// 流入の u 成分だけは中心線で1、側壁で0となるよう線形に変化させ、
    /// 角での不連続を緩和します。
    pub fn gen_bc_weight(&self, points: &[[f32; 3]], bc_index: &[usize]) -> Vec<[f32; 3]> {
        let w = self.weight;
        bc_index
            .iter()
            .map(|&id| {
                let point = &points[id];
                match self.classify(point) {
                    Edge::Inlet => {
                        let y = point[2];
                        [1.0 - (y - self.centerline).abs() / self.half_height, w, w]
                    }
                    Edge::Outlet | Edge::Side | Edge::Cylinder => [w, w, w],
                }
            })
            .collect()
    }

    /// 初期時刻の点ごとの目標値を生成します。
    ///
    /// `x` 座標で分類し、流入列の点には `(U, 0, 0)`、それ以外には `(0, 0, 0)` を与えます。
    /// `with_ic_inlet_velocity(false)` のときは全点が静止状態 `(0, 0, 0)` になります。
    pub fn gen_ic(&self, points: &[[f32; 3]], ic_index: &[usize]) -> Vec<[f32; 3]> {
        ic_index
            .iter()
            .map(|&id| {
                let x = points[id][1];
                if self.ic_inlet_velocity && (x - self.x_range[0]).abs() < EDGE_TOLERANCE {
                    [self.inlet_velocity, 0.0, 0.0]
                } else {
                    [0.0, 0.0, 0.0]
                }
            })
            .collect()
    }
}

/// `check_dims` に含まれない成分の重みを0にします。
pub fn mask_weights(weights: &mut [[f32; 3]], check_dims: &[usize]) {
    for row in weights.iter_mut() {
        for (dim, value) in row.iter_mut().enumerate() {
            if !check_dims.contains(&dim) {
                *value = 0.0;
            }
        }
    }
}
