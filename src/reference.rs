//! 参照解（他のソルバーの計算結果など）との比較。

use crate::error::{PinnError, Result};
use std::fs;
use std::path::Path;

/// 流速成分ごとの平均二乗誤差
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityError {
    pub mse_u: f32,
    pub mse_v: f32,
}

/// 1行に `u v`（カンマまたは空白区切り）を持つテキストを読み込みます。
///
/// 空行と `#` で始まる行は読み飛ばします。
pub fn load_reference(path: impl AsRef<Path>) -> Result<Vec<[f32; 2]>> {
    let text = fs::read_to_string(path.as_ref())?;
    parse_reference(&text)
}

pub fn parse_reference(text: &str) -> Result<Vec<[f32; 2]>> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(lineno, line)| -> Result<[f32; 2]> {
            let values = line
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<f32>().map_err(|e| {
                        PinnError::Reference(format!("{}行目: '{}' を数値に変換できません: {}", lineno, s, e))
                    })
                })
                .collect::<Result<Vec<f32>>>()?;
            match values.as_slice() {
                [u, v, ..] => Ok([*u, *v]),
                _ => Err(PinnError::Reference(format!(
                    "{}行目: u と v の2列が必要です",
                    lineno
                ))),
            }
        })
        .collect()
}

/// 予測 `[u, v, p]` と参照 `[u, v]` の平均二乗誤差を計算します。
pub fn velocity_mse(prediction: &[[f32; 3]], reference: &[[f32; 2]]) -> Result<VelocityError> {
    if prediction.len() != reference.len() {
        return Err(PinnError::Reference(format!(
            "点の数が一致しません: 予測 {}, 参照 {}",
            prediction.len(),
            reference.len()
        )));
    }
    if prediction.is_empty() {
        return Err(PinnError::Reference("比較する点がありません".to_string()));
    }
    let (sum_u, sum_v) = prediction
        .iter()
        .zip(reference)
        .fold((0.0f64, 0.0f64), |(su, sv), (pred, r)| {
            let du = (pred[0] - r[0]) as f64;
            let dv = (pred[1] - r[1]) as f64;
            (su + du * du, sv + dv * dv)
        });
    let n = prediction.len() as f64;
    Ok(VelocityError {
        mse_u: (sum_u / n) as f32,
        mse_v: (sum_v / n) as f32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_and_whitespace_rows() {
        let text = "# u v\n1.0, 2.0\n\n3.5 -4  \n0 0 9.9\n";
        let rows = parse_reference(text).unwrap();
        assert_eq!(rows, vec![[1.0, 2.0], [3.5, -4.0], [0.0, 0.0]]);
    }

    #[test]
    fn reports_bad_rows_with_line_number() {
        let err = parse_reference("1 2\n3\n").unwrap_err();
        assert!(err.to_string().contains("2行目"));
        assert!(parse_reference("1 x\n").is_err());
    }

    #[test]
    fn mse_per_component() {
        let prediction = [[1.0, 0.0, 5.0], [3.0, 2.0, 5.0]];
        let reference = [[0.0, 0.0], [1.0, 0.0]];
        let err = velocity_mse(&prediction, &reference).unwrap();
        assert!((err.mse_u - 2.5).abs() < 1e-6);
        assert!((err.mse_v - 2.0).abs() < 1e-6);
    }

    #[test]
    fn mse_requires_matching_lengths() {
        let err = velocity_mse(&[[0.0; 3]], &[]).unwrap_err();
        assert!(matches!(err, PinnError::Reference(_)));
    }
}
