//! 点群の結果をレガシー形式 (ASCII) の VTK ファイルとして書き出します。

use crate::error::{PinnError, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// 拡張子がなければ `.vtk` を付けたパスを返します。
pub fn vtk_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.extension().is_some_and(|ext| ext == "vtk") {
        path.to_path_buf()
    } else {
        let mut name = path.as_os_str().to_owned();
        name.push(".vtk");
        PathBuf::from(name)
    }
}

/// 点 `[t, x, y]` と出力 `[u, v, p]` を VTK の点群として保存します。
///
/// 各点は `VERTEX` セルとして書き出され、点データとして `u`, `v`, `p`,
/// 流速の大きさ、流速ベクトルを持ちます。書き出したファイルのパスを返します。
pub fn save_vtk_points(
    path: impl AsRef<Path>,
    points: &[[f32; 3]],
    data: &[[f32; 3]],
) -> Result<PathBuf> {
    if points.len() != data.len() {
        return Err(PinnError::Export(format!(
            "点の数 ({}) と出力の数 ({}) が一致しません",
            points.len(),
            data.len()
        )));
    }
    let path = vtk_path(path);
    let mut w = BufWriter::new(File::create(&path)?);
    let n = points.len();

    writeln!(w, "# vtk DataFile Version 3.0")?;
    writeln!(w, "cylinder pinn result")?;
    writeln!(w, "ASCII")?;
    writeln!(w, "DATASET UNSTRUCTURED_GRID")?;
    writeln!(w, "POINTS {} float", n)?;
    for [_, x, y] in points {
        writeln!(w, "{} {} 0", x, y)?;
    }
    writeln!(w, "CELLS {} {}", n, 2 * n)?;
    for i in 0..n {
        writeln!(w, "1 {}", i)?;
    }
    writeln!(w, "CELL_TYPES {}", n)?;
    for _ in 0..n {
        writeln!(w, "1")?;
    }

    writeln!(w, "POINT_DATA {}", n)?;
    let names = ["u", "v", "p"];
    for (k, name) in names.iter().enumerate() {
        write_scalars(&mut w, name, data.iter().map(|row| row[k]))?;
    }
    write_scalars(
        &mut w,
        "velocity_magnitude",
        data.iter().map(|[u, v, _]| (u * u + v * v).sqrt()),
    )?;
    writeln!(w, "VECTORS velocity float")?;
    for [u, v, _] in data {
        writeln!(w, "{} {} 0", u, v)?;
    }
    w.flush()?;

    tracing::debug!(path = %path.display(), points = n, "VTKファイルを書き出しました");
    Ok(path)
}

fn write_scalars<W: Write>(
    w: &mut W,
    name: &str,
    values: impl Iterator<Item = f32>,
) -> std::io::Result<()> {
    writeln!(w, "SCALARS {} float 1", name)?;
    writeln!(w, "LOOKUP_TABLE default")?;
    for value in values {
        writeln!(w, "{}", value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_extension_once() {
        assert_eq!(vtk_path("out/result"), PathBuf::from("out/result.vtk"));
        assert_eq!(vtk_path("out/result.vtk"), PathBuf::from("out/result.vtk"));
    }

    #[test]
    fn writes_points_cells_and_fields() {
        let dir = tempfile::tempdir().unwrap();
        let points = [[1.0, 0.5, -0.1], [1.0, 0.25, 0.2]];
        let data = [[3.0, 4.0, 1.5], [0.0, 0.0, -2.0]];
        let path = save_vtk_points(dir.path().join("result"), &points, &data).unwrap();
        assert_eq!(path.extension().unwrap(), "vtk");

        let text = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "# vtk DataFile Version 3.0");
        assert!(lines.contains(&"POINTS 2 float"));
        assert!(lines.contains(&"0.5 -0.1 0"));
        assert!(lines.contains(&"CELLS 2 4"));
        assert!(lines.contains(&"SCALARS velocity_magnitude float 1"));

        let magnitude = lines
            .iter()
            .position(|l| *l == "SCALARS velocity_magnitude float 1")
            .unwrap();
        assert_eq!(lines[magnitude + 2], "5");
        assert_eq!(lines[magnitude + 3], "0");
    }

    #[test]
    fn rejects_length_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let result = save_vtk_points(dir.path().join("bad"), &[[0.0; 3]], &[]);
        assert!(matches!(result, Err(PinnError::Export(_))));
    }
}
