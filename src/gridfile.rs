//! Legacy datum correction-grid text export
//!
//! One transform exports as two plain-text files, one per axis, in the NADCON
//! text grid layout: an 80-character title line, a parameter line with column
//! and row counts plus origin and steps, and the node values six per line,
//! emitted from the maximum-y grid row down to the minimum-y row.
//!
//! Compatibility note: the axis-0 (longitude) file carries the negated x
//! displacement while the axis-1 (latitude) file carries the unnegated y
//! displacement. This asymmetry matches the legacy consumers byte for byte
//! and must not be "fixed".

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::grid::GridGeometry;
use crate::warpgrid::WarpGridBuilder;

/// Constant title line content, padded to the fixed 80-character width.
const TITLE: &str = "WARPGRID DERIVED DATUM SHIFT GRID";

/// Which displacement axis a correction file carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridAxis {
    /// Longitude / x shifts, written negated.
    X,
    /// Latitude / y shifts, written as-is.
    Y,
}

/// Write one axis of a filled grid as a legacy correction-grid text file.
pub fn write_correction_grid(grid: &GridGeometry, axis: GridAxis, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);

    write!(w, "{:<80}", TITLE)?;
    write!(
        w,
        "\n {} {}   1    {:.5}      {:.5}    {:.5}      {:.5}      0.00000",
        grid.columns(),
        grid.rows(),
        grid.x_start,
        grid.x_step,
        grid.y_start,
        grid.y_step
    )?;

    for i in (0..grid.rows()).rev() {
        write!(w, "\n")?;
        for j in 0..grid.columns() {
            let node = grid.node_position(i, j);
            let target = grid.target(i, j);
            let raw = match axis {
                GridAxis::X => -(target.x - node.x),
                GridAxis::Y => target.y - node.y,
            };
            // Normalize -0.0 so zero shifts never print a sign.
            let value = raw + 0.0;
            if j > 0 {
                if j % 6 == 0 {
                    write!(w, "\n")?;
                } else {
                    write!(w, " ")?;
                }
            }
            write!(w, "{:.6}", value)?;
        }
    }
    writeln!(w)?;
    w.flush()?;

    info!(
        "wrote {:?} correction grid ({}x{} nodes) to {}",
        axis,
        grid.columns(),
        grid.rows(),
        path.display()
    );
    Ok(())
}

impl WarpGridBuilder {
    /// Export one displacement axis of the built grid to `path` in the legacy
    /// correction-grid format, filling the grid first if needed.
    pub fn write_grid_file(&mut self, path: &Path, axis: GridAxis) -> Result<()> {
        self.build_grid()?;
        write_correction_grid(self.geometry(), axis, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A 2x1-cell grid whose targets equal the node positions (zero shift).
    fn zero_grid() -> GridGeometry {
        let mut grid = GridGeometry::with_counts(0.0, 0.0, 10.0, 10.0, 2, 1);
        for i in 0..grid.rows() {
            for j in 0..grid.columns() {
                let node = grid.node_position(i, j);
                grid.set_target(i, j, node);
            }
        }
        grid
    }

    #[test]
    fn test_export_zero_grid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shift.loa");
        write_correction_grid(&zero_grid(), GridAxis::X, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines[0].len(), 80);
        assert_eq!(
            lines[1],
            " 3 2   1    0.00000      10.00000    0.00000      10.00000      0.00000"
        );
        // body: two grid rows of three values each
        assert_eq!(lines.len(), 4);
        for line in &lines[2..] {
            assert_eq!(line.split_whitespace().count(), 3);
            for v in line.split_whitespace() {
                assert_eq!(v, "0.000000");
            }
        }
    }

    #[test]
    fn test_axis_sign_convention() {
        // +2 shift in both axes at every node.
        let mut grid = GridGeometry::with_counts(0.0, 0.0, 1.0, 1.0, 1, 1);
        for i in 0..grid.rows() {
            for j in 0..grid.columns() {
                let node = grid.node_position(i, j);
                grid.set_target(
                    i,
                    j,
                    crate::point::Position::new(node.x + 2.0, node.y + 2.0),
                );
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let x_path = dir.path().join("shift.loa");
        let y_path = dir.path().join("shift.laa");
        write_correction_grid(&grid, GridAxis::X, &x_path).unwrap();
        write_correction_grid(&grid, GridAxis::Y, &y_path).unwrap();

        let x_body = std::fs::read_to_string(&x_path).unwrap();
        let y_body = std::fs::read_to_string(&y_path).unwrap();

        // x displacements are negated on export, y displacements are not
        assert!(x_body.lines().skip(2).all(|l| l
            .split_whitespace()
            .all(|v| v == "-2.000000")));
        assert!(y_body.lines().skip(2).all(|l| l
            .split_whitespace()
            .all(|v| v == "2.000000")));
    }

    #[test]
    fn test_rows_emitted_top_down() {
        // Distinct y displacement per row: bottom row 0, top row +1.
        let mut grid = GridGeometry::with_counts(0.0, 0.0, 1.0, 1.0, 1, 1);
        for j in 0..grid.columns() {
            let bottom = grid.node_position(0, j);
            grid.set_target(0, j, bottom);
            let top = grid.node_position(1, j);
            grid.set_target(1, j, crate::point::Position::new(top.x, top.y + 1.0));
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shift.laa");
        write_correction_grid(&grid, GridAxis::Y, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        // maximum-y row comes first
        assert!(lines[2].starts_with("1.000000"));
        assert!(lines[3].starts_with("0.000000"));
    }

    #[test]
    fn test_wide_rows_wrap_after_six_values() {
        // 7 columns, 1 row of nodes per grid row -> each grid row wraps into
        // a line of 6 values and a line of 1.
        let mut grid = GridGeometry::with_counts(0.0, 0.0, 1.0, 1.0, 6, 0);
        for j in 0..grid.columns() {
            let node = grid.node_position(0, j);
            grid.set_target(0, j, node);
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.loa");
        write_correction_grid(&grid, GridAxis::X, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2].split_whitespace().count(), 6);
        assert_eq!(lines[3].split_whitespace().count(), 1);
    }
}
