use super::widget::Control;
use crate::geometry::{Rect, Size};

/// Lays controls out in equal cells, row by row.
///
/// Cell sizes use integer division of the area, and each control is inset by
/// `spacing` on every side of its cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformGrid {
    pub columns: u32,
    pub rows: u32,
    pub spacing: f32,
}

impl UniformGrid {
    pub fn new(columns: u32, rows: u32) -> Self {
        Self {
            columns: columns.max(1),
            rows: rows.max(1),
            spacing: 2.0,
        }
    }

    pub fn with_spacing(mut self, spacing: f32) -> Self {
        self.spacing = spacing.max(0.0);
        self
    }

    /// Rectangle of the `index`-th control. Indices past the last row keep
    /// flowing downwards.
    pub fn cell(&self, area: Size, index: usize) -> Rect {
        let w = (area.width / self.columns) as f32;
        let h = (area.height / self.rows) as f32;
        let column = (index % self.columns as usize) as f32;
        let row = (index / self.columns as usize) as f32;
        Rect::new(
            w * column + self.spacing,
            h * row + self.spacing,
            (w - 2.0 * self.spacing).max(0.0),
            (h - 2.0 * self.spacing).max(0.0),
        )
    }

    pub fn arrange(&self, area: Size, controls: &mut [Box<dyn Control>]) {
        for (index, control) in controls.iter_mut().enumerate() {
            control.set_bounds(self.cell(area, index));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cells_flow_row_by_row() {
        let grid = UniformGrid::new(3, 2);
        let area = Size::new(300, 200);
        assert_eq!(grid.cell(area, 0), Rect::new(2.0, 2.0, 96.0, 96.0));
        assert_eq!(grid.cell(area, 2), Rect::new(202.0, 2.0, 96.0, 96.0));
        assert_eq!(grid.cell(area, 4), Rect::new(102.0, 102.0, 96.0, 96.0));
    }

    #[test]
    fn test_tiny_cells_collapse_to_zero() {
        let grid = UniformGrid::new(10, 1).with_spacing(4.0);
        let cell = grid.cell(Size::new(50, 5), 0);
        assert_eq!(cell.width, 0.0);
        assert_eq!(cell.height, 0.0);
    }
}
