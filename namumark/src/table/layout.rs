//! Visual column assignment and color inheritance.
use super::{Cell, Table};
use crate::utils::css::ThemedColor;

/// Layout of one cell: its visual column and the colors it ends up with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedCell {
  pub column:  usize,
  pub bgcolor: Option<ThemedColor>,
  pub color:   Option<ThemedColor>,
}

/// Row-level colors, taken from the first cell of the row that sets them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowColors {
  pub bgcolor: Option<ThemedColor>,
  pub color:   Option<ThemedColor>,
}

fn row_colors(cells: &[Cell]) -> RowColors {
  RowColors {
    bgcolor: cells.iter().find_map(|c| c.attrs.row_bgcolor.clone()),
    color:   cells.iter().find_map(|c| c.attrs.row_color.clone()),
  }
}

fn set_column(columns: &mut Vec<Option<ThemedColor>>, at: usize, value: &ThemedColor) {
  if columns.len() <= at {
    columns.resize(at + 1, None);
  }
  columns[at] = Some(value.clone());
}

/// Place every cell of `table` on the visual grid.
///
/// A per-column counter holds how many more rows a rowspan still covers.
/// Covered columns are skipped when placing cells and every counter is
/// decremented at the end of each row. Column colors set by a cell apply
/// from that row on until overridden. Colors resolve cell first, then row,
/// then column.
#[must_use]
pub fn layout(table: &Table) -> Vec<(RowColors, Vec<PlacedCell>)> {
  let mut remaining: Vec<usize> = Vec::new();
  let mut column_bg: Vec<Option<ThemedColor>> = Vec::new();
  let mut column_fg: Vec<Option<ThemedColor>> = Vec::new();
  let mut rows = Vec::with_capacity(table.rows.len());

  for row in &table.rows {
    let colors = row_colors(&row.cells);
    let mut placed = Vec::with_capacity(row.cells.len());
    let mut column = 0;
    for cell in &row.cells {
      while remaining.get(column).is_some_and(|n| *n > 0) {
        column += 1;
      }
      let attrs = &cell.attrs;
      if let Some(bg) = &attrs.col_bgcolor {
        set_column(&mut column_bg, column, bg);
      }
      if let Some(fg) = &attrs.col_color {
        set_column(&mut column_fg, column, fg);
      }
      let end = column + attrs.colspan.max(1);
      if attrs.rowspan > 1 {
        if remaining.len() < end {
          remaining.resize(end, 0);
        }
        for slot in &mut remaining[column..end] {
          *slot = attrs.rowspan;
        }
      }
      let inherited = |columns: &[Option<ThemedColor>]| {
        columns.get(column).cloned().flatten()
      };
      placed.push(PlacedCell {
        column,
        bgcolor: attrs
          .bgcolor
          .clone()
          .or_else(|| colors.bgcolor.clone())
          .or_else(|| inherited(&column_bg)),
        color: attrs
          .color
          .clone()
          .or_else(|| colors.color.clone())
          .or_else(|| inherited(&column_fg)),
      });
      column = end;
    }
    for slot in &mut remaining {
      *slot = slot.saturating_sub(1);
    }
    rows.push((colors, placed));
  }
  rows
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::table::{CellAttrs, Row};

  fn cell(attrs: CellAttrs) -> Cell {
    Cell {
      attrs,
      children: Vec::new(),
    }
  }

  fn plain() -> Cell {
    cell(CellAttrs::default())
  }

  fn color(value: &str) -> ThemedColor {
    ThemedColor {
      light: value.into(),
      dark:  None,
    }
  }

  #[test]
  fn test_rowspan_skips_covered_column() {
    let table = Table {
      rows: vec![
        Row {
          cells: vec![
            cell(CellAttrs {
              colspan: 2,
              ..CellAttrs::default()
            }),
            plain(),
          ],
        },
        Row {
          cells: vec![
            cell(CellAttrs {
              rowspan: 2,
              ..CellAttrs::default()
            }),
            plain(),
            plain(),
          ],
        },
        Row {
          cells: vec![plain(), plain()],
        },
      ],
      ..Table::default()
    };
    let columns: Vec<Vec<usize>> = layout(&table)
      .into_iter()
      .map(|(_, cells)| cells.into_iter().map(|c| c.column).collect())
      .collect();
    assert_eq!(columns, vec![vec![0, 2], vec![0, 1, 2], vec![1, 2]]);
  }

  #[test]
  fn test_column_colors_persist_and_yield() {
    let table = Table {
      rows: vec![
        Row {
          cells: vec![cell(CellAttrs {
            col_bgcolor: Some(color("red")),
            ..CellAttrs::default()
          })],
        },
        Row {
          cells: vec![plain()],
        },
        Row {
          cells: vec![cell(CellAttrs {
            row_bgcolor: Some(color("blue")),
            ..CellAttrs::default()
          })],
        },
        Row {
          cells: vec![cell(CellAttrs {
            bgcolor: Some(color("green")),
            ..CellAttrs::default()
          })],
        },
      ],
      ..Table::default()
    };
    let backgrounds: Vec<Option<String>> = layout(&table)
      .into_iter()
      .map(|(_, cells)| cells[0].bgcolor.clone().map(|c| c.light))
      .collect();
    assert_eq!(backgrounds, vec![
      Some("red".to_string()),
      Some("red".to_string()),
      Some("blue".to_string()),
      Some("green".to_string()),
    ]);
  }
}
