//! Table model, cell attribute mini-language and span layout.
//!
//! Cells carry a prefix of `<tag>` attributes. The parser strips them with a
//! per-table [`TableAttrParser`] and block-parses the rest; [`layout`] then
//! assigns visual columns and resolves colors once all rows are known.
use serde::{Deserialize, Serialize};

use crate::{parser::ast::Node, utils::css::ThemedColor};

mod attr;
pub mod layout;

pub use attr::{TableAttrParser, apply_space_alignment};
pub use layout::{PlacedCell, layout};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HorizontalAlign {
  Left,
  Center,
  Right,
}

impl HorizontalAlign {
  #[must_use]
  pub const fn css(self) -> &'static str {
    match self {
      Self::Left => "left",
      Self::Center => "center",
      Self::Right => "right",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerticalAlign {
  Top,
  Middle,
  Bottom,
}

impl VerticalAlign {
  #[must_use]
  pub const fn css(self) -> &'static str {
    match self {
      Self::Top => "top",
      Self::Middle => "middle",
      Self::Bottom => "bottom",
    }
  }
}

/// Properties that apply to the whole table. Each may be set once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableProps {
  pub align:        Option<HorizontalAlign>,
  pub width:        Option<String>,
  pub bgcolor:      Option<ThemedColor>,
  pub color:        Option<ThemedColor>,
  pub border_color: Option<ThemedColor>,
}

/// Attributes parsed from one cell's tag prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellAttrs {
  pub colspan:     usize,
  pub rowspan:     usize,
  pub align:       Option<HorizontalAlign>,
  pub valign:      Option<VerticalAlign>,
  pub bgcolor:     Option<ThemedColor>,
  pub color:       Option<ThemedColor>,
  pub row_bgcolor: Option<ThemedColor>,
  pub row_color:   Option<ThemedColor>,
  pub col_bgcolor: Option<ThemedColor>,
  pub col_color:   Option<ThemedColor>,
  pub width:       Option<String>,
  pub height:      Option<String>,
  pub nopad:       bool,
  pub keepall:     bool,
}

impl Default for CellAttrs {
  fn default() -> Self {
    Self {
      colspan:     1,
      rowspan:     1,
      align:       None,
      valign:      None,
      bgcolor:     None,
      color:       None,
      row_bgcolor: None,
      row_color:   None,
      col_bgcolor: None,
      col_color:   None,
      width:       None,
      height:      None,
      nopad:       false,
      keepall:     false,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
  pub attrs:    CellAttrs,
  pub children: Vec<Node>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
  pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
  pub caption: Option<Vec<Node>>,
  pub props:   TableProps,
  pub rows:    Vec<Row>,
}
