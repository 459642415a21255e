use std::mem::{Discriminant, discriminant};

use super::{CellAttrs, HorizontalAlign, TableProps, VerticalAlign};
use crate::utils::css::{ThemedColor, css_length};

/// Largest accepted colspan or rowspan.
const MAX_SPAN: usize = 256;

/// What one `<tag>` does to its cell, row, column or table.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Effect {
  Colspan(usize),
  Rowspan(usize, Option<VerticalAlign>),
  Align(HorizontalAlign),
  Bgcolor(ThemedColor),
  Color(ThemedColor),
  RowBgcolor(ThemedColor),
  RowColor(ThemedColor),
  ColBgcolor(ThemedColor),
  ColColor(ThemedColor),
  Width(String),
  Height(String),
  Nopad,
  Keepall,
  Table(TableEffect),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TableEffect {
  Align(HorizontalAlign),
  Width(String),
  Bgcolor(ThemedColor),
  Color(ThemedColor),
  BorderColor(ThemedColor),
}

fn unquote(value: &str) -> &str {
  let value = value.trim();
  for quote in ['"', '\''] {
    if let Some(inner) = value
      .strip_prefix(quote)
      .and_then(|rest| rest.strip_suffix(quote))
    {
      return inner;
    }
  }
  value
}

fn parse_span(digits: &str) -> Option<usize> {
  digits
    .parse::<usize>()
    .ok()
    .filter(|n| (1..=MAX_SPAN).contains(n))
}

fn parse_table_align(value: &str) -> Option<HorizontalAlign> {
  match value.to_ascii_lowercase().as_str() {
    "left" => Some(HorizontalAlign::Left),
    "center" => Some(HorizontalAlign::Center),
    "right" => Some(HorizontalAlign::Right),
    _ => None,
  }
}

/// Interpret the inside of one `<...>` tag.
fn parse_tag(inner: &str) -> Option<Effect> {
  match inner {
    ":" => return Some(Effect::Align(HorizontalAlign::Center)),
    "(" => return Some(Effect::Align(HorizontalAlign::Left)),
    ")" => return Some(Effect::Align(HorizontalAlign::Right)),
    _ => {},
  }
  if let Some(digits) = inner.strip_prefix('-') {
    return parse_span(digits).map(Effect::Colspan);
  }
  if let Some(digits) = inner.strip_prefix("^|") {
    return parse_span(digits)
      .map(|n| Effect::Rowspan(n, Some(VerticalAlign::Top)));
  }
  if let Some(digits) = inner.strip_prefix("v|") {
    return parse_span(digits)
      .map(|n| Effect::Rowspan(n, Some(VerticalAlign::Bottom)));
  }
  if let Some(digits) = inner.strip_prefix('|') {
    return parse_span(digits).map(|n| Effect::Rowspan(n, None));
  }
  if inner.starts_with('#') {
    return ThemedColor::parse(inner).map(Effect::Bgcolor);
  }
  let Some((key, value)) = inner.split_once('=') else {
    return match inner.to_ascii_lowercase().as_str() {
      "nopad" => Some(Effect::Nopad),
      "keepall" => Some(Effect::Keepall),
      _ => None,
    };
  };
  let value = unquote(value);
  let color = || ThemedColor::parse(value);
  let effect = match key.trim().to_ascii_lowercase().as_str() {
    "bgcolor" => Effect::Bgcolor(color()?),
    "color" => Effect::Color(color()?),
    "rowbgcolor" => Effect::RowBgcolor(color()?),
    "rowcolor" => Effect::RowColor(color()?),
    "colbgcolor" => Effect::ColBgcolor(color()?),
    "colcolor" => Effect::ColColor(color()?),
    "width" => Effect::Width(css_length(value)?),
    "height" => Effect::Height(css_length(value)?),
    "tablealign" => Effect::Table(TableEffect::Align(parse_table_align(value)?)),
    "tablewidth" => Effect::Table(TableEffect::Width(css_length(value)?)),
    "tablebgcolor" => Effect::Table(TableEffect::Bgcolor(color()?)),
    "tablecolor" => Effect::Table(TableEffect::Color(color()?)),
    "tablebordercolor" => {
      Effect::Table(TableEffect::BorderColor(color()?))
    },
    _ => return None,
  };
  Some(effect)
}

/// Length of the tag starting at `<`, up to and including `>`. Quoted values
/// may contain `>`.
fn tag_len(text: &str) -> Option<usize> {
  let mut quote = None;
  for (i, ch) in text.char_indices().skip(1) {
    match (quote, ch) {
      (None, '"' | '\'') => quote = Some(ch),
      (Some(open), _) if ch == open => quote = None,
      (None, '>') => return Some(i + 1),
      (None, '<' | '\n') => return None,
      _ => {},
    }
  }
  None
}

/// Cell attribute parser for one table. Table-level properties are
/// remembered across cells so each can be set only once.
#[derive(Debug, Default)]
pub struct TableAttrParser {
  props:     TableProps,
  table_set: Vec<Discriminant<TableEffect>>,
}

impl TableAttrParser {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Strip the leading tags of a cell. Stops at the first tag that is
  /// invalid or repeats an earlier one; that tag and everything after it
  /// is content.
  pub fn parse_cell<'a>(&mut self, content: &'a str) -> (CellAttrs, &'a str) {
    let mut attrs = CellAttrs::default();
    let mut seen: Vec<Discriminant<Effect>> = Vec::new();
    let mut rest = content;
    while rest.starts_with('<') {
      let Some(len) = tag_len(rest) else {
        break;
      };
      let Some(effect) = parse_tag(&rest[1..len - 1]) else {
        break;
      };
      // Table-level tags are deduplicated per table in `apply`.
      let slot = discriminant(&effect);
      let cell_level = !matches!(effect, Effect::Table(_));
      if (cell_level && seen.contains(&slot)) || !self.apply(&mut attrs, effect)
      {
        break;
      }
      seen.push(slot);
      rest = &rest[len..];
    }
    (attrs, rest)
  }

  /// Apply an effect. Returns `false` for a repeated table-level property.
  fn apply(&mut self, attrs: &mut CellAttrs, effect: Effect) -> bool {
    match effect {
      Effect::Colspan(n) => attrs.colspan = n,
      Effect::Rowspan(n, valign) => {
        attrs.rowspan = n;
        attrs.valign = valign.or(attrs.valign);
      },
      Effect::Align(align) => attrs.align = Some(align),
      Effect::Bgcolor(c) => attrs.bgcolor = Some(c),
      Effect::Color(c) => attrs.color = Some(c),
      Effect::RowBgcolor(c) => attrs.row_bgcolor = Some(c),
      Effect::RowColor(c) => attrs.row_color = Some(c),
      Effect::ColBgcolor(c) => attrs.col_bgcolor = Some(c),
      Effect::ColColor(c) => attrs.col_color = Some(c),
      Effect::Width(w) => attrs.width = Some(w),
      Effect::Height(h) => attrs.height = Some(h),
      Effect::Nopad => attrs.nopad = true,
      Effect::Keepall => attrs.keepall = true,
      Effect::Table(table) => {
        let slot = discriminant(&table);
        if self.table_set.contains(&slot) {
          return false;
        }
        self.table_set.push(slot);
        match table {
          TableEffect::Align(a) => self.props.align = Some(a),
          TableEffect::Width(w) => self.props.width = Some(w),
          TableEffect::Bgcolor(c) => self.props.bgcolor = Some(c),
          TableEffect::Color(c) => self.props.color = Some(c),
          TableEffect::BorderColor(c) => self.props.border_color = Some(c),
        }
      },
    }
    true
  }

  /// Table-level properties collected so far.
  #[must_use]
  pub fn into_props(self) -> TableProps {
    self.props
  }
}

/// Derive alignment from the spaces around cell content (`| x|` right,
/// `|x |` left, `| x |` center) and trim them. An explicit alignment tag
/// wins.
#[must_use]
pub fn apply_space_alignment(
  content: &str,
  explicit: Option<HorizontalAlign>,
) -> (Option<HorizontalAlign>, &str) {
  let leading = content.starts_with(' ');
  let trailing = content.ends_with(' ');
  let implied = match (leading, trailing) {
    (true, true) => Some(HorizontalAlign::Center),
    (true, false) => Some(HorizontalAlign::Right),
    (false, true) => Some(HorizontalAlign::Left),
    (false, false) => None,
  };
  (explicit.or(implied), content.trim())
}
