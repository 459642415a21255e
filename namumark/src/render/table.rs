use std::fmt::Write as _;

use super::{RenderContext, StyleAttr};
use crate::{
  error::RenderError,
  table::{Cell, PlacedCell, Table, layout},
};

impl RenderContext<'_> {
  pub(crate) fn render_table(&mut self, table: &Table, out: &mut String) -> Result<(), RenderError> {
    let props = &table.props;
    let mut wrap_class = String::from("wiki-table-wrap");
    if let Some(align) = props.align {
      let _ = write!(wrap_class, " table-{}", align.css());
    }
    let mut wrap = StyleAttr::default();
    if let Some(width) = &props.width {
      wrap.push(format!("width:{width}"));
    }
    let mut style = StyleAttr::default();
    style.color("background-color", props.bgcolor.as_ref());
    style.color("color", props.color.as_ref());
    if let Some(border) = &props.border_color {
      let (light, dark) = border.declarations("border");
      style.push(light.replacen(':', ":2px solid ", 1));
      if let Some(dark) = dark {
        style.dark.push(dark.replacen(':', ":2px solid ", 1));
      }
    }
    self.put(
      out,
      &format!(
        "<div class=\"{wrap_class}\"{}><table class=\"wiki-table\"{}>",
        wrap.attrs(),
        style.attrs()
      ),
    )?;
    if let Some(caption) = &table.caption {
      self.put(out, "<caption>")?;
      self.render_nodes(caption, out)?;
      self.put(out, "</caption>")?;
    }
    self.put(out, "<tbody>")?;
    for (row, (colors, placed)) in table.rows.iter().zip(layout(table)) {
      let mut row_style = StyleAttr::default();
      row_style.color("background-color", colors.bgcolor.as_ref());
      row_style.color("color", colors.color.as_ref());
      self.put(out, &format!("<tr{}>", row_style.attrs()))?;
      for (cell, place) in row.cells.iter().zip(placed) {
        self.render_cell(cell, &place, out)?;
      }
      self.put(out, "</tr>")?;
    }
    self.put(out, "</tbody></table></div>")
  }

  fn render_cell(
    &mut self,
    cell: &Cell,
    place: &PlacedCell,
    out: &mut String,
  ) -> Result<(), RenderError> {
    let attrs = &cell.attrs;
    let mut style = StyleAttr::default();
    style.color("background-color", place.bgcolor.as_ref());
    style.color("color", place.color.as_ref());
    if let Some(align) = attrs.align {
      style.push(format!("text-align:{}", align.css()));
    }
    if let Some(valign) = attrs.valign {
      style.push(format!("vertical-align:{}", valign.css()));
    }
    if let Some(width) = &attrs.width {
      style.push(format!("width:{width}"));
    }
    if let Some(height) = &attrs.height {
      style.push(format!("height:{height}"));
    }
    if attrs.nopad {
      style.push("padding:0".to_string());
    }
    if attrs.keepall {
      style.push("word-break:keep-all".to_string());
    }
    let mut open = String::from("<td");
    if attrs.colspan > 1 {
      let _ = write!(open, " colspan=\"{}\"", attrs.colspan);
    }
    if attrs.rowspan > 1 {
      let _ = write!(open, " rowspan=\"{}\"", attrs.rowspan);
    }
    let _ = write!(open, " data-column=\"{}\"{}>", place.column, style.attrs());
    self.put(out, &open)?;
    self.render_nodes(&cell.children, out)?;
    self.put(out, "</td>")
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]

  use crate::{
    deadline::Deadline,
    document::DocumentRef,
    lookup::EmptyLookup,
    parser::Parser,
    processor::types::MarkupOptions,
    render::{MacroRegistry, RenderContext},
  };

  fn render(text: &str) -> String {
    let options = MarkupOptions::default();
    let parsed = Parser::new(Default::default(), &options.namespaces)
      .parse_document(text, Deadline::unbounded())
      .unwrap();
    let document = DocumentRef::new("문서", "Test");
    let registry = MacroRegistry::with_builtins();
    RenderContext::new(
      &document,
      &EmptyLookup,
      &registry,
      &options,
      &options.limits,
      Deadline::unbounded(),
    )
    .render_document(&parsed)
    .unwrap()
    .html
  }

  #[test]
  fn test_spans_and_columns() {
    let html = render("||<-2> wide ||<|2> tall ||\n|| a || b ||\n|| c || d || e ||");
    assert!(html.contains("<td colspan=\"2\" data-column=\"0\""));
    assert!(html.contains("<td rowspan=\"2\" data-column=\"2\""));
    // The second row sits left of the rowspan.
    assert!(html.contains("data-column=\"1\" style=\"text-align:center\">b</td>"));
  }

  #[test]
  fn test_colors_and_caption() {
    let html =
      render("|Caption|<tablebgcolor=#eee><rowbgcolor=red> x || y ||\n||<#00f> z || w ||");
    assert!(html.contains("<caption>Caption</caption>"));
    assert!(html.contains("<table class=\"wiki-table\" style=\"background-color:#eee\">"));
    assert!(html.contains("<tr style=\"background-color:red\">"));
    assert!(html.contains("style=\"background-color:#00f"));
  }
}
