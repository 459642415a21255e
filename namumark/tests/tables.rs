use namumark::{MarkupOptions, MarkupProcessor, RenderRequest};

fn assert_html_contains(html: &str, expected: &[&str]) {
  for &needle in expected {
    assert!(
      html.contains(needle),
      "Expected HTML to contain '{needle}', but it did not.\nFull \
       HTML:\n{html}"
    );
  }
}

fn render_html(text: &str) -> String {
  let processor = MarkupProcessor::new(MarkupOptions::default());
  processor.process(text, &RenderRequest::standalone("Test")).html
}

#[test]
fn test_colspan_then_rowspan_skips_covered_column() {
  let html = render_html("||<-2>A||B||\n||<|2>C||D||E||\n||F||G||");
  assert_html_contains(&html, &[
    "<td colspan=\"2\" data-column=\"0\">A</td>",
    "<td data-column=\"2\">B</td>",
    "<td rowspan=\"2\" data-column=\"0\">C</td>",
  ]);
  // The third row starts right of the rowspan and has no extra cell.
  let last_row = html.rsplit("<tr>").next().unwrap_or_default();
  assert_html_contains(last_row, &[
    "<td data-column=\"1\">F</td>",
    "<td data-column=\"2\">G</td>",
  ]);
  assert_eq!(last_row.matches("<td").count(), 2);
}

#[test]
fn test_empty_cells_widen_the_next() {
  let html = render_html("||||wide||x||");
  assert_html_contains(&html, &["<td colspan=\"2\" data-column=\"0\">wide</td>"]);
}

#[test]
fn test_spaces_align_cells() {
  let html = render_html("|| 가운데 || 오른쪽||왼쪽 ||");
  assert_html_contains(&html, &[
    "style=\"text-align:center\">가운데</td>",
    "style=\"text-align:right\">오른쪽</td>",
    "style=\"text-align:left\">왼쪽</td>",
  ]);
}

#[test]
fn test_table_props() {
  let html = render_html(
    "||<tablealign=center><tablewidth=50%><tablebordercolor=#333>가운데||<(> 왼쪽 ||",
  );
  assert_html_contains(&html, &[
    "<div class=\"wiki-table-wrap table-center\" style=\"width:50%\">",
    "border:2px solid #333",
    "<td data-column=\"0\">가운데</td>",
    "style=\"text-align:left\">왼쪽</td>",
  ]);
}

#[test]
fn test_dark_mode_colors() {
  let html = render_html("||<bgcolor=#fff,#000>셀||");
  assert_html_contains(&html, &[
    "style=\"background-color:#fff\" data-dark-style=\"background-color:#000\">셀</td>",
  ]);
}

#[test]
fn test_invalid_attribute_stays_text() {
  let html = render_html("||<nonsense=1>x||");
  assert_html_contains(&html, &["&lt;nonsense=1&gt;x</td>"]);
}

#[test]
fn test_cells_hold_inline_markup() {
  let html = render_html("|| '''굵게''' || [[링크]] ||");
  assert_html_contains(&html, &[
    "<strong>굵게</strong></td>",
    "title=\"링크\">링크</a></td>",
  ]);
}
