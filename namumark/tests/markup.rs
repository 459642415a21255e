#![allow(clippy::unwrap_used, reason = "Fine in tests")]
use namumark::{
  ErrorCode,
  MarkupOptions,
  MarkupProcessor,
  RenderRequest,
  RenderResult,
  utils::{escape_html, unescape_html},
};

/// Check if HTML output contains all expected substrings.
fn assert_html_contains(html: &str, expected: &[&str]) {
  for &needle in expected {
    assert!(
      html.contains(needle),
      "Expected HTML to contain '{needle}', but it did not.\nFull \
       HTML:\n{html}"
    );
  }
}

fn render(text: &str) -> RenderResult {
  let processor = MarkupProcessor::new(MarkupOptions::default());
  processor.process(text, &RenderRequest::standalone("Test"))
}

#[test]
fn test_document_features_together() {
  let text = r"= 개요 =
'''굵게''', ''기울임'', __밑줄__, ~~취소~~ 그리고 {{{+2 큰 글씨}}}.
 * 첫째
 * 둘째
> 인용문
{{{#!syntax rust
fn main() {}
}}}
== 세부 ==
{{{#!folding 더 보기
숨겨진 내용
}}}
----
";
  let result = render(text);
  assert!(!result.has_error, "unexpected error: {:?}", result.error_code);
  assert_html_contains(&result.html, &[
    "<strong>굵게</strong>",
    "<em>기울임</em>",
    "<u>밑줄</u>",
    "<del>취소</del>",
    "<span class=\"wiki-size size-up-2\">큰 글씨</span>",
    "<ul class=\"wiki-list\"><li>",
    "<blockquote class=\"wiki-quote\">",
    "<pre class=\"wiki-code\"><code class=\"language-rust\">fn main() {}",
    "<details class=\"wiki-folding\"><summary>더 보기</summary>",
    "<hr>",
  ]);
}

#[test]
fn test_headings_number_and_nest() {
  let result = render("= A =\n== B ==\n== C ==\n= D =\n");
  let numbering: Vec<&str> = result
    .headings
    .iter()
    .map(|heading| heading.numbering.as_str())
    .collect();
  assert_eq!(numbering, vec!["1", "1.1", "1.2", "2"]);
  assert_html_contains(&result.html, &[
    "<h1 class=\"wiki-heading\" id=\"s-1\">",
    "<h2 class=\"wiki-heading\" id=\"s-1.2\">",
    "<span class=\"wiki-heading-text\">D</span></h1>",
  ]);
  let sections: Vec<usize> = result.headings.iter().map(|h| h.section).collect();
  assert!(sections.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn test_conditional_blocks() {
  let hidden = render("{{{#!if 1==2\nX}}}");
  assert!(!hidden.html.contains('X'));

  let shown = render("{{{#!if 1==1\n'''X'''}}}");
  assert_html_contains(&shown.html, &["<strong>X</strong>"]);

  // Expressions the sandbox rejects count as false.
  let rejected = render("{{{#!if constructor\nX}}}");
  assert!(!rejected.html.contains('X'));
}

#[test]
fn test_unregistered_macro_is_literal() {
  let result = render("앞 [없는매크로(1, 2)] 뒤");
  assert_html_contains(&result.html, &["앞 [없는매크로(1, 2)] 뒤"]);
}

#[test]
fn test_builtin_macros() {
  let result = render("= 제목 =\n[목차]\n내용[* 각주]\n[br][각주]");
  assert_html_contains(&result.html, &[
    "<div class=\"wiki-macro-toc\" id=\"toc\">",
    "<a href=\"#s-1\">1</a>",
    "<br>",
    "class=\"wiki-macro-footnote\"",
  ]);
}

#[test]
fn test_raw_html_is_sanitized() {
  let result = render("{{{#!html <a href=\"javascript:alert(1)\" onclick=\"x\">link</a>}}}");
  assert!(!result.html.contains("javascript:"));
  assert!(!result.html.contains("onclick"));
  assert_html_contains(&result.html, &["link</a>"]);
}

#[test]
fn test_text_is_escaped() {
  let result = render("<script>alert('x')</script> & more");
  assert!(!result.html.contains("<script>"));
  assert_html_contains(&result.html, &["&lt;script&gt;", "&amp; more"]);
}

#[test]
fn test_escape_round_trip() {
  for text in ["plain", "a < b", "\"quoted\" & 'single'", "한국어 <태그>", ""] {
    assert_eq!(unescape_html(&escape_html(text)), text);
  }
}

#[test]
fn test_redirect_document() {
  let result = render("#redirect 다른 문서\n");
  assert_eq!(result.redirect.as_deref(), Some("다른 문서"));
  assert_eq!(result.error_code, ErrorCode::None);
}

#[test]
fn test_embed_preview() {
  let result = render("= 제목 =\n첫 문단의   내용입니다.");
  assert!(result.embed.text.contains("첫 문단의 내용입니다."));
  assert!(result.embed.image.is_none());
}

#[test]
fn test_result_serializes() {
  let result = render("[[링크]] [[분류:분류 이름]]");
  let json = serde_json::to_value(&result).unwrap();
  assert_eq!(json["error_code"], "none");
  assert_eq!(json["links"][0], "링크");
}
