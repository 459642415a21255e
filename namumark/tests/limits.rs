#![allow(clippy::unwrap_used, reason = "Fine in tests")]
use std::time::{Duration, Instant};

use namumark::{
  ErrorCode,
  Limits,
  MarkupOptions,
  MarkupOptionsBuilder,
  MarkupProcessor,
  Messages,
  RenderPool,
  RenderRequest,
};

#[test]
fn test_nesting_past_depth_renders_as_text() {
  let processor = MarkupProcessor::new(MarkupOptionsBuilder::new().max_depth(4).build());
  let text = "{{{+1 ".repeat(50) + "core" + &"}}}".repeat(50);
  let result = processor.process(&text, &RenderRequest::standalone("Test"));
  assert!(!result.has_error);
  assert!(result.html.contains("core"));
  assert!(result.html.contains("{{{+1 "));
  assert!(result.html.matches("<span class=\"wiki-size").count() <= 4);
}

#[test]
fn test_deep_brackets_do_not_overflow() {
  let processor = MarkupProcessor::new(MarkupOptions::default());
  let text = "[[".repeat(2_000) + &"]]".repeat(2_000);
  let result = processor.process(&text, &RenderRequest::standalone("Test"));
  assert!(!result.html.is_empty());
}

#[test]
fn test_output_cap_reports_code_and_message() {
  let messages = Messages {
    render_too_long: "too long".to_string(),
    ..Messages::default()
  };
  let processor = MarkupProcessor::new(
    MarkupOptionsBuilder::new()
      .max_output_len(64)
      .messages(messages)
      .build(),
  );
  let result = processor.process(&"문단\n".repeat(100), &RenderRequest::standalone("Test"));
  assert!(result.has_error);
  assert_eq!(result.error_code, ErrorCode::RenderTooLong);
  assert_eq!(result.html, "<div class=\"wiki-error\">too long</div>");
}

#[test]
fn test_request_limits_override_processor() {
  let processor = MarkupProcessor::new(MarkupOptions::default());
  let request = RenderRequest::standalone("Test").with_limits(Limits {
    max_output_len: 32,
    ..Limits::default()
  });
  let result = processor.process(&"x".repeat(100), &request);
  assert_eq!(result.error_code, ErrorCode::RenderTooLong);
}

#[test]
fn test_macro_calls_are_capped() {
  let processor = MarkupProcessor::new(MarkupOptionsBuilder::new().max_macro_calls(3).build());
  let result = processor.process(&"[br]".repeat(10), &RenderRequest::standalone("Test"));
  assert_eq!(result.html.matches("<br>").count(), 3);
  assert!(result.html.contains("[br]"));
}

#[test]
fn test_large_input_finishes_within_budget() {
  let options = MarkupOptionsBuilder::new()
    .parse_timeout(Duration::from_millis(500))
    .render_timeout(Duration::from_millis(500))
    .build();
  let processor = MarkupProcessor::new(options);
  let text = "'''bold [[link|''it'' {{{#!wiki\n||<-2>x||\n}}}]]''' ".repeat(5_000);
  let started = Instant::now();
  let result = processor.process(&text, &RenderRequest::standalone("Test"));
  // Either finished or stopped by a limit, never stuck.
  assert!(started.elapsed() < Duration::from_secs(30));
  if result.has_error {
    assert!(matches!(
      result.error_code,
      ErrorCode::ParseTimeout | ErrorCode::RenderTimeout | ErrorCode::RenderTooLong
    ));
  }
}

#[test]
fn test_pool_reports_parse_timeout() {
  let options = MarkupOptionsBuilder::new()
    .parse_timeout(Duration::ZERO)
    .build();
  let pool = RenderPool::new(MarkupProcessor::new(options), 1).unwrap();
  let result = pool.render(&"'''a''' ".repeat(5_000), RenderRequest::standalone("Test"));
  assert!(result.has_error);
  assert_eq!(result.error_code, ErrorCode::ParseTimeout);
}

fn assert_bounded(text: &str) {
  let budget = Duration::from_millis(100);
  let processor = MarkupProcessor::new(
    MarkupOptionsBuilder::new()
      .parse_timeout(budget)
      .render_timeout(budget)
      .build(),
  );
  let started = Instant::now();
  let result = processor.process(text, &RenderRequest::standalone("Test"));
  let elapsed = started.elapsed();
  assert!(
    elapsed < budget * 20,
    "{} bytes starting {:?} took {elapsed:?}",
    text.len(),
    &text[..text.len().min(16)]
  );
  if result.has_error {
    assert!(matches!(
      result.error_code,
      ErrorCode::ParseTimeout | ErrorCode::RenderTimeout | ErrorCode::RenderTooLong
    ));
  }
}

#[test]
fn test_unclosed_link_openers_are_bounded() {
  assert_bounded(&"[[".repeat(100_000));
  assert_bounded(&"[[a|".repeat(50_000));
}

#[test]
fn test_unclosed_macro_openers_are_bounded() {
  assert_bounded(&"[macro(".repeat(30_000));
  assert_bounded(&"[a ".repeat(60_000));
  assert_bounded(&"[*x\n".repeat(40_000));
}

#[test]
fn test_unclosed_literal_lines_are_bounded() {
  assert_bounded(&"{{{\n".repeat(40_000));
  assert_bounded(&"||{{{x\n".repeat(30_000));
  assert_bounded(&"||x\n".repeat(40_000));
}
