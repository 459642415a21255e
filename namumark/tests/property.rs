//! Pseudo-random markup soup. The generator is seeded, so failures
//! reproduce.
use std::time::{Duration, Instant};

use namumark::{ErrorCode, MarkupOptionsBuilder, MarkupProcessor, RenderRequest};

const FRAGMENTS: &[&str] = &[
  "'''", "''", "__", "~~", "--", "^^", ",,", "[[", "]]", "|", "[*", "]", "[", "(", ")",
  "{{{", "}}}", "{{{+2 ", "{{{#red ", "{{{#!wiki style=\"color:red\"\n", "{{{#!if ",
  "{{{#!folding ", "{{{#!html ", "{{{#!syntax c\n", "||", "<-2>", "<|2>", "<#fff>", "\n",
  "\n= ", " =\n", "\n== ", " ==\n", "\n * ", "\n> ", "\n 1.", "@", "@x=1@", "#", "\\",
  "[include(틀:X, a=b)]", "[br]", "[date]", "[목차]", "[각주]", "[age(2000-01-01)]",
  "[youtube(abc)]", "[[분류:C]]", "[[파일:a.png|width=10]]", "[[https://e.x|e]]",
  "<script>", "&amp;", "가나다", "text ", "  ", "1==1", "'a'.length",
];

/// xorshift64*
struct Rng(u64);

impl Rng {
  fn next(&mut self) -> u64 {
    self.0 ^= self.0 >> 12;
    self.0 ^= self.0 << 25;
    self.0 ^= self.0 >> 27;
    self.0.wrapping_mul(0x2545_f491_4f6c_dd1d)
  }

  fn below(&mut self, n: usize) -> usize {
    let n = u64::try_from(n).unwrap_or(u64::MAX);
    usize::try_from(self.next() % n).unwrap_or(0)
  }
}

fn soup(rng: &mut Rng, pieces: usize) -> String {
  (0..pieces)
    .map(|_| FRAGMENTS[rng.below(FRAGMENTS.len())])
    .collect()
}

#[test]
fn test_random_markup_terminates_without_panic() {
  let options = MarkupOptionsBuilder::new()
    .parse_timeout(Duration::from_millis(500))
    .render_timeout(Duration::from_millis(500))
    .build();
  let processor = MarkupProcessor::new(options);
  let mut rng = Rng(0x9e37_79b9_7f4a_7c15);

  for round in 0..300 {
    let len = 1 + rng.below(200);
    let text = soup(&mut rng, len);
    let started = Instant::now();
    let result = processor.process(&text, &RenderRequest::standalone("Test"));
    assert!(
      started.elapsed() < Duration::from_secs(10),
      "round {round} took {:?} on {text:?}",
      started.elapsed()
    );
    assert!(
      !result.has_error
        || matches!(
          result.error_code,
          ErrorCode::ParseTimeout | ErrorCode::RenderTimeout | ErrorCode::RenderTooLong
        ),
      "round {round} failed with {:?} on {text:?}",
      result.error_code
    );
    assert!(!result.html.contains("<script>"), "round {round} leaked a script tag");

    let sections: Vec<usize> = result.headings.iter().map(|h| h.section).collect();
    assert!(
      sections.windows(2).all(|pair| pair[0] < pair[1]),
      "round {round} produced sections {sections:?}"
    );
  }
}

#[test]
fn test_heading_numbering_depends_only_on_prior_levels() {
  let processor = MarkupProcessor::new(MarkupOptionsBuilder::new().build());
  let mut rng = Rng(0x0123_4567_89ab_cdef);

  for _ in 0..50 {
    let levels: Vec<usize> = (0..12).map(|_| 1 + rng.below(4)).collect();
    let document = |count: usize| {
      levels[..count]
        .iter()
        .enumerate()
        .map(|(i, level)| {
          let marks = "=".repeat(*level);
          format!("{marks} h{i} {marks}\n본문\n")
        })
        .collect::<String>()
    };

    let full = processor.process(&document(levels.len()), &RenderRequest::standalone("T"));
    assert_eq!(full.headings.len(), levels.len());
    let cut = 1 + rng.below(levels.len() - 1);
    let prefix = processor.process(&document(cut), &RenderRequest::standalone("T"));
    for (a, b) in prefix.headings.iter().zip(&full.headings) {
      assert_eq!(a.numbering, b.numbering, "levels {levels:?}, cut at {cut}");
    }
  }
}
