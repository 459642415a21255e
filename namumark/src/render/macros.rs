//! The macro plugin interface and the built-in macros.
//!
//! Handlers are keyed by name and aliases in a [`MacroRegistry`]. The
//! built-in table is assembled once and shared; callers may build their own
//! registry on top of it with [`MacroRegistry::register`].
use std::{
  collections::HashMap,
  fmt::Write as _,
  sync::{Arc, LazyLock},
};

use jiff::civil::Date;
use regex::Regex;

use super::RenderContext;
use crate::{
  error::RenderError,
  parser::ast::MacroCall,
  utils::{anchor_id, css::css_color, escape_html, never_matching_regex},
};

/// A macro handler.
pub trait Macro: Send + Sync {
  /// Canonical, lowercase name.
  fn name(&self) -> &'static str;

  fn aliases(&self) -> &'static [&'static str] {
    &[]
  }

  /// Whether the macro expands in discussion threads.
  fn allowed_in_thread(&self) -> bool {
    true
  }

  /// Produce the HTML for one invocation. Output written through the
  /// context is charged there; the returned string is charged by the
  /// caller.
  ///
  /// # Errors
  ///
  /// Returns a [`RenderError`] only for limits hit while rendering nested
  /// content. Bad arguments render the call literally instead.
  fn format(
    &self,
    raw_args: Option<&str>,
    ctx: &mut RenderContext<'_>,
    call: &MacroCall,
  ) -> Result<String, RenderError>;
}

/// Name and alias keyed macro table.
#[derive(Default)]
pub struct MacroRegistry {
  handlers: Vec<Box<dyn Macro>>,
  names:    HashMap<&'static str, usize>,
}

impl std::fmt::Debug for MacroRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let mut names: Vec<_> = self.names.keys().collect();
    names.sort();
    f.debug_struct("MacroRegistry").field("names", &names).finish()
  }
}

static BUILTINS: LazyLock<Arc<MacroRegistry>> =
  LazyLock::new(|| Arc::new(MacroRegistry::with_builtins()));

impl MacroRegistry {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// A registry holding every built-in macro.
  #[must_use]
  pub fn with_builtins() -> Self {
    let mut registry = Self::new();
    registry
      .register(Box::new(LineBreak))
      .register(Box::new(Clearfix))
      .register(Box::new(DateTime))
      .register(Box::new(Age))
      .register(Box::new(DDay))
      .register(Box::new(PageCount))
      .register(Box::new(TableOfContents))
      .register(Box::new(FootnoteList))
      .register(Box::new(Anchor))
      .register(Box::new(Ruby))
      .register(Box::new(Math))
      .register(Box::new(Include))
      .register(Box::new(Vote));
    for video in VIDEOS {
      registry.register(Box::new(video));
    }
    registry
  }

  /// The shared built-in registry.
  #[must_use]
  pub fn builtins() -> Arc<Self> {
    Arc::clone(&BUILTINS)
  }

  /// Add a handler. Its names replace earlier handlers with the same names.
  pub fn register(&mut self, handler: Box<dyn Macro>) -> &mut Self {
    let index = self.handlers.len();
    self.names.insert(handler.name(), index);
    for alias in handler.aliases() {
      self.names.insert(*alias, index);
    }
    self.handlers.push(handler);
    self
  }

  #[must_use]
  pub fn get(&self, name: &str) -> Option<&dyn Macro> {
    self
      .names
      .get(name)
      .and_then(|index| self.handlers.get(*index))
      .map(|handler| &**handler)
  }

  /// Number of names, aliases included.
  #[must_use]
  pub fn len(&self) -> usize {
    self.names.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }
}

/// The call as written, for arguments a handler cannot use.
fn literal(call: &MacroCall) -> String {
  escape_html(&call.raw)
}

fn date_arg(call: &MacroCall) -> Option<Date> {
  call.args.first()?.parse().ok()
}

struct LineBreak;

impl Macro for LineBreak {
  fn name(&self) -> &'static str {
    "br"
  }

  fn format(
    &self,
    _raw_args: Option<&str>,
    _ctx: &mut RenderContext<'_>,
    _call: &MacroCall,
  ) -> Result<String, RenderError> {
    Ok("<br>".to_string())
  }
}

struct Clearfix;

impl Macro for Clearfix {
  fn name(&self) -> &'static str {
    "clearfix"
  }

  fn format(
    &self,
    _raw_args: Option<&str>,
    _ctx: &mut RenderContext<'_>,
    _call: &MacroCall,
  ) -> Result<String, RenderError> {
    Ok("<div style=\"clear:both\"></div>".to_string())
  }
}

struct DateTime;

impl Macro for DateTime {
  fn name(&self) -> &'static str {
    "date"
  }

  fn aliases(&self) -> &'static [&'static str] {
    &["datetime"]
  }

  fn format(
    &self,
    _raw_args: Option<&str>,
    ctx: &mut RenderContext<'_>,
    _call: &MacroCall,
  ) -> Result<String, RenderError> {
    Ok(ctx.now().strftime("%Y-%m-%d %H:%M:%S%:z").to_string())
  }
}

/// Full years since a date.
struct Age;

impl Macro for Age {
  fn name(&self) -> &'static str {
    "age"
  }

  fn format(
    &self,
    _raw_args: Option<&str>,
    ctx: &mut RenderContext<'_>,
    call: &MacroCall,
  ) -> Result<String, RenderError> {
    let today = ctx.now().date();
    let Some(birth) = date_arg(call).filter(|birth| *birth <= today) else {
      return Ok(literal(call));
    };
    let mut age = i32::from(today.year()) - i32::from(birth.year());
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
      age -= 1;
    }
    Ok(age.to_string())
  }
}

/// Days since (`D+N`) or until (`D-N`) a date.
struct DDay;

impl Macro for DDay {
  fn name(&self) -> &'static str {
    "dday"
  }

  fn format(
    &self,
    _raw_args: Option<&str>,
    ctx: &mut RenderContext<'_>,
    call: &MacroCall,
  ) -> Result<String, RenderError> {
    let Some(target) = date_arg(call) else {
      return Ok(literal(call));
    };
    let today = ctx.now().date();
    let days = (today - target).get_days();
    Ok(match days {
      0 => "D-Day".to_string(),
      d if d > 0 => format!("D+{d}"),
      d => format!("D-{}", d.unsigned_abs()),
    })
  }
}

struct PageCount;

impl Macro for PageCount {
  fn name(&self) -> &'static str {
    "pagecount"
  }

  fn format(
    &self,
    _raw_args: Option<&str>,
    ctx: &mut RenderContext<'_>,
    call: &MacroCall,
  ) -> Result<String, RenderError> {
    let namespace = call.args.first().map(String::as_str);
    if let Some(namespace) = namespace
      && !ctx.options().namespaces.is_known(namespace)
    {
      return Ok(literal(call));
    }
    Ok(ctx.lookup().count(namespace).to_string())
  }
}

struct TableOfContents;

impl Macro for TableOfContents {
  fn name(&self) -> &'static str {
    "tableofcontents"
  }

  fn aliases(&self) -> &'static [&'static str] {
    &["목차"]
  }

  fn format(
    &self,
    _raw_args: Option<&str>,
    ctx: &mut RenderContext<'_>,
    _call: &MacroCall,
  ) -> Result<String, RenderError> {
    Ok(ctx.toc_html())
  }
}

/// Lists the footnotes seen so far and starts a new list.
struct FootnoteList;

impl Macro for FootnoteList {
  fn name(&self) -> &'static str {
    "footnote"
  }

  fn aliases(&self) -> &'static [&'static str] {
    &["각주"]
  }

  fn format(
    &self,
    _raw_args: Option<&str>,
    ctx: &mut RenderContext<'_>,
    _call: &MacroCall,
  ) -> Result<String, RenderError> {
    let mut html = String::new();
    ctx.flush_footnotes(&mut html)?;
    Ok(html)
  }
}

struct Anchor;

impl Macro for Anchor {
  fn name(&self) -> &'static str {
    "anchor"
  }

  fn format(
    &self,
    _raw_args: Option<&str>,
    _ctx: &mut RenderContext<'_>,
    call: &MacroCall,
  ) -> Result<String, RenderError> {
    let id = call.args.first().map(|name| anchor_id(name)).unwrap_or_default();
    if id.is_empty() {
      return Ok(literal(call));
    }
    Ok(format!(
      "<a class=\"wiki-anchor\" id=\"{}\"></a>",
      escape_html(&id)
    ))
  }
}

/// `[ruby(base, ruby=annotation, color=c)]`.
struct Ruby;

impl Macro for Ruby {
  fn name(&self) -> &'static str {
    "ruby"
  }

  fn format(
    &self,
    _raw_args: Option<&str>,
    _ctx: &mut RenderContext<'_>,
    call: &MacroCall,
  ) -> Result<String, RenderError> {
    let base = call.positional_args().next().filter(|b| !b.is_empty());
    let annotation = call.named_arg("ruby").filter(|r| !r.is_empty());
    let (Some(base), Some(annotation)) = (base, annotation) else {
      return Ok(literal(call));
    };
    let style = call
      .named_arg("color")
      .and_then(css_color)
      .map(|color| format!(" style=\"color:{}\"", escape_html(&color)))
      .unwrap_or_default();
    Ok(format!(
      "<ruby>{}<rp>(</rp><rt{style}>{}</rt><rp>)</rp></ruby>",
      escape_html(base),
      escape_html(annotation)
    ))
  }
}

/// TeX source, typeset client-side.
struct Math;

impl Macro for Math {
  fn name(&self) -> &'static str {
    "math"
  }

  fn format(
    &self,
    raw_args: Option<&str>,
    _ctx: &mut RenderContext<'_>,
    call: &MacroCall,
  ) -> Result<String, RenderError> {
    let tex = raw_args.map(str::trim).unwrap_or_default();
    if tex.is_empty() {
      return Ok(literal(call));
    }
    Ok(format!(
      "<span class=\"wiki-math\">\\({}\\)</span>",
      escape_html(tex)
    ))
  }
}

static VIDEO_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^[A-Za-z0-9_-]{1,64}$").unwrap_or_else(|e| {
    log::error!("Failed to compile VIDEO_ID_RE regex: {e}");
    never_matching_regex()
  })
});

/// An embedded video player from one host.
#[derive(Debug, Clone, Copy)]
struct Video {
  name:   &'static str,
  player: &'static str,
  /// Query parameter for the start offset, if the player has one.
  start:  Option<&'static str>,
}

const VIDEOS: [Video; 5] = [
  Video {
    name:   "youtube",
    player: "https://www.youtube-nocookie.com/embed/",
    start:  Some("start"),
  },
  Video {
    name:   "kakaotv",
    player: "https://tv.kakao.com/embed/player/cliplink/",
    start:  Some("start"),
  },
  Video {
    name:   "nicovideo",
    player: "https://embed.nicovideo.jp/watch/",
    start:  Some("from"),
  },
  Video {
    name:   "vimeo",
    player: "https://player.vimeo.com/video/",
    start:  None,
  },
  Video {
    name:   "navertv",
    player: "https://tv.naver.com/embed/",
    start:  None,
  },
];

/// A pixel dimension argument, digits only.
fn dimension(call: &MacroCall, key: &str, default: u32) -> u32 {
  call
    .named_arg(key)
    .map(|value| value.trim_end_matches("px"))
    .and_then(|value| value.parse().ok())
    .filter(|value| (1..=4096).contains(value))
    .unwrap_or(default)
}

impl Macro for Video {
  fn name(&self) -> &'static str {
    self.name
  }

  fn format(
    &self,
    _raw_args: Option<&str>,
    _ctx: &mut RenderContext<'_>,
    call: &MacroCall,
  ) -> Result<String, RenderError> {
    let Some(id) = call.positional_args().next().filter(|id| VIDEO_ID_RE.is_match(id)) else {
      return Ok(literal(call));
    };
    let mut src = format!("{}{id}", self.player);
    if let Some(param) = self.start
      && let Some(start) = call.named_arg("start").and_then(|s| s.parse::<u32>().ok())
    {
      let _ = write!(src, "?{param}={start}");
    }
    let width = dimension(call, "width", 640);
    let height = dimension(call, "height", 360);
    Ok(format!(
      "<iframe class=\"wiki-video wiki-video-{}\" src=\"{}\" width=\"{width}\" \
       height=\"{height}\" frameborder=\"0\" allowfullscreen \
       loading=\"lazy\"></iframe>",
      self.name,
      escape_html(&src)
    ))
  }
}

struct Include;

impl Macro for Include {
  fn name(&self) -> &'static str {
    "include"
  }

  fn allowed_in_thread(&self) -> bool {
    false
  }

  fn format(
    &self,
    _raw_args: Option<&str>,
    ctx: &mut RenderContext<'_>,
    call: &MacroCall,
  ) -> Result<String, RenderError> {
    match &call.include {
      Some(include) => ctx.render_include(include),
      None => Ok(literal(call)),
    }
  }
}

/// A poll: the first argument is the question, the rest are the options.
struct Vote;

impl Macro for Vote {
  fn name(&self) -> &'static str {
    "vote"
  }

  fn format(
    &self,
    _raw_args: Option<&str>,
    ctx: &mut RenderContext<'_>,
    call: &MacroCall,
  ) -> Result<String, RenderError> {
    let Some((question, choices)) = call
      .vote
      .as_deref()
      .and_then(|args| args.split_first())
    else {
      return Ok(literal(call));
    };
    let group = ctx.macro_count(self.name());
    let mut html = String::new();
    ctx.put(&mut html, "<div class=\"wiki-macro-vote\"><div class=\"vote-question\">")?;
    ctx.render_nodes(question, &mut html)?;
    ctx.put(&mut html, "</div><ul class=\"vote-options\">")?;
    for (i, choice) in choices.iter().enumerate() {
      ctx.put(
        &mut html,
        &format!(
          "<li><label><input type=\"radio\" name=\"vote-{group}\" value=\"{i}\" \
           disabled> "
        ),
      )?;
      ctx.render_nodes(choice, &mut html)?;
      ctx.put(&mut html, "</label></li>")?;
    }
    ctx.put(&mut html, "</ul></div>")?;
    Ok(html)
  }
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]

  use jiff::{Zoned, civil::date, tz::TimeZone};

  use super::*;
  use crate::{
    deadline::Deadline,
    document::DocumentRef,
    lookup::MemoryLookup,
    parser::Parser,
    processor::types::MarkupOptions,
  };

  fn fixed_now() -> Zoned {
    date(2024, 3, 15)
      .at(12, 30, 0, 0)
      .to_zoned(TimeZone::UTC)
      .unwrap()
  }

  fn render_in(text: &str, thread: bool, lookup: &MemoryLookup) -> String {
    let options = MarkupOptions::default();
    let parse_options = crate::parser::ParseOptions {
      thread,
      ..Default::default()
    };
    let parsed = Parser::new(parse_options, &options.namespaces)
      .parse_document(text, Deadline::unbounded())
      .unwrap();
    let document = DocumentRef::new("문서", "Test");
    let registry = MacroRegistry::with_builtins();
    RenderContext::new(
      &document,
      lookup,
      &registry,
      &options,
      &options.limits,
      Deadline::unbounded(),
    )
    .with_now(Some(fixed_now()))
    .with_thread(thread)
    .render_document(&parsed)
    .unwrap()
    .html
  }

  fn render(text: &str) -> String {
    render_in(text, false, &MemoryLookup::new())
  }

  #[test]
  fn test_registry_aliases() {
    let registry = MacroRegistry::with_builtins();
    assert_eq!(registry.get("목차").map(Macro::name), Some("tableofcontents"));
    assert_eq!(registry.get("각주").map(Macro::name), Some("footnote"));
    assert_eq!(registry.get("datetime").map(Macro::name), Some("date"));
    assert!(registry.get("nope").is_none());
  }

  #[test]
  fn test_dates() {
    assert!(render("[date]").contains("2024-03-15 12:30:00+00:00"));
    assert!(render("[age(2000-03-16)]").contains(">23<"));
    assert!(render("[age(2000-03-15)]").contains(">24<"));
    assert!(render("[dday(2024-03-10)]").contains("D+5"));
    assert!(render("[dday(2024-03-20)]").contains("D-5"));
    assert!(render("[dday(2024-03-15)]").contains("D-Day"));
    assert!(render("[age(2099-01-01)]").contains("[age(2099-01-01)]"));
    assert!(render("[dday(soon)]").contains("[dday(soon)]"));
  }

  #[test]
  fn test_ruby_and_anchor() {
    let html = render("[ruby(漢字, ruby=かんじ, color=red)][anchor(top)]");
    assert!(html.contains("<ruby>漢字<rp>(</rp><rt style=\"color:red\">かんじ</rt>"));
    assert!(html.contains("<a class=\"wiki-anchor\" id=\"top\"></a>"));
    assert!(render("[ruby(x)]").contains("[ruby(x)]"));
  }

  #[test]
  fn test_video_ids_validated() {
    let html = render("[youtube(dQw4w9WgXcQ, start=30, width=320)]");
    assert!(html.contains("src=\"https://www.youtube-nocookie.com/embed/dQw4w9WgXcQ?start=30\""));
    assert!(html.contains("width=\"320\" height=\"360\""));
    let bad = render("[youtube(\"><script>)]");
    assert!(!bad.contains("<iframe"));
    assert!(!bad.contains("<script>"));
  }

  #[test]
  fn test_include_disabled_in_threads() {
    let mut lookup = MemoryLookup::new();
    lookup.insert_document(DocumentRef::new("틀", "T"), "included");
    assert!(render_in("[include(틀:T)]", false, &lookup).contains("included"));
    let html = render_in("[include(틀:T)]", true, &lookup);
    assert!(!html.contains("wiki-include"));
    assert!(html.contains("[include(틀:T)]"));
  }

  #[test]
  fn test_pagecount() {
    let html = render("[pagecount(없는곳)]");
    assert!(html.contains("[pagecount(없는곳)]"));
    assert!(render("[pagecount]").contains(">0<"));
  }

  #[test]
  fn test_vote() {
    let html = render("[vote(Which?, '''A''', B)]");
    assert!(html.contains("<div class=\"vote-question\">Which?</div>"));
    assert!(html.contains("value=\"0\" disabled> <strong>A</strong>"));
    assert!(html.contains("value=\"1\" disabled> B"));
  }

  #[test]
  fn test_call_cap() {
    let options = crate::processor::types::MarkupOptionsBuilder::new()
      .max_macro_calls(2)
      .build();
    let parsed = Parser::new(Default::default(), &options.namespaces)
      .parse_document("[br][br][br]", Deadline::unbounded())
      .unwrap();
    let document = DocumentRef::new("문서", "Test");
    let registry = MacroRegistry::with_builtins();
    let html = RenderContext::new(
      &document,
      &MemoryLookup::new(),
      &registry,
      &options,
      &options.limits,
      Deadline::unbounded(),
    )
    .render_document(&parsed)
    .unwrap()
    .html;
    assert_eq!(html.matches("<br>").count(), 2);
    assert!(html.contains("[br]"));
  }
}
