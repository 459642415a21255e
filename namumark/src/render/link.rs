//! Link and image resolution.
//!
//! External links carry the allowlisted URL as parsed. Internal links are
//! checked against the lookup for existence, relative targets resolve
//! against the current document, and file links become images when the
//! file is stored.
use std::fmt::Write as _;

use super::{RenderContext, StyleAttr};
use crate::{
  document::{DocumentRef, resolve_relative},
  error::RenderError,
  lookup::{Entry, FileMeta},
  parser::ast::{Link, LinkTarget},
  utils::{
    anchor_id,
    css::{css_color, css_length},
    encode_title,
    escape_html,
    unescape_markup,
  },
};

const ALIGNS: [&str; 6] = ["left", "center", "right", "bottom", "middle", "top"];
const THEMES: [&str; 2] = ["light", "dark"];
const RENDERINGS: [&str; 5] = [
  "auto",
  "smooth",
  "high-quality",
  "crisp-edges",
  "pixelated",
];

/// Display options of a file embed (`[[파일:x.png|width=100&align=center]]`).
/// Options that fail validation are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageOptions {
  pub width:         Option<String>,
  pub height:        Option<String>,
  pub border_radius: Option<String>,
  pub align:         Option<&'static str>,
  pub bgcolor:       Option<String>,
  pub theme:         Option<&'static str>,
  pub rendering:     Option<&'static str>,
}

fn one_of(allowed: &[&'static str], value: &str) -> Option<&'static str> {
  allowed.iter().copied().find(|a| a.eq_ignore_ascii_case(value))
}

impl ImageOptions {
  #[must_use]
  pub fn parse(raw: &str) -> Self {
    let mut options = Self::default();
    for pair in raw.split('&') {
      let Some((key, value)) = pair.split_once('=') else {
        continue;
      };
      let value = value.trim();
      match key.trim().to_ascii_lowercase().as_str() {
        "width" => options.width = css_length(value),
        "height" => options.height = css_length(value),
        "border-radius" => options.border_radius = css_length(value),
        "align" => options.align = one_of(&ALIGNS, value),
        "bgcolor" => options.bgcolor = css_color(value),
        "theme" => options.theme = one_of(&THEMES, value),
        "rendering" => options.rendering = one_of(&RENDERINGS, value),
        other => log::trace!("dropping unknown image option {other:?}"),
      }
    }
    options
  }
}

impl RenderContext<'_> {
  pub(crate) fn render_link(&mut self, link: &Link, out: &mut String) -> Result<(), RenderError> {
    match &link.target {
      LinkTarget::External { url } => {
        self.put(
          out,
          &format!(
            "<a class=\"wiki-link-external\" href=\"{}\" target=\"_blank\" \
             rel=\"nofollow noopener ugc\">",
            escape_html(url)
          ),
        )?;
        self.link_content(link, out)?;
        self.put(out, "</a>")
      },
      LinkTarget::Anchor { fragment } => {
        self.put(
          out,
          &format!(
            "<a class=\"wiki-link-anchor\" href=\"#{}\">",
            escape_html(&anchor_id(fragment))
          ),
        )?;
        self.link_content(link, out)?;
        self.put(out, "</a>")
      },
      LinkTarget::Document { document, fragment } => {
        self.render_document_link(link, document, fragment.as_deref(), out)
      },
      LinkTarget::File { document, options } => {
        self.render_file(link, document, options, out)
      },
    }
  }

  fn link_content(&mut self, link: &Link, out: &mut String) -> Result<(), RenderError> {
    match &link.display {
      Some(display) => self.render_nodes(display, out),
      None => self.put_text(out, &unescape_markup(&link.raw_target)),
    }
  }

  /// Expand a relative title against the current document.
  fn resolve_target(&self, document: &DocumentRef) -> DocumentRef {
    let namespaces = &self.options().namespaces;
    let title = document.title.as_str();
    if document.namespace == namespaces.default
      && (title.starts_with('/') || title.starts_with("../"))
    {
      let absolute = resolve_relative(title, self.document(), namespaces);
      return DocumentRef::parse(&absolute, namespaces).document;
    }
    document.clone()
  }

  fn document_href(&self, document: &DocumentRef, fragment: Option<&str>) -> String {
    let options = self.options();
    let mut href = format!(
      "{}{}",
      options.links.document_prefix,
      encode_title(&document.full_title(&options.namespaces))
    );
    if let Some(fragment) = fragment.filter(|f| !f.is_empty()) {
      let _ = write!(href, "#{}", anchor_id(fragment));
    }
    href
  }

  fn render_document_link(
    &mut self,
    link: &Link,
    document: &DocumentRef,
    fragment: Option<&str>,
    out: &mut String,
  ) -> Result<(), RenderError> {
    let mut target = self.resolve_target(document);
    if target.title.is_empty() {
      target = self.document().clone();
    }
    let namespaces = &self.options().namespaces;
    let full_title = target.full_title(namespaces);
    let self_link = target == *self.document();
    let class = if self_link {
      "wiki-self-link"
    } else if self.lookup().exists(&target) {
      "wiki-link-internal"
    } else {
      "wiki-link-internal not-exist"
    };
    let href = self.document_href(&target, fragment);
    self.record_link(full_title.clone());
    self.put(
      out,
      &format!(
        "<a class=\"{class}\" href=\"{}\" title=\"{}\">",
        escape_html(&href),
        escape_html(&full_title)
      ),
    )?;
    self.link_content(link, out)?;
    self.put(out, "</a>")
  }

  fn render_file(
    &mut self,
    link: &Link,
    document: &DocumentRef,
    options: &str,
    out: &mut String,
  ) -> Result<(), RenderError> {
    let full_title = document.full_title(&self.options().namespaces);
    self.record_file(full_title.clone());
    let Some(Entry::File(meta)) = self.lookup().lookup(document) else {
      log::debug!("file {full_title} not found, rendering a link");
      let href = self.document_href(document, None);
      self.put(
        out,
        &format!(
          "<a class=\"wiki-link-internal not-exist\" href=\"{}\" title=\"{}\">",
          escape_html(&href),
          escape_html(&full_title)
        ),
      )?;
      self.put_text(out, &unescape_markup(&link.raw_target))?;
      return self.put(out, "</a>");
    };
    let image = ImageOptions::parse(options);
    let html = self.image_html(&meta, &image, &document.title);
    self.put(out, &html)
  }

  fn image_html(&mut self, meta: &FileMeta, options: &ImageOptions, alt: &str) -> String {
    let src = format!("{}{}", self.options().links.file_prefix, meta.storage_key);
    self.note_image(&src);

    let mut class = String::from("wiki-image-wrap");
    if let Some(align) = options.align {
      let _ = write!(class, " wiki-image-align-{align}");
    }
    if let Some(theme) = options.theme {
      let _ = write!(class, " wiki-theme-{theme}");
    }
    let mut wrap = StyleAttr::default();
    if let Some(width) = &options.width {
      wrap.push(format!("width:{width}"));
    }
    if let Some(height) = &options.height {
      wrap.push(format!("height:{height}"));
    }
    if let Some(bgcolor) = &options.bgcolor {
      wrap.push(format!("background-color:{bgcolor}"));
    }
    let mut image = StyleAttr::default();
    if let Some(radius) = &options.border_radius {
      image.push(format!("border-radius:{radius}"));
    }
    if let Some(rendering) = options.rendering {
      image.push(format!("image-rendering:{rendering}"));
    }

    let mut html = format!(
      "<span class=\"{class}\"{}><img class=\"wiki-image\" src=\"{}\" alt=\"{}\" \
       loading=\"lazy\"",
      wrap.attrs(),
      escape_html(&src),
      escape_html(alt)
    );
    if let Some(width) = meta.width {
      let _ = write!(html, " width=\"{width}\"");
    }
    if let Some(height) = meta.height {
      let _ = write!(html, " height=\"{height}\"");
    }
    let _ = write!(html, "{}></span>", image.attrs());
    html
  }
}
