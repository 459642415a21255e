//! Validation helpers for the small CSS surface documents can touch:
//! colors, lengths and inline `style` declarations.
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::never_matching_regex;

static HEX_COLOR_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{4}|[0-9a-fA-F]{6}|[0-9a-fA-F]{8})$")
    .unwrap_or_else(|e| {
      log::error!("Failed to compile HEX_COLOR_RE regex: {e}");
      never_matching_regex()
    })
});

static LENGTH_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^(\d{1,5}(?:\.\d{1,3})?)(px|%)?$").unwrap_or_else(|e| {
    log::error!("Failed to compile LENGTH_RE regex: {e}");
    never_matching_regex()
  })
});

static PROPERTY_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^-?[a-zA-Z][a-zA-Z-]*$").unwrap_or_else(|e| {
    log::error!("Failed to compile PROPERTY_RE regex: {e}");
    never_matching_regex()
  })
});

/// CSS named colors accepted by the markup.
const NAMED_COLORS: &[&str] = &[
  "aliceblue", "antiquewhite", "aqua", "aquamarine", "azure", "beige",
  "bisque", "black", "blanchedalmond", "blue", "blueviolet", "brown",
  "burlywood", "cadetblue", "chartreuse", "chocolate", "coral",
  "cornflowerblue", "cornsilk", "crimson", "cyan", "darkblue", "darkcyan",
  "darkgoldenrod", "darkgray", "darkgreen", "darkgrey", "darkkhaki",
  "darkmagenta", "darkolivegreen", "darkorange", "darkorchid", "darkred",
  "darksalmon", "darkseagreen", "darkslateblue", "darkslategray",
  "darkslategrey", "darkturquoise", "darkviolet", "deeppink", "deepskyblue",
  "dimgray", "dimgrey", "dodgerblue", "firebrick", "floralwhite",
  "forestgreen", "fuchsia", "gainsboro", "ghostwhite", "gold", "goldenrod",
  "gray", "green", "greenyellow", "grey", "honeydew", "hotpink", "indianred",
  "indigo", "ivory", "khaki", "lavender", "lavenderblush", "lawngreen",
  "lemonchiffon", "lightblue", "lightcoral", "lightcyan",
  "lightgoldenrodyellow", "lightgray", "lightgreen", "lightgrey", "lightpink",
  "lightsalmon", "lightseagreen", "lightskyblue", "lightslategray",
  "lightslategrey", "lightsteelblue", "lightyellow", "lime", "limegreen",
  "linen", "magenta", "maroon", "mediumaquamarine", "mediumblue",
  "mediumorchid", "mediumpurple", "mediumseagreen", "mediumslateblue",
  "mediumspringgreen", "mediumturquoise", "mediumvioletred", "midnightblue",
  "mintcream", "mistyrose", "moccasin", "navajowhite", "navy", "oldlace",
  "olive", "olivedrab", "orange", "orangered", "orchid", "palegoldenrod",
  "palegreen", "paleturquoise", "palevioletred", "papayawhip", "peachpuff",
  "peru", "pink", "plum", "powderblue", "purple", "rebeccapurple", "red",
  "rosybrown", "royalblue", "saddlebrown", "salmon", "sandybrown",
  "seagreen", "seashell", "sienna", "silver", "skyblue", "slateblue",
  "slategray", "slategrey", "snow", "springgreen", "steelblue", "tan", "teal",
  "thistle", "tomato", "transparent", "turquoise", "violet", "wheat", "white",
  "whitesmoke", "yellow", "yellowgreen",
];

/// Validate a color written as `#hex`, `hex` (only with the `#`), or a named
/// color with or without a leading `#`. Returns the normalized CSS value.
#[must_use]
pub fn css_color(value: &str) -> Option<String> {
  let value = value.trim();
  if let Some(rest) = value.strip_prefix('#') {
    if HEX_COLOR_RE.is_match(rest) {
      return Some(format!("#{}", rest.to_ascii_lowercase()));
    }
    return named_color(rest);
  }
  named_color(value)
}

fn named_color(name: &str) -> Option<String> {
  let lower = name.to_ascii_lowercase();
  NAMED_COLORS
    .binary_search(&lower.as_str())
    .ok()
    .map(|_| lower)
}

/// A color with an optional dark-mode variant (`light,dark`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemedColor {
  pub light: String,
  pub dark:  Option<String>,
}

impl ThemedColor {
  /// Parse `color` or `color,dark-color`. Both halves must validate.
  #[must_use]
  pub fn parse(value: &str) -> Option<Self> {
    match value.split_once(',') {
      Some((light, dark)) => {
        Some(Self {
          light: css_color(light)?,
          dark:  Some(css_color(dark)?),
        })
      },
      None => {
        Some(Self {
          light: css_color(value)?,
          dark:  None,
        })
      },
    }
  }

  /// Render as `property:light` plus the dark-mode declaration, if any.
  #[must_use]
  pub fn declarations(&self, property: &str) -> (String, Option<String>) {
    (
      format!("{property}:{}", self.light),
      self.dark.as_ref().map(|dark| format!("{property}:{dark}")),
    )
  }
}

/// Validate a length: a number with unit `px` or `%`; a bare number means
/// pixels. Anything else is rejected.
#[must_use]
pub fn css_length(value: &str) -> Option<String> {
  let caps = LENGTH_RE.captures(value.trim())?;
  let number = &caps[1];
  let unit = caps.get(2).map_or("px", |m| m.as_str());
  Some(format!("{number}{unit}"))
}

/// Sanitize an inline `style` attribute value.
///
/// Declarations with odd property names, or values that could escape the
/// attribute or load resources, are dropped one by one.
#[must_use]
pub fn sanitize_style(style: &str) -> String {
  let mut kept = Vec::new();
  for declaration in style.split(';') {
    let Some((property, value)) = declaration.split_once(':') else {
      continue;
    };
    let property = property.trim();
    let value = value.trim();
    if !PROPERTY_RE.is_match(property) || value.is_empty() {
      continue;
    }
    let lowered = value.to_ascii_lowercase();
    if lowered.contains("url(")
      || lowered.contains("expression")
      || lowered.contains("javascript:")
      || lowered.contains("@import")
      || value.contains(['<', '>', '"', '\\', '{', '}'])
    {
      continue;
    }
    kept.push(format!("{}:{value}", property.to_ascii_lowercase()));
  }
  kept.join(";")
}
