//! Static theme configuration for the front-end styling build.

use serde::Serialize;
use std::collections::BTreeMap;

/// Key used for the unsuffixed shade of a color family.
const DEFAULT_SHADE: &str = "DEFAULT";

/// A single color or a family of named shades.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ColorValue {
  Single(String),
  Shades(BTreeMap<String, String>),
}

/// Fonts and colors exposed to the styling tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
  pub font_family: BTreeMap<String, Vec<String>>,
  pub colors: BTreeMap<String, ColorValue>,
}

impl Default for Theme {
  fn default() -> Self {
    let font_family = BTreeMap::from([(
      "robomono".to_string(),
      vec!["RobotoMono".to_string(), "sans-serif".to_string()],
    )]);

    let single = |v: &str| ColorValue::Single(v.to_string());
    let nostr = BTreeMap::from([
      ("dark".to_string(), "#800080".to_string()),
      (DEFAULT_SHADE.to_string(), "#be29ec".to_string()),
      ("light".to_string(), "#d896ff".to_string()),
    ]);

    let colors = BTreeMap::from([
      ("transparent".to_string(), single("transparent")),
      ("current".to_string(), single("currentColor")),
      ("nostr".to_string(), ColorValue::Shades(nostr)),
      ("black".to_string(), single("#000")),
      ("white".to_string(), single("#fff")),
      ("green".to_string(), single("#16a34a")),
      ("red".to_string(), single("#dc2626")),
    ]);

    Self {
      font_family,
      colors,
    }
  }
}

impl Theme {
  /// Look up a color by utility-style name: `red`, `nostr` or `nostr-dark`.
  pub fn color(&self, name: &str) -> Option<&str> {
    if let Some(value) = self.colors.get(name) {
      return match value {
        ColorValue::Single(v) => Some(v.as_str()),
        ColorValue::Shades(shades) => shades.get(DEFAULT_SHADE).map(String::as_str),
      };
    }

    let (family, shade) = name.rsplit_once('-')?;
    match self.colors.get(family)? {
      ColorValue::Shades(shades) => shades.get(shade).map(String::as_str),
      ColorValue::Single(_) => None,
    }
  }

  pub fn font(&self, name: &str) -> Option<&[String]> {
    self.font_family.get(name).map(Vec::as_slice)
  }

  /// Resolve a name against colors first, then fonts.
  pub fn resolve(&self, name: &str) -> Option<String> {
    self
      .color(name)
      .map(String::from)
      .or_else(|| self.font(name).map(|stack| stack.join(", ")))
  }
}
