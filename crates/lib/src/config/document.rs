//! In-memory model of a flat `KEY=value` document.
//!
//! Lines that are not entries (comments, blanks, anything without `=`) are
//! kept verbatim so a rewrite never loses user content.

use std::fmt;

use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
  Entry { key: String, value: String },
  Other(String),
}

/// Ordered `KEY=value` document with non-destructive updates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDocument {
  lines: Vec<Line>,
}

impl ConfigDocument {
  pub fn new() -> Self {
    Self::default()
  }

  /// Parse document text. Never fails: unrecognised lines are preserved as-is.
  pub fn parse(content: &str) -> Self {
    let lines = content.lines().map(parse_line).collect();
    Self { lines }
  }

  /// Value of `key`; the last occurrence wins if the file repeats a key.
  pub fn get(&self, key: &str) -> Option<&str> {
    self.lines.iter().rev().find_map(|line| match line {
      Line::Entry { key: k, value } if k == key => Some(value.as_str()),
      _ => None,
    })
  }

  pub fn contains_key(&self, key: &str) -> bool {
    self.get(key).is_some()
  }

  /// Upsert `key`.
  ///
  /// The first occurrence keeps its line position and later duplicates are
  /// dropped, so keys are unique afterwards. New keys are appended.
  ///
  /// Values are written literally. A value containing a newline will split
  /// into extra lines when the document is read back.
  pub fn set(&mut self, key: &str, value: &str) {
    if value.contains('\n') {
      warn!(key, "config value contains a newline and will not round-trip");
    }

    let mut seen = false;
    self.lines.retain_mut(|line| match line {
      Line::Entry { key: k, value: v } if k == key => {
        if seen {
          return false;
        }
        seen = true;
        *v = value.to_string();
        true
      }
      _ => true,
    });

    if !seen {
      self.lines.push(Line::Entry {
        key: key.to_string(),
        value: value.to_string(),
      });
    }
  }

  /// Entries in file order.
  pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
    self.lines.iter().filter_map(|line| match line {
      Line::Entry { key, value } => Some((key.as_str(), value.as_str())),
      Line::Other(_) => None,
    })
  }

  pub fn is_empty(&self) -> bool {
    self.lines.is_empty()
  }
}

impl fmt::Display for ConfigDocument {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for line in &self.lines {
      match line {
        Line::Entry { key, value } => writeln!(f, "{}={}", key, value)?,
        Line::Other(raw) => writeln!(f, "{}", raw)?,
      }
    }
    Ok(())
  }
}

fn parse_line(raw: &str) -> Line {
  let trimmed = raw.trim_start();
  if trimmed.is_empty() || trimmed.starts_with('#') {
    return Line::Other(raw.to_string());
  }

  match raw.split_once('=') {
    Some((key, value)) if !key.trim().is_empty() => Line::Entry {
      key: key.trim().to_string(),
      value: value.to_string(),
    },
    _ => Line::Other(raw.to_string()),
  }
}
