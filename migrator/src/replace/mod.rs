//! Special-character replacement table.
//!
//! The mainframe code page cannot hold every character found in source
//! files, so configured tokens are substituted in every output value:
//!
//! ```json
//! { "Ñ": "N", "ñ": "n", "º": "o", "\"": "" }
//! ```
//!
//! Tokens are applied in a single left-to-right scan, longest token first,
//! so a multi-character token is never cut by a shorter one it contains.
//! Replacement text is not scanned again.

use regex::Regex;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::{ConfigError, ConfigResult};
use crate::validation::validate_replacements;

/// Immutable token -> replacement table.
#[derive(Debug, Clone, Default)]
pub struct ReplacementTable {
    entries: Vec<(String, String)>,
    lookup: HashMap<String, String>,
    pattern: Option<Regex>,
}

impl ReplacementTable {
    /// Build from ordered pairs. Tokens must be non-empty and distinct.
    pub fn new(entries: Vec<(String, String)>) -> ConfigResult<Self> {
        let mut lookup = HashMap::with_capacity(entries.len());
        for (token, replacement) in &entries {
            if token.is_empty() {
                return Err(ConfigError::InvalidReplacement("empty token".to_string()));
            }
            if lookup.insert(token.clone(), replacement.clone()).is_some() {
                return Err(ConfigError::InvalidReplacement(format!(
                    "token '{}' is declared more than once",
                    token
                )));
            }
        }

        let pattern = if entries.is_empty() {
            None
        } else {
            // Alternation is leftmost-first, so longer tokens must come first.
            // The sort is stable: equal lengths keep declaration order.
            let mut tokens: Vec<&str> = entries.iter().map(|(t, _)| t.as_str()).collect();
            tokens.sort_by_key(|t| std::cmp::Reverse(t.chars().count()));
            let alternation = tokens
                .iter()
                .map(|t| regex::escape(t))
                .collect::<Vec<_>>()
                .join("|");
            let regex = Regex::new(&alternation)
                .map_err(|e| ConfigError::InvalidReplacement(e.to_string()))?;
            Some(regex)
        };

        Ok(Self {
            entries,
            lookup,
            pattern,
        })
    }

    /// Load a replacement document from disk.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&path.display().to_string(), &content)
    }

    /// Parse a replacement document. `origin` names the source in errors.
    pub fn from_json_str(origin: &str, content: &str) -> ConfigResult<Self> {
        let json_error = |e: serde_json::Error| ConfigError::Json {
            path: origin.to_string(),
            message: e.to_string(),
        };

        let document: serde_json::Value = serde_json::from_str(content).map_err(json_error)?;
        validate_replacements(&document).map_err(|errors| ConfigError::Layout {
            path: origin.to_string(),
            errors,
        })?;

        // Parsed again as raw pairs: a JSON map would hide duplicated tokens.
        let pairs: OrderedPairs = serde_json::from_str(content).map_err(json_error)?;
        Self::new(pairs.0)
    }

    /// Replace every token in `text`. Returns the new text and the number of
    /// replacements made.
    pub fn apply<'t>(&self, text: &'t str) -> (Cow<'t, str>, usize) {
        let Some(pattern) = &self.pattern else {
            return (Cow::Borrowed(text), 0);
        };
        let mut count = 0;
        let replaced = pattern.replace_all(text, |caps: &regex::Captures| {
            count += 1;
            self.lookup.get(&caps[0]).cloned().unwrap_or_default()
        });
        (replaced, count)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// JSON object read as ordered pairs, duplicates included.
struct OrderedPairs(Vec<(String, String)>);

impl<'de> Deserialize<'de> for OrderedPairs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PairsVisitor;

        impl<'de> Visitor<'de> for PairsVisitor {
            type Value = OrderedPairs;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of token -> replacement strings")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((token, replacement)) = map.next_entry::<String, String>()? {
                    pairs.push((token, replacement));
                }
                Ok(OrderedPairs(pairs))
            }
        }

        deserializer.deserialize_map(PairsVisitor)
    }
}
