//! Block configuration: the user-facing option set and the resolved per-block settings.
//!
//! [`CodeBlockOptions`] is sparse (every field optional) and doubles as the editor-wide defaults
//! object. [`BlockSettings::resolve`] merges a block's own options over the defaults over the
//! hard-coded fallbacks exactly once, when a block is finalized, and every other part of the
//! crate reads the resulting [`BlockSettings`].

use crate::error::CodeResult;
use lined_code_highlight::{Tokenizer, standard_tokenizer};
use lined_code_lang::code_language;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Fallback class for the block element.
pub const DEFAULT_BLOCK_CLASS: &str = "lined-code-node";
/// Fallback class for line elements.
pub const DEFAULT_LINE_CLASS: &str = "code-line";
/// Fallback class added to block and lines while line numbers are visible.
pub const DEFAULT_NUMBERS_CLASS: &str = "line-number";

/// A base class plus an optional extension class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassPairOptions {
    /// Base class.
    pub base: Option<String>,
    /// Extra class appended after the base.
    pub extension: Option<String>,
}

/// Sparse theme class mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeThemeOptions {
    /// Classes of the block element.
    pub block: Option<ClassPairOptions>,
    /// Classes of every line element.
    pub line: Option<ClassPairOptions>,
    /// Class toggled with line-number visibility.
    pub numbers: Option<String>,
    /// Highlight type (e.g. `keyword`) to run class.
    pub highlights: Option<BTreeMap<String, String>>,
}

/// Sparse block options. Used both per block and as the editor-wide defaults.
///
/// The tokenizer is never serialized: it is written as `null` and ignored when read back, then
/// re-attached from the defaults when the block is resolved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CodeBlockOptions {
    /// Let the Tab key indent/outdent inside the block.
    pub activate_tabs: Option<bool>,
    /// Language used when nothing else is configured.
    pub default_language: Option<String>,
    /// Language of the block.
    pub initial_language: Option<String>,
    /// Locked blocks suppress indent, exit and border navigation.
    pub is_block_locked: Option<bool>,
    /// Show line numbers.
    pub line_numbers: Option<bool>,
    /// Theme class mapping.
    pub theme: Option<CodeThemeOptions>,
    /// Extra class naming the active theme.
    pub theme_name: Option<String>,
    /// Tokenizer override.
    #[serde(with = "tokenizer_as_null")]
    pub tokenizer: Option<Arc<dyn Tokenizer>>,
}

mod tokenizer_as_null {
    use super::Tokenizer;
    use serde::de::IgnoredAny;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::sync::Arc;

    pub fn serialize<S: Serializer>(
        _tokenizer: &Option<Arc<dyn Tokenizer>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_none()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Arc<dyn Tokenizer>>, D::Error> {
        IgnoredAny::deserialize(deserializer)?;
        Ok(None)
    }
}

impl CodeBlockOptions {
    /// Options that only set the block language.
    pub fn with_language(language: impl Into<String>) -> Self {
        Self {
            initial_language: Some(language.into()),
            ..Self::default()
        }
    }

    /// Set the tokenizer override.
    pub fn tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    /// Parse options from JSON.
    pub fn from_json(json: &str) -> CodeResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize options to pretty-printed JSON (`tokenizer` is always `null`).
    pub fn to_json(&self) -> CodeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Loads options from a JSON file at `path`.
    /// Returns defaults on any error (missing file, parse error, etc.).
    pub fn load_or_default(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(options) => return options,
                Err(e) => {
                    tracing::warn!("Failed to parse code block options at {}: {e}", path.display());
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read code block options at {}: {e}", path.display());
            }
        }
        Self::default()
    }

    /// Saves options to `path` as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> CodeResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// A resolved base/extension class pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassPair {
    /// Base class.
    pub base: String,
    /// Extension class (may be empty).
    pub extension: String,
}

/// A fully resolved theme class mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeTheme {
    /// Classes of the block element.
    pub block: ClassPair,
    /// Classes of every line element.
    pub line: ClassPair,
    /// Class toggled with line-number visibility.
    pub numbers: String,
    /// Highlight type to run class.
    pub highlights: BTreeMap<String, String>,
}

impl CodeTheme {
    /// Class for a run of the given highlight type, if the theme maps it.
    pub fn highlight_class(&self, highlight_type: Option<&str>) -> Option<&str> {
        highlight_type
            .and_then(|kind| self.highlights.get(kind))
            .map(String::as_str)
            .filter(|class| !class.is_empty())
    }
}

/// Steady-state settings of one block.
#[derive(Debug, Clone)]
pub struct BlockSettings {
    /// Let the Tab key indent/outdent.
    pub activate_tabs: bool,
    /// Language used when nothing else is configured.
    pub default_language: String,
    /// Current language (always a known key or the default sentinel).
    pub language: String,
    /// Lock flag.
    pub is_block_locked: bool,
    /// Line-number visibility.
    pub line_numbers: bool,
    /// Theme class mapping.
    pub theme: CodeTheme,
    /// Theme name class (may be empty).
    pub theme_name: String,
    /// Tokenizer used for every line of the block.
    pub tokenizer: Arc<dyn Tokenizer>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn pick_class(existing: Option<&String>, default: Option<&String>, fallback: &str) -> String {
    existing
        .cloned()
        .or_else(|| default.filter(|v| !v.is_empty()).cloned())
        .unwrap_or_else(|| fallback.to_string())
}

impl BlockSettings {
    /// Resolve each field by priority: the block's own value, then `defaults`, then the
    /// hard-coded fallback. Languages are validated against the known-language table.
    pub fn resolve(existing: &CodeBlockOptions, defaults: &CodeBlockOptions) -> Self {
        let theme = existing.theme.clone().unwrap_or_default();
        let default_theme = defaults.theme.clone().unwrap_or_default();

        let block = theme.block.unwrap_or_default();
        let default_block = default_theme.block.unwrap_or_default();
        let line = theme.line.unwrap_or_default();
        let default_line = default_theme.line.unwrap_or_default();

        let language = code_language(
            non_empty(&existing.initial_language).or(non_empty(&defaults.initial_language)),
        );
        let default_language = code_language(
            non_empty(&existing.default_language).or(non_empty(&defaults.default_language)),
        );

        Self {
            activate_tabs: existing
                .activate_tabs
                .or(defaults.activate_tabs)
                .unwrap_or(false),
            default_language: default_language.to_string(),
            language: language.to_string(),
            is_block_locked: existing
                .is_block_locked
                .or(defaults.is_block_locked)
                .unwrap_or(false),
            line_numbers: existing
                .line_numbers
                .or(defaults.line_numbers)
                .unwrap_or(true),
            theme: CodeTheme {
                block: ClassPair {
                    base: pick_class(
                        block.base.as_ref(),
                        default_block.base.as_ref(),
                        DEFAULT_BLOCK_CLASS,
                    ),
                    extension: pick_class(
                        block.extension.as_ref(),
                        default_block.extension.as_ref(),
                        "",
                    ),
                },
                line: ClassPair {
                    base: pick_class(
                        line.base.as_ref(),
                        default_line.base.as_ref(),
                        DEFAULT_LINE_CLASS,
                    ),
                    extension: pick_class(
                        line.extension.as_ref(),
                        default_line.extension.as_ref(),
                        "",
                    ),
                },
                numbers: pick_class(
                    theme.numbers.as_ref(),
                    default_theme.numbers.as_ref(),
                    DEFAULT_NUMBERS_CLASS,
                ),
                highlights: theme
                    .highlights
                    .or(default_theme.highlights)
                    .unwrap_or_default(),
            },
            theme_name: pick_class(
                existing.theme_name.as_ref(),
                defaults.theme_name.as_ref(),
                "",
            ),
            tokenizer: existing
                .tokenizer
                .clone()
                .or_else(|| defaults.tokenizer.clone())
                .unwrap_or_else(standard_tokenizer),
        }
    }

    /// Settings as a serializable option set (`initialLanguage` carries the current language).
    pub fn to_options(&self) -> CodeBlockOptions {
        CodeBlockOptions {
            activate_tabs: Some(self.activate_tabs),
            default_language: Some(self.default_language.clone()),
            initial_language: Some(self.language.clone()),
            is_block_locked: Some(self.is_block_locked),
            line_numbers: Some(self.line_numbers),
            theme: Some(CodeThemeOptions {
                block: Some(ClassPairOptions {
                    base: Some(self.theme.block.base.clone()),
                    extension: Some(self.theme.block.extension.clone()),
                }),
                line: Some(ClassPairOptions {
                    base: Some(self.theme.line.base.clone()),
                    extension: Some(self.theme.line.extension.clone()),
                }),
                numbers: Some(self.theme.numbers.clone()),
                highlights: Some(self.theme.highlights.clone()),
            }),
            theme_name: Some(self.theme_name.clone()),
            tokenizer: None,
        }
    }
}

impl Default for BlockSettings {
    fn default() -> Self {
        Self::resolve(&CodeBlockOptions::default(), &CodeBlockOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lined_code_highlight::PlainTokenizer;
    use lined_code_lang::DEFAULT_CODE_LANGUAGE;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fallbacks() {
        let settings = BlockSettings::default();

        assert!(!settings.activate_tabs);
        assert!(!settings.is_block_locked);
        assert!(settings.line_numbers);
        assert_eq!(settings.language, DEFAULT_CODE_LANGUAGE);
        assert_eq!(settings.default_language, DEFAULT_CODE_LANGUAGE);
        assert_eq!(settings.theme.block.base, DEFAULT_BLOCK_CLASS);
        assert_eq!(settings.theme.block.extension, "");
        assert_eq!(settings.theme.line.base, DEFAULT_LINE_CLASS);
        assert_eq!(settings.theme.numbers, DEFAULT_NUMBERS_CLASS);
        assert!(settings.theme.highlights.is_empty());
        assert_eq!(settings.theme_name, "");
    }

    #[test]
    fn test_existing_beats_defaults_beats_fallback() {
        let existing = CodeBlockOptions {
            line_numbers: Some(false),
            initial_language: Some("rust".to_string()),
            ..Default::default()
        };
        let defaults = CodeBlockOptions {
            line_numbers: Some(true),
            activate_tabs: Some(true),
            initial_language: Some("python".to_string()),
            theme_name: Some("dracula".to_string()),
            ..Default::default()
        };

        let settings = BlockSettings::resolve(&existing, &defaults);

        assert!(!settings.line_numbers);
        assert!(settings.activate_tabs);
        assert_eq!(settings.language, "rust");
        assert_eq!(settings.theme_name, "dracula");
    }

    #[test]
    fn test_unknown_language_maps_to_sentinel() {
        let settings = BlockSettings::resolve(
            &CodeBlockOptions::with_language("cobol"),
            &CodeBlockOptions::with_language("rust"),
        );
        assert_eq!(settings.language, DEFAULT_CODE_LANGUAGE);

        let settings = BlockSettings::resolve(
            &CodeBlockOptions::default(),
            &CodeBlockOptions::with_language("rust"),
        );
        assert_eq!(settings.language, "rust");
    }

    #[test]
    fn test_empty_default_class_uses_fallback() {
        let defaults = CodeBlockOptions {
            theme: Some(CodeThemeOptions {
                numbers: Some(String::new()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let settings = BlockSettings::resolve(&CodeBlockOptions::default(), &defaults);
        assert_eq!(settings.theme.numbers, DEFAULT_NUMBERS_CLASS);
    }

    #[test]
    fn test_tokenizer_priority() {
        let plain: Arc<dyn Tokenizer> = Arc::new(PlainTokenizer);
        let defaults = CodeBlockOptions::default().tokenizer(plain.clone());
        let settings = BlockSettings::resolve(&CodeBlockOptions::default(), &defaults);
        assert!(Arc::ptr_eq(&settings.tokenizer, &plain));

        let settings = BlockSettings::default();
        assert!(Arc::ptr_eq(&settings.tokenizer, &standard_tokenizer()));
    }

    #[test]
    fn test_tokenizer_serializes_as_null() {
        let options = BlockSettings::default().to_options();
        let value: serde_json::Value = serde_json::from_str(&options.to_json().unwrap()).unwrap();

        assert_eq!(value["tokenizer"], serde_json::Value::Null);
        assert_eq!(value["lineNumbers"], serde_json::Value::Bool(true));
        assert_eq!(value["initialLanguage"], DEFAULT_CODE_LANGUAGE);
    }

    #[test]
    fn test_from_json_ignores_tokenizer_value() {
        let options = CodeBlockOptions::from_json(
            r#"{"isBlockLocked": true, "tokenizer": {"anything": 1}, "theme": {"numbers": "ln"}}"#,
        )
        .unwrap();

        assert_eq!(options.is_block_locked, Some(true));
        assert!(options.tokenizer.is_none());
        assert_eq!(
            options.theme.and_then(|t| t.numbers),
            Some("ln".to_string())
        );
    }

    #[test]
    fn test_load_or_default_falls_back() {
        let dir = std::env::temp_dir().join(format!("lined-code-options-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let missing = CodeBlockOptions::load_or_default(&dir.join("missing.json"));
        assert!(missing.line_numbers.is_none());

        let broken = dir.join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        assert!(CodeBlockOptions::load_or_default(&broken).line_numbers.is_none());

        let good = dir.join("good.json");
        CodeBlockOptions {
            line_numbers: Some(false),
            ..Default::default()
        }
        .save(&good)
        .unwrap();
        assert_eq!(CodeBlockOptions::load_or_default(&good).line_numbers, Some(false));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
