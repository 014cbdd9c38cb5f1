#![warn(missing_docs)]
//! `lined-code-lang` - the known-language table for `lined-code` blocks.
//!
//! This crate intentionally stays lightweight and does **not** depend on any tokenizer. It
//! answers three questions hosts and the block settings merge keep asking:
//!
//! - is a language key one we know about?
//! - what should a user-facing picker call it?
//! - which highlighting grammar family does it use?
//!
//! Unknown or missing languages resolve to [`DEFAULT_CODE_LANGUAGE`], a sentinel that
//! highlights as JavaScript but stays distinguishable from an explicit `"javascript"` choice.

/// Sentinel language used when a block has no (valid) language configured.
pub const DEFAULT_CODE_LANGUAGE: &str = "javascript (default)";

/// One entry of the known-language table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageEntry {
    /// Language key as stored on a block (e.g. `rust`).
    pub key: &'static str,
    /// Human-readable label (e.g. `Rust`).
    pub label: &'static str,
}

/// Every language a block may be configured with, default sentinel first.
pub const KNOWN_LANGUAGES: &[LanguageEntry] = &[
    LanguageEntry {
        key: DEFAULT_CODE_LANGUAGE,
        label: "JavaScript (default)",
    },
    LanguageEntry { key: "c", label: "C" },
    LanguageEntry {
        key: "clike",
        label: "C-like",
    },
    LanguageEntry { key: "css", label: "CSS" },
    LanguageEntry {
        key: "html",
        label: "HTML",
    },
    LanguageEntry {
        key: "javascript",
        label: "JavaScript",
    },
    LanguageEntry {
        key: "js",
        label: "JavaScript",
    },
    LanguageEntry {
        key: "markdown",
        label: "Markdown",
    },
    LanguageEntry {
        key: "markup",
        label: "Markup",
    },
    LanguageEntry {
        key: "objectivec",
        label: "Objective-C",
    },
    LanguageEntry {
        key: "python",
        label: "Python",
    },
    LanguageEntry {
        key: "rust",
        label: "Rust",
    },
    LanguageEntry { key: "sql", label: "SQL" },
    LanguageEntry {
        key: "swift",
        label: "Swift",
    },
];

/// Look up the table entry for `key`.
pub fn language_entry(key: &str) -> Option<&'static LanguageEntry> {
    KNOWN_LANGUAGES.iter().find(|entry| entry.key == key)
}

/// Returns `true` if `key` is in [`KNOWN_LANGUAGES`].
pub fn is_known_language(key: &str) -> bool {
    language_entry(key).is_some()
}

/// Human-readable label for a language key.
pub fn language_label(key: &str) -> Option<&'static str> {
    language_entry(key).map(|entry| entry.label)
}

/// Resolve an optional language to a known key, falling back to [`DEFAULT_CODE_LANGUAGE`].
///
/// Empty strings count as missing.
pub fn code_language(language: Option<&str>) -> &'static str {
    language
        .and_then(language_entry)
        .map(|entry| entry.key)
        .unwrap_or(DEFAULT_CODE_LANGUAGE)
}

/// Grammar family used to highlight `language`.
///
/// Aliases collapse onto one family (`js` and the default sentinel highlight as
/// `javascript`, `html` as `markup`, `objectivec` as `c`). Unknown keys use `clike`.
pub fn grammar_key(language: &str) -> &'static str {
    match language {
        DEFAULT_CODE_LANGUAGE | "javascript" | "js" => "javascript",
        "html" | "markup" => "markup",
        "c" | "objectivec" => "c",
        "css" => "css",
        "markdown" => "markdown",
        "python" => "python",
        "rust" => "rust",
        "sql" => "sql",
        _ => "clike",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_language_falls_back_to_sentinel() {
        assert_eq!(code_language(None), DEFAULT_CODE_LANGUAGE);
        assert_eq!(code_language(Some("")), DEFAULT_CODE_LANGUAGE);
        assert_eq!(code_language(Some("cobol")), DEFAULT_CODE_LANGUAGE);
        assert_eq!(code_language(Some("rust")), "rust");
    }

    #[test]
    fn test_sentinel_is_known_and_labelled() {
        assert!(is_known_language(DEFAULT_CODE_LANGUAGE));
        assert_eq!(
            language_label(DEFAULT_CODE_LANGUAGE),
            Some("JavaScript (default)")
        );
        assert_eq!(language_label("objectivec"), Some("Objective-C"));
        assert_eq!(language_label("brainfuck"), None);
    }

    #[test]
    fn test_grammar_key_aliases() {
        assert_eq!(grammar_key(DEFAULT_CODE_LANGUAGE), "javascript");
        assert_eq!(grammar_key("js"), "javascript");
        assert_eq!(grammar_key("html"), "markup");
        assert_eq!(grammar_key("objectivec"), "c");
        assert_eq!(grammar_key("swift"), "clike");
    }

    #[test]
    fn test_every_known_language_has_a_grammar() {
        for entry in KNOWN_LANGUAGES {
            assert!(!grammar_key(entry.key).is_empty(), "{}", entry.key);
        }
    }
}
