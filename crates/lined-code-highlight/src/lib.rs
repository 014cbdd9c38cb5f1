#![warn(missing_docs)]
//! `lined-code-highlight` - the tokenizer seam for `lined-code` blocks.
//!
//! A block never interprets language grammars itself. It hands one line of text plus a language
//! key to a [`Tokenizer`] and stores the flattened result of [`normalize_tokens`]. This crate
//! provides:
//!
//! - the raw token tree ([`Token`], [`TokenContent`]) and its normalization
//! - the [`Tokenizer`] trait
//! - [`RegexTokenizer`], a rule-ordered regex highlighter with a grammar per language family
//! - [`PlainTokenizer`], which never highlights anything
//!
//! Tokenization is always whole-line: input never contains a newline.

pub mod grammar;
pub mod tokens;

pub use grammar::{Grammar, RegexRule};
pub use tokens::{NormalizedToken, Token, TokenContent, normalize_tokens, normalized_text};

use lined_code_lang::grammar_key;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Turns one line of text into a token tree.
///
/// Implementations must be total: concatenating the text of every returned token must give back
/// `text` exactly.
pub trait Tokenizer: Send + Sync + std::fmt::Debug {
    /// Tokenize `text` (one line, no newline) as `language`.
    fn tokenize(&self, text: &str, language: &str) -> Vec<Token>;
}

/// A tokenizer that returns the whole line as one plain token.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTokenizer;

impl Tokenizer for PlainTokenizer {
    fn tokenize(&self, text: &str, _language: &str) -> Vec<Token> {
        if text.is_empty() {
            Vec::new()
        } else {
            vec![Token::plain(text)]
        }
    }
}

/// Regex grammars keyed by grammar family (see [`lined_code_lang::grammar_key`]).
#[derive(Debug, Clone)]
pub struct RegexTokenizer {
    grammars: HashMap<&'static str, Grammar>,
}

impl RegexTokenizer {
    /// Compile every built-in grammar.
    pub fn new() -> Result<Self, regex::Error> {
        let mut grammars = HashMap::new();
        grammars.insert("javascript", grammar::javascript()?);
        grammars.insert("rust", grammar::rust()?);
        grammars.insert("python", grammar::python()?);
        grammars.insert("c", grammar::c()?);
        grammars.insert("clike", grammar::clike()?);
        grammars.insert("css", grammar::css()?);
        grammars.insert("sql", grammar::sql()?);
        grammars.insert("markdown", grammar::markdown()?);
        grammars.insert("markup", grammar::markup()?);
        Ok(Self { grammars })
    }

    /// Replace (or add) the grammar used for a grammar family.
    pub fn with_grammar(mut self, key: &'static str, grammar: Grammar) -> Self {
        self.grammars.insert(key, grammar);
        self
    }

    /// Grammar used for `language`, if any.
    pub fn grammar_for(&self, language: &str) -> Option<&Grammar> {
        self.grammars
            .get(grammar_key(language))
            .or_else(|| self.grammars.get("clike"))
    }
}

impl Tokenizer for RegexTokenizer {
    fn tokenize(&self, text: &str, language: &str) -> Vec<Token> {
        match self.grammar_for(language) {
            Some(grammar) => grammar.tokenize(text),
            None => PlainTokenizer.tokenize(text, language),
        }
    }
}

/// The shared standard tokenizer.
///
/// Grammars are compiled once per process. If compilation ever fails the standard tokenizer
/// degrades to [`PlainTokenizer`] instead of failing every block.
pub fn standard_tokenizer() -> Arc<dyn Tokenizer> {
    static STANDARD: OnceLock<Arc<dyn Tokenizer>> = OnceLock::new();
    STANDARD
        .get_or_init(|| match RegexTokenizer::new() {
            Ok(tokenizer) => Arc::new(tokenizer),
            Err(e) => {
                tracing::warn!("Failed to compile highlight grammars: {e}");
                Arc::new(PlainTokenizer)
            }
        })
        .clone()
}
