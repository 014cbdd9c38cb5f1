//! Token trees and their normalization into flat highlight runs.
//!
//! A [`Tokenizer`](crate::Tokenizer) may return arbitrarily nested output: plain substrings,
//! tagged substrings, tagged wrappers around a single substring, or tagged wrappers around a
//! further list of tokens. Blocks never store that tree. They store the flat sequence produced
//! by [`normalize_tokens`], one [`NormalizedToken`] per highlight run.

/// A node of raw tokenizer output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Unhighlighted text.
    Plain(String),
    /// Text (or nested tokens) classified as `kind` (e.g. `keyword`).
    Tagged {
        /// Highlight classification.
        kind: String,
        /// Payload of the tagged node.
        content: TokenContent,
    },
}

/// Payload of a [`Token::Tagged`] node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenContent {
    /// A single substring.
    Text(String),
    /// A single nested token.
    Token(Box<Token>),
    /// A list of nested tokens (a singleton list of a plain string is a wrapped substring).
    List(Vec<Token>),
}

impl Token {
    /// Unhighlighted text.
    pub fn plain(text: impl Into<String>) -> Self {
        Token::Plain(text.into())
    }

    /// Text classified as `kind`.
    pub fn tagged(kind: impl Into<String>, text: impl Into<String>) -> Self {
        Token::Tagged {
            kind: kind.into(),
            content: TokenContent::Text(text.into()),
        }
    }

    /// A `kind` wrapper around nested tokens.
    pub fn nested(kind: impl Into<String>, children: Vec<Token>) -> Self {
        Token::Tagged {
            kind: kind.into(),
            content: TokenContent::List(children),
        }
    }

    /// Concatenated source text covered by this token.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.push_text(&mut out);
        out
    }

    fn push_text(&self, out: &mut String) {
        match self {
            Token::Plain(text) => out.push_str(text),
            Token::Tagged { content, .. } => match content {
                TokenContent::Text(text) => out.push_str(text),
                TokenContent::Token(inner) => inner.push_text(out),
                TokenContent::List(children) => {
                    for child in children {
                        child.push_text(out);
                    }
                }
            },
        }
    }
}

/// One flat highlight run: a substring plus its (optional) classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedToken {
    /// Run text (never empty).
    pub content: String,
    /// Highlight classification (`None` = unhighlighted).
    pub highlight_type: Option<String>,
}

impl NormalizedToken {
    /// Create a normalized run.
    pub fn new(content: impl Into<String>, highlight_type: Option<&str>) -> Self {
        Self {
            content: content.into(),
            highlight_type: highlight_type.map(str::to_string),
        }
    }
}

/// Flatten tokenizer output into an ordered sequence of highlight runs.
///
/// - plain substring: one run with no type
/// - tagged substring: one run with the tag
/// - tagged singleton list of a plain substring: unwrapped, tagged
/// - tagged list (or nested token): flattened, the wrapper's own tag is discarded
///
/// Empty substrings are dropped, so the output never contains an empty run and empty input
/// yields an empty sequence. No characters are ever lost.
pub fn normalize_tokens(tokens: &[Token]) -> Vec<NormalizedToken> {
    let mut out = Vec::with_capacity(tokens.len());
    for token in tokens {
        push_normalized(token, &mut out);
    }
    out
}

fn push_normalized(token: &Token, out: &mut Vec<NormalizedToken>) {
    match token {
        Token::Plain(text) => push_run(out, text, None),
        Token::Tagged { kind, content } => match content {
            TokenContent::Text(text) => push_run(out, text, Some(kind)),
            TokenContent::List(children) => match children.as_slice() {
                [Token::Plain(text)] => push_run(out, text, Some(kind)),
                _ => {
                    for child in children {
                        push_normalized(child, out);
                    }
                }
            },
            TokenContent::Token(inner) => push_normalized(inner, out),
        },
    }
}

fn push_run(out: &mut Vec<NormalizedToken>, text: &str, kind: Option<&str>) {
    if !text.is_empty() {
        out.push(NormalizedToken::new(text, kind));
    }
}

/// Concatenate run contents back into the source text.
pub fn normalized_text(tokens: &[NormalizedToken]) -> String {
    tokens.iter().map(|t| t.content.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_and_tagged_strings() {
        let tokens = vec![
            Token::tagged("keyword", "let"),
            Token::plain(" x "),
            Token::tagged("operator", "="),
            Token::plain(" 1"),
        ];

        assert_eq!(
            normalize_tokens(&tokens),
            vec![
                NormalizedToken::new("let", Some("keyword")),
                NormalizedToken::new(" x ", None),
                NormalizedToken::new("=", Some("operator")),
                NormalizedToken::new(" 1", None),
            ]
        );
    }

    #[test]
    fn test_singleton_list_is_unwrapped_and_tagged() {
        let tokens = vec![Token::nested("string", vec![Token::plain("\"hi\"")])];

        assert_eq!(
            normalize_tokens(&tokens),
            vec![NormalizedToken::new("\"hi\"", Some("string"))]
        );
    }

    #[test]
    fn test_nested_list_discards_wrapper_type() {
        let tokens = vec![Token::nested(
            "template-string",
            vec![
                Token::tagged("template-punctuation", "`"),
                Token::plain("a "),
                Token::nested(
                    "interpolation",
                    vec![
                        Token::tagged("interpolation-punctuation", "${"),
                        Token::plain("x"),
                        Token::tagged("interpolation-punctuation", "}"),
                    ],
                ),
                Token::tagged("template-punctuation", "`"),
            ],
        )];

        let normalized = normalize_tokens(&tokens);
        let types: Vec<Option<&str>> = normalized
            .iter()
            .map(|t| t.highlight_type.as_deref())
            .collect();

        assert_eq!(normalized_text(&normalized), "`a ${x}`");
        assert_eq!(
            types,
            vec![
                Some("template-punctuation"),
                None,
                Some("interpolation-punctuation"),
                None,
                Some("interpolation-punctuation"),
                Some("template-punctuation"),
            ]
        );
    }

    #[test]
    fn test_single_nested_token_is_followed() {
        let tokens = vec![Token::Tagged {
            kind: "outer".to_string(),
            content: TokenContent::Token(Box::new(Token::tagged("inner", "x"))),
        }];

        assert_eq!(
            normalize_tokens(&tokens),
            vec![NormalizedToken::new("x", Some("inner"))]
        );
    }

    #[test]
    fn test_empty_pieces_are_dropped() {
        let tokens = vec![
            Token::plain(""),
            Token::tagged("keyword", ""),
            Token::nested("list", vec![]),
        ];
        assert!(normalize_tokens(&tokens).is_empty());
        assert!(normalize_tokens(&[]).is_empty());
    }

    #[test]
    fn test_token_text_matches_normalized_text() {
        let token = Token::nested(
            "a",
            vec![Token::plain("x"), Token::nested("b", vec![Token::plain("y")])],
        );
        assert_eq!(token.text(), "xy");
        assert_eq!(
            normalized_text(&normalize_tokens(std::slice::from_ref(&token))),
            "xy"
        );
    }
}
