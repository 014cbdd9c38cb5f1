//! Regex grammars: ordered rule lists that turn one line of text into a [`Token`] tree.
//!
//! Matching is "earliest match wins": at every position, each rule searches forward and the rule
//! whose match starts first produces the next token (ties go to the rule listed first). Text that
//! no rule claims becomes plain. A rule may highlight only a capture group of its match, which
//! emulates look-behind/look-ahead (the regex crate has neither): text before the group stays
//! plain and scanning resumes right after the group. A rule may also carry an `inside` grammar
//! that re-tokenizes the matched text into nested tokens.

use crate::tokens::Token;
use regex::Regex;

/// A single regex highlighting rule.
#[derive(Debug, Clone)]
pub struct RegexRule {
    regex: Regex,
    kind: String,
    capture_group: Option<usize>,
    inside: Option<Box<Grammar>>,
}

impl RegexRule {
    /// Create a rule that tags every match of `pattern` as `kind`.
    pub fn new(pattern: &str, kind: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            kind: kind.into(),
            capture_group: None,
            inside: None,
        })
    }

    /// Highlight only a capture group of each match.
    ///
    /// Example (function name):
    /// - pattern: `\b([a-z_]\w*)\s*\(`
    /// - capture_group: `1` (the name; the parenthesis is scanned again by later rules)
    pub fn with_capture_group(mut self, group: usize) -> Self {
        self.capture_group = Some(group);
        self
    }

    /// Re-tokenize matched text with `grammar`, producing a nested token.
    pub fn with_inside(mut self, grammar: Grammar) -> Self {
        self.inside = Some(Box::new(grammar));
        self
    }

    /// Highlight classification produced by this rule.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    fn find_from(&self, text: &str, pos: usize) -> Option<Hit> {
        let mut from = pos;
        loop {
            let (match_start, start, end) = match self.capture_group {
                Some(group) => {
                    let caps = self.regex.captures_at(text, from)?;
                    let whole = caps.get(0)?;
                    match caps.get(group) {
                        Some(m) => (whole.start(), m.start(), m.end()),
                        None => (whole.start(), whole.start(), whole.start()),
                    }
                }
                None => {
                    let m = self.regex.find_at(text, from)?;
                    (m.start(), m.start(), m.end())
                }
            };

            if end > start {
                return Some(Hit {
                    match_start,
                    start,
                    end,
                });
            }

            // Empty token: retry one character further on.
            let step = text[match_start..].chars().next()?.len_utf8();
            from = match_start + step;
        }
    }

    fn token_for(&self, matched: &str) -> Token {
        match &self.inside {
            Some(grammar) => Token::nested(self.kind.clone(), grammar.tokenize(matched)),
            None => Token::tagged(self.kind.clone(), matched),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Hit {
    match_start: usize,
    start: usize,
    end: usize,
}

/// An ordered list of [`RegexRule`]s.
#[derive(Debug, Clone, Default)]
pub struct Grammar {
    rules: Vec<RegexRule>,
}

impl Grammar {
    /// Create a grammar from rules (earlier rules win ties).
    pub fn new(rules: Vec<RegexRule>) -> Self {
        Self { rules }
    }

    /// Rules in priority order.
    pub fn rules(&self) -> &[RegexRule] {
        &self.rules
    }

    /// Tokenize `text`. Adjacent unclaimed text is merged into one plain token, so the output
    /// never contains two plain tokens in a row.
    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut pending = String::new();
        let mut pos = 0;

        while pos < text.len() {
            let Some((rule, hit)) = self.earliest(text, pos) else {
                break;
            };

            pending.push_str(&text[pos..hit.start]);
            if !pending.is_empty() {
                tokens.push(Token::Plain(std::mem::take(&mut pending)));
            }
            tokens.push(rule.token_for(&text[hit.start..hit.end]));
            pos = hit.end;
        }

        pending.push_str(&text[pos..]);
        if !pending.is_empty() {
            tokens.push(Token::Plain(pending));
        }
        tokens
    }

    fn earliest(&self, text: &str, pos: usize) -> Option<(&RegexRule, Hit)> {
        let mut best: Option<(&RegexRule, Hit)> = None;
        for rule in &self.rules {
            let Some(hit) = rule.find_from(text, pos) else {
                continue;
            };
            let better = match &best {
                Some((_, current)) => hit.match_start < current.match_start,
                None => true,
            };
            if better {
                best = Some((rule, hit));
            }
        }
        best
    }
}

const BLOCK_COMMENT: &str = r#"/\*.*?(?:\*/|$)"#;
const DOUBLE_STRING: &str = r#""(?:\\.|[^"\\])*"?"#;
const SINGLE_STRING: &str = r#"'(?:\\.|[^'\\])*'?"#;
const FUNCTION: &str = r#"\b([A-Za-z_][\w$]*)\s*\("#;
const PUNCTUATION: &str = r#"[{}\[\];(),.:]"#;

/// JavaScript (also used for the default-language sentinel and `js`).
pub fn javascript() -> Result<Grammar, regex::Error> {
    let keyword = r#"\b(?:as|async|await|break|case|catch|class|const|continue|debugger|default|delete|do|else|export|extends|finally|for|from|function|if|import|in|instanceof|let|new|null|of|return|static|super|switch|this|throw|try|typeof|undefined|var|void|while|with|yield)\b"#;
    let number = r#"\b(?:0[xX][\da-fA-F]+|0[bB][01]+|\d+(?:\.\d+)?(?:[eE][+-]?\d+)?)n?\b"#;
    let operator = r#"=>|\.\.\.|[-+*/%=!<>&|^~?]+"#;

    let interpolation = Grammar::new(vec![
        RegexRule::new(r#"^\$\{|\}$"#, "interpolation-punctuation")?,
        RegexRule::new(keyword, "keyword")?,
        RegexRule::new(number, "number")?,
        RegexRule::new(operator, "operator")?,
        RegexRule::new(PUNCTUATION, "punctuation")?,
    ]);
    let template = Grammar::new(vec![
        RegexRule::new(r#"^`|`$"#, "template-punctuation")?,
        RegexRule::new(r#"\$\{[^}]*\}?"#, "interpolation")?.with_inside(interpolation),
    ]);

    Ok(Grammar::new(vec![
        RegexRule::new(&format!(r#"//.*|{BLOCK_COMMENT}"#), "comment")?,
        RegexRule::new(r#"`(?:\\.|[^`\\])*`?"#, "template-string")?.with_inside(template),
        RegexRule::new(&format!("{DOUBLE_STRING}|{SINGLE_STRING}"), "string")?,
        RegexRule::new(keyword, "keyword")?,
        RegexRule::new(r#"\b(?:true|false)\b"#, "boolean")?,
        RegexRule::new(FUNCTION, "function")?.with_capture_group(1),
        RegexRule::new(r#"\b[A-Z][\w$]*\b"#, "class-name")?,
        RegexRule::new(number, "number")?,
        RegexRule::new(operator, "operator")?,
        RegexRule::new(PUNCTUATION, "punctuation")?,
    ]))
}

/// Rust.
pub fn rust() -> Result<Grammar, regex::Error> {
    Ok(Grammar::new(vec![
        RegexRule::new(&format!(r#"//.*|{BLOCK_COMMENT}"#), "comment")?,
        RegexRule::new(r#"#!?\[[^\]]*\]?"#, "attribute")?,
        RegexRule::new(r#"b?"(?:\\.|[^"\\])*"?"#, "string")?,
        RegexRule::new(r#"b?'(?:\\.|[^'\\])'"#, "char")?,
        RegexRule::new(r#"'[A-Za-z_]\w*"#, "lifetime-annotation")?,
        RegexRule::new(r#"\b([A-Za-z_]\w*!)\s*[\[({]"#, "macro")?.with_capture_group(1),
        RegexRule::new(
            r#"\b(?:as|async|await|break|const|continue|crate|dyn|else|enum|extern|fn|for|if|impl|in|let|loop|match|mod|move|mut|pub|ref|return|self|Self|static|struct|super|trait|type|unsafe|use|where|while)\b"#,
            "keyword",
        )?,
        RegexRule::new(r#"\b(?:true|false)\b"#, "boolean")?,
        RegexRule::new(r#"\b([a-z_]\w*)\s*\("#, "function")?.with_capture_group(1),
        RegexRule::new(r#"\b[A-Z]\w*\b"#, "class-name")?,
        RegexRule::new(
            r#"\b(?:0x[\da-fA-F_]+|0o[0-7_]+|0b[01_]+|\d[\d_]*(?:\.\d[\d_]*)?(?:[eE][+-]?\d+)?)(?:[iu](?:8|16|32|64|128|size)|f32|f64)?\b"#,
            "number",
        )?,
        RegexRule::new(r#"::|\.\.=?|->|=>|[-+*/%=!<>&|^?]+"#, "operator")?,
        RegexRule::new(PUNCTUATION, "punctuation")?,
    ]))
}

/// Python.
pub fn python() -> Result<Grammar, regex::Error> {
    Ok(Grammar::new(vec![
        RegexRule::new(r#"#.*"#, "comment")?,
        RegexRule::new(
            &format!("(?:[rRbBfFuU]{{1,2}})?(?:{DOUBLE_STRING}|{SINGLE_STRING})"),
            "string",
        )?,
        RegexRule::new(r#"^\s*(@[\w.]+)"#, "decorator")?.with_capture_group(1),
        RegexRule::new(
            r#"\b(?:and|as|assert|async|await|break|class|continue|def|del|elif|else|except|finally|for|from|global|if|import|in|is|lambda|nonlocal|not|or|pass|raise|return|try|while|with|yield)\b"#,
            "keyword",
        )?,
        RegexRule::new(r#"\b(?:True|False|None)\b"#, "boolean")?,
        RegexRule::new(
            r#"\b(?:abs|all|any|bool|dict|enumerate|filter|float|int|isinstance|len|list|map|max|min|open|print|range|repr|set|sorted|str|sum|tuple|type|zip)\b"#,
            "builtin",
        )?,
        RegexRule::new(FUNCTION, "function")?.with_capture_group(1),
        RegexRule::new(
            r#"\b(?:0[xX][\da-fA-F_]+|0[oO][0-7_]+|0[bB][01_]+|\d[\d_]*(?:\.\d*)?(?:[eE][+-]?\d+)?j?)\b"#,
            "number",
        )?,
        RegexRule::new(r#":=|\*\*|//|[-+*/%=!<>&|^~@]+"#, "operator")?,
        RegexRule::new(PUNCTUATION, "punctuation")?,
    ]))
}

/// C (also Objective-C).
pub fn c() -> Result<Grammar, regex::Error> {
    Ok(Grammar::new(vec![
        RegexRule::new(&format!(r#"//.*|{BLOCK_COMMENT}"#), "comment")?,
        RegexRule::new(r#"^\s*#\s*[A-Za-z]+.*"#, "macro")?,
        RegexRule::new(DOUBLE_STRING, "string")?,
        RegexRule::new(r#"'(?:\\.|[^'\\])+'"#, "char")?,
        RegexRule::new(
            r#"\b(?:_Bool|auto|break|case|char|const|continue|default|do|double|else|enum|extern|float|for|goto|if|inline|int|long|register|restrict|return|short|signed|sizeof|static|struct|switch|typedef|union|unsigned|void|volatile|while)\b|@[A-Za-z]+"#,
            "keyword",
        )?,
        RegexRule::new(r#"\b(?:NULL|EOF|true|false|nil|YES|NO)\b"#, "constant")?,
        RegexRule::new(FUNCTION, "function")?.with_capture_group(1),
        RegexRule::new(
            r#"\b(?:0[xX][\da-fA-F]+|\d+(?:\.\d*)?(?:[eE][+-]?\d+)?)[fFlLuU]*"#,
            "number",
        )?,
        RegexRule::new(r#"->|\+\+|--|[-+*/%=!<>&|^~?]+"#, "operator")?,
        RegexRule::new(PUNCTUATION, "punctuation")?,
    ]))
}

/// Generic C-like fallback (also used for Swift and unknown keys).
pub fn clike() -> Result<Grammar, regex::Error> {
    Ok(Grammar::new(vec![
        RegexRule::new(&format!(r#"//.*|{BLOCK_COMMENT}"#), "comment")?,
        RegexRule::new(&format!("{DOUBLE_STRING}|{SINGLE_STRING}"), "string")?,
        RegexRule::new(
            r#"\b(?:break|case|catch|class|continue|default|do|else|enum|extension|finally|for|func|function|guard|if|import|in|init|instanceof|internal|let|new|override|private|protocol|public|return|self|static|struct|switch|throw|try|var|while)\b"#,
            "keyword",
        )?,
        RegexRule::new(r#"\b(?:true|false|null|nil)\b"#, "boolean")?,
        RegexRule::new(FUNCTION, "function")?.with_capture_group(1),
        RegexRule::new(
            r#"\b(?:0[xX][\da-fA-F]+|\d+(?:\.\d+)?(?:[eE][+-]?\d+)?)\b"#,
            "number",
        )?,
        RegexRule::new(r#"--|\+\+|&&|\|\||[-+*/%=!<>&|^~?]+"#, "operator")?,
        RegexRule::new(PUNCTUATION, "punctuation")?,
    ]))
}

/// CSS.
pub fn css() -> Result<Grammar, regex::Error> {
    Ok(Grammar::new(vec![
        RegexRule::new(BLOCK_COMMENT, "comment")?,
        RegexRule::new(r#"@[\w-]+"#, "atrule")?,
        RegexRule::new(r#"([^{}\s;@][^{};]*?)\s*\{"#, "selector")?.with_capture_group(1),
        RegexRule::new(r#"([-\w]+)\s*:"#, "property")?.with_capture_group(1),
        RegexRule::new(&format!("{DOUBLE_STRING}|{SINGLE_STRING}"), "string")?,
        RegexRule::new(r#"url\([^)]*\)?"#, "url")?,
        RegexRule::new(r#"#[\da-fA-F]{3,8}\b"#, "hexcode")?,
        RegexRule::new(r#"!important\b"#, "important")?,
        RegexRule::new(r#"([-\w]+)\("#, "function")?.with_capture_group(1),
        RegexRule::new(r#"-?(?:\d+\.?\d*|\.\d+)(?:%|[a-zA-Z]+)?"#, "number")?,
        RegexRule::new(r#"[(){};:,]"#, "punctuation")?,
    ]))
}

/// SQL (keywords are case-insensitive).
pub fn sql() -> Result<Grammar, regex::Error> {
    Ok(Grammar::new(vec![
        RegexRule::new(&format!(r#"--.*|{BLOCK_COMMENT}"#), "comment")?,
        RegexRule::new(r#"'(?:''|[^'])*'?|"(?:""|[^"])*"?"#, "string")?,
        RegexRule::new(r#"`[^`]*`?"#, "identifier")?,
        RegexRule::new(r#"@[\w.$]+"#, "variable")?,
        RegexRule::new(
            r#"(?i)\b(?:all|alter|and|as|asc|between|by|case|create|default|delete|desc|distinct|drop|else|end|exists|foreign|from|group|having|in|index|inner|insert|into|is|join|key|left|like|limit|not|null|offset|on|or|order|outer|primary|references|right|select|set|table|then|union|update|values|when|where)\b"#,
            "keyword",
        )?,
        RegexRule::new(r#"(?i)\b(?:true|false)\b"#, "boolean")?,
        RegexRule::new(r#"\b(\w+)\s*\("#, "function")?.with_capture_group(1),
        RegexRule::new(r#"\b\d+(?:\.\d+)?\b"#, "number")?,
        RegexRule::new(r#"[-+*/%=<>!|&^~]+"#, "operator")?,
        RegexRule::new(r#"[;\[\]()`,.]"#, "punctuation")?,
    ]))
}

/// Markdown.
pub fn markdown() -> Result<Grammar, regex::Error> {
    let title = Grammar::new(vec![RegexRule::new(r#"^#+"#, "punctuation")?]);

    Ok(Grammar::new(vec![
        RegexRule::new(r#"^#{1,6}\s.*"#, "title")?.with_inside(title),
        RegexRule::new(r#"^\s*(?:-{3,}|\*{3,})\s*$"#, "hr")?,
        RegexRule::new(r#"^\s*>"#, "blockquote")?,
        RegexRule::new(r#"^\s*(?:[*+-]|\d+\.)\s"#, "list")?,
        RegexRule::new(r#"`[^`]*`?"#, "code")?,
        RegexRule::new(r#"!?\[[^\]]*\]\([^)]*\)"#, "url")?,
        RegexRule::new(r#"\*\*[^*]+\*\*|__[^_]+__"#, "bold")?,
        RegexRule::new(r#"\*[^*\s][^*]*\*|_[^_\s][^_]*_"#, "italic")?,
    ]))
}

/// HTML/XML markup.
pub fn markup() -> Result<Grammar, regex::Error> {
    let tag_name = Grammar::new(vec![RegexRule::new(r#"^</?"#, "punctuation")?]);
    let attr_value = Grammar::new(vec![RegexRule::new(r#"^=|"|'"#, "punctuation")?]);
    let tag = Grammar::new(vec![
        RegexRule::new(r#"^</?[A-Za-z][\w:.-]*"#, "tag")?.with_inside(tag_name),
        RegexRule::new(r#"=\s*(?:"[^"]*"?|'[^']*'?|[^\s'">=]+)"#, "attr-value")?
            .with_inside(attr_value),
        RegexRule::new(r#"[^\s>/=]+"#, "attr-name")?,
        RegexRule::new(r#"/?>"#, "punctuation")?,
    ]);

    Ok(Grammar::new(vec![
        RegexRule::new(r#"<!--.*?(?:-->|$)"#, "comment")?,
        RegexRule::new(r#"(?i)<!DOCTYPE[^>]*>?"#, "doctype")?,
        RegexRule::new(
            r#"</?[A-Za-z][\w:.-]*(?:\s+[^\s>/=]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s'">=]+))?)*\s*/?>?"#,
            "tag",
        )?
        .with_inside(tag),
        RegexRule::new(r#"&#?[\da-zA-Z]{1,8};"#, "entity")?,
    ]))
}
