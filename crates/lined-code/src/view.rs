//! View callbacks: the element description of blocks, lines and runs.
//!
//! Views read only block settings and the entity's own attributes. Updates patch classes and
//! attributes in place and never ask for re-creation.

use crate::document::{CodeRun, Document, NodeId};
use crate::error::{CodeError, CodeResult};
use crate::line_offset::line_number;
use crate::settings::BlockSettings;
use std::collections::BTreeMap;

/// Attribute carrying the block language.
pub const LANGUAGE_DATA_ATTRIBUTE: &str = "data-highlight-language";
/// Attribute carrying the theme name.
pub const THEME_DATA_ATTRIBUTE: &str = "data-theme";
/// Attribute carrying the 1-based line number.
pub const LINE_NUMBER_DATA_ATTRIBUTE: &str = "data-line-number";

/// A rendered element: tag, ordered classes and attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementView {
    /// Tag name.
    pub tag: String,
    /// Classes in insertion order, without duplicates.
    pub classes: Vec<String>,
    /// Attributes other than `class`.
    pub attributes: BTreeMap<String, String>,
}

impl ElementView {
    /// Empty element.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Add classes, skipping empty names and duplicates.
    pub fn add_classes<'a>(&mut self, classes: impl IntoIterator<Item = &'a str>) {
        for class in classes {
            if !class.is_empty() && !self.has_class(class) {
                self.classes.push(class.to_string());
            }
        }
    }

    /// Remove classes.
    pub fn remove_classes<'a>(&mut self, classes: impl IntoIterator<Item = &'a str>) {
        for class in classes {
            self.classes.retain(|c| c != class);
        }
    }

    /// Returns `true` if the element has `class`.
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Set an attribute.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        self.attributes.insert(name.to_string(), value.into());
    }

    /// Patch this view to match `desired`, touching only what differs.
    pub fn sync_to(&mut self, desired: &ElementView) {
        let stale: Vec<String> = self
            .classes
            .iter()
            .filter(|c| !desired.has_class(c))
            .cloned()
            .collect();
        self.remove_classes(stale.iter().map(String::as_str));
        self.add_classes(desired.classes.iter().map(String::as_str));

        self.attributes
            .retain(|name, _| desired.attributes.contains_key(name));
        for (name, value) in &desired.attributes {
            if self.attributes.get(name) != Some(value) {
                self.attributes.insert(name.clone(), value.clone());
            }
        }
    }

    /// Opening tag with escaped class and attribute values.
    pub fn open_tag(&self) -> String {
        let mut out = format!("<{}", self.tag);
        if !self.classes.is_empty() {
            out.push_str(&format!(
                " class=\"{}\"",
                html_escape::encode_double_quoted_attribute(&self.classes.join(" "))
            ));
        }
        for (name, value) in &self.attributes {
            out.push_str(&format!(
                " {name}=\"{}\"",
                html_escape::encode_double_quoted_attribute(value)
            ));
        }
        out.push('>');
        out
    }
}

/// Block element: `code` with theme classes, language and theme attributes.
pub fn create_block_view(settings: &BlockSettings) -> ElementView {
    let mut view = ElementView::new("code");
    view.add_classes([
        settings.theme.block.base.as_str(),
        settings.theme.block.extension.as_str(),
    ]);
    if settings.line_numbers {
        view.add_classes([settings.theme.numbers.as_str()]);
    }
    view.add_classes([settings.theme_name.as_str()]);
    view.set_attribute(LANGUAGE_DATA_ATTRIBUTE, settings.language.as_str());
    view.set_attribute("spellcheck", "false");
    if !settings.theme_name.is_empty() {
        view.set_attribute(THEME_DATA_ATTRIBUTE, settings.theme_name.as_str());
    }
    view
}

/// Patch a block element after its settings changed. Always `false`.
pub fn update_block_view(settings: &BlockSettings, view: &mut ElementView) -> bool {
    view.sync_to(&create_block_view(settings));
    false
}

/// Line element: `div` with discrete and theme classes and the line number.
pub fn create_line_view(doc: &Document, line: NodeId) -> CodeResult<ElementView> {
    let data = doc.code_line(line).ok_or(CodeError::UnknownNode(line))?;
    let block = doc
        .block_of_line(line)
        .ok_or(CodeError::Setup("code line is not attached to a code block"))?;
    let settings = doc.settings(block)?;

    let mut view = ElementView::new("div");
    view.add_classes(data.discrete_classes.iter().map(String::as_str));
    view.add_classes([
        settings.theme.line.base.as_str(),
        settings.theme.line.extension.as_str(),
    ]);
    if settings.line_numbers {
        view.add_classes([settings.theme.numbers.as_str()]);
    }
    if let Some(number) = line_number(doc, line) {
        view.set_attribute(LINE_NUMBER_DATA_ATTRIBUTE, number.to_string());
    }
    Ok(view)
}

/// Patch a line element (classes, line number). Always `false`.
pub fn update_line_view(doc: &Document, line: NodeId, view: &mut ElementView) -> CodeResult<bool> {
    view.sync_to(&create_line_view(doc, line)?);
    Ok(false)
}

/// Run element: `span` carrying the theme class of its highlight type.
pub fn create_run_view(settings: &BlockSettings, run: &CodeRun) -> ElementView {
    let mut view = ElementView::new("span");
    if let Some(class) = settings
        .theme
        .highlight_class(run.highlight_type.as_deref())
    {
        view.add_classes(class.split_whitespace());
    }
    view
}

/// Patch a run element after its highlight type changed. Always `false`.
pub fn update_run_view(settings: &BlockSettings, run: &CodeRun, view: &mut ElementView) -> bool {
    view.sync_to(&create_run_view(settings, run));
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::code_block_from_text;
    use crate::settings::{CodeBlockOptions, CodeThemeOptions};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_block_view_classes() {
        let mut settings = BlockSettings::default();
        settings.theme_name = "dracula".to_string();
        let view = create_block_view(&settings);

        assert_eq!(view.tag, "code");
        assert_eq!(view.classes, vec!["lined-code-node", "line-number", "dracula"]);
        assert_eq!(view.attributes[THEME_DATA_ATTRIBUTE], "dracula");
        assert_eq!(view.attributes["spellcheck"], "false");
    }

    #[test]
    fn test_update_toggles_number_class_only() {
        let mut settings = BlockSettings::default();
        let mut view = create_block_view(&settings);
        view.add_classes(["host-added"]);

        settings.line_numbers = false;
        assert!(!update_block_view(&settings, &mut view));

        assert!(!view.has_class("line-number"));
        assert!(view.has_class("lined-code-node"));
        assert!(!view.has_class("host-added"));
    }

    #[test]
    fn test_line_view_has_number_and_discrete_classes() {
        let mut doc = Document::new();
        let block = code_block_from_text(&mut doc, &CodeBlockOptions::default(), "a\nb").unwrap();
        let second = doc.children(block)[1];
        doc.code_line_mut(second)
            .unwrap()
            .discrete_classes
            .insert("hl".to_string());

        let view = create_line_view(&doc, second).unwrap();
        assert_eq!(view.classes, vec!["hl", "code-line", "line-number"]);
        assert_eq!(view.attributes[LINE_NUMBER_DATA_ATTRIBUTE], "2");
    }

    #[test]
    fn test_line_view_update_drops_stale_classes() {
        let mut doc = Document::new();
        let block = code_block_from_text(&mut doc, &CodeBlockOptions::default(), "a\nb").unwrap();
        let [first, second] = [doc.children(block)[0], doc.children(block)[1]];
        let classes = &mut doc.code_line_mut(second).unwrap().discrete_classes;
        classes.insert("hl".to_string());
        let mut view = create_line_view(&doc, second).unwrap();

        let classes = &mut doc.code_line_mut(second).unwrap().discrete_classes;
        classes.remove("hl");
        classes.insert("focus".to_string());
        doc.remove(first).unwrap();

        assert!(!update_line_view(&doc, second, &mut view).unwrap());
        assert!(!view.has_class("hl"));
        assert_eq!(view.classes, vec!["code-line", "line-number", "focus"]);
        assert_eq!(view.attributes[LINE_NUMBER_DATA_ATTRIBUTE], "1");
        assert!(update_line_view(&doc, first, &mut view).is_err());
    }

    #[test]
    fn test_run_view_update_follows_highlight_type() {
        let options = CodeBlockOptions {
            theme: Some(CodeThemeOptions {
                highlights: Some(
                    [
                        ("keyword".to_string(), "tok-kw".to_string()),
                        ("number".to_string(), "tok-num".to_string()),
                    ]
                    .into(),
                ),
                ..Default::default()
            }),
            ..Default::default()
        };
        let settings = BlockSettings::resolve(&options, &CodeBlockOptions::default());
        let mut run = CodeRun {
            text: "1".to_string(),
            highlight_type: Some("keyword".to_string()),
        };
        let mut view = create_run_view(&settings, &run);

        run.highlight_type = Some("number".to_string());
        assert!(!update_run_view(&settings, &run, &mut view));
        assert_eq!(view.classes, vec!["tok-num"]);

        run.highlight_type = None;
        assert!(!update_run_view(&settings, &run, &mut view));
        assert!(view.classes.is_empty());
    }

    #[test]
    fn test_run_view_uses_highlight_map() {
        let options = CodeBlockOptions {
            theme: Some(CodeThemeOptions {
                highlights: Some([("keyword".to_string(), "tok-kw".to_string())].into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let settings = BlockSettings::resolve(&options, &CodeBlockOptions::default());
        let keyword = CodeRun {
            text: "let".to_string(),
            highlight_type: Some("keyword".to_string()),
        };
        let plain = CodeRun {
            text: " x".to_string(),
            highlight_type: None,
        };

        assert_eq!(create_run_view(&settings, &keyword).classes, vec!["tok-kw"]);
        assert!(create_run_view(&settings, &plain).classes.is_empty());
        assert_eq!(create_run_view(&settings, &plain).open_tag(), "<span>");
    }
}
