//! Snippet templates with typed placeholder substitution.
//!
//! Placeholders are written `###NAME###` with `NAME` in `[A-Z_]`. Only
//! [`LabelExpr`] values can be bound, and rendering fails rather than
//! emitting text with a placeholder left in it.

use thiserror::Error;

use super::labels::LabelExpr;

const MARK: &str = "###";

/// Errors rendering a snippet template.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// The template names a placeholder with no binding.
    #[error("unresolved placeholder ###{0}###")]
    Unresolved(String),
    /// A binding names a placeholder the template does not contain.
    #[error("binding for unknown placeholder {0:?}")]
    UnknownBinding(String),
}

/// A static policy snippet with `###NAME###` placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnippetTemplate {
    text: &'static str,
}

impl SnippetTemplate {
    /// Wrap static template text.
    pub const fn new(text: &'static str) -> Self {
        Self { text }
    }

    /// Raw template text.
    pub fn text(&self) -> &'static str {
        self.text
    }

    /// Placeholder names in order of appearance, duplicates removed.
    pub fn placeholders(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        let mut rest = self.text;
        while let Some((_, after)) = rest.split_once(MARK) {
            match after.split_once(MARK) {
                Some((name, tail)) if is_placeholder_name(name) => {
                    if !names.contains(&name) {
                        names.push(name);
                    }
                    rest = tail;
                }
                _ => rest = after,
            }
        }
        names
    }

    /// Substitute every placeholder with its bound label.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Unresolved`] if a placeholder has no
    /// binding and [`TemplateError::UnknownBinding`] if a binding matches no
    /// placeholder.
    pub fn render(&self, bindings: &[(&str, &LabelExpr)]) -> Result<String, TemplateError> {
        let placeholders = self.placeholders();
        if let Some((name, _)) = bindings
            .iter()
            .find(|(name, _)| !placeholders.contains(name))
        {
            return Err(TemplateError::UnknownBinding((*name).to_owned()));
        }

        let mut out = String::with_capacity(self.text.len());
        let mut rest = self.text;
        while let Some((before, after)) = rest.split_once(MARK) {
            out.push_str(before);
            match after.split_once(MARK) {
                Some((name, tail)) if is_placeholder_name(name) => {
                    let value = bindings
                        .iter()
                        .find(|(bound, _)| *bound == name)
                        .map(|(_, value)| *value)
                        .ok_or_else(|| TemplateError::Unresolved(name.to_owned()))?;
                    out.push_str(value.as_str());
                    rest = tail;
                }
                _ => {
                    out.push_str(MARK);
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        Ok(out)
    }
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_uppercase() || b == b'_')
}
