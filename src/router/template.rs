//! Path templates.
//!
//! `/demo/{id}` style patterns. Each `{name}` matches one or more characters
//! other than `/` and the whole path must match. A template compiles to an
//! anchored regex, so placeholders may also sit inside a segment
//! (`/files/{stem}.{ext}`).

use crate::router::TemplateError;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone)]
pub struct PathTemplate {
    template: String,
    pattern: Regex,
    param_names: Vec<String>,
}

impl PathTemplate {
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        if template.is_empty() {
            return Err(TemplateError::Empty);
        }

        let mut pattern = String::from("^");
        let mut param_names = Vec::new();
        let mut seen = HashSet::new();
        let mut rest = template;

        while let Some(open) = rest.find(|c: char| c == '{' || c == '}') {
            if rest.as_bytes()[open] == b'}' {
                return Err(TemplateError::Unbalanced(template.to_string()));
            }
            pattern.push_str(&regex::escape(&rest[..open]));

            let after = &rest[open + 1..];
            let close = after
                .find(|c: char| c == '{' || c == '}')
                .filter(|&i| after.as_bytes()[i] == b'}')
                .ok_or_else(|| TemplateError::Unbalanced(template.to_string()))?;

            let name = &after[..close];
            if name.is_empty() {
                return Err(TemplateError::EmptyName(template.to_string()));
            }
            if !is_identifier(name) {
                return Err(TemplateError::InvalidName(name.to_string()));
            }
            if !seen.insert(name) {
                return Err(TemplateError::DuplicateName(name.to_string()));
            }

            pattern.push_str(&format!("(?P<{name}>[^/]+)"));
            param_names.push(name.to_string());
            rest = &after[close + 1..];
        }
        pattern.push_str(&regex::escape(rest));
        pattern.push('$');

        // Escaped literals plus identifier-named groups always compile.
        let pattern = Regex::new(&pattern)
            .map_err(|_| TemplateError::InvalidName(template.to_string()))?;

        Ok(Self {
            template: template.to_string(),
            pattern,
            param_names,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Placeholder names in template order.
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Match a full path. Returns the captured placeholders, which is an
    /// empty map for a matching template without placeholders.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let captures = self.pattern.captures(path)?;
        Some(
            self.param_names
                .iter()
                .filter_map(|name| {
                    captures
                        .name(name)
                        .map(|value| (name.clone(), value.as_str().to_string()))
                })
                .collect(),
        )
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
