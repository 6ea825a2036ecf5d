//! `{{var}}` substitution for api action URLs.
//!
//! Only `baseUrl` and `appId` are defined. Unknown placeholders are left in
//! place so the resulting request fails visibly instead of hitting a wrong
//! endpoint.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder pattern is valid")
});

/// Values available to request templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    pub base_url: String,
    pub app_id: String,
}

impl TemplateVars {
    pub fn new(base_url: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            app_id: app_id.into(),
        }
    }

    fn lookup(&self, name: &str) -> Option<&str> {
        match name {
            "baseUrl" => Some(self.base_url.trim_end_matches('/')),
            "appId" => Some(&self.app_id),
            _ => None,
        }
    }

    /// Substitute known placeholders in `template`.
    pub fn render(&self, template: &str) -> String {
        PLACEHOLDER
            .replace_all(template, |caps: &Captures<'_>| {
                let name = &caps[1];
                match self.lookup(name) {
                    Some(value) => value.to_string(),
                    None => {
                        tracing::warn!(placeholder = %name, "Unknown template variable");
                        caps[0].to_string()
                    }
                }
            })
            .into_owned()
    }
}
