//! Template interpolation for dataset definitions
//!
//! Handles `{{ variable }}` interpolation in source URLs and query params.
//! Two roots are available:
//! - `env.NAME` - process environment, for API keys
//! - `vars.NAME` - values derived from the run date (`today`, `year`, ...)

use crate::error::{Error, Result};
use chrono::{DateTime, Datelike, Utc};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Regex for matching template variables: {{ root.name }}
static TEMPLATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_]*)*)\s*\}\}")
        .expect("template regex is valid")
});

/// Variables available while rendering
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    env: HashMap<String, String>,
    vars: HashMap<String, String>,
}

impl TemplateContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Context seeded with the process environment and run-date variables
    pub fn for_run(now: DateTime<Utc>) -> Self {
        Self {
            env: std::env::vars().collect(),
            vars: HashMap::new(),
        }
        .with_run_date(now)
    }

    /// Set `vars.today`, `vars.year`, `vars.last_year` and `vars.month`
    #[must_use]
    pub fn with_run_date(mut self, now: DateTime<Utc>) -> Self {
        self.vars
            .insert("today".into(), now.format("%Y-%m-%d").to_string());
        self.vars.insert("year".into(), now.year().to_string());
        self.vars
            .insert("last_year".into(), (now.year() - 1).to_string());
        self.vars
            .insert("month".into(), format!("{:02}", now.month()));
        self
    }

    #[must_use]
    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Look up a dotted path such as `env.FRED_API_KEY`
    pub fn get(&self, path: &str) -> Option<&str> {
        let (root, name) = path.split_once('.')?;
        let table = match root {
            "env" => &self.env,
            "vars" => &self.vars,
            _ => return None,
        };
        table.get(name).map(String::as_str)
    }
}

/// Render a template string, failing on any undefined variable
pub fn render(template: &str, ctx: &TemplateContext) -> Result<String> {
    let mut missing = Vec::new();

    let rendered = TEMPLATE_REGEX.replace_all(template, |cap: &Captures<'_>| {
        match ctx.get(&cap[1]) {
            Some(value) => value.to_string(),
            None => {
                missing.push(cap[1].to_string());
                String::new()
            }
        }
    });

    if missing.is_empty() {
        Ok(rendered.into_owned())
    } else {
        Err(Error::undefined_var(missing.join(", ")))
    }
}

/// Check if a string contains template variables
pub fn has_templates(s: &str) -> bool {
    TEMPLATE_REGEX.is_match(s)
}

/// Extract all variable paths from a template
pub fn extract_variables(template: &str) -> Vec<String> {
    TEMPLATE_REGEX
        .captures_iter(template)
        .map(|cap| cap[1].to_string())
        .collect()
}

/// Reject variables outside the `env` / `vars` roots
pub fn validate(template: &str) -> Result<()> {
    for var in extract_variables(template) {
        match var.split_once('.') {
            Some(("env" | "vars", name)) if !name.contains('.') => {}
            _ => {
                return Err(Error::template(format!(
                    "unsupported variable '{var}', expected env.NAME or vars.NAME"
                )))
            }
        }
    }
    Ok(())
}
