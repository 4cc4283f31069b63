//! Configuration templates.
//!
//! Rules and adapter specs may reference configuration values:
//!
//! ```text
//! {{.Vars.NAME}}      variable
//! {{.Env.NAME}}       alias of Vars
//! {{.Secrets.NAME}}   secret, only expanded when explicitly allowed
//! ```
//!
//! Missing keys expand to the empty string. Array values expand to an
//! anchored alternation, `{^a$|^b$}`, which the rule matcher reads as a
//! regex capture. Runs of whitespace in the template collapse to one space.

use crate::error::{StoreError, StoreResult};
use lazy_static::lazy_static;
use regex::Regex;
use shared_types::{EnvData, Val};
use std::collections::BTreeSet;

lazy_static! {
    static ref REFERENCE: Regex =
        Regex::new(r"^\.(Vars|Env|Secrets)\.([A-Za-z_][A-Za-z0-9_\-]*)$")
            .expect("template reference regex is valid");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Text(String),
    Var(String),
    Secret(String),
}

/// A parsed template, reusable across data sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvTemplate {
    source: String,
    parts: Vec<Part>,
}

impl EnvTemplate {
    pub fn parse(source: &str) -> StoreResult<Self> {
        let normalized = source.split_whitespace().collect::<Vec<_>>().join(" ");
        let mut parts = Vec::new();
        let mut rest = normalized.as_str();

        while let Some(open) = rest.find("{{") {
            if open > 0 {
                parts.push(Part::Text(rest[..open].to_string()));
            }
            let after = &rest[open + 2..];
            let close = after.find("}}").ok_or_else(|| StoreError::Template {
                template: source.to_string(),
                reason: "unclosed '{{'".to_string(),
            })?;
            let inner = after[..close].trim();
            let caps = REFERENCE.captures(inner).ok_or_else(|| StoreError::Template {
                template: source.to_string(),
                reason: format!("unsupported action '{inner}'"),
            })?;
            let name = caps[2].to_string();
            parts.push(match &caps[1] {
                "Secrets" => Part::Secret(name),
                _ => Part::Var(name),
            });
            rest = &after[close + 2..];
        }
        if !rest.is_empty() {
            parts.push(Part::Text(rest.to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            parts,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Variables the template references.
    pub fn vars(&self) -> BTreeSet<&str> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Var(n) => Some(n.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Secrets the template references.
    pub fn secrets(&self) -> BTreeSet<&str> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Secret(n) => Some(n.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Expand against `data`. Secrets expand to empty unless
    /// `include_secrets` is set.
    pub fn render(&self, data: &EnvData, include_secrets: bool) -> String {
        let mut out = String::with_capacity(self.source.len());
        for part in &self.parts {
            match part {
                Part::Text(t) => out.push_str(t),
                Part::Var(name) => {
                    if let Some(v) = data.vars.get(name) {
                        out.push_str(&render_val(v));
                    }
                }
                Part::Secret(name) => {
                    if include_secrets {
                        if let Some(v) = data.secrets.get(name) {
                            out.push_str(&render_val(v));
                        }
                    }
                }
            }
        }
        out
    }
}

/// One-shot parse and render.
pub fn expand(template: &str, data: &EnvData, include_secrets: bool) -> StoreResult<String> {
    Ok(EnvTemplate::parse(template)?.render(data, include_secrets))
}

fn render_val(val: &Val) -> String {
    match val {
        Val::ArrayNumber(_) | Val::ArrayString(_) => {
            let alts: Vec<String> = val
                .to_string_list()
                .iter()
                .map(|s| format!("^{}$", regex::escape(s)))
                .collect();
            format!("{{{}}}", alts.join("|"))
        }
        Val::Nil => String::new(),
        other => other.to_string(),
    }
}
