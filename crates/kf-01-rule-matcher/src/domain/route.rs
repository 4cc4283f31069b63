//! Route: one rule bound to the component that handles it.

use super::parser::compile;
use super::predicate::Predicate;
use crate::error::MatcherError;
use lazy_static::lazy_static;
use regex::Regex;
use shared_types::{Component, Event, EventContext};

lazy_static! {
    /// Capture templates, collapsed to `{}` before measuring a rule so that
    /// capture names do not affect specificity.
    static ref CAPTURE_TEMPLATE: Regex =
        Regex::new(r"([^\\])(\{[^}]+\})").expect("capture template regex is valid");
}

/// Specificity of a rule: its length once every capture is collapsed.
pub fn derived_priority(resolved_rule: &str) -> i64 {
    let normalized = CAPTURE_TEMPLATE.replace_all(resolved_rule, "${1}{}");
    normalized.chars().count() as i64
}

#[derive(Debug, Clone)]
pub struct Route {
    pub id: i64,
    /// Rule as authored, possibly containing configuration templates.
    pub rule: String,
    /// Rule after template expansion; what was compiled.
    pub resolved_rule: String,
    /// Effective priority; higher is tried first.
    pub priority: i64,
    explicit_priority: bool,
    pub component: Component,
    pub event_context: Option<EventContext>,
    predicate: Option<Predicate>,
    parse_err: Option<MatcherError>,
}

impl Route {
    pub fn new(id: i64, rule: impl Into<String>) -> Self {
        Self {
            id,
            rule: rule.into(),
            resolved_rule: String::new(),
            priority: 0,
            explicit_priority: false,
            component: Component::default(),
            event_context: None,
            predicate: None,
            parse_err: Some(MatcherError::Unresolved(id)),
        }
    }

    #[must_use]
    pub fn with_component(mut self, component: Component) -> Self {
        self.component = component;
        self
    }

    #[must_use]
    pub fn with_context(mut self, ctx: EventContext) -> Self {
        self.event_context = Some(ctx);
        self
    }

    /// Compile `resolved_rule`. Without an explicit priority one is derived
    /// from the rule. Compile errors are kept on the route.
    pub fn resolve(&mut self, resolved_rule: impl Into<String>, explicit_priority: Option<i64>) {
        self.resolved_rule = resolved_rule.into();
        self.explicit_priority = explicit_priority.is_some();
        self.priority = match explicit_priority {
            Some(priority) => priority,
            None => derived_priority(&self.resolved_rule),
        };
        match compile(&self.resolved_rule) {
            Ok(p) => {
                self.predicate = Some(p);
                self.parse_err = None;
            }
            Err(e) => {
                self.predicate = None;
                self.parse_err = Some(e);
            }
        }
    }

    #[must_use]
    pub fn resolved(
        mut self,
        resolved_rule: impl Into<String>,
        explicit_priority: Option<i64>,
    ) -> Self {
        self.resolve(resolved_rule, explicit_priority);
        self
    }

    pub fn parse_err(&self) -> Option<&MatcherError> {
        self.parse_err.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        self.predicate.is_some()
    }

    pub fn has_explicit_priority(&self) -> bool {
        self.explicit_priority
    }

    /// Ordering key: explicit priorities outrank derived ones, then higher
    /// values first.
    pub fn rank(&self) -> (bool, i64) {
        (self.explicit_priority, self.priority)
    }

    /// Evaluate the rule, writing captures to the event on success.
    pub fn evaluate(&self, evt: &mut Event) -> bool {
        self.predicate.as_ref().is_some_and(|p| p.apply(evt))
    }
}
