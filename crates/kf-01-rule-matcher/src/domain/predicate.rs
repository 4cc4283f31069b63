//! Compiled predicates and their evaluation.

use super::pattern::{SegmentPattern, ValuePattern};
use shared_types::Event;
use std::collections::BTreeMap;

/// Named captures collected while evaluating.
pub type Captures = BTreeMap<String, String>;

/// A compiled rule.
#[derive(Debug, Clone)]
pub enum Predicate {
    All,
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
    /// Any of the listed methods, case-insensitive.
    Method(Vec<String>),
    Path(SegmentPattern),
    PathPrefix(SegmentPattern),
    Host(SegmentPattern),
    /// Key is stored canonicalized.
    Header {
        key: String,
        value: ValuePattern,
    },
    Query {
        key: String,
        value: ValuePattern,
    },
    Type(String),
}

impl Predicate {
    /// Evaluate against `evt`. Captures from a sub-expression reach
    /// `captures` only if that sub-expression contributed to a true result,
    /// so a failed `OR` branch leaves nothing behind.
    pub fn evaluate(&self, evt: &Event, captures: &mut Captures) -> bool {
        match self {
            Predicate::All => true,
            Predicate::And(a, b) => {
                let mut scratch = Captures::new();
                if a.evaluate(evt, &mut scratch) && b.evaluate(evt, &mut scratch) {
                    captures.extend(scratch);
                    true
                } else {
                    false
                }
            }
            Predicate::Or(a, b) => {
                for side in [a, b] {
                    let mut scratch = Captures::new();
                    if side.evaluate(evt, &mut scratch) {
                        captures.extend(scratch);
                        return true;
                    }
                }
                false
            }
            Predicate::Not(p) => !p.evaluate(evt, &mut Captures::new()),
            Predicate::Method(methods) => {
                let m = evt.method();
                methods.iter().any(|v| v.eq_ignore_ascii_case(m))
            }
            Predicate::Path(p) => p.matches(evt.path(), false, captures),
            Predicate::PathPrefix(p) => p.matches(evt.path(), true, captures),
            Predicate::Host(p) => p.matches(evt.host(), false, captures),
            Predicate::Header { key, value } => value.matches_any(evt.header_values(key)),
            Predicate::Query { key, value } => value.matches_any(evt.query_values(key)),
            Predicate::Type(t) => {
                evt.event_type == *t
                    || evt
                        .event_type
                        .to_lowercase()
                        .ends_with(&t.to_lowercase())
            }
        }
    }

    /// Evaluate and, on success, write captures to the event's params.
    pub fn apply(&self, evt: &mut Event) -> bool {
        let mut captures = Captures::new();
        if !self.evaluate(evt, &mut captures) {
            return false;
        }
        for (k, v) in captures {
            evt.params.insert(k, v.into());
        }
        true
    }
}
