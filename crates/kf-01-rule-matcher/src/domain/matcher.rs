//! Matcher: an immutable, priority-ordered set of routes.

use super::route::Route;
use shared_types::Event;
use std::sync::Arc;
use tracing::warn;

/// Ordered routes. Never mutated after construction; a rebuild produces a
/// new `Matcher`.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    routes: Vec<Arc<Route>>,
    invalid: Vec<Arc<Route>>,
}

impl Matcher {
    /// Build from routes. Routes that failed to compile are set aside and
    /// never matched; the rest are stably sorted by rank, highest first.
    pub fn new(routes: impl IntoIterator<Item = Route>) -> Self {
        let mut valid = Vec::new();
        let mut invalid = Vec::new();
        for route in routes {
            if let Some(err) = route.parse_err() {
                warn!(
                    route_id = route.id,
                    component = %route.component,
                    rule = %route.resolved_rule,
                    error = %err,
                    "Skipping route with invalid rule"
                );
                invalid.push(Arc::new(route));
            } else {
                valid.push(Arc::new(route));
            }
        }
        valid.sort_by(|a, b| b.rank().cmp(&a.rank()));

        Self {
            routes: valid,
            invalid,
        }
    }

    /// First route whose rule accepts `evt`. Captures of the matching rule
    /// are written to the event's params.
    pub fn match_event(&self, evt: &mut Event) -> Option<Arc<Route>> {
        self.routes.iter().find(|r| r.evaluate(evt)).cloned()
    }

    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    pub fn invalid_routes(&self) -> &[Arc<Route>] {
        &self.invalid
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
