//! # Events
//!
//! An `Event` is one unit of work moving between components. It carries its
//! remaining time budget (`ttl`, microseconds) which only ever shrinks as the
//! event is processed; once it reaches zero the event is dead.

use crate::component::Component;
use crate::val::Val;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Well-known event types.
pub mod event_type {
    pub const CRON: &str = "io.kubefox.cron";
    pub const DAPR: &str = "io.kubefox.dapr";
    pub const ERROR: &str = "io.kubefox.error";
    pub const HEALTH: &str = "io.kubefox.health";
    pub const HTTP: &str = "io.kubefox.http";
    pub const KUBERNETES: &str = "io.kubefox.kubernetes";
    pub const METRICS: &str = "io.kubefox.metrics";
    pub const REGISTER: &str = "io.kubefox.register";
    pub const REJECTED: &str = "io.kubefox.rejected";
    pub const TELEMETRY: &str = "io.kubefox.telemetry";
    pub const UNKNOWN: &str = "io.kubefox.unknown";
}

/// Keys of well-known event values.
pub mod value_key {
    pub const HEADER: &str = "header";
    pub const HOST: &str = "host";
    pub const METHOD: &str = "method";
    pub const PATH: &str = "path";
    pub const QUERY: &str = "queryParam";
    pub const STATUS_CODE: &str = "statusCode";
    pub const URL: &str = "url";
}

/// Route id used when a name-only target is addressed without a rule.
pub const DEFAULT_ROUTE_ID: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    #[default]
    Unknown,
    Message,
    Request,
    Response,
}

/// Configuration coordinates used to resolve routing for an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EventContext {
    pub platform: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub app_deployment: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub virtual_env: String,
    /// Pins routing data to an immutable snapshot of the virtual environment.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub virtual_env_snapshot: String,
    /// Pins routing data to the manifest of an active release.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub release_manifest: String,
}

impl EventContext {
    pub fn new(
        platform: impl Into<String>,
        app_deployment: impl Into<String>,
        virtual_env: impl Into<String>,
    ) -> Self {
        Self {
            platform: platform.into(),
            app_deployment: app_deployment.into(),
            virtual_env: virtual_env.into(),
            ..Default::default()
        }
    }

    /// Enough coordinates to resolve a deployment matcher.
    pub fn is_resolvable(&self) -> bool {
        !self.platform.is_empty()
            && !self.virtual_env.is_empty()
            && (!self.app_deployment.is_empty() || !self.release_manifest.is_empty())
    }

    /// App deployment and virtual environment are both set or both empty,
    /// and a release manifest only appears alongside them.
    pub fn is_well_formed(&self) -> bool {
        let has_ve = !self.virtual_env.is_empty();
        let has_dep = !self.app_deployment.is_empty();
        if has_ve != has_dep {
            return false;
        }
        has_ve || self.release_manifest.is_empty()
    }
}

/// Trace correlation carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SpanContext {
    pub trace_id: String,
    pub span_id: String,
    pub trace_flags: u8,
}

/// An in-flight unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parent_id: String,
    pub category: Category,
    #[serde(rename = "type")]
    pub event_type: String,
    pub source: Option<Component>,
    pub target: Option<Component>,
    pub context: Option<EventContext>,
    /// Remaining budget in microseconds. May go negative once exhausted.
    pub ttl: i64,
    /// Creation time, microseconds since the Unix epoch.
    #[serde(default)]
    pub create_time: i64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, Val>,
    /// Named captures written by the route matcher.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, Val>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<u8>,
    #[serde(default)]
    pub span: Option<SpanContext>,
}

impl Event {
    pub fn new(category: Category, event_type: impl Into<String>, ttl: Duration) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            parent_id: String::new(),
            category,
            event_type: event_type.into(),
            source: None,
            target: None,
            context: None,
            ttl: duration_to_micros(ttl),
            create_time: now_micros(),
            values: BTreeMap::new(),
            params: BTreeMap::new(),
            content_type: String::new(),
            content: Vec::new(),
            span: None,
        }
    }

    /// Response to `parent`, addressed back to its source.
    pub fn new_response(parent: &Event, event_type: impl Into<String>) -> Self {
        let mut evt = Self::new(Category::Response, event_type, Duration::ZERO);
        evt.set_parent(parent);
        evt.target = parent.source.clone();
        evt
    }

    /// Link to `parent`, inheriting its remaining budget, context and trace.
    pub fn set_parent(&mut self, parent: &Event) {
        self.parent_id = parent.id.clone();
        self.ttl = parent.ttl;
        self.context = parent.context.clone();
        self.span = parent.span.clone();
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_micros(self.ttl.max(0) as u64)
    }

    pub fn is_expired(&self) -> bool {
        self.ttl <= 0
    }

    /// Charge the time elapsed since `start` against the budget.
    pub fn reduce_ttl(&mut self, start: Instant) -> i64 {
        self.charge(start.elapsed())
    }

    /// Charge the wall-clock time elapsed since `start`, for timestamps that
    /// crossed a process boundary.
    pub fn reduce_ttl_since(&mut self, start: SystemTime) -> i64 {
        let elapsed = SystemTime::now()
            .duration_since(start)
            .unwrap_or(Duration::ZERO);
        self.charge(elapsed)
    }

    pub fn charge(&mut self, elapsed: Duration) -> i64 {
        self.ttl = self.ttl.saturating_sub(duration_to_micros(elapsed));
        self.ttl
    }

    pub fn has_context(&self) -> bool {
        self.context.as_ref().is_some_and(EventContext::is_resolvable)
    }

    pub fn value(&self, key: &str) -> Option<&Val> {
        self.values.get(key)
    }

    pub fn set_value(&mut self, key: &str, val: impl Into<Val>) {
        self.values.insert(key.to_string(), val.into());
    }

    fn value_str(&self, key: &str) -> &str {
        self.values.get(key).map_or("", |v| v.as_str_or(""))
    }

    pub fn method(&self) -> &str {
        self.value_str(value_key::METHOD)
    }

    pub fn set_method(&mut self, method: &str) {
        self.set_value(value_key::METHOD, method);
    }

    pub fn path(&self) -> &str {
        self.value_str(value_key::PATH)
    }

    pub fn set_path(&mut self, path: &str) {
        self.set_value(value_key::PATH, path);
    }

    pub fn host(&self) -> &str {
        self.value_str(value_key::HOST)
    }

    pub fn set_host(&mut self, host: &str) {
        self.set_value(value_key::HOST, host);
    }

    pub fn status_code(&self) -> i64 {
        self.values
            .get(value_key::STATUS_CODE)
            .map_or(0, Val::as_i64)
    }

    pub fn set_status_code(&mut self, code: u16) {
        self.set_value(value_key::STATUS_CODE, i64::from(code));
    }

    /// All values of header `key`; lookup is case-insensitive.
    pub fn header_values(&self, key: &str) -> &[String] {
        self.multi_values(value_key::HEADER, &canonical_header_key(key))
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.header_values(key).first().map(String::as_str)
    }

    pub fn headers(&self) -> Option<&BTreeMap<String, Vec<String>>> {
        self.multi_map(value_key::HEADER)
    }

    pub fn add_header(&mut self, key: &str, value: &str) {
        self.add_multi(value_key::HEADER, canonical_header_key(key), value);
    }

    pub fn query_values(&self, key: &str) -> &[String] {
        self.multi_values(value_key::QUERY, key)
    }

    pub fn query(&self, key: &str) -> Option<&str> {
        self.query_values(key).first().map(String::as_str)
    }

    pub fn queries(&self) -> Option<&BTreeMap<String, Vec<String>>> {
        self.multi_map(value_key::QUERY)
    }

    pub fn add_query(&mut self, key: &str, value: &str) {
        self.add_multi(value_key::QUERY, key.to_string(), value);
    }

    pub fn param(&self, key: &str) -> Option<&Val> {
        self.params.get(key)
    }

    fn multi_map(&self, key: &str) -> Option<&BTreeMap<String, Vec<String>>> {
        match self.values.get(key) {
            Some(Val::MapArrayString(map)) => Some(map),
            _ => None,
        }
    }

    fn multi_values(&self, key: &str, name: &str) -> &[String] {
        self.multi_map(key)
            .and_then(|m| m.get(name))
            .map_or(&[], Vec::as_slice)
    }

    fn add_multi(&mut self, key: &str, name: String, value: &str) {
        let entry = self
            .values
            .entry(key.to_string())
            .or_insert_with(|| Val::MapArrayString(BTreeMap::new()));
        if !matches!(entry, Val::MapArrayString(_)) {
            *entry = Val::MapArrayString(BTreeMap::new());
        }
        if let Val::MapArrayString(map) = entry {
            map.entry(name).or_default().push(value.to_string());
        }
    }
}

/// Event handed to a component together with routing results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedEvent {
    pub event: Event,
    pub route_id: i64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, Val>,
}

/// Canonical MIME header key: `content-type` becomes `Content-Type`.
pub fn canonical_header_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = true;
    for c in key.chars() {
        if upper {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        upper = c == '-';
    }
    out
}

pub fn duration_to_micros(d: Duration) -> i64 {
    i64::try_from(d.as_micros()).unwrap_or(i64::MAX)
}

pub fn now_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(duration_to_micros)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> Event {
        Event::new(Category::Request, event_type::HTTP, Duration::from_secs(5))
    }

    #[test]
    fn test_canonical_header_key() {
        assert_eq!(canonical_header_key("content-type"), "Content-Type");
        assert_eq!(canonical_header_key("X-REQUEST-ID"), "X-Request-Id");
        assert_eq!(canonical_header_key("accept"), "Accept");
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut evt = request();
        evt.add_header("x-tenant", "a");
        evt.add_header("X-Tenant", "b");
        assert_eq!(
            evt.header_values("X-TENANT"),
            &["a".to_string(), "b".to_string()]
        );
        assert_eq!(evt.header("x-tenant"), Some("a"));
        assert!(evt.header("missing").is_none());
    }

    #[test]
    fn test_query_values() {
        let mut evt = request();
        evt.add_query("q", "1");
        evt.add_query("q", "2");
        assert_eq!(evt.query_values("q").len(), 2);
        assert_eq!(evt.query("Q"), None);
    }

    #[test]
    fn test_charge_is_monotonic() {
        let mut evt = request();
        let before = evt.ttl;
        evt.charge(Duration::from_millis(10));
        assert_eq!(evt.ttl, before - 10_000);
        evt.charge(Duration::from_secs(10));
        assert!(evt.is_expired());
        assert_eq!(evt.ttl(), Duration::ZERO);
    }

    #[test]
    fn test_set_parent_copies_budget_and_context() {
        let mut parent = request();
        parent.context = Some(EventContext::new("dev", "shop", "prod"));
        parent.span = Some(SpanContext {
            trace_id: "t".into(),
            span_id: "s".into(),
            trace_flags: 1,
        });
        parent.source = Some(Component::new("web", "abcdef0").with_id("1").with_broker("b"));

        let resp = Event::new_response(&parent, event_type::HTTP);
        assert_eq!(resp.parent_id, parent.id);
        assert_eq!(resp.ttl, parent.ttl);
        assert_eq!(resp.context, parent.context);
        assert_eq!(resp.span, parent.span);
        assert_eq!(resp.target, parent.source);
    }

    #[test]
    fn test_context_shapes() {
        assert!(EventContext::new("dev", "shop", "prod").is_well_formed());
        assert!(EventContext::new("dev", "", "").is_well_formed());
        assert!(!EventContext::new("dev", "shop", "").is_well_formed());
        assert!(!EventContext::new("dev", "", "prod").is_well_formed());

        let pinned_alone = EventContext {
            platform: "dev".into(),
            release_manifest: "rel-1".into(),
            ..Default::default()
        };
        assert!(!pinned_alone.is_well_formed());
    }

    #[test]
    fn test_has_context() {
        let mut evt = request();
        assert!(!evt.has_context());
        evt.context = Some(EventContext::new("dev", "shop", "prod"));
        assert!(evt.has_context());
        evt.context = Some(EventContext::new("dev", "", "prod"));
        assert!(!evt.has_context());
    }

    #[test]
    fn test_wire_json_roundtrip_keeps_values() {
        let mut evt = request();
        evt.set_method("GET");
        evt.set_path("/cart/99");
        evt.add_header("accept", "text/html");
        let json = serde_json::to_vec(&evt).unwrap();
        let back: Event = serde_json::from_slice(&json).unwrap();
        assert_eq!(back.method(), "GET");
        assert_eq!(back.header("Accept"), Some("text/html"));
        assert_eq!(back.id, evt.id);
    }
}
