//! Trace context propagation across brokers and components.
//!
//! Events carry a `SpanContext` on the wire. On receipt the broker turns it
//! into a `TraceContext` and makes it the parent of the event's root span, so
//! every hop of one request lands in the same trace. Before an event leaves
//! the broker, the current span is written back onto it.
//!
//! ```rust,ignore
//! let span = tracing::info_span!("route_event", event_id = %evt.id);
//! PropagatedContext::from_event(&evt).to_context().attach_to(&span);
//! let _enter = span.enter();
//!
//! // ... later, before publishing
//! evt.span = Some(TraceContext::from_span(&tracing::Span::current()).to_propagated().into());
//! ```

use opentelemetry::{
    trace::{SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState},
    Context,
};
use serde::{Deserialize, Serialize};
use shared_types::Event;
use tracing_opentelemetry::OpenTelemetrySpanExt;

const INVALID_TRACE_ID: &str = "00000000000000000000000000000000";
const INVALID_SPAN_ID: &str = "0000000000000000";

/// Trace context in its serializable form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagatedContext {
    /// Trace ID (32 hex characters)
    pub trace_id: String,
    /// Parent span ID (16 hex characters)
    pub span_id: String,
    /// Trace flags (bit 0 = sampled)
    pub trace_flags: u8,
}

impl PropagatedContext {
    /// Context with no parent trace.
    pub fn empty() -> Self {
        Self {
            trace_id: INVALID_TRACE_ID.to_string(),
            span_id: INVALID_SPAN_ID.to_string(),
            trace_flags: 0,
        }
    }

    /// Context carried by `evt`, or empty if it has none.
    pub fn from_event(evt: &Event) -> Self {
        evt.span.as_ref().map_or_else(Self::empty, Self::from)
    }

    /// A real trace: non-zero trace and span ids that parse as hex.
    pub fn is_valid(&self) -> bool {
        TraceId::from_hex(&self.trace_id).is_ok_and(|id| id != TraceId::INVALID)
            && SpanId::from_hex(&self.span_id).is_ok_and(|id| id != SpanId::INVALID)
    }

    pub fn is_sampled(&self) -> bool {
        self.trace_flags & TraceFlags::SAMPLED.to_u8() != 0
    }

    /// Remote OpenTelemetry context usable as a span parent.
    pub fn to_context(&self) -> TraceContext {
        if !self.is_valid() {
            return TraceContext::new();
        }
        let trace_id = TraceId::from_hex(&self.trace_id).unwrap_or(TraceId::INVALID);
        let span_id = SpanId::from_hex(&self.span_id).unwrap_or(SpanId::INVALID);

        TraceContext {
            span_context: Some(SpanContext::new(
                trace_id,
                span_id,
                TraceFlags::new(self.trace_flags),
                true,
                TraceState::default(),
            )),
        }
    }
}

impl Default for PropagatedContext {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<&shared_types::SpanContext> for PropagatedContext {
    fn from(s: &shared_types::SpanContext) -> Self {
        Self {
            trace_id: s.trace_id.clone(),
            span_id: s.span_id.clone(),
            trace_flags: s.trace_flags,
        }
    }
}

impl From<PropagatedContext> for shared_types::SpanContext {
    fn from(p: PropagatedContext) -> Self {
        Self {
            trace_id: p.trace_id,
            span_id: p.span_id,
            trace_flags: p.trace_flags,
        }
    }
}

/// OpenTelemetry span context with helpers for `tracing` spans.
#[derive(Debug, Clone, Default)]
pub struct TraceContext {
    span_context: Option<SpanContext>,
}

impl TraceContext {
    pub fn new() -> Self {
        Self { span_context: None }
    }

    /// Context of a `tracing` span. Empty when no OpenTelemetry layer is
    /// installed.
    pub fn from_span(span: &tracing::Span) -> Self {
        let context = span.context();
        let span_context = context.span().span_context().clone();
        Self {
            span_context: span_context.is_valid().then_some(span_context),
        }
    }

    /// Make this context the parent of `span`. No-op when invalid.
    pub fn attach_to(&self, span: &tracing::Span) {
        if let Some(sc) = self.span_context.as_ref().filter(|sc| sc.is_valid()) {
            span.set_parent(Context::new().with_remote_span_context(sc.clone()));
        }
    }

    pub fn to_propagated(&self) -> PropagatedContext {
        match &self.span_context {
            Some(ctx) if ctx.is_valid() => PropagatedContext {
                trace_id: ctx.trace_id().to_string(),
                span_id: ctx.span_id().to_string(),
                trace_flags: ctx.trace_flags().to_u8(),
            },
            _ => PropagatedContext::empty(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.span_context.as_ref().is_some_and(SpanContext::is_valid)
    }
}
