//! Inbound ports (API) for the route store.
//!
//! The orchestrator depends on this trait rather than on `RouteStore`, so it
//! can be driven by a fixed table in tests.

use crate::domain::ResolvedContext;
use crate::error::StoreResult;
use async_trait::async_trait;
use kf_01_rule_matcher::Matcher;
use shared_types::{Adapter, Component, ComponentDefinition, ComponentType, EventContext};
use std::sync::Arc;

#[async_trait]
pub trait RouteLookup: Send + Sync {
    /// Resolve the deployment and data an event context routes with.
    async fn attach_event_context(&self, ctx: &EventContext) -> StoreResult<ResolvedContext>;

    /// Matcher for one resolved context, cached by its key.
    async fn deployment_matcher(&self, resolved: &ResolvedContext) -> StoreResult<Arc<Matcher>>;

    /// Union of the routes of every active release.
    async fn release_matcher(&self) -> StoreResult<Arc<Matcher>>;

    /// Declared dependency adapter with its url and headers expanded against the
    /// context data.
    async fn adapter(
        &self,
        resolved: &ResolvedContext,
        name: &str,
        component_type: ComponentType,
    ) -> StoreResult<Adapter>;

    /// Definition of a deployed component, keyed by name and version.
    fn component_def(&self, component: &Component) -> Option<Arc<ComponentDefinition>>;

    /// Component is a platform ingress adapter allowed to send context-free
    /// events.
    fn is_genesis_adapter(&self, component: &Component) -> bool;
}
