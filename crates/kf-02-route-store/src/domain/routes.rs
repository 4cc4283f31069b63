//! Route construction from an app deployment and its configuration.

use super::template::EnvTemplate;
use kf_01_rule_matcher::Route;
use shared_types::{AppDeployment, EnvData, EventContext};
use std::sync::Arc;
use tracing::warn;

/// Everything needed to route within one event context.
#[derive(Debug, Clone)]
pub struct ResolvedContext {
    pub context: EventContext,
    pub app_deployment: Arc<AppDeployment>,
    pub data: Arc<EnvData>,
    /// Cache key; changes whenever the deployment or its data changes.
    pub key: String,
}

/// `<appDep>-<gen>_<ve>-<dataVersion>`
pub fn context_key(dep: &AppDeployment, virtual_env: &str, data_version: &str) -> String {
    format!(
        "{}-{}_{}-{}",
        dep.name, dep.generation, virtual_env, data_version
    )
}

/// Build one route per declared rule. A rule whose template cannot be
/// parsed yields an unresolved route, which the matcher skips.
pub fn build_routes(dep: &AppDeployment, data: &EnvData, ctx: &EventContext) -> Vec<Route> {
    let route_ctx = EventContext {
        platform: ctx.platform.clone(),
        app_deployment: dep.name.clone(),
        virtual_env: ctx.virtual_env.clone(),
        virtual_env_snapshot: ctx.virtual_env_snapshot.clone(),
        release_manifest: ctx.release_manifest.clone(),
    };

    let mut routes = Vec::new();
    for (comp, def) in dep.declared_components() {
        for spec in &def.routes {
            let mut route = Route::new(spec.id, spec.rule.clone())
                .with_component(comp.clone())
                .with_context(route_ctx.clone());

            match EnvTemplate::parse(&spec.rule) {
                Ok(tpl) => route.resolve(tpl.render(data, false), spec.priority),
                Err(e) => warn!(
                    app_deployment = %dep.name,
                    component = %comp.name,
                    route_id = spec.id,
                    error = %e,
                    "Route template invalid"
                ),
            }
            routes.push(route);
        }
    }
    routes
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{ComponentDefinition, RouteSpec};
    use std::collections::BTreeMap;

    fn dep() -> AppDeployment {
        AppDeployment {
            name: "shop".into(),
            generation: 3,
            app_name: "shop-app".into(),
            components: BTreeMap::from([(
                "cart".to_string(),
                ComponentDefinition {
                    hash: "0123456789abc".into(),
                    routes: vec![
                        RouteSpec {
                            id: 0,
                            rule: r#"Path("/{{.Vars.base}}/{id}")"#.into(),
                            priority: None,
                        },
                        RouteSpec {
                            id: 1,
                            rule: "Path({{ bad }})".into(),
                            priority: None,
                        },
                    ],
                    ..Default::default()
                },
            )]),
            ..Default::default()
        }
    }

    #[test]
    fn test_context_key() {
        assert_eq!(context_key(&dep(), "prod", "7.2"), "shop-3_prod-7.2");
    }

    #[test]
    fn test_build_routes() {
        let data = EnvData::default().with_var("base", "cart");
        let ctx = EventContext::new("dev", "", "prod");
        let routes = build_routes(&dep(), &data, &ctx);

        assert_eq!(routes.len(), 2);
        let ok = &routes[0];
        assert!(ok.is_valid());
        assert_eq!(ok.resolved_rule, r#"Path("/cart/{id}")"#);
        assert_eq!(ok.component.name, "cart");
        assert_eq!(ok.component.hash, "0123456789abc");
        let rctx = ok.event_context.as_ref().unwrap();
        assert_eq!(rctx.app_deployment, "shop");
        assert_eq!(rctx.virtual_env, "prod");

        assert!(!routes[1].is_valid());
    }
}
