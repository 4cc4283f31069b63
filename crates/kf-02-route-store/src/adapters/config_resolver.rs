//! Configuration resolver backed by the resource cache.
//!
//! | Context pins | Data | Version |
//! |--------------|------|---------|
//! | release manifest | manifest data | `m<gen>` |
//! | data snapshot | snapshot data | `s<gen>` |
//! | neither | environment data overlaid by virtual env data | `<veGen>.<envGen>` |

use crate::error::{StoreError, StoreResult};
use crate::ports::outbound::{ConfigResolver, ResolvedData, ResourceCache, ResourceKind};
use async_trait::async_trait;
use shared_types::EventContext;
use std::sync::Arc;

pub struct MergingConfigResolver {
    resources: Arc<dyn ResourceCache>,
}

impl MergingConfigResolver {
    pub fn new(resources: Arc<dyn ResourceCache>) -> Self {
        Self { resources }
    }
}

#[async_trait]
impl ConfigResolver for MergingConfigResolver {
    async fn resolve(&self, ctx: &EventContext) -> StoreResult<ResolvedData> {
        if ctx.virtual_env.is_empty() {
            return Err(StoreError::not_found(ResourceKind::VirtualEnvironment, ""));
        }

        if !ctx.release_manifest.is_empty() {
            let manifest = self.resources.release_manifest(&ctx.release_manifest).await?;
            if manifest.virtual_env != ctx.virtual_env {
                return Err(StoreError::InvalidContext(format!(
                    "release manifest '{}' belongs to virtual environment '{}', not '{}'",
                    manifest.name, manifest.virtual_env, ctx.virtual_env
                )));
            }
            return Ok(ResolvedData {
                data: manifest.data,
                version: format!("m{}", manifest.generation),
            });
        }

        if !ctx.virtual_env_snapshot.is_empty() {
            let snapshot = self
                .resources
                .data_snapshot(&ctx.virtual_env_snapshot)
                .await?;
            if snapshot.virtual_env != ctx.virtual_env {
                return Err(StoreError::InvalidContext(format!(
                    "data snapshot '{}' belongs to virtual environment '{}', not '{}'",
                    snapshot.name, snapshot.virtual_env, ctx.virtual_env
                )));
            }
            return Ok(ResolvedData {
                data: snapshot.data,
                version: format!("s{}", snapshot.generation),
            });
        }

        let ve = self.resources.virtual_environment(&ctx.virtual_env).await?;
        let env = self.resources.environment(&ve.environment).await?;
        let mut data = env.data;
        data.merge(&ve.data);

        Ok(ResolvedData {
            data,
            version: format!("{}.{}", ve.generation, env.generation),
        })
    }
}
