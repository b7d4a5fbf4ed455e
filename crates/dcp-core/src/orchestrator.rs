use std::sync::Arc;

use dcp_exec::{ExecRequest, InstallExecutor};
use dcp_hash::{fingerprint, BundleId, DependencyFile, DependencySet};
use dcp_installer::InstallerRegistry;

use crate::error::CacheError;
use crate::request::{CacheRequest, CacheResponse};
use crate::singleflight::{Leadership, SingleFlight};
use crate::store::CacheStore;

/// End-to-end request handling: validate, fingerprint, probe the cache,
/// and on a miss install then persist. Owns no mutable state beyond what
/// the stores themselves persist; safe to share behind an `Arc` and call
/// concurrently from many tasks.
pub struct RequestOrchestrator {
    registry: Arc<InstallerRegistry>,
    executor: InstallExecutor,
    store: CacheStore,
    single_flight: Option<Arc<SingleFlight>>,
}

impl RequestOrchestrator {
    pub fn new(
        registry: Arc<InstallerRegistry>,
        executor: InstallExecutor,
        store: CacheStore,
        single_flight: bool,
    ) -> Self {
        Self {
            registry,
            executor,
            store,
            single_flight: single_flight.then(SingleFlight::new),
        }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Run the request state machine: fingerprint, probe, and on miss,
    /// install then store in blob → index → archive order.
    pub async fn handle(&self, request: CacheRequest) -> Result<CacheResponse, CacheError> {
        if request.manifest_content.is_empty() {
            return Err(CacheError::BadRequest(
                "manifest_content must not be empty".to_string(),
            ));
        }
        if !self.registry.supports_manager(&request.manager) {
            return Err(CacheError::BadRequest(format!(
                "unsupported manager: {}",
                request.manager
            )));
        }

        let installer = self
            .registry
            .resolve(&request.manager, &request.versions, &request.custom_args)
            .expect("supports_manager just confirmed this manager is registered");

        // The lockfile is only part of the dependency set when it has
        // content; an empty lockfile is never added, even as an empty file.
        let mut files = vec![DependencyFile::new(
            installer.manifest_name(),
            request.manifest_content.clone(),
        )];
        if !request.lockfile_content.is_empty() {
            files.push(DependencyFile::new(
                installer.lockfile_name(),
                request.lockfile_content.clone(),
            ));
        }
        let dependency_set = DependencySet::new(&request.manager, request.versions.clone(), files);
        let bundle_id = fingerprint(&dependency_set);

        if self.store.has_bundle(bundle_id.as_str()) {
            tracing::debug!(bundle_id = %bundle_id, "cache hit");
            return Ok(CacheResponse::new(bundle_id, true));
        }

        match &self.single_flight {
            None => self.install_and_store(bundle_id, request).await,
            Some(flight) => match flight.acquire(bundle_id.as_str()) {
                Leadership::Leader(_guard) => self.install_and_store(bundle_id, request).await,
                Leadership::Follower(notify) => {
                    notify.notified().await;
                    if self.store.has_bundle(bundle_id.as_str()) {
                        Ok(CacheResponse::new(bundle_id, true))
                    } else {
                        // The leader's install failed; redundant work is
                        // tolerated, so this caller tries on its own.
                        self.install_and_store(bundle_id, request).await
                    }
                }
            },
        }
    }

    async fn install_and_store(
        &self,
        bundle_id: BundleId,
        request: CacheRequest,
    ) -> Result<CacheResponse, CacheError> {
        let manager_version =
            dcp_store::describe_manager_version(&request.manager, &request.versions);

        let exec_request = ExecRequest {
            manager: request.manager.clone(),
            versions: request.versions.clone(),
            custom_args: request.custom_args.clone(),
            manifest_content: request.manifest_content.clone(),
            lockfile_content: request.lockfile_content.clone(),
        };

        tracing::debug!(bundle_id = %bundle_id, manager = %request.manager, "cache miss, installing");
        let files = self.executor.run(exec_request).await?;

        self.store
            .store_bundle(
                bundle_id.as_str().to_string(),
                request.manager.clone(),
                manager_version,
                files,
            )
            .await
            .map_err(|e| CacheError::StorageFault(e.to_string()))?;

        Ok(CacheResponse::new(bundle_id, false))
    }
}
