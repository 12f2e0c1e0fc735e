//! The permissions controller orchestrates grants, approval requests and restricted calls.

use crate::{
    caveat::{self, Caveat, CaveatType},
    config::PermissionsConfig,
    error::{PermissionsError, Result},
    events::{ApprovalUi, MetricsHook, NoopMetrics, Web3UsageEvent},
    middleware::{MethodMiddleware, RequestContext},
    pending::PendingApprovals,
    provider::Provider,
    restricted::{AuthorizedCall, ETH_ACCOUNTS, RestrictedExecutor, RestrictedMethods},
    store::{JsonFileStore, MemoryStateStore, PermissionStore, StateStore},
    types::{
        ApprovedRequest, DomainMetadata, DomainMetadataParams, Origin, Permission,
        PermissionsRequest, RequestId, RequestedPermissions,
    },
};
use alloy_primitives::Address;
use serde_json::Value;
use std::{fmt, sync::Arc};
use wallet_permissions_rpc::request::{Id, RpcMethodCall};

/// Mediates capability grants between origins and the wallet.
///
/// One instance is created at startup with its collaborators injected and shared by cloning; all
/// clones operate on the same store and pending registry.
#[derive(Clone)]
pub struct PermissionsController {
    config: Arc<PermissionsConfig>,
    store: PermissionStore,
    restricted: Arc<RestrictedMethods>,
    pending: PendingApprovals,
    provider: Arc<dyn Provider>,
    metrics: Arc<dyn MetricsHook>,
}

impl fmt::Debug for PermissionsController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionsController")
            .field("config", &self.config)
            .field("restricted", &self.restricted)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl PermissionsController {
    /// Creates a controller that persists to the configured state file, or keeps its state in
    /// memory if none is configured.
    pub fn new(
        config: PermissionsConfig,
        provider: impl Provider + 'static,
        ui: impl ApprovalUi + 'static,
    ) -> Result<Self> {
        let backend: Arc<dyn StateStore> = match &config.state_path {
            Some(path) => Arc::new(JsonFileStore::new(path)),
            None => Arc::new(MemoryStateStore::new()),
        };
        Self::with_state_store(config, provider, ui, backend)
    }

    /// Creates a controller on top of the given state backend.
    pub fn with_state_store(
        config: PermissionsConfig,
        provider: impl Provider + 'static,
        ui: impl ApprovalUi + 'static,
        backend: Arc<dyn StateStore>,
    ) -> Result<Self> {
        let store = PermissionStore::open(backend)?;
        let restricted = config.restricted_methods();
        let names: Vec<_> = restricted.names().collect();
        debug!(target: "permissions::controller", restricted = ?names, "created permissions controller");
        Ok(Self {
            config: Arc::new(config),
            store,
            restricted: Arc::new(restricted),
            pending: PendingApprovals::new(Arc::new(ui)),
            provider: Arc::new(provider),
            metrics: Arc::new(NoopMetrics),
        })
    }

    /// Sets the hook usage events are reported to
    #[must_use]
    pub fn with_metrics(mut self, metrics: impl MetricsHook + 'static) -> Self {
        self.metrics = Arc::new(metrics);
        self
    }

    pub fn config(&self) -> &PermissionsConfig {
        &self.config
    }

    pub fn store(&self) -> &PermissionStore {
        &self.store
    }

    pub fn restricted_methods(&self) -> &RestrictedMethods {
        &self.restricted
    }

    pub fn pending_approvals(&self) -> &PendingApprovals {
        &self.pending
    }

    /// Returns a middleware serving calls of `origin`.
    pub fn middleware(&self, origin: Origin, extension_id: Option<String>) -> MethodMiddleware<Self> {
        MethodMiddleware::new(self.clone(), RequestContext { origin, extension_id })
    }

    /// Accounts the origin is permitted to see, empty if it holds no account permission.
    pub fn get_accounts(&self, origin: &Origin) -> Vec<Address> {
        self.store
            .get_permission(origin, ETH_ACCOUNTS)
            .and_then(|permission| match permission.caveat(CaveatType::EthAccounts) {
                Some(Caveat::EthAccounts(accounts)) => Some(accounts.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Returns the origin's accounts, asking the user for access first if necessary.
    pub async fn request_accounts(&self, origin: &Origin) -> Result<Vec<Address>> {
        let accounts = self.get_accounts(origin);
        if !accounts.is_empty() {
            return Ok(accounts);
        }

        self.request_permissions(origin, RequestedPermissions::single(ETH_ACCOUNTS)).await?;
        let accounts = self.get_accounts(origin);
        if accounts.is_empty() {
            return Err(PermissionsError::Internal(
                "accounts unavailable after permissions approval".to_string(),
            ));
        }
        Ok(accounts)
    }

    /// Asks the user to grant `requested` to `origin` and waits for the decision.
    ///
    /// Resolves with the permissions that were granted, which may differ from those requested.
    pub async fn request_permissions(
        &self,
        origin: &Origin,
        requested: RequestedPermissions,
    ) -> Result<Vec<Permission>> {
        self.validate_requested(&requested)?;
        let metadata = self.store.get_metadata(origin);
        let (id, receiver) = self.pending.create(origin.clone(), requested, metadata)?;
        trace!(target: "permissions::controller", %origin, %id, "waiting for permissions approval");

        receiver.await.map_err(|_| {
            PermissionsError::Internal(format!("permissions request {id} was dropped"))
        })?
    }

    /// Grants the user-approved permissions and resumes the waiting caller.
    ///
    /// `accounts` become the account restriction of an approved `eth_accounts` permission. If the
    /// approval is invalid or cannot be persisted, the waiting caller fails with the same error
    /// that is returned here.
    ///
    /// The request stays registered while the approval is validated, so its origin cannot open
    /// another request until this one is resolved.
    pub async fn approve_permissions_request(
        &self,
        approved: ApprovedRequest,
        accounts: Vec<Address>,
    ) -> Result<Vec<Permission>> {
        let id = approved.id;
        let origin =
            self.pending.get(&id).ok_or(PermissionsError::NoSuchPendingApproval(id))?.origin;
        let finalized = self.finalize_permissions(&origin, approved.permissions, accounts).await;

        // no await from here on: the entry is removed, persisted and resolved in one step
        let pending = self.pending.take(id).inspect_err(|_| {
            debug!(target: "permissions::controller", %origin, %id, "request resolved during approval");
        })?;
        let granted = finalized.and_then(|permissions| {
            self.store.grant(&origin, permissions.clone())?;
            Ok(permissions)
        });

        match granted {
            Ok(permissions) => {
                debug!(
                    target: "permissions::controller",
                    %origin,
                    %id,
                    granted = permissions.len(),
                    "granted permissions"
                );
                pending.approve(permissions.clone());
                Ok(permissions)
            }
            Err(err) => {
                warn!(target: "permissions::controller", %origin, %id, %err, "failed to grant permissions");
                pending.reject(err.clone());
                Err(err)
            }
        }
    }

    /// Fails the waiting caller, with a user rejection unless another reason is given.
    pub fn reject_permissions_request(
        &self,
        id: RequestId,
        reason: Option<PermissionsError>,
    ) -> Result<()> {
        self.pending.reject(id, reason)
    }

    /// Rejects the origin's pending request, e.g. because its tab went away.
    pub fn reject_pending_for_origin(&self, origin: &Origin) -> Option<RequestId> {
        self.pending.reject_origin(origin, None)
    }

    pub fn pending_requests(&self) -> Vec<PermissionsRequest> {
        self.pending.requests()
    }

    pub fn is_restricted(&self, method: &str) -> bool {
        self.restricted.is_restricted(method)
    }

    /// Authorizes and executes a call to a restricted method.
    pub async fn execute_restricted_method(
        &self,
        origin: &Origin,
        method: &str,
        params: Value,
    ) -> Result<Value> {
        let AuthorizedCall { permission, params } =
            self.restricted.authorize(&self.store, origin, method, params)?;
        let executor =
            self.restricted.get(method).map_or(RestrictedExecutor::Provider, |m| m.executor);
        trace!(target: "permissions::controller", %origin, method, ?executor, "executing restricted method");

        let result = match executor {
            RestrictedExecutor::Accounts => {
                let known = self.provider.accounts().await;
                let accounts: Vec<Address> = self
                    .get_accounts(origin)
                    .into_iter()
                    .filter(|account| known.contains(account))
                    .collect();
                serde_json::to_value(accounts)
                    .map_err(|err| PermissionsError::Internal(err.to_string()))?
            }
            RestrictedExecutor::Provider => {
                let call = RpcMethodCall::new(Id::Null, method, params);
                self.provider.send_request(call).await.into_result()?
            }
        };

        Ok(match permission {
            Some(permission) => caveat::apply_response(&permission.caveats, result),
            None => result,
        })
    }

    /// Records the origin's metadata. A payload without a name is ignored.
    pub fn record_domain_metadata(
        &self,
        origin: &Origin,
        metadata: Option<DomainMetadataParams>,
        extension_id: Option<String>,
    ) -> Result<()> {
        let Some(name) = metadata.and_then(|metadata| metadata.name).filter(|n| !n.is_empty())
        else {
            trace!(target: "permissions::controller", %origin, "ignoring domain metadata without name");
            return Ok(());
        };
        self.store.set_metadata(origin, DomainMetadata { name, extension_id })?;
        Ok(())
    }

    pub fn get_permissions(&self, origin: &Origin) -> Vec<Permission> {
        self.store.get_permissions(origin)
    }

    /// Revokes the origin's grants for `methods`, returning what was removed.
    pub fn revoke_permissions(&self, origin: &Origin, methods: &[String]) -> Result<Vec<Permission>> {
        let removed = self.store.revoke(origin, methods)?;
        debug!(target: "permissions::controller", %origin, revoked = removed.len(), "revoked permissions");
        Ok(removed)
    }

    /// Revokes every grant of every origin.
    pub fn clear_permissions(&self) -> Result<()> {
        self.store.clear()?;
        debug!(target: "permissions::controller", "cleared all permissions");
        Ok(())
    }

    pub fn log_web3_usage(&self, origin: &Origin, event: &Web3UsageEvent) {
        self.metrics.track(origin, event);
    }

    fn validate_requested(&self, requested: &RequestedPermissions) -> Result<()> {
        if requested.is_empty() {
            return Err(PermissionsError::InvalidParams(
                "must request at least one permission".to_string(),
            ));
        }
        if let Some(unknown) = requested.methods().find(|method| !self.is_restricted(method)) {
            return Err(PermissionsError::UnknownPermission(unknown.to_string()));
        }
        Ok(())
    }

    async fn finalize_permissions(
        &self,
        origin: &Origin,
        approved: RequestedPermissions,
        accounts: Vec<Address>,
    ) -> Result<Vec<Permission>> {
        self.validate_requested(&approved)?;
        if approved.contains(ETH_ACCOUNTS) {
            self.validate_accounts(&accounts).await?;
        }

        Ok(approved
            .into_iter()
            .map(|(method, requested)| {
                let mut caveats = requested.caveats;
                if method == ETH_ACCOUNTS {
                    caveats.retain(|caveat| caveat.kind() != CaveatType::EthAccounts);
                    caveats.insert(0, Caveat::EthAccounts(accounts.clone()));
                }
                Permission::new(origin.clone(), method, caveats)
            })
            .collect())
    }

    async fn validate_accounts(&self, accounts: &[Address]) -> Result<()> {
        if accounts.is_empty() {
            return Err(PermissionsError::InvalidAccounts(
                "must provide a non-empty list of accounts".to_string(),
            ));
        }
        if self.config.validate_accounts {
            let known = self.provider.accounts().await;
            if let Some(unknown) = accounts.iter().find(|account| !known.contains(account)) {
                return Err(PermissionsError::InvalidAccounts(format!("unknown account {unknown}")));
            }
        }
        Ok(())
    }
}
