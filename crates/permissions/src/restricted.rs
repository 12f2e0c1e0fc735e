//! Registry of restricted methods, those that require a granted permission.

use crate::{
    caveat,
    error::{PermissionsError, Result},
    store::PermissionStore,
    types::{Origin, Permission},
};
use serde_json::Value;
use std::collections::BTreeMap;

/// The account access method, always restricted.
pub const ETH_ACCOUNTS: &str = "eth_accounts";

/// How an authorized call to a restricted method is answered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestrictedExecutor {
    /// Answered from the origin's account caveat, limited to accounts the provider knows.
    Accounts,
    /// Forwarded to the provider with the caveat-transformed params.
    Provider,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestrictedMethod {
    pub description: String,
    pub executor: RestrictedExecutor,
}

impl RestrictedMethod {
    /// A restricted method answered by the provider.
    pub fn provider(description: impl Into<String>) -> Self {
        Self { description: description.into(), executor: RestrictedExecutor::Provider }
    }
}

/// The outcome of a successful authorization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizedCall {
    /// The permission that allowed the call, `None` for unrestricted methods.
    pub permission: Option<Permission>,
    /// Params after all caveats were applied.
    pub params: Value,
}

#[derive(Clone, Debug)]
pub struct RestrictedMethods {
    methods: BTreeMap<String, RestrictedMethod>,
}

impl Default for RestrictedMethods {
    fn default() -> Self {
        Self::new()
    }
}

impl RestrictedMethods {
    /// Creates a registry containing the built-in restricted methods.
    pub fn new() -> Self {
        let mut methods = BTreeMap::new();
        methods.insert(
            ETH_ACCOUNTS.to_string(),
            RestrictedMethod {
                description: "View the addresses of the user's chosen accounts.".to_string(),
                executor: RestrictedExecutor::Accounts,
            },
        );
        Self { methods }
    }

    /// Registers a restricted method, replacing a previous registration of the same name.
    pub fn register(&mut self, name: impl Into<String>, method: RestrictedMethod) -> &mut Self {
        self.methods.insert(name.into(), method);
        self
    }

    pub fn is_restricted(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }

    pub fn get(&self, method: &str) -> Option<&RestrictedMethod> {
        self.methods.get(method)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    /// Returns the origin's permission for `method`, if granted.
    pub fn permission_for(
        &self,
        store: &PermissionStore,
        origin: &Origin,
        method: &str,
    ) -> Option<Permission> {
        store.get_permission(origin, method)
    }

    /// Checks whether `origin` may call `method` and applies the permission's caveats to
    /// `params`.
    pub fn authorize(
        &self,
        store: &PermissionStore,
        origin: &Origin,
        method: &str,
        params: Value,
    ) -> Result<AuthorizedCall> {
        if !self.is_restricted(method) {
            return Ok(AuthorizedCall { permission: None, params });
        }
        let Some(permission) = self.permission_for(store, origin, method) else {
            debug!(target: "permissions::restricted", %origin, method, "no permission");
            return Err(PermissionsError::Unauthorized {
                origin: origin.clone(),
                method: method.to_string(),
            });
        };
        let params = caveat::apply_params(&permission.caveats, params).map_err(|(caveat, reason)| {
            debug!(target: "permissions::restricted", %origin, method, %caveat, %reason, "caveat rejected call");
            PermissionsError::CaveatRejected {
                origin: origin.clone(),
                method: method.to_string(),
                caveat,
                reason,
            }
        })?;
        Ok(AuthorizedCall { permission: Some(permission), params })
    }
}
