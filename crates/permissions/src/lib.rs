//! # wallet-permissions
//!
//! Permissions middleware and pending-approval coordinator of the wallet.
//!
//! Web origins must be granted a permission before they may call a restricted RPC method. Grants
//! are requested through [`PermissionsController::request_permissions`], which suspends the caller
//! until the user approves or rejects the request; at most one request per origin may be pending
//! at any time.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

#[macro_use]
extern crate tracing;

pub mod caveat;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod middleware;
pub mod pending;
pub mod provider;
pub mod restricted;
pub mod store;
pub mod types;

pub use caveat::{Caveat, CaveatType};
pub use config::PermissionsConfig;
pub use controller::PermissionsController;
pub use error::{PermissionsError, Result};
pub use events::{ApprovalNotifications, ApprovalUi, MetricsHook, Web3UsageEvent};
pub use middleware::{Dispatch, MethodMiddleware, PermissionedRpcHandler, RequestContext};
pub use pending::PendingApprovals;
pub use provider::Provider;
pub use restricted::{ETH_ACCOUNTS, RestrictedMethods};
pub use store::{JsonFileStore, MemoryStateStore, PermissionStore, StateStore};
pub use types::{
    ApprovedRequest, DomainMetadata, Origin, Permission, PermissionsRequest, RequestId,
    RequestedPermission, RequestedPermissions,
};

pub use wallet_permissions_rpc as rpc;
