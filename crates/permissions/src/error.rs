//! Aggregated error type for the permissions subsystem

use crate::{
    caveat::{CaveatError, CaveatType},
    store::StoreError,
    types::{Origin, RequestId},
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use wallet_permissions_rpc::{
    error::{ErrorCode, RpcError},
    response::ResponseResult,
};

pub type Result<T, E = PermissionsError> = std::result::Result<T, E>;

/// Default message of a request the user declined.
pub const USER_REJECTED_MESSAGE: &str = "User rejected the request.";

#[derive(Clone, Debug, thiserror::Error)]
pub enum PermissionsError {
    #[error(
        "Unauthorized to perform action. Try requesting the required permission(s) first. For more information, see: https://eips.ethereum.org/EIPS/eip-2255"
    )]
    Unauthorized { origin: Origin, method: String },
    #[error("Unauthorized to perform action: caveat `{caveat}` rejected `{method}`: {reason}")]
    CaveatRejected { origin: Origin, method: String, caveat: CaveatType, reason: CaveatError },
    #[error(
        "Request of type 'wallet_requestPermissions' already pending for origin {0}. Please wait."
    )]
    RequestAlreadyPending(Origin),
    #[error("{0}")]
    UserRejected(String),
    #[error("No pending permissions request with id {0}")]
    NoSuchPendingApproval(RequestId),
    #[error("Unknown permission: {0}")]
    UnknownPermission(String),
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    #[error("Invalid accounts: {0}")]
    InvalidAccounts(String),
    #[error(transparent)]
    Store(Arc<StoreError>),
    #[error("Provider error: {0}")]
    Provider(RpcError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PermissionsError {
    /// The error the caller sees when the user declines a request.
    pub fn user_rejected() -> Self {
        Self::UserRejected(USER_REJECTED_MESSAGE.to_string())
    }

    /// Returns the JSON-RPC error code this error is reported with.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Unauthorized { .. } | Self::CaveatRejected { .. } => ErrorCode::Unauthorized,
            Self::RequestAlreadyPending(_) => ErrorCode::ResourceUnavailable,
            Self::UserRejected(_) => ErrorCode::UserRejectedRequest,
            Self::NoSuchPendingApproval(_) => ErrorCode::ResourceNotFound,
            Self::UnknownPermission(_) | Self::InvalidParams(_) | Self::InvalidAccounts(_) => {
                ErrorCode::InvalidParams
            }
            Self::Store(_) | Self::Internal(_) => ErrorCode::InternalError,
            Self::Provider(err) => err.code,
        }
    }
}

impl From<StoreError> for PermissionsError {
    fn from(err: StoreError) -> Self {
        Self::Store(Arc::new(err))
    }
}

impl From<RpcError> for PermissionsError {
    fn from(err: RpcError) -> Self {
        Self::Provider(err)
    }
}

impl From<PermissionsError> for RpcError {
    fn from(err: PermissionsError) -> Self {
        let message = err.to_string();
        match err {
            PermissionsError::Provider(err) => err,
            PermissionsError::Unauthorized { origin, method } => Self::unauthorized(message)
                .with_data(json!({ "origin": origin, "method": method })),
            PermissionsError::CaveatRejected { origin, method, caveat, reason } => {
                Self::unauthorized(message).with_data(json!({
                    "origin": origin,
                    "method": method,
                    "caveat": caveat,
                    "reason": reason.to_string(),
                }))
            }
            PermissionsError::RequestAlreadyPending(_) => Self::resource_unavailable(message),
            PermissionsError::UserRejected(_) => Self::user_rejected(message),
            PermissionsError::NoSuchPendingApproval(_) => Self::resource_not_found(message),
            PermissionsError::UnknownPermission(_)
            | PermissionsError::InvalidParams(_)
            | PermissionsError::InvalidAccounts(_) => Self::invalid_params(message),
            PermissionsError::Store(_) | PermissionsError::Internal(_) => {
                Self::internal_error_with(message)
            }
        }
    }
}

/// Helper trait to easily convert results to rpc results
pub(crate) trait ToRpcResponseResult {
    fn to_rpc_result(self) -> ResponseResult;
}

/// Converts a serializable value into a `ResponseResult`
pub fn to_rpc_result<T: Serialize>(val: T) -> ResponseResult {
    match serde_json::to_value(val) {
        Ok(success) => ResponseResult::Success(success),
        Err(err) => {
            error!(target: "permissions::rpc", %err, "failed to serialize rpc response");
            ResponseResult::error(RpcError::internal_error())
        }
    }
}

impl<T: Serialize> ToRpcResponseResult for Result<T> {
    fn to_rpc_result(self) -> ResponseResult {
        match self {
            Ok(val) => to_rpc_result(val),
            Err(err) => {
                match &err {
                    PermissionsError::Store(_) | PermissionsError::Internal(_) => {
                        error!(target: "permissions::rpc", %err, "request failed")
                    }
                    _ => debug!(target: "permissions::rpc", %err, "request failed"),
                }
                RpcError::from(err).into()
            }
        }
    }
}
