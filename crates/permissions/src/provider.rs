//! The account and RPC backend that executes authorized calls.

use alloy_primitives::Address;
use wallet_permissions_rpc::{request::RpcMethodCall, response::ResponseResult};

/// Executes calls that already passed authorization.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// All accounts the wallet currently exposes, in display order.
    async fn accounts(&self) -> Vec<Address>;

    /// Sends a single call and returns its result or error.
    async fn send_request(&self, call: RpcMethodCall) -> ResponseResult;
}

#[async_trait::async_trait]
impl<P: Provider + ?Sized> Provider for std::sync::Arc<P> {
    async fn accounts(&self) -> Vec<Address> {
        (**self).accounts().await
    }

    async fn send_request(&self, call: RpcMethodCall) -> ResponseResult {
        (**self).send_request(call).await
    }
}
