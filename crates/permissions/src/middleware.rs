//! Dispatch of inbound RPC calls from a single origin.
//!
//! Wallet-owned methods are served from a static handler table. Restricted methods go through the
//! controller's authorization; everything else is passed on to the next handler.

use crate::{
    controller::PermissionsController,
    error::{PermissionsError, Result, ToRpcResponseResult, to_rpc_result},
    events::Web3UsageEvent,
    provider::Provider,
    types::{DomainMetadataParams, Origin, Permission, RequestedPermissions},
};
use alloy_primitives::Address;
use futures::future;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{collections::HashMap, sync::LazyLock};
use wallet_permissions_rpc::{
    request::{Id, Request, RequestParams, RpcCall, RpcMethodCall},
    response::{Response, ResponseResult, RpcResponse},
};

/// The operations the method handlers need.
#[async_trait::async_trait]
pub trait MethodHooks: Send + Sync {
    fn get_accounts(&self, origin: &Origin) -> Vec<Address>;

    async fn request_accounts(&self, origin: &Origin) -> Result<Vec<Address>>;

    async fn request_permissions(
        &self,
        origin: &Origin,
        requested: RequestedPermissions,
    ) -> Result<Vec<Permission>>;

    fn get_permissions(&self, origin: &Origin) -> Vec<Permission>;

    fn record_domain_metadata(
        &self,
        origin: &Origin,
        metadata: Option<DomainMetadataParams>,
        extension_id: Option<String>,
    ) -> Result<()>;

    fn log_web3_usage(&self, origin: &Origin, event: &Web3UsageEvent);

    fn is_restricted(&self, method: &str) -> bool;

    async fn execute_restricted_method(
        &self,
        origin: &Origin,
        method: &str,
        params: Value,
    ) -> Result<Value>;
}

#[async_trait::async_trait]
impl MethodHooks for PermissionsController {
    fn get_accounts(&self, origin: &Origin) -> Vec<Address> {
        Self::get_accounts(self, origin)
    }

    async fn request_accounts(&self, origin: &Origin) -> Result<Vec<Address>> {
        Self::request_accounts(self, origin).await
    }

    async fn request_permissions(
        &self,
        origin: &Origin,
        requested: RequestedPermissions,
    ) -> Result<Vec<Permission>> {
        Self::request_permissions(self, origin, requested).await
    }

    fn get_permissions(&self, origin: &Origin) -> Vec<Permission> {
        Self::get_permissions(self, origin)
    }

    fn record_domain_metadata(
        &self,
        origin: &Origin,
        metadata: Option<DomainMetadataParams>,
        extension_id: Option<String>,
    ) -> Result<()> {
        Self::record_domain_metadata(self, origin, metadata, extension_id)
    }

    fn log_web3_usage(&self, origin: &Origin, event: &Web3UsageEvent) {
        Self::log_web3_usage(self, origin, event)
    }

    fn is_restricted(&self, method: &str) -> bool {
        Self::is_restricted(self, method)
    }

    async fn execute_restricted_method(
        &self,
        origin: &Origin,
        method: &str,
        params: Value,
    ) -> Result<Value> {
        Self::execute_restricted_method(self, origin, method, params).await
    }
}

/// Wallet-owned methods served directly by the middleware.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MethodHandler {
    RequestPermissions,
    GetPermissions,
    RequestAccounts,
    Accounts,
    SendDomainMetadata,
    LogWeb3Usage,
}

static HANDLERS: LazyLock<HashMap<&'static str, MethodHandler>> = LazyLock::new(|| {
    MethodHandler::ALL.into_iter().map(|handler| (handler.method_name(), handler)).collect()
});

impl MethodHandler {
    pub const ALL: [Self; 6] = [
        Self::RequestPermissions,
        Self::GetPermissions,
        Self::RequestAccounts,
        Self::Accounts,
        Self::SendDomainMetadata,
        Self::LogWeb3Usage,
    ];

    pub const fn method_name(&self) -> &'static str {
        match self {
            Self::RequestPermissions => "wallet_requestPermissions",
            Self::GetPermissions => "wallet_getPermissions",
            Self::RequestAccounts => "eth_requestAccounts",
            Self::Accounts => "eth_accounts",
            Self::SendDomainMetadata => "wallet_sendDomainMetadata",
            Self::LogWeb3Usage => "metamask_logInjectedWeb3Usage",
        }
    }

    /// Returns the handler serving `method`, if any.
    pub fn lookup(method: &str) -> Option<Self> {
        HANDLERS.get(method).copied()
    }
}

/// Who a call comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestContext {
    pub origin: Origin,
    /// Id of the calling extension, if the caller is one
    pub extension_id: Option<String>,
}

/// Outcome of [`MethodMiddleware::handle`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// The call was answered.
    End(ResponseResult),
    /// The call is not ours, hand it to the next handler.
    Next(RpcMethodCall),
}

/// Serves the calls of one origin.
#[derive(Clone, Debug)]
pub struct MethodMiddleware<H> {
    hooks: H,
    context: RequestContext,
}

impl<H: MethodHooks> MethodMiddleware<H> {
    pub fn new(hooks: H, context: RequestContext) -> Self {
        Self { hooks, context }
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    pub fn origin(&self) -> &Origin {
        &self.context.origin
    }

    pub async fn handle(&self, call: RpcMethodCall) -> Dispatch {
        trace!(target: "permissions::rpc", origin = %self.origin(), method = %call.method, "handling call");
        if let Some(handler) = MethodHandler::lookup(&call.method) {
            return Dispatch::End(self.execute(handler, call.params).await);
        }
        if self.hooks.is_restricted(&call.method) {
            let RpcMethodCall { method, params, .. } = call;
            let result =
                self.hooks.execute_restricted_method(self.origin(), &method, params.into()).await;
            return Dispatch::End(result.to_rpc_result());
        }
        Dispatch::Next(call)
    }

    async fn execute(&self, handler: MethodHandler, params: RequestParams) -> ResponseResult {
        let origin = self.origin();
        match handler {
            MethodHandler::RequestPermissions => self.request_permissions(&params).await.to_rpc_result(),
            MethodHandler::GetPermissions => to_rpc_result(self.hooks.get_permissions(origin)),
            MethodHandler::RequestAccounts => self.hooks.request_accounts(origin).await.to_rpc_result(),
            MethodHandler::Accounts => to_rpc_result(self.hooks.get_accounts(origin)),
            MethodHandler::SendDomainMetadata => self
                .hooks
                .record_domain_metadata(origin, metadata_param(&params), self.context.extension_id.clone())
                .map(|()| true)
                .to_rpc_result(),
            MethodHandler::LogWeb3Usage => first_param::<Web3UsageEvent>(&params)
                .map(|event| {
                    self.hooks.log_web3_usage(origin, &event);
                    true
                })
                .to_rpc_result(),
        }
    }

    async fn request_permissions(&self, params: &RequestParams) -> Result<Vec<Permission>> {
        let requested = first_param::<RequestedPermissions>(params)?;
        self.hooks.request_permissions(self.origin(), requested).await
    }
}

/// Deserializes the first positional param.
fn first_param<T: DeserializeOwned>(params: &RequestParams) -> Result<T> {
    let value = params
        .get(0)
        .ok_or_else(|| PermissionsError::InvalidParams("expected a single object param".to_string()))?;
    serde_json::from_value(value.clone()).map_err(|err| PermissionsError::InvalidParams(err.to_string()))
}

/// Domain metadata is sent either as the params object or as its first element.
fn metadata_param(params: &RequestParams) -> Option<DomainMetadataParams> {
    let value = match params {
        RequestParams::None => return None,
        RequestParams::Object(object) => Value::Object(object.clone()),
        RequestParams::Array(values) => values.first()?.clone(),
    };
    serde_json::from_value(value)
        .inspect_err(|err| trace!(target: "permissions::rpc", %err, "malformed domain metadata"))
        .ok()
}

/// Answers calls of one origin, forwarding everything the middleware passes on to the provider.
#[derive(Clone, Debug)]
pub struct PermissionedRpcHandler<H, P> {
    middleware: MethodMiddleware<H>,
    provider: P,
}

impl<P: Provider> PermissionedRpcHandler<PermissionsController, P> {
    /// Creates a handler for `origin` on top of the controller.
    pub fn for_origin(controller: &PermissionsController, origin: Origin, provider: P) -> Self {
        Self::new(controller.middleware(origin, None), provider)
    }
}

impl<H: MethodHooks, P: Provider> PermissionedRpcHandler<H, P> {
    pub fn new(middleware: MethodMiddleware<H>, provider: P) -> Self {
        Self { middleware, provider }
    }

    pub fn middleware(&self) -> &MethodMiddleware<H> {
        &self.middleware
    }

    /// Invoked for every incoming `RpcMethodCall`
    pub async fn on_call(&self, call: RpcMethodCall) -> RpcResponse {
        let id = call.id();
        let result = match self.middleware.handle(call).await {
            Dispatch::End(result) => result,
            Dispatch::Next(call) => {
                trace!(target: "permissions::rpc", method = %call.method, "forwarding call to provider");
                self.provider.send_request(call).await
            }
        };
        trace!(target: "permissions::rpc", "sending rpc result {:?}", result);
        RpcResponse::new(id, result)
    }

    /// Handles a single call of any kind; notifications yield no response.
    pub async fn on_rpc_call(&self, call: RpcCall) -> Option<RpcResponse> {
        match call {
            RpcCall::MethodCall(call) => Some(self.on_call(call).await),
            RpcCall::Notification(notification) => {
                let call = RpcMethodCall::new(Id::Null, notification.method, notification.params);
                let _ = self.on_call(call).await;
                None
            }
            RpcCall::Invalid { id } => {
                warn!(target: "permissions::rpc", %id, "invalid rpc call");
                Some(RpcResponse::invalid_request(id))
            }
        }
    }

    /// Handles a single call or a batch. Yields nothing if no call expects a response.
    pub async fn on_request(&self, request: Request) -> Option<Response> {
        match request {
            Request::Single(call) => self.on_rpc_call(call).await.map(Response::Single),
            Request::Batch(calls) => {
                let responses =
                    future::join_all(calls.into_iter().map(|call| self.on_rpc_call(call))).await;
                let batch: Vec<_> = responses.into_iter().flatten().collect();
                (!batch.is_empty()).then_some(Response::Batch(batch))
            }
        }
    }
}
