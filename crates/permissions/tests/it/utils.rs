use alloy_primitives::{Address, address};
use futures::{StreamExt, channel::mpsc::UnboundedReceiver};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use wallet_permissions::{
    ApprovalNotifications, MetricsHook, Origin, PermissionsConfig, PermissionsController,
    PermissionsRequest, Provider, Web3UsageEvent,
    rpc::{
        error::RpcError,
        request::{Id, RpcMethodCall},
        response::{ResponseResult, RpcResponse},
    },
};

pub const ORIGIN_A: &str = "https://a.test";
pub const ORIGIN_B: &str = "https://b.test";

/// A restricted method answered by the test provider.
pub const TEST_METHOD: &str = "test_method";

pub const ACCOUNTS: [Address; 2] = [
    address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"),
    address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8"),
];

/// Provider that knows [`ACCOUNTS`] and records every call it receives.
#[derive(Debug, Default)]
pub struct TestProvider {
    calls: Mutex<Vec<RpcMethodCall>>,
}

impl TestProvider {
    pub fn calls(&self) -> Vec<RpcMethodCall> {
        self.calls.lock().clone()
    }
}

#[async_trait::async_trait]
impl Provider for TestProvider {
    async fn accounts(&self) -> Vec<Address> {
        ACCOUNTS.to_vec()
    }

    async fn send_request(&self, call: RpcMethodCall) -> ResponseResult {
        self.calls.lock().push(call.clone());
        match call.method.as_str() {
            TEST_METHOD => ResponseResult::success(1),
            "eth_chainId" => ResponseResult::success("0x1"),
            _ => RpcError::method_not_found().into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingMetrics {
    events: Mutex<Vec<(Origin, Web3UsageEvent)>>,
}

impl RecordingMetrics {
    pub fn events(&self) -> Vec<(Origin, Web3UsageEvent)> {
        self.events.lock().clone()
    }
}

impl MetricsHook for RecordingMetrics {
    fn track(&self, origin: &Origin, event: &Web3UsageEvent) {
        self.events.lock().push((origin.clone(), event.clone()));
    }
}

pub struct TestSetup {
    pub controller: PermissionsController,
    pub provider: Arc<TestProvider>,
    pub notifications: ApprovalNotifications,
}

pub fn setup() -> TestSetup {
    setup_with(PermissionsConfig::test())
}

pub fn setup_with(config: PermissionsConfig) -> TestSetup {
    crate::init_tracing();
    let provider = Arc::new(TestProvider::default());
    let notifications = ApprovalNotifications::new();
    let controller = PermissionsController::new(
        config.with_restricted_method(TEST_METHOD, "Test method"),
        provider.clone(),
        notifications.clone(),
    )
    .unwrap();
    TestSetup { controller, provider, notifications }
}

pub fn call(method: &str, params: Value) -> RpcMethodCall {
    RpcMethodCall::new(Id::Number(1), method, params)
}

pub fn request_permissions_call(permissions: Value) -> RpcMethodCall {
    call("wallet_requestPermissions", json!([permissions]))
}

/// Waits for the next request announced to the approval UI.
pub async fn next_request(requests: &mut UnboundedReceiver<PermissionsRequest>) -> PermissionsRequest {
    requests.next().await.expect("approval notifications closed")
}

pub fn error_code(response: &RpcResponse) -> Option<i64> {
    response.result().as_error().map(|err| err.code.code())
}
