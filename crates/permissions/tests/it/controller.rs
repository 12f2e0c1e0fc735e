use crate::utils::*;
use alloy_primitives::Address;
use std::sync::Arc;
use tokio::sync::Notify;
use wallet_permissions::{
    ApprovalNotifications, ApprovedRequest, Caveat, ETH_ACCOUNTS, MemoryStateStore, Origin,
    Permission, PermissionsConfig, PermissionsController, PermissionsError, Provider,
    RequestedPermissions,
    rpc::{error::RpcError, request::RpcMethodCall, response::ResponseResult},
    store::StateStore,
};

/// Provider whose account lookups block until released.
#[derive(Debug, Default)]
struct GatedProvider {
    entered: Notify,
    release: Notify,
}

#[async_trait::async_trait]
impl Provider for GatedProvider {
    async fn accounts(&self) -> Vec<Address> {
        self.entered.notify_one();
        self.release.notified().await;
        ACCOUNTS.to_vec()
    }

    async fn send_request(&self, _call: RpcMethodCall) -> ResponseResult {
        RpcError::method_not_found().into()
    }
}

fn gated_controller() -> (PermissionsController, Arc<GatedProvider>) {
    crate::init_tracing();
    let provider = Arc::new(GatedProvider::default());
    let controller = PermissionsController::new(
        PermissionsConfig::test().with_restricted_method(TEST_METHOD, "Test method"),
        provider.clone(),
        ApprovalNotifications::new(),
    )
    .unwrap();
    (controller, provider)
}

#[tokio::test]
async fn accounts_are_empty_before_any_grant() {
    let TestSetup { controller, .. } = setup();
    assert!(controller.get_accounts(&Origin::new(ORIGIN_A)).is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn request_accounts_resolves_with_approved_accounts() {
    let TestSetup { controller, notifications, .. } = setup();
    let mut requests = notifications.subscribe();
    let origin = Origin::new(ORIGIN_A);

    let pending = {
        let controller = controller.clone();
        let origin = origin.clone();
        tokio::spawn(async move { controller.request_accounts(&origin).await })
    };
    let request = next_request(&mut requests).await;
    controller
        .approve_permissions_request(
            ApprovedRequest::new(request.id, request.permissions.clone()),
            vec![ACCOUNTS[1]],
        )
        .await
        .unwrap();

    assert_eq!(pending.await.unwrap().unwrap(), vec![ACCOUNTS[1]]);
    assert_eq!(controller.get_accounts(&origin), vec![ACCOUNTS[1]]);
}

#[tokio::test]
async fn unknown_ids_cannot_be_resolved() {
    let TestSetup { controller, .. } = setup();
    let origin = Origin::new(ORIGIN_A);
    let (id, _receiver) = controller
        .pending_approvals()
        .create(origin, RequestedPermissions::single(TEST_METHOD), None)
        .unwrap();
    controller.reject_permissions_request(id, None).unwrap();

    let err = controller
        .approve_permissions_request(
            ApprovedRequest::new(id, RequestedPermissions::single(TEST_METHOD)),
            vec![],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PermissionsError::NoSuchPendingApproval(missing) if missing == id));
    assert!(matches!(
        controller.reject_permissions_request(id, None),
        Err(PermissionsError::NoSuchPendingApproval(_))
    ));
}

#[tokio::test]
async fn eth_accounts_approval_requires_accounts() {
    let TestSetup { controller, .. } = setup();
    let origin = Origin::new(ORIGIN_A);
    let (id, receiver) = controller
        .pending_approvals()
        .create(origin.clone(), RequestedPermissions::single(ETH_ACCOUNTS), None)
        .unwrap();

    let err = controller
        .approve_permissions_request(
            ApprovedRequest::new(id, RequestedPermissions::single(ETH_ACCOUNTS)),
            vec![],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PermissionsError::InvalidAccounts(_)));
    assert!(matches!(receiver.await.unwrap(), Err(PermissionsError::InvalidAccounts(_))));
    assert!(controller.get_permissions(&origin).is_empty());
    assert!(controller.pending_approvals().is_empty());
}

#[tokio::test]
async fn account_validation_can_be_disabled() {
    let TestSetup { controller, .. } = setup_with(PermissionsConfig::test().with_validate_accounts(false));
    let origin = Origin::new(ORIGIN_A);
    let (id, _receiver) = controller
        .pending_approvals()
        .create(origin.clone(), RequestedPermissions::single(ETH_ACCOUNTS), None)
        .unwrap();

    let stranger = alloy_primitives::Address::repeat_byte(0x11);
    controller
        .approve_permissions_request(
            ApprovedRequest::new(id, RequestedPermissions::single(ETH_ACCOUNTS)),
            vec![stranger],
        )
        .await
        .unwrap();
    assert_eq!(controller.get_accounts(&origin), vec![stranger]);
}

#[tokio::test]
async fn regrant_replaces_same_method_only() {
    let TestSetup { controller, .. } = setup();
    let origin = Origin::new(ORIGIN_A);
    controller
        .store()
        .grant(
            &origin,
            vec![
                Permission::new(origin.clone(), ETH_ACCOUNTS, vec![Caveat::EthAccounts(vec![ACCOUNTS[0]])]),
                Permission::new(origin.clone(), TEST_METHOD, vec![]),
            ],
        )
        .unwrap();

    let (id, _receiver) = controller
        .pending_approvals()
        .create(origin.clone(), RequestedPermissions::single(ETH_ACCOUNTS), None)
        .unwrap();
    controller
        .approve_permissions_request(
            ApprovedRequest::new(id, RequestedPermissions::single(ETH_ACCOUNTS)),
            vec![ACCOUNTS[1]],
        )
        .await
        .unwrap();

    let permissions = controller.get_permissions(&origin);
    assert_eq!(permissions.len(), 2);
    assert_eq!(controller.get_accounts(&origin), vec![ACCOUNTS[1]]);
    assert!(permissions.iter().any(|p| p.parent_capability == TEST_METHOD));
}

#[tokio::test(flavor = "multi_thread")]
async fn origin_teardown_rejects_pending_caller() {
    let TestSetup { controller, notifications, .. } = setup();
    let mut requests = notifications.subscribe();
    let origin = Origin::new(ORIGIN_A);

    let pending = {
        let controller = controller.clone();
        let origin = origin.clone();
        tokio::spawn(async move {
            controller.request_permissions(&origin, RequestedPermissions::single(TEST_METHOD)).await
        })
    };
    let request = next_request(&mut requests).await;

    assert_eq!(controller.reject_pending_for_origin(&origin), Some(request.id));
    assert!(controller.pending_requests().is_empty());
    assert!(matches!(pending.await.unwrap(), Err(PermissionsError::UserRejected(_))));
    assert_eq!(controller.reject_pending_for_origin(&origin), None);
}

#[tokio::test]
async fn revoke_and_clear() {
    let TestSetup { controller, .. } = setup();
    let (a, b) = (Origin::new(ORIGIN_A), Origin::new(ORIGIN_B));
    for origin in [&a, &b] {
        controller
            .store()
            .grant(origin, vec![Permission::new(origin.clone(), TEST_METHOD, vec![])])
            .unwrap();
    }

    let removed = controller.revoke_permissions(&a, &[TEST_METHOD.to_string()]).unwrap();
    assert_eq!(removed.len(), 1);
    assert!(controller.get_permissions(&a).is_empty());
    assert_eq!(controller.get_permissions(&b).len(), 1);

    controller.clear_permissions().unwrap();
    assert!(controller.store().domains().is_empty());
}

#[tokio::test]
async fn failed_persistence_rejects_caller_and_keeps_state() {
    crate::init_tracing();
    let backend = Arc::new(MemoryStateStore::new());
    let controller = PermissionsController::with_state_store(
        PermissionsConfig::test().with_restricted_method(TEST_METHOD, "Test method"),
        Arc::new(TestProvider::default()),
        wallet_permissions::ApprovalNotifications::new(),
        backend.clone() as Arc<dyn StateStore>,
    )
    .unwrap();
    let origin = Origin::new(ORIGIN_A);
    let (id, receiver) = controller
        .pending_approvals()
        .create(origin.clone(), RequestedPermissions::single(TEST_METHOD), None)
        .unwrap();

    backend.set_read_only(true);
    let err = controller
        .approve_permissions_request(
            ApprovedRequest::new(id, RequestedPermissions::single(TEST_METHOD)),
            vec![],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PermissionsError::Store(_)));
    assert!(matches!(receiver.await.unwrap(), Err(PermissionsError::Store(_))));
    assert!(controller.get_permissions(&origin).is_empty());
    assert!(controller.pending_approvals().is_empty());
    assert_eq!(backend.writes(), 0);
}

#[tokio::test]
async fn pending_request_carries_domain_metadata() {
    let TestSetup { controller, notifications, .. } = setup();
    let mut requests = notifications.subscribe();
    let origin = Origin::new(ORIGIN_A);
    controller
        .record_domain_metadata(
            &origin,
            Some(wallet_permissions::types::DomainMetadataParams { name: Some("A".to_string()) }),
            None,
        )
        .unwrap();

    let pending = {
        let controller = controller.clone();
        let origin = origin.clone();
        tokio::spawn(async move {
            controller.request_permissions(&origin, RequestedPermissions::single(TEST_METHOD)).await
        })
    };
    let request = next_request(&mut requests).await;
    assert_eq!(request.metadata.map(|m| m.name), Some("A".to_string()));
    controller.reject_permissions_request(request.id, None).unwrap();
    assert!(pending.await.unwrap().is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn origin_stays_pending_while_approval_is_validated() {
    let (controller, provider) = gated_controller();
    let origin = Origin::new(ORIGIN_A);
    let (id, receiver) = controller
        .pending_approvals()
        .create(origin.clone(), RequestedPermissions::single(ETH_ACCOUNTS), None)
        .unwrap();

    let approval = {
        let controller = controller.clone();
        tokio::spawn(async move {
            controller
                .approve_permissions_request(
                    ApprovedRequest::new(id, RequestedPermissions::single(ETH_ACCOUNTS)),
                    vec![ACCOUNTS[0]],
                )
                .await
        })
    };
    provider.entered.notified().await;

    let err = controller
        .pending_approvals()
        .create(origin.clone(), RequestedPermissions::single(TEST_METHOD), None)
        .unwrap_err();
    assert!(matches!(err, PermissionsError::RequestAlreadyPending(_)));
    assert_eq!(controller.pending_approvals().id_for_origin(&origin), Some(id));

    provider.release.notify_one();
    let granted = approval.await.unwrap().unwrap();
    assert_eq!(granted.len(), 1);
    assert_eq!(receiver.await.unwrap().unwrap(), granted);
    assert_eq!(controller.get_accounts(&origin), vec![ACCOUNTS[0]]);

    assert!(controller.pending_approvals().is_empty());
    controller
        .pending_approvals()
        .create(origin, RequestedPermissions::single(TEST_METHOD), None)
        .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn rejection_during_validation_wins() {
    let (controller, provider) = gated_controller();
    let origin = Origin::new(ORIGIN_A);
    let (id, receiver) = controller
        .pending_approvals()
        .create(origin.clone(), RequestedPermissions::single(ETH_ACCOUNTS), None)
        .unwrap();

    let approval = {
        let controller = controller.clone();
        tokio::spawn(async move {
            controller
                .approve_permissions_request(
                    ApprovedRequest::new(id, RequestedPermissions::single(ETH_ACCOUNTS)),
                    vec![ACCOUNTS[0]],
                )
                .await
        })
    };
    provider.entered.notified().await;

    controller.reject_permissions_request(id, None).unwrap();
    assert!(matches!(receiver.await.unwrap(), Err(PermissionsError::UserRejected(_))));

    provider.release.notify_one();
    let err = approval.await.unwrap().unwrap_err();
    assert!(matches!(err, PermissionsError::NoSuchPendingApproval(missing) if missing == id));
    assert!(controller.get_permissions(&origin).is_empty());
}
