use crate::utils::*;
use wallet_permissions::{
    Caveat, DomainMetadata, JsonFileStore, Origin, Permission, PermissionStore,
    store::{PermissionsState, StateStore},
};

#[test]
fn missing_file_loads_as_empty_state() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("permissions.json"));
    assert!(store.load().unwrap().is_none());
}

#[test]
fn json_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("permissions.json");
    let origin = Origin::new(ORIGIN_A);

    let store = PermissionStore::open(std::sync::Arc::new(JsonFileStore::new(&path))).unwrap();
    store
        .grant(
            &origin,
            vec![Permission::new(origin.clone(), "eth_accounts", vec![Caveat::EthAccounts(vec![ACCOUNTS[0]])])],
        )
        .unwrap();
    store
        .set_metadata(&origin, DomainMetadata { name: "A".to_string(), extension_id: None })
        .unwrap();

    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["domains"][ORIGIN_A]["permissions"][0]["parentCapability"], "eth_accounts");
    assert_eq!(raw["domainMetadata"][ORIGIN_A]["name"], "A");

    let reopened = PermissionStore::open(std::sync::Arc::new(JsonFileStore::new(&path))).unwrap();
    assert_eq!(reopened.snapshot(), store.snapshot());
    assert!(!path.with_file_name("permissions.json.tmp").exists());
}

#[tokio::test]
async fn controller_restores_grants_from_state_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("permissions.json");
    let origin = Origin::new(ORIGIN_A);

    let config = wallet_permissions::PermissionsConfig::test().with_state_path(&path);
    let TestSetup { controller, .. } = setup_with(config.clone());
    controller
        .store()
        .grant(
            &origin,
            vec![Permission::new(origin.clone(), "eth_accounts", vec![Caveat::EthAccounts(vec![ACCOUNTS[1]])])],
        )
        .unwrap();
    drop(controller);

    let TestSetup { controller, .. } = setup_with(config);
    assert_eq!(controller.get_accounts(&origin), vec![ACCOUNTS[1]]);
}

#[test]
fn corrupt_state_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("permissions.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(PermissionStore::open(std::sync::Arc::new(JsonFileStore::new(&path))).is_err());

    std::fs::write(&path, serde_json::to_string(&PermissionsState::default()).unwrap()).unwrap();
    assert!(PermissionStore::open(std::sync::Arc::new(JsonFileStore::new(&path))).is_ok());
}
