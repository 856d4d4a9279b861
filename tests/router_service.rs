mod common;

use std::sync::Arc;

use common::{ScriptedDevice, target};
use rosbridge::config::ManagerConfig;
use rosbridge::error::ConnectError;
use rosbridge::router::{
    AddressListKey, AddressListUpdate, FirewallRuleKey, FirewallRuleUpdate, LinkStatus,
    NewAddressListEntry, NewFirewallRule, RouterService,
};
use rosbridge::session::SessionPool;

const ADDRESS_LIST: &str = include_str!("fixtures/address_list_print.txt");
const FIREWALL_FILTER: &str = include_str!("fixtures/firewall_filter_print.txt");
const IDENTITY: &str = include_str!("fixtures/identity_print.txt");
const RESOURCE: &str = include_str!("fixtures/resource_print.txt");
const PACKAGE: &str = include_str!("fixtures/package_print.txt");

fn service(device: &ScriptedDevice) -> RouterService<ScriptedDevice> {
    RouterService::new(Arc::new(SessionPool::new(
        device.clone(),
        ManagerConfig::default(),
    )))
}

#[tokio::test]
async fn test_connection_online() {
    let device = ScriptedDevice::new();
    device.reply("/system/identity/print", IDENTITY);

    let status = service(&device).test_connection(&target()).await;

    assert!(status.success);
    assert_eq!(status.status, LinkStatus::Online);
    assert_eq!(status.identity.as_deref(), Some("edge-gw-01"));
    assert!(status.latency.is_some());
}

#[tokio::test]
async fn test_connection_offline_never_errors() {
    let device = ScriptedDevice::new();
    device.go_offline();

    let status = service(&device).test_connection(&target()).await;
    let json = serde_json::to_value(&status).expect("serialize status");

    assert_eq!(json["success"], false);
    assert_eq!(json["status"], "offline");
    assert!(json["latency"].is_null());
    assert!(!status.message.contains("s3cret"));
}

#[tokio::test]
async fn router_info_flattens_identity_resource_and_package() {
    let device = ScriptedDevice::new();
    device
        .reply("/system/identity/print", IDENTITY)
        .reply("/system/resource/print", RESOURCE)
        .reply("/system/package/print where name=routeros", PACKAGE);

    let info = service(&device)
        .router_info(&target())
        .await
        .expect("router info");

    assert_eq!(info.identity, "edge-gw-01");
    assert_eq!(info.model, "hAP ac^2");
    assert_eq!(info.version, "7.15.2");
    assert_eq!(info.uptime, "3w2d4h11m");
    assert_eq!(info.cpu, "ARMv7");
    assert_eq!(info.architecture, "arm");
    assert_eq!(info.memory.total, 268_435_456);
    assert_eq!(info.memory.free, 211_183_206);
}

#[tokio::test]
async fn router_info_defaults_missing_fields() {
    let device = ScriptedDevice::new();

    let info = service(&device)
        .router_info(&target())
        .await
        .expect("router info");

    assert_eq!(info.identity, "Unknown");
    assert_eq!(info.model, "Unknown");
    assert_eq!(info.version, "Unknown");
    assert_eq!(info.memory.total, 0);
    assert_eq!(info.memory.free, 0);
}

#[tokio::test]
async fn router_info_falls_back_to_resource_version() {
    let device = ScriptedDevice::new();
    device.reply("/system/resource/print", RESOURCE);

    let info = service(&device)
        .router_info(&target())
        .await
        .expect("router info");

    assert_eq!(info.version, "7.14.3");
}

#[tokio::test]
async fn address_lists_are_typed() {
    let device = ScriptedDevice::new();
    device.reply("/ip/firewall/address-list/print", ADDRESS_LIST);

    let entries = service(&device)
        .address_lists(&target())
        .await
        .expect("address lists");

    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].id.as_deref(), Some("*1"));
    assert_eq!(entries[0].comment, "ssh brute force");
    assert!(!entries[0].disabled);
    assert!(entries[1].disabled);
    assert_eq!(entries[2].timeout, "1d");
    assert_eq!(entries[2].list, "trusted");
}

#[tokio::test]
async fn firewall_rules_are_typed() {
    let device = ScriptedDevice::new();
    device.reply("/ip/firewall/filter/print", FIREWALL_FILTER);

    let rules = service(&device)
        .firewall_rules(&target())
        .await
        .expect("firewall rules");

    assert_eq!(rules.len(), 3);
    assert_eq!(rules[1].src_address, "203.0.113.0/24");
    assert_eq!(rules[1].dst_port, "22");
    assert_eq!(rules[1].comment, "block ssh scanners");
    assert_eq!(rules[0].src_address, "");
    assert!(rules[2].disabled);
}

#[tokio::test]
async fn create_address_list_sends_one_sanitized_command() {
    let device = ScriptedDevice::new();
    let entry = NewAddressListEntry {
        list: "blocked".to_string(),
        address: "203.0.113.9".to_string(),
        comment: Some("seen $(whoami) twice".to_string()),
        timeout: None,
    };

    let result = service(&device)
        .create_address_list(&target(), &entry)
        .await
        .expect("create");

    assert!(result.success);
    assert_eq!(
        device.commands(),
        vec![
            r#"/ip/firewall/address-list/add list=blocked address=203.0.113.9 comment="seen whoami twice""#
        ]
    );
}

#[tokio::test]
async fn update_address_list_clears_explicitly_empty_fields() {
    let device = ScriptedDevice::new();
    let update = AddressListUpdate {
        id: "*3".to_string(),
        comment: Some(String::new()),
        timeout: Some("2d".to_string()),
        ..Default::default()
    };

    service(&device)
        .update_address_list(&target(), &update)
        .await
        .expect("update");

    assert_eq!(
        device.commands(),
        vec![r#"/ip/firewall/address-list/set *3 comment="" timeout=2d"#]
    );
}

#[tokio::test]
async fn delete_address_list_finds_then_removes_by_id() {
    let device = ScriptedDevice::new();
    device.reply(
        r#"/ip/firewall/address-list/print where list="blocked" and address="203.0.113.7""#,
        " 0   .id=*1 list=blocked address=203.0.113.7",
    );
    let key = AddressListKey {
        list: "blocked".to_string(),
        address: "203.0.113.7".to_string(),
    };

    let result = service(&device)
        .delete_address_list(&target(), &key)
        .await
        .expect("delete");

    assert!(result.success);
    assert_eq!(
        device.commands().last().map(String::as_str),
        Some("/ip/firewall/address-list/remove *1")
    );
}

#[tokio::test]
async fn delete_missing_address_list_is_not_found_without_removal() {
    let device = ScriptedDevice::new();
    let key = AddressListKey {
        list: "blocked".to_string(),
        address: "192.0.2.1".to_string(),
    };

    let err = service(&device)
        .delete_address_list(&target(), &key)
        .await
        .expect_err("missing entry");

    assert!(matches!(err, ConnectError::NotFound(_)));
    assert_eq!(err.classify().status, 404);
    assert_eq!(device.commands().len(), 1);
    assert!(device.commands().iter().all(|c| !c.contains("/remove")));
}

#[tokio::test]
async fn create_firewall_rule_renders_disabled_flag() {
    let device = ScriptedDevice::new();
    let rule = NewFirewallRule {
        chain: "input".to_string(),
        action: "drop".to_string(),
        src_address: Some("203.0.113.0/24".to_string()),
        protocol: Some("tcp".to_string()),
        dst_port: Some("22".to_string()),
        disabled: true,
        ..Default::default()
    };

    service(&device)
        .create_firewall_rule(&target(), &rule)
        .await
        .expect("create");

    assert_eq!(
        device.commands(),
        vec![
            "/ip/firewall/filter/add chain=input action=drop src-address=203.0.113.0/24 dst-port=22 protocol=tcp disabled=yes"
        ]
    );
}

#[tokio::test]
async fn update_firewall_rule_renders_yes_no() {
    let device = ScriptedDevice::new();
    let update = FirewallRuleUpdate {
        id: "*B".to_string(),
        comment: Some("temporarily off".to_string()),
        disabled: Some(false),
        ..Default::default()
    };

    service(&device)
        .update_firewall_rule(&target(), &update)
        .await
        .expect("update");

    assert_eq!(
        device.commands(),
        vec![r#"/ip/firewall/filter/set *B comment="temporarily off" disabled=no"#]
    );
}

#[tokio::test]
async fn delete_firewall_rule_checks_existence_first() {
    let device = ScriptedDevice::new();
    device.reply(
        "/ip/firewall/filter/print where .id=*B",
        " 1    .id=*B chain=input action=drop",
    );
    let svc = service(&device);

    svc.delete_firewall_rule(&target(), &FirewallRuleKey { id: "*B".to_string() })
        .await
        .expect("delete");
    let err = svc
        .delete_firewall_rule(&target(), &FirewallRuleKey { id: "*Z".to_string() })
        .await
        .expect_err("missing rule");

    assert!(matches!(err, ConnectError::NotFound(_)));
    assert_eq!(
        device.commands(),
        vec![
            "/ip/firewall/filter/print where .id=*B",
            "/ip/firewall/filter/remove *B",
            "/ip/firewall/filter/print where .id=*Z",
        ]
    );
}

#[tokio::test]
async fn release_all_empties_pool() {
    let device = ScriptedDevice::new();
    let config = ManagerConfig {
        release_after_request: false,
        ..ManagerConfig::default()
    };
    let pool = Arc::new(SessionPool::new(device.clone(), config));
    let svc = RouterService::new(pool.clone());

    svc.address_lists(&target()).await.expect("list");
    svc.firewall_rules(&target()).await.expect("rules");
    assert_eq!(device.connects(), 1);
    assert!(pool.contains(&target()));

    pool.release_all().await;

    assert!(pool.is_empty().await);
}
