//! RouterOS operations used by the dashboard.
//!
//! [`RouterService`] composes the session pool, the command builder and the
//! output parser into one round trip per logical operation, and shapes the
//! parsed records into the typed entries the dashboard displays.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::command::{CommandBuilder, paths, where_clause, where_id};
use crate::error::ConnectError;
use crate::parser::{Record, parse};
use crate::session::{Connector, SessionHandle, SessionPool, Target};

const UNKNOWN: &str = "Unknown";

/// Reachability reported by [`RouterService::test_connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Online,
    Offline,
}

/// Outcome of a connection test. Always produced, never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ConnectionStatus {
    pub success: bool,
    pub status: LinkStatus,
    pub message: String,
    /// Round trip in milliseconds, `None` when the test failed.
    pub latency: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
}

/// Memory totals in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MemoryInfo {
    pub total: u64,
    pub free: u64,
}

/// Identity and resource facts of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RouterInfo {
    pub identity: String,
    pub model: String,
    pub version: String,
    pub uptime: String,
    pub cpu: String,
    pub memory: MemoryInfo,
    pub architecture: String,
}

/// One `/ip/firewall/address-list` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddressListEntry {
    pub id: Option<String>,
    pub list: String,
    pub address: String,
    pub comment: String,
    pub timeout: String,
    pub disabled: bool,
}

/// Fields for a new address-list entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewAddressListEntry {
    pub list: String,
    pub address: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub timeout: Option<String>,
}

/// Changes to an existing address-list entry. `None` leaves a field alone,
/// an empty string clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddressListUpdate {
    pub id: String,
    #[serde(default)]
    pub list: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub timeout: Option<String>,
}

/// Natural key of an address-list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AddressListKey {
    pub list: String,
    pub address: String,
}

/// One `/ip/firewall/filter` rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FirewallRule {
    pub id: Option<String>,
    pub chain: String,
    pub action: String,
    pub src_address: String,
    pub dst_port: String,
    pub protocol: String,
    pub comment: String,
    pub disabled: bool,
}

/// Fields for a new filter rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewFirewallRule {
    pub chain: String,
    pub action: String,
    #[serde(default)]
    pub src_address: Option<String>,
    #[serde(default)]
    pub dst_port: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

/// Changes to an existing filter rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FirewallRuleUpdate {
    pub id: String,
    #[serde(default)]
    pub chain: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub src_address: Option<String>,
    #[serde(default)]
    pub dst_port: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub disabled: Option<bool>,
}

/// A filter rule is addressed by its device identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FirewallRuleKey {
    pub id: String,
}

/// Success envelope for mutating operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct OperationResult {
    pub success: bool,
    pub message: String,
}

impl OperationResult {
    fn ok(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
        }
    }
}

impl From<&Record> for AddressListEntry {
    fn from(record: &Record) -> Self {
        Self {
            id: record.text(".id").map(str::to_string),
            list: record.text_or("list", "").to_string(),
            address: record.text_or("address", "").to_string(),
            comment: record.text_or("comment", "").to_string(),
            timeout: record.text_or("timeout", "").to_string(),
            disabled: record.is_set("disabled"),
        }
    }
}

impl From<&Record> for FirewallRule {
    fn from(record: &Record) -> Self {
        Self {
            id: record.text(".id").map(str::to_string),
            chain: record.text_or("chain", "").to_string(),
            action: record.text_or("action", "").to_string(),
            src_address: record.text_or("src-address", "").to_string(),
            dst_port: record.text_or("dst-port", "").to_string(),
            protocol: record.text_or("protocol", "").to_string(),
            comment: record.text_or("comment", "").to_string(),
            disabled: record.is_set("disabled"),
        }
    }
}

/// Converts RouterOS sizes such as `256.0MiB` or `262144000` to bytes.
pub fn parse_size(value: &str) -> Option<u64> {
    let value = value.trim();
    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);
    let number: f64 = number.parse().ok()?;
    let factor: u64 = match unit.trim() {
        "" | "B" => 1,
        "KiB" | "KB" | "K" => 1 << 10,
        "MiB" | "MB" | "M" => 1 << 20,
        "GiB" | "GB" | "G" => 1 << 30,
        "TiB" | "TB" | "T" => 1 << 40,
        _ => return None,
    };
    Some((number * factor as f64).round() as u64)
}

fn first_text(record: Option<&Record>, key: &str) -> Option<String> {
    record.and_then(|r| r.text(key)).map(str::to_string)
}

/// Dispatcher for RouterOS operations.
pub struct RouterService<C: Connector> {
    pool: Arc<SessionPool<C>>,
}

impl<C: Connector> Clone for RouterService<C> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

impl<C: Connector> RouterService<C> {
    pub fn new(pool: Arc<SessionPool<C>>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<SessionPool<C>> {
        &self.pool
    }

    async fn open(&self, target: &Target) -> Result<SessionHandle<C::Session>, ConnectError> {
        target.validate()?;
        self.pool.acquire(target).await
    }

    async fn finish(&self, handle: &SessionHandle<C::Session>) {
        if self.pool.config().release_after_request {
            self.pool.release(handle).await;
        }
    }

    async fn query(
        &self,
        handle: &SessionHandle<C::Session>,
        command: &str,
    ) -> Result<Vec<Record>, ConnectError> {
        let output = self.pool.execute(handle, command).await?;
        Ok(parse(&output))
    }

    /// Connects, reads the identity and reports the round-trip latency.
    /// Failures are reported in the result, never returned as errors.
    pub async fn test_connection(&self, target: &Target) -> ConnectionStatus {
        info!("Testing connection to {}", target.key());
        let started = Instant::now();

        let result: Result<Vec<Record>, ConnectError> = async {
            let handle = self.open(target).await?;
            let records = self.query(&handle, paths::IDENTITY_PRINT).await;
            self.finish(&handle).await;
            records
        }
        .await;

        match result {
            Ok(records) => ConnectionStatus {
                success: true,
                status: LinkStatus::Online,
                message: "Connection successful".to_string(),
                latency: Some(started.elapsed().as_millis() as u64),
                identity: Some(
                    first_text(records.first(), "name").unwrap_or_else(|| UNKNOWN.to_string()),
                ),
            },
            Err(err) => {
                warn!("Connection test to {} failed: {}", target.key(), err);
                ConnectionStatus {
                    success: false,
                    status: LinkStatus::Offline,
                    message: err.to_string(),
                    latency: None,
                    identity: None,
                }
            }
        }
    }

    /// Collects identity, board, version and resource facts.
    pub async fn router_info(&self, target: &Target) -> Result<RouterInfo, ConnectError> {
        info!("Getting router info for {}", target.key());
        let handle = self.open(target).await?;
        let result = self.collect_info(&handle).await;
        self.finish(&handle).await;
        result
    }

    async fn collect_info(
        &self,
        handle: &SessionHandle<C::Session>,
    ) -> Result<RouterInfo, ConnectError> {
        let identity = self.query(handle, paths::IDENTITY_PRINT).await?;
        let resource = self.query(handle, paths::RESOURCE_PRINT).await?;
        let package = self.query(handle, paths::ROUTEROS_PACKAGE_PRINT).await?;
        let resource = resource.first();

        let text = |key: &str| first_text(resource, key).unwrap_or_else(|| UNKNOWN.to_string());
        let size = |key: &str| {
            resource
                .and_then(|r| r.text(key))
                .and_then(parse_size)
                .unwrap_or(0)
        };

        Ok(RouterInfo {
            identity: first_text(identity.first(), "name")
                .unwrap_or_else(|| UNKNOWN.to_string()),
            model: text("board-name"),
            version: first_text(package.first(), "version")
                .or_else(|| first_text(resource, "version"))
                .unwrap_or_else(|| UNKNOWN.to_string()),
            uptime: text("uptime"),
            cpu: text("cpu"),
            memory: MemoryInfo {
                total: size("total-memory"),
                free: size("free-memory"),
            },
            architecture: text("architecture-name"),
        })
    }

    async fn list<T>(&self, target: &Target, menu: &str) -> Result<Vec<T>, ConnectError>
    where
        T: for<'a> From<&'a Record>,
    {
        let handle = self.open(target).await?;
        let result = self.query(&handle, &format!("{menu}/print")).await;
        self.finish(&handle).await;
        Ok(result?.iter().map(T::from).collect())
    }

    async fn run(
        &self,
        target: &Target,
        command: &CommandBuilder,
        message: &str,
    ) -> Result<OperationResult, ConnectError> {
        let handle = self.open(target).await?;
        let result = self.pool.execute(&handle, &command.build()).await;
        self.finish(&handle).await;
        result.map(|_| OperationResult::ok(message))
    }

    /// Looks the entry up by its natural key and removes it. Nothing is
    /// removed when the lookup finds no entry.
    async fn remove_matching(
        &self,
        target: &Target,
        menu: &str,
        filter: &str,
        what: &str,
    ) -> Result<OperationResult, ConnectError> {
        let handle = self.open(target).await?;
        let result = self.find_and_remove(&handle, menu, filter, what).await;
        self.finish(&handle).await;
        result
    }

    async fn find_and_remove(
        &self,
        handle: &SessionHandle<C::Session>,
        menu: &str,
        filter: &str,
        what: &str,
    ) -> Result<OperationResult, ConnectError> {
        let found = self
            .query(handle, &format!("{menu}/print {filter}"))
            .await?;
        let Some(entry) = found.first() else {
            debug!("{} matching {} not found", what, filter);
            return Err(ConnectError::NotFound(what.to_string()));
        };

        let remove = match entry.text(".id") {
            Some(id) => CommandBuilder::new(format!("{menu}/remove")).item(id).build(),
            None => format!("{menu}/remove [find {filter}]"),
        };
        self.pool.execute(handle, &remove).await?;
        Ok(OperationResult::ok(&format!("{what} deleted successfully")))
    }

    pub async fn address_lists(
        &self,
        target: &Target,
    ) -> Result<Vec<AddressListEntry>, ConnectError> {
        info!("Getting address lists for {}", target.key());
        self.list(target, paths::ADDRESS_LIST).await
    }

    pub async fn create_address_list(
        &self,
        target: &Target,
        entry: &NewAddressListEntry,
    ) -> Result<OperationResult, ConnectError> {
        info!("Creating address list entry for {}", target.key());
        let command = CommandBuilder::new(format!("{}/add", paths::ADDRESS_LIST))
            .arg("list", &entry.list)
            .arg("address", &entry.address)
            .opt("comment", entry.comment.as_deref())
            .opt("timeout", entry.timeout.as_deref());
        self.run(target, &command, "Address list entry created successfully")
            .await
    }

    pub async fn update_address_list(
        &self,
        target: &Target,
        update: &AddressListUpdate,
    ) -> Result<OperationResult, ConnectError> {
        info!("Updating address list entry {} for {}", update.id, target.key());
        let command = CommandBuilder::new(format!("{}/set", paths::ADDRESS_LIST))
            .item(&update.id)
            .opt("list", update.list.as_deref())
            .opt("address", update.address.as_deref())
            .assign("comment", update.comment.as_deref())
            .assign("timeout", update.timeout.as_deref());
        self.run(target, &command, "Address list entry updated successfully")
            .await
    }

    pub async fn delete_address_list(
        &self,
        target: &Target,
        key: &AddressListKey,
    ) -> Result<OperationResult, ConnectError> {
        info!("Deleting address list entry for {}", target.key());
        self.remove_matching(
            target,
            paths::ADDRESS_LIST,
            &where_clause(&[("list", key.list.as_str()), ("address", key.address.as_str())]),
            "Address list entry",
        )
        .await
    }

    pub async fn firewall_rules(
        &self,
        target: &Target,
    ) -> Result<Vec<FirewallRule>, ConnectError> {
        info!("Getting firewall rules for {}", target.key());
        self.list(target, paths::FIREWALL_FILTER).await
    }

    pub async fn create_firewall_rule(
        &self,
        target: &Target,
        rule: &NewFirewallRule,
    ) -> Result<OperationResult, ConnectError> {
        info!("Creating firewall rule for {}", target.key());
        let command = CommandBuilder::new(format!("{}/add", paths::FIREWALL_FILTER))
            .arg("chain", &rule.chain)
            .arg("action", &rule.action)
            .opt("src-address", rule.src_address.as_deref())
            .opt("dst-port", rule.dst_port.as_deref())
            .opt("protocol", rule.protocol.as_deref())
            .opt("comment", rule.comment.as_deref())
            .opt("disabled", rule.disabled.then_some(true));
        self.run(target, &command, "Firewall rule created successfully")
            .await
    }

    pub async fn update_firewall_rule(
        &self,
        target: &Target,
        update: &FirewallRuleUpdate,
    ) -> Result<OperationResult, ConnectError> {
        info!("Updating firewall rule {} for {}", update.id, target.key());
        let command = CommandBuilder::new(format!("{}/set", paths::FIREWALL_FILTER))
            .item(&update.id)
            .opt("chain", update.chain.as_deref())
            .opt("action", update.action.as_deref())
            .assign("src-address", update.src_address.as_deref())
            .assign("dst-port", update.dst_port.as_deref())
            .assign("protocol", update.protocol.as_deref())
            .assign("comment", update.comment.as_deref())
            .opt("disabled", update.disabled);
        self.run(target, &command, "Firewall rule updated successfully")
            .await
    }

    pub async fn delete_firewall_rule(
        &self,
        target: &Target,
        key: &FirewallRuleKey,
    ) -> Result<OperationResult, ConnectError> {
        info!("Deleting firewall rule {} for {}", key.id, target.key());
        self.remove_matching(
            target,
            paths::FIREWALL_FILTER,
            &where_id(&key.id),
            "Firewall rule",
        )
        .await
    }
}
