//! Read-only NetBox access.
//!
//! [`InventorySource`] is the seam the MCP tools are written against;
//! [`NetboxClient`] implements it over the NetBox REST API. Every list call
//! follows NetBox pagination (`count` / `next` / `results`) to the end.

use std::time::Duration;

use async_trait::async_trait;
use netops_core::config::NetboxConfig;
use netops_core::domain::inventory::{InventoryDevice, IpAddress, NetworkSegment, Site, Vlan};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::{InventoryError, InventoryResult};

#[async_trait]
pub trait InventorySource: Send + Sync {
    async fn list_sites(&self) -> InventoryResult<Vec<Site>>;
    async fn list_devices(&self) -> InventoryResult<Vec<InventoryDevice>>;
    async fn get_device(&self, name: &str) -> InventoryResult<Option<InventoryDevice>>;
    async fn list_ip_addresses(&self) -> InventoryResult<Vec<IpAddress>>;
    async fn get_ip_address(&self, address: &str) -> InventoryResult<Option<IpAddress>>;
    /// Prefixes with `ip_count` left at zero.
    async fn list_prefixes(&self) -> InventoryResult<Vec<NetworkSegment>>;
    async fn get_prefix(&self, prefix: &str) -> InventoryResult<Option<NetworkSegment>>;
    async fn list_vlans(&self) -> InventoryResult<Vec<Vlan>>;
    /// Number of IP addresses recorded inside `prefix`.
    async fn count_addresses_in(&self, prefix: &str) -> InventoryResult<u64>;
}

#[derive(Clone, Debug)]
pub struct NetboxClient {
    base_url: String,
    page_size: u32,
    client: Client,
}

impl NetboxClient {
    pub fn new(config: &NetboxConfig) -> InventoryResult<Self> {
        let token = config.require_token()?;
        let mut headers = HeaderMap::new();
        let authorization = HeaderValue::from_str(&format!("Token {token}"))
            .map_err(|error| InventoryError::Decode(format!("invalid NetBox token: {error}")))?;
        headers.insert(AUTHORIZATION, authorization);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            page_size: config.page_size,
            client,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> InventoryResult<T> {
        let response = self.client.get(url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InventoryError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }
        response.json().await.map_err(|error| InventoryError::Decode(error.to_string()))
    }

    async fn list<T: DeserializeOwned>(
        &self,
        path: &str,
        filters: &[(&str, String)],
    ) -> InventoryResult<Vec<T>> {
        let mut query: Vec<(&str, String)> = filters.to_vec();
        query.push(("limit", self.page_size.to_string()));

        let mut page: Page<T> = self.get_json(&format!("{}{path}", self.base_url), &query).await?;
        let mut results = std::mem::take(&mut page.results);
        let mut pages = 1usize;

        while let Some(next) = page.next.take() {
            page = self.get_json(&next, &[]).await?;
            results.append(&mut page.results);
            pages += 1;
        }

        tracing::debug!(
            event_name = "mcp.netbox.list.fetched",
            path,
            pages,
            count = results.len(),
            reported = page.count,
            "NetBox list fetched"
        );
        Ok(results)
    }

    async fn first<T: DeserializeOwned>(
        &self,
        path: &str,
        filters: &[(&str, String)],
    ) -> InventoryResult<Option<T>> {
        let mut query: Vec<(&str, String)> = filters.to_vec();
        query.push(("limit", "1".to_string()));
        let page: Page<T> = self.get_json(&format!("{}{path}", self.base_url), &query).await?;
        Ok(page.results.into_iter().next())
    }
}

#[async_trait]
impl InventorySource for NetboxClient {
    async fn list_sites(&self) -> InventoryResult<Vec<Site>> {
        let sites: Vec<RawSite> = self.list("/api/dcim/sites/", &[]).await?;
        Ok(sites.into_iter().map(Site::from).collect())
    }

    async fn list_devices(&self) -> InventoryResult<Vec<InventoryDevice>> {
        let devices: Vec<RawDevice> = self.list("/api/dcim/devices/", &[]).await?;
        Ok(devices.into_iter().map(InventoryDevice::from).collect())
    }

    async fn get_device(&self, name: &str) -> InventoryResult<Option<InventoryDevice>> {
        let device: Option<RawDevice> =
            self.first("/api/dcim/devices/", &[("name", name.to_string())]).await?;
        Ok(device.map(InventoryDevice::from))
    }

    async fn list_ip_addresses(&self) -> InventoryResult<Vec<IpAddress>> {
        let addresses: Vec<RawIpAddress> = self.list("/api/ipam/ip-addresses/", &[]).await?;
        Ok(addresses.into_iter().map(IpAddress::from).collect())
    }

    async fn get_ip_address(&self, address: &str) -> InventoryResult<Option<IpAddress>> {
        let found: Option<RawIpAddress> =
            self.first("/api/ipam/ip-addresses/", &[("address", address.to_string())]).await?;
        Ok(found.map(IpAddress::from))
    }

    async fn list_prefixes(&self) -> InventoryResult<Vec<NetworkSegment>> {
        let prefixes: Vec<RawPrefix> = self.list("/api/ipam/prefixes/", &[]).await?;
        Ok(prefixes.into_iter().map(NetworkSegment::from).collect())
    }

    async fn get_prefix(&self, prefix: &str) -> InventoryResult<Option<NetworkSegment>> {
        let found: Option<RawPrefix> =
            self.first("/api/ipam/prefixes/", &[("prefix", prefix.to_string())]).await?;
        Ok(found.map(NetworkSegment::from))
    }

    async fn list_vlans(&self) -> InventoryResult<Vec<Vlan>> {
        let vlans: Vec<RawVlan> = self.list("/api/ipam/vlans/", &[]).await?;
        Ok(vlans.into_iter().map(Vlan::from).collect())
    }

    async fn count_addresses_in(&self, prefix: &str) -> InventoryResult<u64> {
        let page: Page<serde_json::Value> = self
            .get_json(
                &format!("{}/api/ipam/ip-addresses/", self.base_url),
                &[("parent", prefix.to_string()), ("limit", "1".to_string())],
            )
            .await?;
        Ok(page.count)
    }
}

// NetBox API types

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default)]
    count: u64,
    #[serde(default)]
    next: Option<String>,
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

/// A nested object reference. NetBox names most objects with `name`, device
/// types with `model`, and always provides `display`.
#[derive(Debug, Default, Deserialize)]
struct NestedRef {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    display: Option<String>,
}

impl NestedRef {
    fn label(self) -> String {
        self.name.or(self.model).or(self.display).unwrap_or_default()
    }
}

fn label(reference: Option<NestedRef>) -> String {
    reference.map(NestedRef::label).unwrap_or_default()
}

/// Choice fields arrive as `{"value": "active", "label": "Active"}`.
#[derive(Debug, Default, Deserialize)]
struct Choice {
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    label: Option<String>,
}

fn choice(choice: Option<Choice>) -> String {
    choice.and_then(|choice| choice.value.or(choice.label)).unwrap_or_else(|| "unknown".to_string())
}

#[derive(Debug, Deserialize)]
struct RawSite {
    #[serde(default)]
    name: String,
    #[serde(default)]
    slug: String,
    #[serde(default)]
    status: Option<Choice>,
}

impl From<RawSite> for Site {
    fn from(raw: RawSite) -> Self {
        Site { name: raw.name, slug: raw.slug, status: choice(raw.status) }
    }
}

#[derive(Debug, Deserialize)]
struct RawDevice {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    device_type: Option<NestedRef>,
    #[serde(default)]
    role: Option<NestedRef>,
    /// Pre-4.0 field name.
    #[serde(default)]
    device_role: Option<NestedRef>,
    #[serde(default)]
    site: Option<NestedRef>,
    #[serde(default)]
    status: Option<Choice>,
}

impl From<RawDevice> for InventoryDevice {
    fn from(raw: RawDevice) -> Self {
        InventoryDevice::new(
            raw.name.unwrap_or_default(),
            label(raw.device_type),
            label(raw.role.or(raw.device_role)),
            label(raw.site),
            choice(raw.status),
        )
    }
}

#[derive(Debug, Deserialize)]
struct RawIpAddress {
    #[serde(default)]
    address: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    status: Option<Choice>,
    #[serde(default)]
    dns_name: String,
    #[serde(default)]
    assigned_object: Option<AssignedObject>,
}

#[derive(Debug, Deserialize)]
struct AssignedObject {
    #[serde(default)]
    device: Option<NestedRef>,
    #[serde(default)]
    virtual_machine: Option<NestedRef>,
}

impl From<RawIpAddress> for IpAddress {
    fn from(raw: RawIpAddress) -> Self {
        let assigned_device = raw
            .assigned_object
            .and_then(|object| object.device.or(object.virtual_machine))
            .map(NestedRef::label)
            .filter(|name| !name.is_empty());
        IpAddress {
            address: raw.address,
            description: raw.description,
            status: choice(raw.status),
            dns_name: raw.dns_name,
            assigned_device,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawPrefix {
    #[serde(default)]
    prefix: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    status: Option<Choice>,
    #[serde(default)]
    site: Option<NestedRef>,
    /// NetBox 4.2 replaced `site` with a generic scope.
    #[serde(default)]
    scope: Option<NestedRef>,
}

impl From<RawPrefix> for NetworkSegment {
    fn from(raw: RawPrefix) -> Self {
        NetworkSegment {
            prefix: raw.prefix,
            description: raw.description,
            status: choice(raw.status),
            site: label(raw.site.or(raw.scope)),
            ip_count: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawVlan {
    #[serde(default)]
    vid: u16,
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: Option<Choice>,
    #[serde(default)]
    site: Option<NestedRef>,
}

impl From<RawVlan> for Vlan {
    fn from(raw: RawVlan) -> Self {
        Vlan { vid: raw.vid, name: raw.name, status: choice(raw.status), site: label(raw.site) }
    }
}
