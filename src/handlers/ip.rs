//! `ip <address>`.

use async_trait::async_trait;
use serde::Deserialize;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::warn;

use super::Handler;
use crate::error::ProviderError;
use crate::http;

pub const GEOLOCATION_HELP: &str = "ip <address>: tell roughly where an IPv4 or IPv6 address is located";

pub const IP_USAGE: &str = "try 'help ip'";

/// Resolves an address to a human readable location.
#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn locate(&self, ip: IpAddr) -> Result<String, ProviderError>;
}

/// ipinfo-style JSON endpoint. `{ip}` in the endpoint is replaced.
pub struct IpInfo {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Default, Deserialize)]
struct IpInfoResponse {
    city: Option<String>,
    region: Option<String>,
    country: Option<String>,
    org: Option<String>,
    #[serde(default)]
    bogon: bool,
}

impl IpInfo {
    pub fn new(client: reqwest::Client, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
        }
    }

    fn url_for(&self, ip: IpAddr) -> String {
        self.endpoint
            .replace("{ip}", &urlencoding::encode(&ip.to_string()))
    }
}

fn describe(ip: IpAddr, info: &IpInfoResponse) -> String {
    if info.bogon {
        return format!("{ip} is a private or reserved address");
    }
    let place: Vec<&str> = [&info.city, &info.region, &info.country]
        .into_iter()
        .filter_map(|part| part.as_deref())
        .filter(|part| !part.is_empty())
        .collect();
    if place.is_empty() {
        return format!("I have no location for {ip}");
    }
    match info.org.as_deref().filter(|org| !org.is_empty()) {
        Some(org) => format!("{ip} is in {} ({org})", place.join(", ")),
        None => format!("{ip} is in {}", place.join(", ")),
    }
}

#[async_trait]
impl Geolocator for IpInfo {
    async fn locate(&self, ip: IpAddr) -> Result<String, ProviderError> {
        let info: IpInfoResponse = http::get_json(self.client.get(self.url_for(ip))).await?;
        Ok(describe(ip, &info))
    }
}

pub struct IpHandler {
    geolocator: Arc<dyn Geolocator>,
}

impl IpHandler {
    pub fn new(geolocator: Arc<dyn Geolocator>) -> Self {
        Self { geolocator }
    }
}

#[async_trait]
impl Handler for IpHandler {
    async fn handle(&self, args: &[String]) -> String {
        let Some(arg) = args.first() else {
            return IP_USAGE.to_string();
        };
        let Ok(ip) = arg.parse::<IpAddr>() else {
            return format!("{arg} does not look like an IP address");
        };
        match self.geolocator.locate(ip).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(%ip, error = %e, "geolocation failed");
                format!("sorry, I could not locate {ip}")
            }
        }
    }

    fn help(&self) -> Option<&'static str> {
        Some(GEOLOCATION_HELP)
    }
}
