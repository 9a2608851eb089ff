use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

const BASE_URL: &str = "https://ipinfo.io";
const USER_AGENT: &str = concat!("kkjukebox/", env!("CARGO_PKG_VERSION"));
const LOCATE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct IpInfo {
    city: Option<String>,
    region: Option<String>,
    country: Option<String>,
}

impl IpInfo {
    fn address(&self) -> String {
        [&self.city, &self.region, &self.country]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// IP-based geolocation
pub struct IpLocator {
    client: Client,
    base_url: String,
}

impl IpLocator {
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(LOCATE_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch(&self) -> Result<IpInfo, reqwest::Error> {
        let url = format!("{}/json", self.base_url);
        debug!(url, "Looking up location");
        self.client.get(&url).send().await?.error_for_status()?.json().await
    }

    /// City of the current public IP, or `None` if it can't be determined
    #[instrument(skip(self))]
    pub async fn locate(&self) -> Option<String> {
        match self.fetch().await {
            Ok(info) => {
                info!(address = %info.address(), "Location");
                info.city.filter(|c| !c.trim().is_empty())
            }
            Err(e) => {
                warn!(error = %e, "Failed to look up location");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_skips_missing_parts() {
        let info: IpInfo =
            serde_json::from_str(r#"{"ip": "203.0.113.7", "city": "Lyon", "country": "FR"}"#).unwrap();
        assert_eq!(info.address(), "Lyon, FR");
        assert_eq!(info.city.as_deref(), Some("Lyon"));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_none() {
        let locator = IpLocator::with_base_url("http://127.0.0.1:9").unwrap();
        assert!(locator.locate().await.is_none());
    }
}
