mod location;
mod types;

pub use location::IpLocator;

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, instrument, warn};

use crate::library::Weather;

use types::WttrReport;

const BASE_URL: &str = "https://wttr.in";
const USER_AGENT: &str = concat!("kkjukebox/", env!("CARGO_PKG_VERSION"));

/// Weather used whenever the forecast can't be retrieved
pub const FALLBACK_WEATHER: Weather = Weather::Sunny;

/// Time allowed for one forecast request
pub const WEATHER_TIMEOUT: Duration = Duration::from_secs(5);

/// Source of the current weather at a location
///
/// Implementations never fail: errors degrade to a fixed category.
pub trait WeatherProvider {
    fn current(&self, location: &str) -> impl Future<Output = Weather> + Send;
}

/// wttr.in forecast client
pub struct WttrClient {
    client: Client,
    base_url: String,
}

impl WttrClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(WEATHER_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch(&self, location: &str) -> Result<WttrReport, reqwest::Error> {
        let url = format!("{}/{}?format=j1", self.base_url, urlencoding::encode(location));
        debug!(url, "Fetching forecast");

        self.client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

impl WeatherProvider for WttrClient {
    #[instrument(skip(self))]
    async fn current(&self, location: &str) -> Weather {
        let report = match tokio::time::timeout(WEATHER_TIMEOUT, self.fetch(location)).await {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                warn!(error = %e, fallback = %FALLBACK_WEATHER, "Error retrieving forecast");
                return FALLBACK_WEATHER;
            }
            Err(_) => {
                warn!(fallback = %FALLBACK_WEATHER, "Timed out retrieving forecast");
                return FALLBACK_WEATHER;
            }
        };

        let Some(kind) = report.kind() else {
            warn!(fallback = %FALLBACK_WEATHER, "Forecast has no current condition");
            return FALLBACK_WEATHER;
        };

        let weather = kind.category();
        info!(
            area = %report.area().unwrap_or_else(|| location.to_string()),
            kind = ?kind,
            description = report.description().unwrap_or("unknown"),
            weather = %weather,
            "Current weather"
        );
        weather
    }
}
