use std::time::Duration;

use chrono::{DateTime, NaiveDateTime};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::types::{Account, Campaign, Comment, Contribution, Envelope, Perk};

/// HTTP timeout for API, auth and webhook requests.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client shared by every outbound request of a binary.
pub fn http_client() -> reqwest::Result<reqwest::Client> {
    client_builder(REQUEST_TIMEOUT).build()
}

pub fn client_builder(timeout: Duration) -> reqwest::ClientBuilder {
    reqwest::Client::builder().timeout(timeout)
}

/// Read endpoints of the campaign API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Campaign,
    Perks,
    Comments,
    Contributions,
    Me,
}

impl Endpoint {
    /// Path relative to the API base URL.
    pub fn path(self, campaign_id: u64) -> String {
        match self {
            Endpoint::Campaign => format!("/campaigns/{campaign_id}.json"),
            Endpoint::Perks => format!("/campaigns/{campaign_id}/perks.json"),
            Endpoint::Comments => format!("/campaigns/{campaign_id}/comments.json"),
            Endpoint::Contributions => format!("/campaigns/{campaign_id}/contributions.json"),
            Endpoint::Me => "/me.json".to_string(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Endpoint::Campaign => "campaign",
            Endpoint::Perks => "perks",
            Endpoint::Comments => "comments",
            Endpoint::Contributions => "contributions",
            Endpoint::Me => "me",
        }
    }
}

/// An item of a paginated, newest-first stream.
pub trait StreamItem: DeserializeOwned {
    const ENDPOINT: Endpoint;

    fn created_at(&self) -> &str;
}

impl StreamItem for Comment {
    const ENDPOINT: Endpoint = Endpoint::Comments;

    fn created_at(&self) -> &str {
        &self.created_at
    }
}

impl StreamItem for Contribution {
    const ENDPOINT: Endpoint = Endpoint::Contributions;

    fn created_at(&self) -> &str {
        &self.created_at
    }
}

/// Read access to one campaign.
///
/// Implemented over HTTP by [`HttpCampaignApi`]; detectors only depend on
/// this trait so they can be exercised against canned responses.
#[allow(async_fn_in_trait)]
pub trait CampaignApi {
    async fn campaign(&self) -> Result<Campaign, ApiError>;

    async fn perks(&self) -> Result<Vec<Perk>, ApiError>;

    /// One page (1-based) of a stream. An empty page means there are no more.
    async fn fetch_page<T: StreamItem>(&self, page: u32) -> Result<Vec<T>, ApiError>;

    async fn current_account(&self) -> Result<Account, ApiError>;
}

/// Token-authenticated HTTP client for the campaign API.
pub struct HttpCampaignApi {
    client: reqwest::Client,
    base_url: String,
    campaign_id: u64,
    api_token: String,
    access_token: String,
}

impl HttpCampaignApi {
    pub fn new(client: reqwest::Client, config: &ApiConfig, access_token: &str) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            campaign_id: config.campaign_id,
            api_token: config.api_token.clone(),
            access_token: access_token.to_string(),
        }
    }

    pub fn url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path(self.campaign_id))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        page: Option<u32>,
    ) -> Result<T, ApiError> {
        let mut req = self.client.get(self.url(endpoint)).query(&[
            ("api_token", self.api_token.as_str()),
            ("access_token", self.access_token.as_str()),
        ]);
        if let Some(page) = page {
            req = req.query(&[("page", page)]);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized(endpoint.name().to_string()));
        }
        if !status.is_success() {
            return Err(ApiError::Status {
                endpoint: endpoint.name().to_string(),
                status,
            });
        }
        let body = resp.bytes().await?;
        decode_envelope(endpoint, &body)
    }
}

impl CampaignApi for HttpCampaignApi {
    async fn campaign(&self) -> Result<Campaign, ApiError> {
        self.get(Endpoint::Campaign, None).await
    }

    async fn perks(&self) -> Result<Vec<Perk>, ApiError> {
        let perks: Option<Vec<Perk>> = self.get(Endpoint::Perks, None).await?;
        Ok(perks.unwrap_or_default())
    }

    async fn fetch_page<T: StreamItem>(&self, page: u32) -> Result<Vec<T>, ApiError> {
        let items: Option<Vec<T>> = self.get(T::ENDPOINT, Some(page)).await?;
        let items = items.unwrap_or_default();
        debug!("Fetched {} {} on page {page}", items.len(), T::ENDPOINT.name());
        Ok(items)
    }

    async fn current_account(&self) -> Result<Account, ApiError> {
        self.get(Endpoint::Me, None).await
    }
}

/// Unwrap the `{"response": ...}` envelope.
pub fn decode_envelope<T: DeserializeOwned>(endpoint: Endpoint, body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice::<Envelope<T>>(body)
        .map(|env| env.response)
        .map_err(|source| ApiError::Decode {
            endpoint: endpoint.name().to_string(),
            source,
        })
}

/// Parse an ISO-8601 timestamp into epoch seconds. A timestamp without an
/// offset is read as UTC.
pub fn parse_timestamp(s: &str) -> Result<i64, ApiError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.timestamp());
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Ok(dt.timestamp());
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc().timestamp())
        .map_err(|_| ApiError::InvalidTimestamp(s.to_string()))
}
