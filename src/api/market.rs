//! warframe.market REST client.
//!
//! Every request waits on the shared [`RateLimiter`] first. HTTP failures are
//! sorted into transient (retry next cycle) and fatal (stop polling the item).

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;

use super::rate_limiter::RateLimiter;
use super::types::{ApiResponse, ItemInfo, Listing, RawItem, RawOrder, TopOrders, TrackedItem};
use crate::core::{FetchError, MarketConfig};

/// Source of listings and item metadata.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketSource: Send + Sync {
    /// Current sell listings for `item`.
    async fn fetch_listings(&self, item: &TrackedItem) -> Result<Vec<Listing>, FetchError>;

    /// Display metadata for `slug`.
    async fn fetch_item(&self, slug: &str) -> Result<ItemInfo, FetchError>;
}

pub struct MarketClient {
    http: Client,
    base_url: String,
    platform: String,
    crossplay: bool,
    rate_limiter: Arc<RateLimiter>,
}

impl MarketClient {
    pub fn new(
        config: &MarketConfig,
        rate_limiter: Arc<RateLimiter>,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(config.request_timeout()).build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            platform: config.platform.clone(),
            crossplay: config.crossplay,
            rate_limiter,
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    async fn get<T: DeserializeOwned>(
        &self,
        subject: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<ApiResponse<T>, FetchError> {
        self.rate_limiter.acquire().await;

        let url = format!("{}/{}", self.base_url, path);
        tracing::debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .header("platform", &self.platform)
            .header("crossplay", self.crossplay.to_string())
            .query(query)
            .send()
            .await
            .map_err(|e| FetchError::transient(subject, format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(subject, status, &body));
        }

        response
            .json::<ApiResponse<T>>()
            .await
            .map_err(|e| FetchError::transient(subject, format!("malformed response: {}", e)))
    }
}

#[async_trait]
impl MarketSource for MarketClient {
    async fn fetch_listings(&self, item: &TrackedItem) -> Result<Vec<Listing>, FetchError> {
        let mut query = Vec::new();
        if let Some(rank) = item.rank {
            query.push(("rank", rank.to_string()));
        }

        let path = format!("orders/item/{}/top", item.slug);
        let response: ApiResponse<TopOrders> = self.get(&item.slug, &path, &query).await?;

        let orders = response.data.ok_or_else(|| {
            FetchError::transient(&item.slug, describe_missing_data(&response.error))
        })?;

        Ok(normalize_orders(&item.slug, orders.sell))
    }

    async fn fetch_item(&self, slug: &str) -> Result<ItemInfo, FetchError> {
        let path = format!("item/{}", slug);
        let response: ApiResponse<RawItem> = self.get(slug, &path, &[]).await?;

        response
            .data
            .map(RawItem::into_info)
            .ok_or_else(|| FetchError::transient(slug, describe_missing_data(&response.error)))
    }
}

/// 429 and 5xx clear up on their own; any other client error will not.
fn classify_status(subject: &str, status: StatusCode, body: &str) -> FetchError {
    let snippet: String = body.chars().take(200).collect();
    let reason = format!("HTTP {} {}", status.as_u16(), snippet).trim_end().to_string();

    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        FetchError::transient(subject, reason)
    } else if status.is_client_error() {
        FetchError::fatal(subject, reason)
    } else {
        FetchError::transient(subject, reason)
    }
}

fn describe_missing_data(error: &Option<serde_json::Value>) -> String {
    match error {
        Some(error) => format!("no data in response (error: {})", error),
        None => "no data in response".to_string(),
    }
}

/// Decodes each order on its own; orders missing required fields are dropped.
pub(crate) fn normalize_orders(item_slug: &str, raw: Vec<serde_json::Value>) -> Vec<Listing> {
    let total = raw.len();
    let listings: Vec<Listing> = raw
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<RawOrder>(value) {
            Ok(order) => Some(order.into_listing(item_slug)),
            Err(e) => {
                tracing::debug!("Dropping malformed order for {}: {}", item_slug, e);
                None
            }
        })
        .collect();

    if listings.len() < total {
        tracing::warn!(
            "⚠️  Dropped {} of {} orders for {} (missing required fields)",
            total - listings.len(),
            total,
            item_slug
        );
    }

    listings
}
