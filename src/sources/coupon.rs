//! Coupon listing adapter
//!
//! Link creation walks a paginated listing endpoint to learn every coupon id,
//! then produces one detail target per coupon. Each detail payload parses
//! into a single record.

use crate::crawler::{
    fetch_json, resolve, AdapterError, FetchError, FetchOutcome, FetchTarget, LinkContext,
    NormalizedRecord, ParseError, RawPayload, SourceAdapter,
};
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::Client;
use serde_json::Value;
use url::Url;

const RECORD_FIELDS: [&str; 4] = ["id", "name", "title", "code"];

pub struct CouponListingAdapter {
    client: Client,
    base_url: Url,
    category_id: String,
    concurrency: usize,
}

impl CouponListingAdapter {
    pub fn new(client: Client, base_url: Url, category_id: impl Into<String>, concurrency: usize) -> Self {
        Self {
            client,
            base_url,
            category_id: category_id.into(),
            concurrency: concurrency.max(1),
        }
    }

    fn listing_path(&self, page: u64) -> String {
        format!(
            "/api/coupon/get?category_id={}&order_by=newest&page={}",
            self.category_id, page
        )
    }

    async fn fetch_listing(&self, page: u64) -> Result<FetchOutcome, FetchError> {
        let url = resolve(&self.base_url, &self.listing_path(page))?;
        fetch_json(&self.client, &url).await
    }
}

#[async_trait]
impl SourceAdapter for CouponListingAdapter {
    async fn create_links(&self, ctx: &LinkContext) -> Result<Vec<FetchTarget>, AdapterError> {
        // Page 1 doubles as the probe for the page count
        let probe = match self.fetch_listing(1).await? {
            FetchOutcome::Payload(payload) => payload,
            FetchOutcome::SoftEmpty => {
                return Err(AdapterError::RateLimited {
                    url: self.listing_path(1),
                })
            }
        };
        let last_page = probe
            .pointer("/data/last_page")
            .and_then(Value::as_u64)
            .ok_or_else(|| ParseError::missing("data.last_page"))?;

        let mut listings = Vec::new();
        if last_page >= 1 {
            listings.push(FetchOutcome::Payload(probe));
        }
        let pages: Vec<_> = (2..=last_page).map(|page| self.fetch_listing(page)).collect();
        let rest: Vec<FetchOutcome> = stream::iter(pages)
            .buffered(self.concurrency)
            .try_collect()
            .await?;
        listings.extend(rest);

        let mut targets = Vec::new();
        for (index, listing) in listings.iter().enumerate() {
            match listing {
                FetchOutcome::Payload(payload) => {
                    for id in listing_ids(payload)? {
                        targets.push(FetchTarget::new(format!("/api/coupon/find/{}", id)));
                    }
                }
                FetchOutcome::SoftEmpty => {
                    tracing::warn!(
                        source = %ctx.source_name,
                        page = index + 1,
                        "Listing page was rate limited, its coupons are skipped this run"
                    );
                }
            }
        }

        tracing::debug!(
            source = %ctx.source_name,
            pages = last_page,
            coupons = targets.len(),
            "Collected coupon ids"
        );
        Ok(targets)
    }

    async fn download(&self, target: &FetchTarget) -> Result<FetchOutcome, FetchError> {
        let url = resolve(&self.base_url, target.as_str())?;
        fetch_json(&self.client, &url).await
    }

    async fn parse(&self, payload: &RawPayload) -> Result<Vec<NormalizedRecord>, ParseError> {
        let coupon = payload
            .get("data")
            .and_then(Value::as_object)
            .ok_or_else(|| ParseError::missing("data"))?;

        let mut record = NormalizedRecord::new();
        for field in RECORD_FIELDS {
            let value = coupon
                .get(field)
                .ok_or_else(|| ParseError::missing(format!("data.{}", field)))?;
            record.insert(field.to_string(), value.clone());
        }
        Ok(vec![record])
    }
}

/// Coupon ids listed on one listing page, rendered for use in a path
fn listing_ids(payload: &Value) -> Result<Vec<String>, ParseError> {
    let entries = payload
        .pointer("/data/data")
        .and_then(Value::as_array)
        .ok_or_else(|| ParseError::missing("data.data"))?;

    entries
        .iter()
        .map(|entry| match entry.get("id") {
            Some(Value::String(id)) => Ok(id.clone()),
            Some(Value::Number(id)) => Ok(id.to_string()),
            Some(other) => Err(ParseError::Malformed(format!("unexpected coupon id {}", other))),
            None => Err(ParseError::missing("data.data[].id")),
        })
        .collect()
}
