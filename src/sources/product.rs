//! Product search adapter
//!
//! Every configured category contributes a fixed range of search pages;
//! no request is needed to build the target list. Each page parses into one
//! record per listed product.

use crate::config::CategoryEntry;
use crate::crawler::{
    fetch_json, resolve, AdapterError, FetchError, FetchOutcome, FetchTarget, LinkContext,
    NormalizedRecord, ParseError, RawPayload, SourceAdapter,
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use url::Url;

pub struct ProductSearchAdapter {
    client: Client,
    base_url: Url,
    categories: Vec<CategoryEntry>,
    page_cap: u32,
}

impl ProductSearchAdapter {
    pub fn new(client: Client, base_url: Url, categories: Vec<CategoryEntry>, page_cap: u32) -> Self {
        Self {
            client,
            base_url,
            categories,
            page_cap,
        }
    }

    /// Search pages of one category, `1..=min(max_page, page_cap)`
    ///
    /// Both bounds are inclusive: `max-page = 2` fetches pages 1 and 2, and
    /// the default cap of 9 fetches page 9. An exclusive range would fetch one
    /// page fewer and skip page 1 entirely when `max-page` is 1.
    fn category_targets(&self, category: &CategoryEntry) -> impl Iterator<Item = FetchTarget> + '_ {
        let last = category.max_page.min(self.page_cap);
        let slug = category.slug.clone();
        (1..=last).map(move |page| {
            FetchTarget::new(format!("/v1/categories/{}/search/?page={}", slug, page))
        })
    }
}

#[async_trait]
impl SourceAdapter for ProductSearchAdapter {
    async fn create_links(&self, ctx: &LinkContext) -> Result<Vec<FetchTarget>, AdapterError> {
        let targets: Vec<FetchTarget> = self
            .categories
            .iter()
            .flat_map(|category| self.category_targets(category))
            .collect();

        tracing::debug!(
            source = %ctx.source_name,
            categories = self.categories.len(),
            pages = targets.len(),
            "Enumerated search pages"
        );
        Ok(targets)
    }

    async fn download(&self, target: &FetchTarget) -> Result<FetchOutcome, FetchError> {
        let url = resolve(&self.base_url, target.as_str())?;
        fetch_json(&self.client, &url).await
    }

    async fn parse(&self, payload: &RawPayload) -> Result<Vec<NormalizedRecord>, ParseError> {
        payload
            .pointer("/data/products")
            .and_then(Value::as_array)
            .ok_or_else(|| ParseError::missing("data.products"))?
            .iter()
            .map(parse_product)
            .collect()
    }
}

/// Normalizes one search hit
///
/// `category` is `data_layer.category` exactly as sent. The vendor currently
/// wraps it in four leading characters and one trailing one; that wrapper is
/// kept rather than sliced off, so a format change never truncates the name.
fn parse_product(product: &Value) -> Result<NormalizedRecord, ParseError> {
    let id = product
        .get("id")
        .filter(|id| !id.is_null())
        .ok_or_else(|| ParseError::missing("id"))?;
    let title = product
        .get("title_fa")
        .ok_or_else(|| ParseError::missing("title_fa"))?;
    let category = product
        .pointer("/data_layer/category")
        .ok_or_else(|| ParseError::missing("data_layer.category"))?;

    // Out-of-stock products carry an empty default variant (`[]` or `{}`)
    let variant = product.get("default_variant");
    let exist = match variant {
        Some(Value::Object(fields)) => !fields.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        _ => false,
    };
    let price = |field: &str| {
        variant
            .filter(|_| exist)
            .and_then(|v| v.pointer(&format!("/price/{}", field)))
            .cloned()
            .unwrap_or(Value::Null)
    };

    let mut record = NormalizedRecord::new();
    record.insert("id".to_string(), id.clone());
    record.insert("title".to_string(), title.clone());
    record.insert("category".to_string(), category.clone());
    record.insert("exist".to_string(), Value::Bool(exist));
    record.insert("rrp_price".to_string(), price("rrp_price"));
    record.insert("selling_price".to_string(), price("selling_price"));
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn adapter(categories: Vec<(&str, u32)>, page_cap: u32) -> ProductSearchAdapter {
        ProductSearchAdapter::new(
            Client::new(),
            Url::parse("https://api.example.com").unwrap(),
            categories
                .into_iter()
                .map(|(slug, max_page)| CategoryEntry {
                    slug: slug.to_string(),
                    max_page,
                })
                .collect(),
            page_cap,
        )
    }

    fn ctx() -> LinkContext {
        LinkContext {
            source_name: "groceries".to_string(),
        }
    }

    #[tokio::test]
    async fn test_pages_are_capped() {
        let adapter = adapter(vec![("dairy", 30), ("protein-foods", 2)], 9);
        let targets = adapter.create_links(&ctx()).await.unwrap();

        assert_eq!(targets.len(), 11);
        assert_eq!(targets[0].as_str(), "/v1/categories/dairy/search/?page=1");
        assert_eq!(targets[8].as_str(), "/v1/categories/dairy/search/?page=9");
        assert_eq!(targets[10].as_str(), "/v1/categories/protein-foods/search/?page=2");
    }

    #[tokio::test]
    async fn test_last_page_is_included() {
        let adapter = adapter(vec![("dairy", 1), ("bakery", 2)], 9);
        let targets = adapter.create_links(&ctx()).await.unwrap();

        let pages: Vec<&str> = targets.iter().map(FetchTarget::as_str).collect();
        assert_eq!(
            pages,
            vec![
                "/v1/categories/dairy/search/?page=1",
                "/v1/categories/bakery/search/?page=1",
                "/v1/categories/bakery/search/?page=2",
            ]
        );
    }

    #[tokio::test]
    async fn test_wrapped_category_is_kept_verbatim() {
        let payload = json!({"data": {"products": [{
            "id": 4,
            "title_fa": "Butter",
            "data_layer": {"category": "cat[dairy]"},
            "default_variant": []
        }]}});

        let records = adapter(vec![], 9).parse(&payload).await.unwrap();
        assert_eq!(records[0]["category"], json!("cat[dairy]"));
    }

    #[tokio::test]
    async fn test_zero_max_page_yields_nothing() {
        let adapter = adapter(vec![("dairy", 0)], 9);
        assert!(adapter.create_links(&ctx()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_parse_products() {
        let payload = json!({
            "data": {
                "products": [
                    {
                        "id": 1,
                        "title_fa": "Milk",
                        "data_layer": {"category": "dairy"},
                        "default_variant": {"price": {"rrp_price": 120, "selling_price": 100}}
                    },
                    {
                        "id": 2,
                        "title_fa": "Cheese",
                        "data_layer": {"category": "dairy"},
                        "default_variant": []
                    }
                ]
            }
        });

        let records = adapter(vec![], 9).parse(&payload).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            Value::Object(records[0].clone()),
            json!({
                "id": 1, "title": "Milk", "category": "dairy",
                "exist": true, "rrp_price": 120, "selling_price": 100
            })
        );
        assert_eq!(records[1]["exist"], json!(false));
        assert_eq!(records[1]["rrp_price"], Value::Null);
        assert_eq!(records[1]["selling_price"], Value::Null);
    }

    #[tokio::test]
    async fn test_variant_without_price() {
        let payload = json!({
            "data": {"products": [{
                "id": 3,
                "title_fa": "Yogurt",
                "data_layer": {"category": "dairy"},
                "default_variant": {"id": 9}
            }]}
        });

        let records = adapter(vec![], 9).parse(&payload).await.unwrap();
        assert_eq!(records[0]["exist"], json!(true));
        assert_eq!(records[0]["selling_price"], Value::Null);
    }

    #[tokio::test]
    async fn test_empty_product_list() {
        let payload = json!({"data": {"products": []}});
        assert!(adapter(vec![], 9).parse(&payload).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_products_is_parse_error() {
        let err = adapter(vec![], 9).parse(&json!({"data": {}})).await.unwrap_err();
        assert!(matches!(err, ParseError::MissingField { .. }));

        let payload = json!({"data": {"products": [{"id": 1, "data_layer": {"category": "x"}}]}});
        let err = adapter(vec![], 9).parse(&payload).await.unwrap_err();
        assert!(err.to_string().contains("title_fa"));
    }
}
