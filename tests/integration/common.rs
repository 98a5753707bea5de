use cadence_crawl::config::{parse_config, Config};
use cadence_crawl::storage::{open_storage, DocumentStore};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// A fresh database file inside its own temporary directory
pub struct TestDb {
    pub dir: TempDir,
}

impl TestDb {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self) -> String {
        self.dir.path().join("cadence.db").display().to_string()
    }

    pub fn open(&self) -> Arc<dyn DocumentStore> {
        Arc::new(open_storage(Path::new(&self.path())).expect("Failed to open database"))
    }
}

/// Builds and validates a configuration from source and schedule TOML fragments
pub fn create_test_config(db: &TestDb, orchestrator: &str, sources: &str) -> Config {
    let toml = format!(
        r#"
[orchestrator]
{orchestrator}

[storage]
database-path = "{db_path}"

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

{sources}
"#,
        orchestrator = orchestrator,
        db_path = db.path().replace('\\', "\\\\"),
        sources = sources,
    );
    parse_config(&toml).expect("Test config should be valid")
}

pub fn coupon_source(name: &str, base_url: &str, minutes: u64) -> String {
    format!(
        r#"
[[source]]
name = "{name}"
kind = "coupon-listing"
base-url = "{base_url}"
category-id = "JBGDg"
max-concurrent-requests = 4

[[schedule]]
source-name = "{name}"
minutes = {minutes}
"#
    )
}

pub fn product_source(name: &str, base_url: &str, max_page: u32, page_cap: u32, minutes: u64) -> String {
    format!(
        r#"
[[source]]
name = "{name}"
kind = "product-search"
base-url = "{base_url}"
max-pages-per-category = {page_cap}

[[source.category]]
slug = "dairy"
max-page = {max_page}

[[schedule]]
source-name = "{name}"
minutes = {minutes}
"#
    )
}

pub fn listing_page(last_page: u64, ids: &[u64]) -> Value {
    let data: Vec<Value> = ids.iter().map(|id| json!({"id": id})).collect();
    json!({"data": {"last_page": last_page, "data": data}})
}

pub fn coupon_detail(id: u64) -> Value {
    json!({
        "data": {
            "id": id,
            "name": format!("coupon-{}", id),
            "title": format!("Coupon {}", id),
            "code": format!("CODE{}", id),
            "description": "ignored"
        }
    })
}

pub fn product(id: u64, in_stock: bool) -> Value {
    let variant = if in_stock {
        json!({"price": {"rrp_price": id * 100, "selling_price": id * 90}})
    } else {
        json!([])
    };
    json!({
        "id": id,
        "title_fa": format!("Product {}", id),
        "data_layer": {"category": "dairy"},
        "default_variant": variant
    })
}

pub fn search_page(products: Vec<Value>) -> Value {
    json!({"data": {"products": products}})
}
