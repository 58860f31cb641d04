use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

const MISSING_PRICE: &str = "N/A";

/// One item as returned by the catalog-search tool.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CatalogItem {
    #[serde(deserialize_with = "lenient_text")]
    pub id: String,
    #[serde(deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(deserialize_with = "lenient_text")]
    pub categories: String,
    #[serde(deserialize_with = "lenient_text")]
    pub price: String,
    #[serde(deserialize_with = "lenient_count")]
    pub availability: i64,
    #[serde(deserialize_with = "lenient_text")]
    pub url: String,
    #[serde(deserialize_with = "lenient_text")]
    pub image: String,
}

/// UI-ready product card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedProduct {
    pub id: String,
    pub name: String,
    pub price: String,
    pub currency: String,
    pub stock: String,
    pub image: String,
    pub category: String,
    pub details_url: String,
    pub availability: i64,
}

impl NormalizedProduct {
    pub fn in_stock(&self) -> bool {
        self.availability > 0
    }
}

impl From<CatalogItem> for NormalizedProduct {
    fn from(item: CatalogItem) -> Self {
        let (price, currency) = split_price(&item.price);
        Self {
            stock: stock_phrase(item.availability),
            id: item.id,
            name: item.title,
            price,
            currency,
            image: item.image,
            category: item.categories,
            details_url: item.url,
            availability: item.availability,
        }
    }
}

/// Splits `"35.0 USD"` into amount and currency on the first space.
pub fn split_price(raw: &str) -> (String, String) {
    let raw = raw.trim();
    if raw.is_empty() {
        return (MISSING_PRICE.to_string(), String::new());
    }
    match raw.split_once(' ') {
        Some((amount, currency)) => (amount.to_string(), currency.trim().to_string()),
        None => (raw.to_string(), String::new()),
    }
}

pub fn stock_phrase(availability: i64) -> String {
    if availability > 0 {
        format!("In stock ({availability})")
    } else {
        "Out of stock".to_string()
    }
}

/// Reads the `items` list of a decoded catalog-search result.
/// Entries that are not objects are dropped.
pub fn extract_products(result: &Map<String, Value>) -> Vec<NormalizedProduct> {
    let Some(items) = result.get("items").and_then(Value::as_array) else {
        debug!("catalog result has no items list");
        return Vec::new();
    };

    items
        .iter()
        .filter(|item| item.is_object())
        .filter_map(|item| match CatalogItem::deserialize(item) {
            Ok(item) => Some(NormalizedProduct::from(item)),
            Err(e) => {
                debug!(error = %e, "skipping unreadable catalog item");
                None
            }
        })
        .collect()
}

pub fn summarize(products: &[NormalizedProduct]) -> String {
    let total = products.len();
    let available = products.iter().filter(|p| p.in_stock()).count();
    let noun = if total == 1 { "product" } else { "products" };

    if available == total {
        format!("Found {total} {noun}. All are in stock.")
    } else if available == 0 {
        format!("Found {total} {noun}, but all are out of stock.")
    } else {
        format!(
            "Found {total} {noun} ({available} in stock, {} out of stock).",
            total - available
        )
    }
}

// The tool forwards whatever the catalog stores. Nulls become empty text and
// scalars are stringified.
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

// Numbers and numeric strings count; anything else is zero.
fn lenient_count<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(availability: i64) -> NormalizedProduct {
        NormalizedProduct::from(CatalogItem {
            id: format!("SKU-{availability}"),
            title: "Zip Hoodie".to_string(),
            price: "35.0 USD".to_string(),
            availability,
            ..CatalogItem::default()
        })
    }

    #[test]
    fn normalizes_price_and_stock() {
        let product = item(2);
        assert_eq!(product.price, "35.0");
        assert_eq!(product.currency, "USD");
        assert_eq!(product.stock, "In stock (2)");
    }

    #[test]
    fn zero_and_negative_are_out_of_stock() {
        assert_eq!(item(0).stock, "Out of stock");
        let negative = item(-3);
        assert_eq!(negative.stock, "Out of stock");
        assert_eq!(negative.availability, -3);
        assert!(!negative.in_stock());
    }

    #[test]
    fn price_edge_cases() {
        assert_eq!(split_price(""), ("N/A".to_string(), String::new()));
        assert_eq!(split_price("   "), ("N/A".to_string(), String::new()));
        assert_eq!(split_price("12.5"), ("12.5".to_string(), String::new()));
        assert_eq!(split_price("12.5 USD extra"), ("12.5".to_string(), "USD extra".to_string()));
    }

    #[test]
    fn sparse_items_do_not_crash() {
        let result = json!({"items": [
            {"id": "A"},
            "junk",
            {"id": "B", "availability": "4", "price": ""},
            {"id": "C", "availability": null, "title": null}
        ]});
        let products = extract_products(result.as_object().unwrap());

        assert_eq!(products.len(), 3);
        assert_eq!(products[0].id, "A");
        assert_eq!(products[0].price, "N/A");
        assert_eq!(products[0].stock, "Out of stock");
        assert_eq!(products[1].availability, 4);
        assert_eq!(products[1].stock, "In stock (4)");
        assert_eq!(products[2].name, "");
        assert_eq!(products[2].availability, 0);
    }

    #[test]
    fn summary_variants() {
        assert_eq!(summarize(&[item(1), item(2)]), "Found 2 products. All are in stock.");
        assert_eq!(summarize(&[item(0)]), "Found 1 product, but all are out of stock.");
        assert_eq!(
            summarize(&[item(1), item(2), item(0)]),
            "Found 3 products (2 in stock, 1 out of stock)."
        );
    }
}
