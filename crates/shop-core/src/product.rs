//! # Product Types
//!
//! Catalog types for the storefront.
//! Products live in Stripe; this crate only models what the storefront reads
//! from them and the metadata keys it writes back (stock, slug, category and
//! the numbered `imageN` gallery slots).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata key holding the remaining stock count
pub const STOCK_KEY: &str = "stock";

/// Metadata key holding the URL slug
pub const SLUG_KEY: &str = "slug";

/// Metadata key holding the category slug
pub const CATEGORY_KEY: &str = "category";

/// Metadata key holding the variant name
pub const VARIANT_KEY: &str = "variant";

/// Metadata key that hides a product from public listings
pub const HIDDEN_KEY: &str = "hidden";

/// Stripe's zero-decimal currencies; amounts are whole units
const ZERO_DECIMAL_CURRENCIES: &[&str] = &[
    "bif", "clp", "djf", "gnf", "jpy", "kmf", "krw", "mga", "pyg", "rwf", "ugx", "vnd", "vuv",
    "xaf", "xof", "xpf",
];

/// ISO 4217 currency as Stripe reports it (lowercase).
///
/// The named variants get a display symbol; any other code Stripe accepts
/// is carried through as [`Currency::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Currency {
    #[default]
    USD,
    EUR,
    GBP,
    JPY,
    CAD,
    AUD,
    CHF,
    MXN,
    /// Lowercase three-letter code without a symbol of its own
    Other(String),
}

impl Currency {
    /// Returns the lowercase ISO 4217 code
    pub fn as_str(&self) -> &str {
        match self {
            Currency::USD => "usd",
            Currency::EUR => "eur",
            Currency::GBP => "gbp",
            Currency::JPY => "jpy",
            Currency::CAD => "cad",
            Currency::AUD => "aud",
            Currency::CHF => "chf",
            Currency::MXN => "mxn",
            Currency::Other(code) => code,
        }
    }

    /// Parse a Stripe currency code (case-insensitive). Anything that is
    /// not three ASCII letters is rejected.
    pub fn parse(code: &str) -> Option<Self> {
        let code = code.trim().to_ascii_lowercase();
        if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_lowercase()) {
            return None;
        }
        Some(match code.as_str() {
            "usd" => Currency::USD,
            "eur" => Currency::EUR,
            "gbp" => Currency::GBP,
            "jpy" => Currency::JPY,
            "cad" => Currency::CAD,
            "aud" => Currency::AUD,
            "chf" => Currency::CHF,
            "mxn" => Currency::MXN,
            _ => Currency::Other(code),
        })
    }

    /// Decimal places of the smallest unit (0 for JPY, KRW and the other
    /// zero-decimal currencies, 2 otherwise)
    pub fn decimal_places(&self) -> u8 {
        if ZERO_DECIMAL_CURRENCIES.contains(&self.as_str()) {
            0
        } else {
            2
        }
    }

    fn symbol(&self) -> String {
        match self {
            Currency::USD => "$".to_string(),
            Currency::EUR => "€".to_string(),
            Currency::GBP => "£".to_string(),
            Currency::JPY => "¥".to_string(),
            Currency::CAD => "C$".to_string(),
            Currency::AUD => "A$".to_string(),
            Currency::CHF => "CHF ".to_string(),
            Currency::MXN => "MX$".to_string(),
            Currency::Other(code) => format!("{} ", code.to_ascii_uppercase()),
        }
    }
}

impl TryFrom<String> for Currency {
    type Error = String;

    fn try_from(code: String) -> Result<Self, Self::Error> {
        Currency::parse(&code).ok_or_else(|| format!("invalid currency code: {}", code))
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.as_str().to_string()
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str().to_uppercase())
    }
}

/// A product's default price, amount in smallest currency unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Stripe price id (price_...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Amount in smallest currency unit (cents for USD)
    pub amount: i64,
    /// Currency
    pub currency: Currency,
}

impl Price {
    /// Create a price from smallest unit (cents)
    pub fn from_cents(amount: i64, currency: Currency) -> Self {
        Self {
            id: None,
            amount,
            currency,
        }
    }

    /// Format for display (e.g., "$10.00", "¥1000", "SEK 99.50")
    pub fn display(&self) -> String {
        let symbol = self.currency.symbol();
        let sign = if self.amount < 0 { "-" } else { "" };
        let units = self.amount.unsigned_abs();
        if self.currency.decimal_places() == 0 {
            format!("{}{}{}", sign, symbol, units)
        } else {
            format!("{}{}{}.{:02}", sign, symbol, units / 100, units % 100)
        }
    }
}

/// Stock level as recorded in product metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stock {
    /// No `stock` key, `"Infinity"`, or an unreadable value
    Unlimited,
    /// Finite count
    Limited(u64),
}

impl Stock {
    /// Read stock from a metadata value
    pub fn parse(value: Option<&str>) -> Self {
        let Some(raw) = value.map(str::trim) else {
            return Stock::Unlimited;
        };
        if raw == "Infinity" {
            return Stock::Unlimited;
        }
        match raw.parse::<i64>() {
            Ok(n) => Stock::Limited(n.max(0) as u64),
            Err(_) => Stock::Unlimited,
        }
    }

    /// Stock after selling `quantity` units, floored at zero
    pub fn decrement(self, quantity: u32) -> Self {
        match self {
            Stock::Unlimited => Stock::Unlimited,
            Stock::Limited(n) => Stock::Limited(n.saturating_sub(quantity as u64)),
        }
    }

    pub fn is_limited(&self) -> bool {
        matches!(self, Stock::Limited(_))
    }
}

impl std::fmt::Display for Stock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stock::Unlimited => write!(f, "Infinity"),
            Stock::Limited(n) => write!(f, "{}", n),
        }
    }
}

/// A product as read from Stripe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Stripe product id (prod_...)
    pub id: String,

    /// Display name
    pub name: String,

    /// Long description (markdown)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Whether this product is active in Stripe
    #[serde(default = "default_true")]
    pub active: bool,

    /// Primary images managed by Stripe
    #[serde(default)]
    pub images: Vec<String>,

    /// Free-form metadata (stock, slug, category, imageN...)
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,

    /// Expanded default price
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_price: Option<Price>,
}

fn default_true() -> bool {
    true
}

impl Product {
    /// Create a new active product without price or metadata
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            active: true,
            images: Vec::new(),
            metadata: BTreeMap::new(),
            default_price: None,
        }
    }

    /// Builder: set default price
    pub fn with_price(mut self, price: Price) -> Self {
        self.default_price = Some(price);
        self
    }

    /// Builder: add a primary image
    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.images.push(url.into());
        self
    }

    /// Builder: add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn slug(&self) -> Option<&str> {
        self.meta(SLUG_KEY)
    }

    pub fn category(&self) -> Option<&str> {
        self.meta(CATEGORY_KEY)
    }

    pub fn variant(&self) -> Option<&str> {
        self.meta(VARIANT_KEY)
    }

    pub fn stock(&self) -> Stock {
        Stock::parse(self.metadata.get(STOCK_KEY).map(String::as_str))
    }

    /// Unit amount of the default price, zero when unpriced
    pub fn unit_amount(&self) -> i64 {
        self.default_price.as_ref().map(|p| p.amount).unwrap_or(0)
    }

    /// Whether the product may appear in public listings
    pub fn is_listed(&self) -> bool {
        let hidden = self
            .meta(HIDDEN_KEY)
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false);
        let slug_ok = matches!(self.slug(), Some(slug) if slug != "hidden");
        !hidden && slug_ok
    }

    /// Gallery images: primary images followed by `imageN` metadata
    /// (N != 1) in numeric order. Only absolute http(s) URLs are kept.
    pub fn gallery(&self) -> Vec<String> {
        let mut extra: Vec<(u32, &String)> = self
            .metadata
            .iter()
            .filter_map(|(key, value)| image_slot(key).map(|n| (n, value)))
            .filter(|(n, value)| *n != 1 && value.starts_with("http"))
            .collect();
        extra.sort_by_key(|(n, _)| *n);

        self.images
            .iter()
            .cloned()
            .chain(extra.into_iter().map(|(_, v)| v.clone()))
            .collect()
    }

    /// First free `imageK` slot number with K >= `start`
    pub fn next_image_slot(&self, start: u32) -> u32 {
        next_free_slot(&self.metadata, start)
    }

    fn meta(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Slot number of an `imageN` metadata key
pub fn image_slot(key: &str) -> Option<u32> {
    key.strip_prefix("image")?.parse().ok()
}

/// First `imageK` (K >= start) not present in `metadata`
pub fn next_free_slot(metadata: &BTreeMap<String, String>, start: u32) -> u32 {
    let mut slot = start;
    while metadata
        .get(&format!("image{}", slot))
        .is_some_and(|v| !v.is_empty())
    {
        slot += 1;
    }
    slot
}

/// A page of products fetched from the commerce provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductCatalog {
    pub products: Vec<Product>,
}

impl ProductCatalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    /// Find a product by ID
    pub fn get(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    /// Active products that may be shown publicly
    pub fn listed(&self) -> impl Iterator<Item = &Product> {
        self.products.iter().filter(|p| p.active && p.is_listed())
    }

    /// Listed products in a category
    pub fn in_category<'a>(&'a self, slug: &'a str) -> impl Iterator<Item = &'a Product> + 'a {
        self.listed().filter(move |p| p.category() == Some(slug))
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

/// Pick the variant to show from products sharing a slug.
///
/// The requested variant is honoured only when there is a real choice;
/// otherwise the first product's variant wins.
pub fn select_variant<'a>(variants: &'a [Product], requested: Option<&str>) -> Option<&'a Product> {
    let first = variants.first()?;
    let wanted = match requested {
        Some(v) if variants.len() > 1 => Some(v),
        _ => first.variant(),
    };
    match wanted {
        Some(w) => variants.iter().find(|p| p.variant() == Some(w)),
        None => variants.iter().find(|p| p.variant().is_none()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lipstick() -> Product {
        Product::new("prod_1", "Rose Powder")
            .with_price(Price::from_cents(1999, Currency::USD))
            .with_metadata("slug", "rose-powder")
            .with_metadata("category", "face-powder")
    }

    #[test]
    fn test_price_display() {
        assert_eq!(Price::from_cents(2999, Currency::USD).display(), "$29.99");
        assert_eq!(Price::from_cents(1999, Currency::EUR).display(), "€19.99");
        assert_eq!(Price::from_cents(1000, Currency::JPY).display(), "¥1000");
        assert_eq!(
            Price::from_cents(9950, Currency::Other("sek".to_string())).display(),
            "SEK 99.50"
        );
        assert_eq!(
            Price::from_cents(15000, Currency::Other("krw".to_string())).display(),
            "KRW 15000"
        );
        assert_eq!(Price::from_cents(5, Currency::USD).display(), "$0.05");
    }

    #[test]
    fn test_currency_serde_uses_lowercase_code() {
        let currency: Currency = serde_json::from_str(r#""NOK""#).unwrap();
        assert_eq!(currency, Currency::Other("nok".to_string()));
        assert_eq!(serde_json::to_string(&currency).unwrap(), r#""nok""#);
        assert_eq!(serde_json::to_string(&Currency::USD).unwrap(), r#""usd""#);
        assert!(serde_json::from_str::<Currency>(r#""not a code""#).is_err());
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!(Currency::parse("USD"), Some(Currency::USD));
        assert_eq!(Currency::parse("eur"), Some(Currency::EUR));
        assert_eq!(Currency::parse("SEK"), Some(Currency::Other("sek".to_string())));
        assert_eq!(Currency::parse(""), None);
        assert_eq!(Currency::parse("dollars"), None);
    }

    #[test]
    fn test_stock_parsing() {
        assert_eq!(Stock::parse(None), Stock::Unlimited);
        assert_eq!(Stock::parse(Some("Infinity")), Stock::Unlimited);
        assert_eq!(Stock::parse(Some("12")), Stock::Limited(12));
        assert_eq!(Stock::parse(Some("-3")), Stock::Limited(0));
        assert_eq!(Stock::parse(Some("lots")), Stock::Unlimited);
    }

    #[test]
    fn test_stock_decrement_floors_at_zero() {
        assert_eq!(Stock::Limited(5).decrement(2), Stock::Limited(3));
        assert_eq!(Stock::Limited(1).decrement(4), Stock::Limited(0));
        assert_eq!(Stock::Unlimited.decrement(4), Stock::Unlimited);
        assert_eq!(Stock::Limited(0).to_string(), "0");
    }

    #[test]
    fn test_gallery_ordering() {
        let product = lipstick()
            .with_image("https://files.stripe.com/main.png")
            .with_metadata("image10", "https://cdn.example.com/10.png")
            .with_metadata("image2", "https://cdn.example.com/2.png")
            .with_metadata("image1", "https://cdn.example.com/1.png")
            .with_metadata("image3", "not-a-url")
            .with_metadata("imageX", "https://cdn.example.com/x.png");

        assert_eq!(
            product.gallery(),
            vec![
                "https://files.stripe.com/main.png",
                "https://cdn.example.com/2.png",
                "https://cdn.example.com/10.png",
            ]
        );
    }

    #[test]
    fn test_next_image_slot_skips_taken() {
        let product = lipstick()
            .with_metadata("image2", "https://a")
            .with_metadata("image3", "https://b")
            .with_metadata("image5", "https://c");

        assert_eq!(product.next_image_slot(2), 4);
        assert_eq!(product.next_image_slot(5), 6);
        assert_eq!(lipstick().next_image_slot(2), 2);
    }

    #[test]
    fn test_listing_rules() {
        assert!(lipstick().is_listed());
        assert!(!lipstick().with_metadata("hidden", "true").is_listed());
        assert!(!Product::new("prod_2", "No slug").is_listed());
        assert!(!lipstick().with_metadata("slug", "hidden").is_listed());
    }

    #[test]
    fn test_catalog_category_filter() {
        let catalog = ProductCatalog::new(vec![
            lipstick(),
            Product::new("prod_2", "Blush")
                .with_metadata("slug", "blush")
                .with_metadata("category", "blush-bronzer"),
        ]);

        let ids: Vec<_> = catalog.in_category("face-powder").map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["prod_1"]);
        assert!(catalog.get("prod_2").is_some());
    }

    #[test]
    fn test_select_variant() {
        let variants = vec![
            lipstick().with_metadata("variant", "light"),
            Product::new("prod_3", "Rose Powder")
                .with_metadata("slug", "rose-powder")
                .with_metadata("variant", "dark"),
        ];

        assert_eq!(select_variant(&variants, None).map(|p| p.id.as_str()), Some("prod_1"));
        assert_eq!(select_variant(&variants, Some("dark")).map(|p| p.id.as_str()), Some("prod_3"));
        assert!(select_variant(&variants, Some("missing")).is_none());

        let single = vec![lipstick()];
        assert_eq!(select_variant(&single, Some("dark")).map(|p| p.id.as_str()), Some("prod_1"));
        assert!(select_variant(&[], None).is_none());
    }
}
