//! # Cart Types
//!
//! The cart is not stored anywhere of its own. It is a Stripe PaymentIntent
//! whose metadata carries the lines as comma-joined `productIds` and
//! `productQuantities`; the browser keeps only a [`CartCookie`] pointing at it.

use crate::error::{StoreError, StoreResult};
use crate::product::{Currency, Product};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the cookie holding the cart pointer
pub const CART_COOKIE_NAME: &str = "yns_cart";

/// PaymentIntent metadata key listing product ids
pub const PRODUCT_IDS_KEY: &str = "productIds";

/// PaymentIntent metadata key listing quantities, aligned with product ids
pub const PRODUCT_QUANTITIES_KEY: &str = "productQuantities";

/// PaymentIntent metadata key with the number of lines
pub const PRODUCT_COUNT_KEY: &str = "productCount";

/// Set on the PaymentIntent once the webhook has taken stock for it
pub const STOCK_APPLIED_KEY: &str = "stockApplied";

/// Prefix of placeholder cart ids issued before any PaymentIntent exists
pub const TEMP_CART_PREFIX: &str = "temp_cart_";

/// Browser-side pointer to the cart PaymentIntent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartCookie {
    /// PaymentIntent id, or a `temp_cart_` placeholder
    pub id: String,
    /// Number of distinct lines, for the nav badge
    pub lines_count: u32,
}

impl CartCookie {
    pub fn new(id: impl Into<String>, lines_count: u32) -> Self {
        Self {
            id: id.into(),
            lines_count,
        }
    }

    /// Placeholder cart issued before the first add-to-cart
    pub fn placeholder(now_millis: i64) -> Self {
        Self::new(format!("{}{}", TEMP_CART_PREFIX, now_millis), 0)
    }

    /// Whether this cookie points at a real PaymentIntent
    pub fn is_placeholder(&self) -> bool {
        self.id.starts_with(TEMP_CART_PREFIX)
    }

    /// Serialize to the cookie value
    pub fn encode(&self) -> StoreResult<String> {
        serde_json::to_string(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Parse a cookie value; malformed values are treated as no cart
    pub fn decode(value: &str) -> Option<Self> {
        serde_json::from_str(value).ok()
    }
}

/// Cart lines as encoded in PaymentIntent metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartMetadata {
    pub entries: Vec<(String, u32)>,
}

impl CartMetadata {
    /// Decode lines from PaymentIntent metadata.
    ///
    /// Returns `None` when `productIds` is absent or empty. Quantities that are
    /// missing, unparseable or zero default to 1; arrays of different length
    /// are tolerated.
    pub fn decode(metadata: &BTreeMap<String, String>) -> Option<Self> {
        let ids = metadata.get(PRODUCT_IDS_KEY).filter(|v| !v.trim().is_empty())?;
        let quantities: Vec<Option<u32>> = metadata
            .get(PRODUCT_QUANTITIES_KEY)
            .map(|q| q.split(',').map(|s| s.trim().parse().ok()).collect())
            .unwrap_or_default();

        let entries = ids
            .split(',')
            .enumerate()
            .filter_map(|(i, id)| {
                let id = id.trim();
                if id.is_empty() {
                    return None;
                }
                let quantity = quantities
                    .get(i)
                    .copied()
                    .flatten()
                    .filter(|q| *q > 0)
                    .unwrap_or(1);
                Some((id.to_string(), quantity))
            })
            .collect();

        Some(Self { entries })
    }

    /// Merge encoded lines into `base`, keeping every unrelated key
    pub fn encode_into(&self, mut base: BTreeMap<String, String>) -> BTreeMap<String, String> {
        let ids: Vec<&str> = self.entries.iter().map(|(id, _)| id.as_str()).collect();
        let quantities: Vec<String> = self.entries.iter().map(|(_, q)| q.to_string()).collect();
        base.insert(PRODUCT_IDS_KEY.to_string(), ids.join(","));
        base.insert(PRODUCT_QUANTITIES_KEY.to_string(), quantities.join(","));
        base.insert(PRODUCT_COUNT_KEY.to_string(), self.entries.len().to_string());
        base
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A Stripe PaymentIntent as seen by the cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl PaymentIntent {
    /// Whether the webhook already decremented stock for this intent
    pub fn stock_applied(&self) -> bool {
        self.metadata.get(STOCK_APPLIED_KEY).map(String::as_str) == Some("true")
    }
}

/// One reconstructed cart line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product: Product,
    pub quantity: u32,
}

impl CartLine {
    /// Unit price times quantity, saturating at `i64::MAX`
    pub fn total(&self) -> i64 {
        self.product
            .unit_amount()
            .saturating_mul(i64::from(self.quantity))
    }
}

/// A cart rebuilt from its PaymentIntent and live product data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    /// PaymentIntent id
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub currency: String,
    /// Amount currently set on the PaymentIntent
    pub amount: i64,
    pub metadata: BTreeMap<String, String>,
    pub lines: Vec<CartLine>,
}

impl Cart {
    /// Empty cart with no backing PaymentIntent yet
    pub fn empty(currency: &Currency) -> Self {
        Self {
            id: String::new(),
            client_secret: None,
            currency: currency.as_str().to_string(),
            amount: 0,
            metadata: BTreeMap::new(),
            lines: Vec::new(),
        }
    }

    /// Cart over an existing PaymentIntent
    pub fn from_intent(intent: PaymentIntent, lines: Vec<CartLine>) -> Self {
        Self {
            id: intent.id,
            client_secret: intent.client_secret,
            currency: intent.currency,
            amount: intent.amount,
            metadata: intent.metadata,
            lines,
        }
    }

    /// Add `quantity` of `product`, summing into an existing line.
    ///
    /// Fails without touching the cart when the summed quantity does not
    /// fit in a `u32`.
    pub fn add(&mut self, product: Product, quantity: u32) -> StoreResult<()> {
        match self.lines.iter_mut().find(|l| l.product.id == product.id) {
            Some(line) => {
                line.quantity = line
                    .quantity
                    .checked_add(quantity)
                    .ok_or_else(|| StoreError::InvalidRequest("Invalid quantity".to_string()))?;
            }
            None => self.lines.push(CartLine { product, quantity }),
        }
        Ok(())
    }

    /// Set a line's quantity; zero removes it. Returns false when the
    /// product is not in the cart.
    pub fn set_quantity(&mut self, product_id: &str, quantity: u32) -> bool {
        let Some(index) = self.lines.iter().position(|l| l.product.id == product_id) else {
            return false;
        };
        if quantity == 0 {
            self.lines.remove(index);
        } else if let Some(line) = self.lines.get_mut(index) {
            line.quantity = quantity;
        }
        true
    }

    pub fn quantity_of(&self, product_id: &str) -> Option<u32> {
        self.lines
            .iter()
            .find(|l| l.product.id == product_id)
            .map(|l| l.quantity)
    }

    /// Sum of unit price times quantity over all lines
    pub fn total(&self) -> i64 {
        self.lines
            .iter()
            .map(CartLine::total)
            .fold(0, i64::saturating_add)
    }

    /// Total number of units
    pub fn item_count(&self) -> u32 {
        self.lines
            .iter()
            .map(|l| l.quantity)
            .fold(0, u32::saturating_add)
    }

    pub fn lines_count(&self) -> u32 {
        self.lines.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Encoded line metadata for the PaymentIntent
    pub fn encoded_metadata(&self) -> BTreeMap<String, String> {
        CartMetadata {
            entries: self
                .lines
                .iter()
                .map(|l| (l.product.id.clone(), l.quantity))
                .collect(),
        }
        .encode_into(self.metadata.clone())
    }

    /// Cookie pointing at this cart
    pub fn cookie(&self) -> CartCookie {
        CartCookie::new(self.id.clone(), self.lines_count())
    }
}
