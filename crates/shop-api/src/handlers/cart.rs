//! Cart endpoints. The cart id travels in the `yns_cart` cookie; every
//! mutating call answers with a refreshed cookie.

use super::catalog::ProductView;
use super::{error_response, masked_error, store_error_to_response, ApiError, JsonOrForm};
use crate::cookies::{cart_cookie, read_cart_cookie, removal_cookie, set_cookie_headers};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use shop_core::{Cart, CartCookie, CartLine, Price, StoreError, StoreResult, CART_COOKIE_NAME};
use tracing::{error, info, instrument};

const ADD_TO_CART_FAILED: &str = "Failed to add product to cart. Please try again.";

// =============================================================================
// Request/Response Types
// =============================================================================

/// Quantity as sent by a form (text) or JSON (number)
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum QuantityInput {
    Number(i64),
    Text(String),
}

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    #[serde(default, rename = "productId", alias = "product_id")]
    pub product_id: Option<String>,
    #[serde(default)]
    pub quantity: Option<QuantityInput>,
}

#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: u32,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitCartRequest {
    pub cart_id: String,
    #[serde(default)]
    pub lines_count: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartIdResponse {
    pub cart_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineView {
    pub product: ProductView,
    pub quantity: u32,
    pub line_total: i64,
}

impl From<&CartLine> for CartLineView {
    fn from(line: &CartLine) -> Self {
        Self {
            product: ProductView::from(&line.product),
            quantity: line.quantity,
            line_total: line.total(),
        }
    }
}

/// A cart shaped for display
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub id: String,
    /// For confirming the payment client-side
    pub client_secret: Option<String>,
    pub currency: String,
    /// Sum of line totals
    pub total: i64,
    pub formatted_total: Option<String>,
    pub item_count: u32,
    pub lines_count: u32,
    pub lines: Vec<CartLineView>,
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        let formatted_total = shop_core::Currency::parse(&cart.currency)
            .map(|c| Price::from_cents(cart.total(), c).display());
        Self {
            id: cart.id.clone(),
            client_secret: cart.client_secret.clone(),
            currency: cart.currency.clone(),
            total: cart.total(),
            formatted_total,
            item_count: cart.item_count(),
            lines_count: cart.lines_count(),
            lines: cart.lines.iter().map(CartLineView::from).collect(),
        }
    }
}

/// Parse a requested quantity; absent means 1
pub fn parse_quantity(input: Option<&QuantityInput>) -> StoreResult<u32> {
    let invalid = || StoreError::InvalidRequest("Invalid quantity".to_string());
    let n = match input {
        None => return Ok(1),
        Some(QuantityInput::Number(n)) => *n,
        Some(QuantityInput::Text(t)) if t.trim().is_empty() => return Ok(1),
        Some(QuantityInput::Text(t)) => t.trim().parse::<i64>().map_err(|_| invalid())?,
    };
    u32::try_from(n).ok().filter(|q| *q >= 1).ok_or_else(invalid)
}

fn cookie_headers(state: &AppState, cookie: &CartCookie) -> Result<HeaderMap, ApiError> {
    let cookie = cart_cookie(cookie, state.config.secure_cookies()).map_err(store_error_to_response)?;
    Ok(set_cookie_headers([cookie]))
}

fn cart_response(state: &AppState, cart: &Cart) -> Result<(HeaderMap, Json<CartView>), ApiError> {
    Ok((cookie_headers(state, &cart.cookie())?, Json(CartView::from(cart))))
}

// =============================================================================
// Handlers
// =============================================================================

/// `GET /api/cart` - the current cart, or `null`
#[instrument(skip_all)]
pub async fn get_cart(State(state): State<AppState>, headers: HeaderMap) -> Json<Option<CartView>> {
    let cookie = read_cart_cookie(&headers);
    let cart = state.carts().get_cart(cookie.as_ref()).await;
    Json(cart.as_ref().map(CartView::from))
}

/// `POST /api/cart` - add a product (form or JSON `productId`, `quantity`)
#[instrument(skip_all)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonOrForm(request): JsonOrForm<AddToCartRequest>,
) -> Result<(HeaderMap, Json<CartView>), ApiError> {
    let product_id = request
        .product_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, "Invalid product ID"))?;
    let quantity = parse_quantity(request.quantity.as_ref()).map_err(store_error_to_response)?;

    let cookie = read_cart_cookie(&headers);
    let cart = state
        .carts()
        .add_to_cart(cookie.as_ref(), product_id, quantity)
        .await
        .map_err(|e| {
            error!("Failed to add {} x{} to cart: {}", product_id, quantity, e);
            masked_error(&e, ADD_TO_CART_FAILED)
        })?;

    info!("Cart {} now has {} lines", cart.id, cart.lines_count());
    cart_response(&state, &cart)
}

/// `PUT /api/cart/lines/{product_id}`
#[instrument(skip(state, headers, request))]
pub async fn set_line_quantity(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<SetQuantityRequest>,
) -> Result<(HeaderMap, Json<CartView>), ApiError> {
    let cookie = read_cart_cookie(&headers);
    let cart = state
        .carts()
        .set_quantity(cookie.as_ref(), &product_id, request.quantity)
        .await
        .map_err(store_error_to_response)?;
    cart_response(&state, &cart)
}

/// `POST /api/cart/lines/{product_id}/increase`
#[instrument(skip(state, headers))]
pub async fn increase_line(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    headers: HeaderMap,
) -> Result<(HeaderMap, Json<CartView>), ApiError> {
    let cookie = read_cart_cookie(&headers);
    let cart = state
        .carts()
        .increase(cookie.as_ref(), &product_id)
        .await
        .map_err(store_error_to_response)?;
    cart_response(&state, &cart)
}

/// `POST /api/cart/lines/{product_id}/decrease`
#[instrument(skip(state, headers))]
pub async fn decrease_line(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    headers: HeaderMap,
) -> Result<(HeaderMap, Json<CartView>), ApiError> {
    let cookie = read_cart_cookie(&headers);
    let cart = state
        .carts()
        .decrease(cookie.as_ref(), &product_id)
        .await
        .map_err(store_error_to_response)?;
    cart_response(&state, &cart)
}

/// `DELETE /api/cart`
#[instrument(skip_all)]
pub async fn clear_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> (StatusCode, HeaderMap) {
    let cookie = read_cart_cookie(&headers);
    state.carts().clear_cart(cookie.as_ref());
    (
        StatusCode::NO_CONTENT,
        set_cookie_headers([removal_cookie(CART_COOKIE_NAME)]),
    )
}

/// `POST /api/cart/init` - point the cookie at an existing cart
#[instrument(skip(state))]
pub async fn init_cart(
    State(state): State<AppState>,
    Json(request): Json<InitCartRequest>,
) -> Result<(HeaderMap, Json<CartCookie>), ApiError> {
    if request.cart_id.trim().is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "cartId is required"));
    }
    let cookie = state
        .carts()
        .set_initial_cart_cookie(request.cart_id.trim(), request.lines_count);
    Ok((cookie_headers(&state, &cookie)?, Json(cookie)))
}

/// `POST /api/cart/id` - id of the current cart, issuing a placeholder
/// cookie when there is none yet
#[instrument(skip_all)]
pub async fn find_or_create_cart_id(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(HeaderMap, Json<CartIdResponse>), ApiError> {
    let cookie = read_cart_cookie(&headers);
    let resolved = state
        .carts()
        .find_or_create_cart_id(cookie.as_ref(), chrono::Utc::now().timestamp_millis())
        .await;

    let headers = match &resolved.new_cookie {
        Some(cookie) => cookie_headers(&state, cookie)?,
        None => HeaderMap::new(),
    };
    Ok((headers, Json(CartIdResponse { cart_id: resolved.id })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Option<QuantityInput> {
        Some(QuantityInput::Text(s.to_string()))
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity(None).unwrap(), 1);
        assert_eq!(parse_quantity(text("").as_ref()).unwrap(), 1);
        assert_eq!(parse_quantity(text(" 3 ").as_ref()).unwrap(), 3);
        assert_eq!(parse_quantity(Some(&QuantityInput::Number(2))).unwrap(), 2);

        assert!(parse_quantity(text("abc").as_ref()).is_err());
        assert!(parse_quantity(text("0").as_ref()).is_err());
        assert!(parse_quantity(Some(&QuantityInput::Number(-1))).is_err());
    }

    #[test]
    fn test_add_request_accepts_both_shapes() {
        let json: AddToCartRequest =
            serde_json::from_str(r#"{"productId":"prod_1","quantity":2}"#).unwrap();
        assert_eq!(json.product_id.as_deref(), Some("prod_1"));
        assert!(matches!(json.quantity, Some(QuantityInput::Number(2))));

        let json: AddToCartRequest =
            serde_json::from_str(r#"{"product_id":"prod_1","quantity":"4"}"#).unwrap();
        assert!(matches!(json.quantity, Some(QuantityInput::Text(ref q)) if q == "4"));
    }
}
