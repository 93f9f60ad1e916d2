//! # Cart Service
//!
//! Cart operations over the commerce backend. The cart lives in a
//! PaymentIntent; every read re-fetches the intent and each product in it.
//! Cookie writes are left to the handlers, which turn the returned
//! [`CartCookie`] into a `Set-Cookie` header.

use crate::cache::{tags, TagCache};
use shop_core::{
    BoxedCommerceProvider, Cart, CartCookie, CartLine, CartMetadata, StoreError, StoreResult,
};
use tracing::{error, info, instrument, warn};

/// Result of resolving the cart id for a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartId {
    pub id: String,
    /// Cookie to set when a placeholder id was issued
    pub new_cookie: Option<CartCookie>,
}

#[derive(Clone)]
pub struct CartService {
    commerce: BoxedCommerceProvider,
    cache: TagCache,
}

impl CartService {
    pub fn new(commerce: BoxedCommerceProvider, cache: TagCache) -> Self {
        Self { commerce, cache }
    }

    /// Cart the cookie points at. Every failure is logged and reads as no cart.
    pub async fn get_cart(&self, cookie: Option<&CartCookie>) -> Option<Cart> {
        let cookie = cookie?;
        if cookie.is_placeholder() {
            return None;
        }

        match self.load(&cookie.id).await {
            Ok(cart) => cart,
            Err(e) => {
                error!("Failed to load cart {}: {}", cookie.id, e);
                None
            }
        }
    }

    async fn load(&self, cart_id: &str) -> StoreResult<Option<Cart>> {
        let intent = self.commerce.retrieve_payment_intent(cart_id).await?;
        let Some(entries) = CartMetadata::decode(&intent.metadata) else {
            return Ok(None);
        };

        let mut lines = Vec::with_capacity(entries.len());
        for (product_id, quantity) in entries.entries {
            let product = self.commerce.retrieve_product(&product_id).await?;
            lines.push(CartLine { product, quantity });
        }

        Ok(Some(Cart::from_intent(intent, lines)))
    }

    /// Id of the existing cart, or a fresh placeholder the caller must store
    pub async fn find_or_create_cart_id(
        &self,
        cookie: Option<&CartCookie>,
        now_millis: i64,
    ) -> CartId {
        if let Some(cart) = self.get_cart(cookie).await {
            return CartId {
                id: cart.id,
                new_cookie: None,
            };
        }

        let placeholder = CartCookie::placeholder(now_millis);
        CartId {
            id: placeholder.id.clone(),
            new_cookie: Some(placeholder),
        }
    }

    /// Point the browser at `cart_id` and drop anything cached for it
    pub fn set_initial_cart_cookie(&self, cart_id: &str, lines_count: u32) -> CartCookie {
        self.cache.invalidate_tag(&tags::cart(cart_id));
        CartCookie::new(cart_id, lines_count)
    }

    /// Add `quantity` of `product_id`, creating the PaymentIntent on first add
    #[instrument(skip(self, cookie), fields(cart_id = cookie.map(|c| c.id.as_str())))]
    pub async fn add_to_cart(
        &self,
        cookie: Option<&CartCookie>,
        product_id: &str,
        quantity: u32,
    ) -> StoreResult<Cart> {
        if product_id.trim().is_empty() {
            return Err(StoreError::InvalidRequest("Invalid product ID".to_string()));
        }
        if quantity < 1 {
            return Err(StoreError::InvalidRequest("Invalid quantity".to_string()));
        }

        let product = self.commerce.retrieve_product(product_id).await?;
        let price = product
            .default_price
            .clone()
            .ok_or_else(|| StoreError::PriceNotFound {
                product_id: product.id.clone(),
            })?;

        let cart = match self.get_cart(cookie).await {
            Some(mut cart) if cart.client_secret.is_some() => {
                cart.add(product, quantity)?;
                let intent = self
                    .commerce
                    .update_payment_intent(&cart.id, Some(cart.total()), &cart.encoded_metadata())
                    .await?;
                Cart::from_intent(intent, cart.lines)
            }
            _ => {
                let mut cart = Cart::empty(&price.currency);
                cart.add(product, quantity)?;
                let intent = self
                    .commerce
                    .create_payment_intent(cart.total(), &price.currency, &cart.encoded_metadata())
                    .await?;
                info!("Created cart {}", intent.id);
                Cart::from_intent(intent, cart.lines)
            }
        };

        self.cache.invalidate_tag(&tags::cart(&cart.id));
        Ok(cart)
    }

    /// Set a line's quantity; zero removes the line
    #[instrument(skip(self, cookie), fields(cart_id = cookie.map(|c| c.id.as_str())))]
    pub async fn set_quantity(
        &self,
        cookie: Option<&CartCookie>,
        product_id: &str,
        quantity: u32,
    ) -> StoreResult<Cart> {
        let mut cart = self.require_cart(cookie).await?;
        if !cart.set_quantity(product_id, quantity) {
            return Err(StoreError::ProductNotFound {
                product_id: product_id.to_string(),
            });
        }
        self.save(cart).await
    }

    pub async fn increase(&self, cookie: Option<&CartCookie>, product_id: &str) -> StoreResult<Cart> {
        let current = self.current_quantity(cookie, product_id).await?;
        self.set_quantity(cookie, product_id, current.saturating_add(1))
            .await
    }

    pub async fn decrease(&self, cookie: Option<&CartCookie>, product_id: &str) -> StoreResult<Cart> {
        let current = self.current_quantity(cookie, product_id).await?;
        self.set_quantity(cookie, product_id, current.saturating_sub(1))
            .await
    }

    /// Forget the cart. The PaymentIntent itself is left in Stripe.
    pub fn clear_cart(&self, cookie: Option<&CartCookie>) {
        if let Some(cookie) = cookie {
            self.cache.invalidate_tag(&tags::cart(&cookie.id));
        }
        self.cache.invalidate_tag(tags::ADMIN_ORDERS);
    }

    async fn require_cart(&self, cookie: Option<&CartCookie>) -> StoreResult<Cart> {
        let cart_id = cookie.map(|c| c.id.clone()).unwrap_or_default();
        self.get_cart(cookie)
            .await
            .ok_or(StoreError::CartNotFound { cart_id })
    }

    async fn current_quantity(
        &self,
        cookie: Option<&CartCookie>,
        product_id: &str,
    ) -> StoreResult<u32> {
        self.require_cart(cookie)
            .await?
            .quantity_of(product_id)
            .ok_or_else(|| StoreError::ProductNotFound {
                product_id: product_id.to_string(),
            })
    }

    /// Write lines and amount back to the PaymentIntent. Stripe rejects a
    /// zero amount, so an emptied cart only has its metadata rewritten.
    async fn save(&self, cart: Cart) -> StoreResult<Cart> {
        let amount = (!cart.is_empty()).then(|| cart.total());
        if amount.is_none() {
            warn!("Cart {} is now empty", cart.id);
        }

        let intent = self
            .commerce
            .update_payment_intent(&cart.id, amount, &cart.encoded_metadata())
            .await?;
        let cart = Cart::from_intent(intent, cart.lines);
        self.cache.invalidate_tag(&tags::cart(&cart.id));
        Ok(cart)
    }
}
