//! Cookie reading and `Set-Cookie` construction.

use axum::http::{header, HeaderMap, HeaderValue};
use cookie::time::Duration;
use cookie::{Cookie, SameSite};
use shop_core::{CartCookie, StoreResult, CART_COOKIE_NAME};
use tracing::warn;

const CART_COOKIE_MAX_AGE_DAYS: i64 = 30;

/// Value of the request cookie `name`, percent-decoded
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for raw in headers.get_all(header::COOKIE) {
        let Ok(raw) = raw.to_str() else {
            continue;
        };
        for cookie in Cookie::split_parse_encoded(raw).flatten() {
            if cookie.name() == name {
                return Some(cookie.value().to_string());
            }
        }
    }
    None
}

/// Cart pointer carried by the request, if any and well-formed
pub fn read_cart_cookie(headers: &HeaderMap) -> Option<CartCookie> {
    read_cookie(headers, CART_COOKIE_NAME).and_then(|v| CartCookie::decode(&v))
}

/// `yns_cart` cookie for `cart`
pub fn cart_cookie(cart: &CartCookie, secure: bool) -> StoreResult<Cookie<'static>> {
    Ok(Cookie::build((CART_COOKIE_NAME, cart.encode()?))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::days(CART_COOKIE_MAX_AGE_DAYS))
        .build())
}

/// Expired cookie that makes the browser drop `name`
pub fn removal_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::build((name, "")).path("/").build();
    cookie.make_removal();
    cookie
}

/// Response headers setting every cookie in `cookies`
pub fn set_cookie_headers<'c>(cookies: impl IntoIterator<Item = Cookie<'c>>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for cookie in cookies {
        match HeaderValue::from_str(&cookie.encoded().to_string()) {
            Ok(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            Err(e) => warn!("Dropping unencodable cookie {}: {}", cookie.name(), e),
        }
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn test_cart_cookie_round_trips_through_headers() {
        let cart = CartCookie::new("pi_123", 2);
        let response = set_cookie_headers([cart_cookie(&cart, false).unwrap()]);
        let set_cookie = response[header::SET_COOKIE].to_str().unwrap();

        assert!(set_cookie.starts_with("yns_cart="));
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("SameSite=Lax"));
        assert!(set_cookie.contains("Max-Age=2592000"));
        assert!(!set_cookie.contains("Secure"));

        // Browser sends back only name=value
        let pair = set_cookie.split(';').next().unwrap();
        let request = request_with(&format!("theme=dark; {}", pair));
        assert_eq!(read_cart_cookie(&request), Some(cart));
    }

    #[test]
    fn test_secure_flag() {
        let cookie = cart_cookie(&CartCookie::new("pi_1", 1), true).unwrap();
        assert_eq!(cookie.secure(), Some(true));
    }

    #[test]
    fn test_malformed_cart_cookie_is_no_cart() {
        assert_eq!(read_cart_cookie(&request_with("yns_cart=not-json")), None);
        assert_eq!(read_cart_cookie(&HeaderMap::new()), None);
    }

    #[test]
    fn test_removal_cookie_expires() {
        let headers = set_cookie_headers([removal_cookie(CART_COOKIE_NAME)]);
        let value = headers[header::SET_COOKIE].to_str().unwrap();
        assert!(value.starts_with("yns_cart=;"));
        assert!(value.contains("Max-Age=0"));
    }
}
