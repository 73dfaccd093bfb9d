//! Incoming and outgoing cookies.
//!
//! # Responsibilities
//! - Parse `Cookie` request headers into a name → value map
//! - Collect `Set-Cookie` values produced while a request is handled
//! - Render session [`Options`] into cookie attributes
//! - Validate cookie names

use std::collections::HashMap;

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use cookie::time::{Duration, OffsetDateTime};
use cookie::Cookie;

use crate::session::options::Options;

/// Cookies sent by the client.
#[derive(Debug, Clone, Default)]
pub struct RequestCookies {
    values: HashMap<String, String>,
}

impl RequestCookies {
    /// Parse every `Cookie` header. When a name appears more than once, the
    /// first occurrence wins.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut values = HashMap::new();
        for header in headers.get_all(COOKIE) {
            let Ok(raw) = header.to_str() else {
                continue;
            };
            for cookie in Cookie::split_parse(raw).flatten() {
                values
                    .entry(cookie.name().to_string())
                    .or_insert_with(|| cookie.value().to_string());
            }
        }
        Self { values }
    }

    /// Build from explicit pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut values = HashMap::new();
        for (k, v) in pairs {
            values.entry(k.into()).or_insert_with(|| v.into());
        }
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Cookies to send back with the response.
#[derive(Debug, Clone, Default)]
pub struct ResponseCookies {
    cookies: Vec<Cookie<'static>>,
}

impl ResponseCookies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a cookie. Every queued cookie becomes one `Set-Cookie` header.
    pub fn set(&mut self, cookie: Cookie<'static>) {
        self.cookies.push(cookie);
    }

    /// The most recently queued cookie named `name`.
    pub fn get(&self, name: &str) -> Option<&Cookie<'static>> {
        self.cookies.iter().rev().find(|c| c.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cookie<'static>> {
        self.cookies.iter()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Append one `Set-Cookie` header per queued cookie.
    pub fn apply_to(&self, headers: &mut HeaderMap) {
        for cookie in &self.cookies {
            match HeaderValue::from_str(&cookie.to_string()) {
                Ok(value) => {
                    headers.append(SET_COOKIE, value);
                }
                Err(e) => {
                    tracing::warn!(cookie = %cookie.name(), error = %e, "Dropping unrenderable cookie");
                }
            }
        }
    }
}

/// Build a cookie carrying `value` with the attributes in `options`.
///
/// `Expires` is set alongside `Max-Age` for clients that only understand the
/// former: `max_age > 0` expires that many seconds from now, `max_age < 0`
/// expires at the epoch with `Max-Age=0`.
pub fn new_cookie(name: &str, value: &str, options: &Options) -> Cookie<'static> {
    let mut builder = Cookie::build((name.to_string(), value.to_string()))
        .path(options.path.clone())
        .secure(options.secure)
        .http_only(options.http_only);

    if !options.domain.is_empty() {
        builder = builder.domain(options.domain.clone());
    }

    if options.max_age > 0 {
        let lifetime = Duration::seconds(options.max_age);
        builder = builder
            .max_age(lifetime)
            .expires(OffsetDateTime::now_utc() + lifetime);
    } else if options.max_age < 0 {
        builder = builder
            .max_age(Duration::ZERO)
            .expires(OffsetDateTime::UNIX_EPOCH + Duration::seconds(1));
    }

    builder.build()
}

/// True when `name` is a non-empty RFC 6265 token.
pub fn is_cookie_name_valid(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(is_token_byte)
}

fn is_token_byte(b: u8) -> bool {
    const SEPARATORS: &[u8] = b"()<>@,;:\\\"/[]?={} \t";
    (0x21..0x7f).contains(&b) && !SEPARATORS.contains(&b)
}
