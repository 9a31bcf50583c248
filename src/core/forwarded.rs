//! Forwarded record: original client and host as reported by a reverse proxy.
//!
//! Parsed from the RFC 7239 `Forwarded` header, or from the de-facto
//! `X-Forwarded-For` / `X-Forwarded-Host` / `X-Forwarded-Proto` family.
//! Only the first hop (closest to the client) is kept.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv6Addr};

use http::HeaderMap;

/// Client node from the `for` parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ForwardedFor {
    pub ip: IpAddr,
    pub port: Option<u16>,
}

/// Forwarded record attached to a request by a trusted proxy middleware.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Forwarded {
    client: Option<ForwardedFor>,
    fields: HashMap<String, String>,
}

impl Forwarded {
    pub fn new(client: Option<ForwardedFor>, fields: HashMap<String, String>) -> Self {
        Self { client, fields }
    }

    /// Original client, when the proxy disclosed a usable address.
    #[inline]
    pub fn client(&self) -> Option<ForwardedFor> {
        self.client
    }

    /// Named parameter (`host`, `proto`, `by`, `for`), case-insensitive.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    #[inline]
    pub fn host(&self) -> Option<&str> {
        self.field("host")
    }

    #[inline]
    pub fn proto(&self) -> Option<&str> {
        self.field("proto")
    }

    /// Parse the first element of a `Forwarded` header value.
    pub fn from_forwarded_header(value: &str) -> Option<Self> {
        let first = split_unquoted(value, ',').into_iter().next()?;
        let mut fields = HashMap::new();

        for pair in split_unquoted(first, ';') {
            let Some((key, val)) = pair.split_once('=') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let val = unquote(val.trim());
            if key.is_empty() || val.is_empty() {
                continue;
            }
            fields.entry(key).or_insert_with(|| val.to_string());
        }

        if fields.is_empty() {
            return None;
        }

        let client = fields.get("for").and_then(|v| parse_node(v));
        Some(Self { client, fields })
    }

    /// Build a record from the `X-Forwarded-*` headers.
    pub fn from_x_forwarded(headers: &HeaderMap) -> Option<Self> {
        let first_value = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let mut fields = HashMap::new();
        if let Some(v) = first_value("x-forwarded-for") {
            fields.insert("for".to_string(), v.to_string());
        }
        if let Some(v) = first_value("x-forwarded-host") {
            fields.insert("host".to_string(), v.to_string());
        }
        if let Some(v) = first_value("x-forwarded-proto") {
            fields.insert("proto".to_string(), v.to_ascii_lowercase());
        }

        if fields.is_empty() {
            return None;
        }

        let client = fields.get("for").and_then(|v| parse_node(v));
        Some(Self { client, fields })
    }

    /// `Forwarded` takes precedence over `X-Forwarded-*`.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get(http::header::FORWARDED)
            .and_then(|v| v.to_str().ok())
            .and_then(Self::from_forwarded_header)
            .or_else(|| Self::from_x_forwarded(headers))
    }
}

/// Parse a node identifier: `192.0.2.43`, `192.0.2.43:8080`,
/// `[2001:db8::1]:4711`, `2001:db8::1`. Obfuscated and `unknown` nodes
/// yield `None`.
fn parse_node(value: &str) -> Option<ForwardedFor> {
    let value = unquote(value.trim());

    if let Some(rest) = value.strip_prefix('[') {
        let (ip, tail) = rest.split_once(']')?;
        let ip: Ipv6Addr = ip.parse().ok()?;
        let port = tail.strip_prefix(':').and_then(|p| p.parse().ok());
        return Some(ForwardedFor {
            ip: IpAddr::V6(ip),
            port,
        });
    }

    if let Ok(ip) = value.parse::<IpAddr>() {
        return Some(ForwardedFor { ip, port: None });
    }

    let (ip, port) = value.rsplit_once(':')?;
    let ip: IpAddr = ip.parse().ok()?;
    Some(ForwardedFor {
        ip,
        port: port.parse().ok(),
    })
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Split on `sep` outside of double quotes.
fn split_unquoted(value: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;

    for (i, c) in value.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c == sep && !in_quotes => {
                parts.push(value[start..i].trim());
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(value[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}
