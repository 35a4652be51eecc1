//! Transport and permission address construction.
//!
//! A transport base is a `ws://` or `wss://` URL template. The per-room
//! address is the base with its `room` query parameter set to the current
//! room, replacing any `room` parameter the base already carries and keeping
//! every other parameter in order.
//!
//! The permission collaborator is asked about the same address, either with
//! the stream scheme rewritten to its HTTP equivalent or unchanged, depending
//! on [`PermissionScheme`].

use url::Url;

use crate::error::AddressError;

/// Compiled-in transport base used when the configured one is unusable.
pub const DEFAULT_TRANSPORT_BASE: &str = "ws://127.0.0.1:8765/stream";

/// Name of the query parameter carrying the room.
pub const ROOM_PARAM: &str = "room";

/// How a transport address is presented to the permission collaborator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PermissionScheme {
    /// `ws` becomes `http`, `wss` becomes `https`.
    #[default]
    HttpRewrite,
    /// The stream address is passed through unchanged.
    Stream,
}

impl PermissionScheme {
    /// Parse a scheme name as accepted on the command line.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "http" | "http-rewrite" => Some(Self::HttpRewrite),
            "stream" | "ws" => Some(Self::Stream),
            _ => None,
        }
    }
}

/// Parse and validate a transport base.
///
/// # Errors
///
/// - [`AddressError::Malformed`] if the base is not a URL
/// - [`AddressError::UnsupportedScheme`] if the scheme is not `ws`/`wss`
/// - [`AddressError::MissingHost`] if the URL has no host
pub fn parse_base(base: &str) -> Result<Url, AddressError> {
    let url = Url::parse(base.trim()).map_err(|e| AddressError::Malformed {
        base: base.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "ws" | "wss" => {},
        other => return Err(AddressError::UnsupportedScheme { scheme: other.to_string() }),
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(AddressError::MissingHost { base: base.to_string() });
    }

    Ok(url)
}

/// Validate a configured base, substituting [`DEFAULT_TRANSPORT_BASE`] when it
/// is missing or unusable.
pub fn normalize_base(base: Option<&str>) -> String {
    let Some(base) = base.map(str::trim).filter(|b| !b.is_empty()) else {
        return DEFAULT_TRANSPORT_BASE.to_string();
    };

    match parse_base(base) {
        Ok(url) => url.to_string(),
        Err(e) => {
            tracing::warn!("Ignoring transport base: {e}; using {DEFAULT_TRANSPORT_BASE}");
            DEFAULT_TRANSPORT_BASE.to_string()
        },
    }
}

/// Build the per-room transport address from a base.
///
/// # Errors
///
/// Any [`AddressError`] from [`parse_base`].
pub fn room_address(base: &str, room: &str) -> Result<Url, AddressError> {
    let mut url = parse_base(base)?;

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != ROOM_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    url.query_pairs_mut().clear().extend_pairs(kept).append_pair(ROOM_PARAM, room);

    Ok(url)
}

/// Build the per-room address, retrying once with the compiled-in default
/// base if the configured one is unusable.
///
/// # Errors
///
/// The error from the default base if both attempts fail.
pub fn room_address_with_fallback(base: &str, room: &str) -> Result<Url, AddressError> {
    room_address(base, room).or_else(|e| {
        tracing::warn!("Transport base unusable ({e}), falling back to {DEFAULT_TRANSPORT_BASE}");
        room_address(DEFAULT_TRANSPORT_BASE, room)
    })
}

/// Present a transport address the way the permission collaborator expects.
pub fn permission_address(address: &Url, scheme: PermissionScheme) -> String {
    match scheme {
        PermissionScheme::Stream => address.to_string(),
        PermissionScheme::HttpRewrite => {
            let target = if address.scheme() == "wss" { "https" } else { "http" };
            let mut rewritten = address.clone();
            if rewritten.set_scheme(target).is_err() {
                return address.to_string();
            }
            rewritten.to_string()
        },
    }
}
