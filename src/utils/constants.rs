//! Shared constants and invariants

/// Minimum remaining validity before a cached token is refreshed.
pub const DEFAULT_SAFETY_MARGIN_SECS: u64 = 300;
/// Assumed validity when the issuer reports no expiry.
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 600;

pub const UNARY_TIMEOUT_SECS: u64 = 10;
pub const STREAM_CONNECT_TIMEOUT_SECS: u64 = 30;
/// Idle bound on upstream reads; must exceed the upstream heartbeat
/// interval so a live-but-quiet stream is not cut off.
pub const STREAM_READ_TIMEOUT_SECS: u64 = 90;

pub const RELAY_CHANNEL_CAPACITY: usize = 32;

pub const DEFAULT_ISSUER_URL: &str = "http://metadata.google.internal";
pub const METADATA_FLAVOR_HEADER: &str = "Metadata-Flavor";
pub const METADATA_FLAVOR_VALUE: &str = "Google";
