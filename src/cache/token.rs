use crate::helpers::time::now_unix;

/// Bearer token with its absolute expiry
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub value: String,
    pub expires_at: i64, // UNIX timestamp, seconds
}

impl CachedToken {
    pub fn new(value: String, expires_at: i64) -> Self {
        Self { value, expires_at }
    }

    /// Usable only while the remaining validity exceeds the safety margin.
    pub fn is_fresh(&self, safety_margin_secs: u64) -> bool {
        now_unix() < self.expires_at - safety_margin_secs as i64
    }
}
