use super::truncate;

const MAX_HEADER_LENGTH: usize = 500;

/// Identifier used when no client address can be determined
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Best-effort information about the visitor, taken from request headers
/// rather than the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientMetadata {
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

impl ClientMetadata {
    /// `user_agent` and `referrer` are cut to 500 characters; empty values are
    /// dropped.
    pub fn new(
        ip_address: String,
        user_agent: Option<&str>,
        referrer: Option<&str>,
    ) -> Self {
        let clip = |value: Option<&str>| {
            value
                .map(|v| truncate(v, MAX_HEADER_LENGTH))
                .filter(|v| !v.is_empty())
        };
        Self {
            ip_address,
            user_agent: clip(user_agent),
            referrer: clip(referrer),
        }
    }
}
