// the admin listing is used by a single operator (or a script), so a shared
// secret in a header is enough; there are no users, sessions or passwords

use actix_web::http::header::HeaderMap;
use anyhow::Context;
use secrecy::ExposeSecret;
use secrecy::Secret;
use subtle::ConstantTimeEq;

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Server-side admin secret. An empty or absent secret means "no admin access
/// at all"; there is no unauthenticated fallback.
#[derive(Clone)]
pub struct AdminKey(Option<Secret<String>>);

impl AdminKey {
    pub fn new(key: Option<Secret<String>>) -> Self {
        Self(key.filter(|k| !k.expose_secret().is_empty()))
    }

    /// Check the `x-admin-key` header against the configured secret. The `Err`
    /// explains why (for logs only; callers must not show it).
    pub fn verify(
        &self,
        headers: &HeaderMap,
    ) -> Result<(), anyhow::Error> {
        let expected = self.0.as_ref().context("No admin key configured")?;
        let supplied = headers
            .get(ADMIN_KEY_HEADER)
            .context("No x-admin-key header")?
            .to_str()
            .context("Invalid str")?;
        // constant time, so the key cannot be guessed byte by byte
        match bool::from(
            supplied
                .as_bytes()
                .ct_eq(expected.expose_secret().as_bytes()),
        ) {
            true => Ok(()),
            false => anyhow::bail!("Admin key does not match"),
        }
    }
}
