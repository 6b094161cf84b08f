use super::ClientMetadata;
use super::SignupEmail;
use super::SignupSource;
use super::UtmTags;

/// Everything needed to upsert a row in `waitlist_signups`. Only constructible
/// from parsed parts.
#[derive(Debug, Clone)]
pub struct NewSignup {
    pub email: SignupEmail,
    pub source: SignupSource,
    pub utm: UtmTags,
    pub client: ClientMetadata,
}
