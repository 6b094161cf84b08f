use validator::ValidateEmail;

/// Longest address accepted, per RFC 5321 path limits
const MAX_LENGTH: usize = 254;

/// A normalised (trimmed, lowercased) and syntactically valid email address.
/// This is the identity of a signup.
///
/// Must be instantiated with `SignupEmail::parse`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupEmail(String);

impl SignupEmail {
    /// On failure, the `Err` is a message that can be shown to the visitor.
    pub fn parse(email: &str) -> Result<Self, String> {
        let email = email.trim().to_lowercase();
        if email.chars().count() > MAX_LENGTH {
            return Err(format!("Email must be at most {MAX_LENGTH} characters"));
        }
        ValidateEmail::validate_email(&email)
            .then_some(Self(email))
            .ok_or("Invalid email address".to_string())
    }
}

impl AsRef<str> for SignupEmail {
    fn as_ref(&self) -> &str { &self.0 }
}
