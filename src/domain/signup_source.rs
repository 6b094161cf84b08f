use super::truncate;

const MAX_LENGTH: usize = 50;
const DEFAULT_SOURCE: &str = "homepage";

/// Free-form tag describing where a signup came from (e.g. `homepage`,
/// `footer`). Angle brackets are stripped, and the tag is cut to 50
/// characters. Never fails; a missing tag becomes `homepage`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupSource(String);

impl SignupSource {
    pub fn parse(source: Option<&str>) -> Self {
        match source {
            None => Self(DEFAULT_SOURCE.to_string()),
            Some(s) => {
                let stripped: String = s.chars().filter(|c| !matches!(c, '<' | '>')).collect();
                Self(truncate(&stripped, MAX_LENGTH))
            }
        }
    }
}

impl Default for SignupSource {
    fn default() -> Self { Self::parse(None) }
}

impl AsRef<str> for SignupSource {
    fn as_ref(&self) -> &str { &self.0 }
}
