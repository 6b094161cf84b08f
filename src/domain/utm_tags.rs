use super::truncate;

const MAX_LENGTH: usize = 100;

/// Campaign attribution sent along with the form. Each tag is optional and cut
/// to 100 characters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtmTags {
    pub source: Option<String>,
    pub medium: Option<String>,
    pub campaign: Option<String>,
}

impl UtmTags {
    pub fn parse(
        source: Option<&str>,
        medium: Option<&str>,
        campaign: Option<&str>,
    ) -> Self {
        let clip = |tag: Option<&str>| tag.map(|t| truncate(t, MAX_LENGTH));
        Self {
            source: clip(source),
            medium: clip(medium),
            campaign: clip(campaign),
        }
    }
}
