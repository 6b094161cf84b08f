mod client_metadata;
mod new_signup;
mod signup_email;
mod signup_source;
mod utm_tags;
// allow external `use` statements to skip `new_signup` etc
pub use client_metadata::ClientMetadata;
pub use client_metadata::UNKNOWN_CLIENT;
pub use new_signup::NewSignup;
pub use signup_email::SignupEmail;
pub use signup_source::SignupSource;
pub use utm_tags::UtmTags;

use unicode_segmentation::UnicodeSegmentation;

/// Keep at most `max` chars of `value`. Only whole graphemes are kept, so a
/// base character is never separated from its combining marks; a grapheme that
/// would cross the limit is dropped along with everything after it.
pub(crate) fn truncate(
    value: &str,
    max: usize,
) -> String {
    let mut kept = 0;
    value
        .graphemes(true)
        .take_while(|g| {
            kept += g.chars().count();
            kept <= max
        })
        .collect()
}
