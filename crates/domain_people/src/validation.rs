//! Identity field validation
//!
//! ORCID iDs are sixteen characters in four groups of four
//! (`0000-0002-1825-0097`). The final character is a check digit computed
//! with ISO 7064 MOD 11-2 over the first fifteen digits and may be `X`
//! (standing for 10).
//!
//! Users paste ORCID iDs in several shapes (bare, with or without dashes,
//! as a full `https://orcid.org/...` URL) so [`validate_orcid`] normalizes
//! to the canonical dashed form before checking.

use validator::ValidateEmail;

use crate::error::PeopleError;

const ORCID_URL_PREFIXES: [&str; 4] = [
    "https://orcid.org/",
    "http://orcid.org/",
    "https://www.orcid.org/",
    "orcid.org/",
];

/// Computes the ISO 7064 MOD 11-2 check character for the given base digits
///
/// # Arguments
///
/// * `base_digits` - The first fifteen digits of an ORCID iD (no dashes)
///
/// # Returns
///
/// The expected check character (`0`-`9` or `X`), or `None` if the input
/// contains a non-digit
pub fn orcid_check_digit(base_digits: &str) -> Option<char> {
    let mut total: u32 = 0;
    for c in base_digits.chars() {
        let digit = c.to_digit(10)?;
        total = (total + digit) * 2;
    }
    let remainder = total % 11;
    let result = (12 - remainder) % 11;
    Some(if result == 10 {
        'X'
    } else {
        char::from_digit(result, 10)?
    })
}

/// Validates an ORCID iD and returns it in canonical `dddd-dddd-dddd-dddX` form
///
/// # Errors
///
/// Returns `PeopleError::InvalidOrcid` if the value is not sixteen
/// characters (ignoring dashes and a URL prefix) or the check digit
/// does not match.
pub fn validate_orcid(raw: &str) -> Result<String, PeopleError> {
    let trimmed = raw.trim();
    let lowered = trimmed.to_ascii_lowercase();
    let without_prefix = ORCID_URL_PREFIXES
        .iter()
        .find(|prefix| lowered.starts_with(*prefix))
        .map(|prefix| &trimmed[prefix.len()..])
        .unwrap_or(trimmed);

    let compact: String = without_prefix
        .chars()
        .filter(|c| *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if compact.len() != 16 {
        return Err(PeopleError::InvalidOrcid(raw.to_string()));
    }

    let (base, check) = compact.split_at(15);
    let expected = orcid_check_digit(base)
        .ok_or_else(|| PeopleError::InvalidOrcid(raw.to_string()))?;
    if check.chars().next() != Some(expected) {
        return Err(PeopleError::InvalidOrcid(raw.to_string()));
    }

    Ok(format!(
        "{}-{}-{}-{}",
        &compact[0..4],
        &compact[4..8],
        &compact[8..12],
        &compact[12..16]
    ))
}

/// Validates an email address and returns it trimmed
pub fn validate_email(raw: &str) -> Result<String, PeopleError> {
    let trimmed = raw.trim();
    if trimmed.validate_email() {
        Ok(trimmed.to_string())
    } else {
        Err(PeopleError::InvalidEmail(raw.to_string()))
    }
}

/// Case-insensitive comparison used for email matching
pub(crate) fn same_email(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
