//! Phone number canonicalization.
//!
//! Every equality comparison, dedup key, and duplicate grouping in this crate
//! uses the normalized form produced here; raw strings are kept only for
//! display in notes and reports.

/// Normalize a phone number for comparison.
///
/// - Strips every non-digit character.
/// - Drops the leading "1" from 11-digit national numbers.
/// - Rejects anything left with fewer than 10 digits.
///
/// Returns `None` when the input cannot be normalized; callers skip the
/// record in that case.
pub fn normalize(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    let digits = if digits.len() == 11 && digits.starts_with('1') {
        digits[1..].to_string()
    } else {
        digits
    };

    if digits.len() < 10 {
        return None;
    }

    Some(digits)
}

/// Build the search-variant set for a normalized number.
///
/// The CRM's phone search is format-sensitive: a lead stored as
/// "+12025550123" is not found by searching "2025550123". All variants are
/// queried together so any storage format matches. Country-code and
/// separator variants only apply to 10-digit national numbers.
pub fn search_variants(normalized: &str) -> Vec<String> {
    let mut variants = vec![normalized.to_string()];

    if normalized.len() == 10 {
        variants.push(format!("1{}", normalized));
        variants.push(format!("+1{}", normalized));
        variants.push(format!(
            "({}) {}-{}",
            &normalized[..3],
            &normalized[3..6],
            &normalized[6..]
        ));
    }

    variants
}
