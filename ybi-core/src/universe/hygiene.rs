//! Symbol hygiene — excluding warrants, units, rights, preferreds and
//! other non-common listings from the candidate pool.
//!
//! Patterns come in two classes. Unambiguous ones (explicit warrant/unit
//! suffixes, test symbols with `^`) are always excluded. Ambiguous ones (a
//! trailing `W` or `P` on longer symbols) collide with legitimate commons,
//! so they apply only when no reference data is available; a present
//! reference record is authoritative either way.

use crate::domain::ReferenceRecord;

/// Suffixes that always denote a non-common instrument.
const UNAMBIGUOUS_SUFFIXES: &[&str] = &[".WS", ".W", ".U", ".R"];

pub fn matches_unambiguous(ticker: &str) -> bool {
    ticker.contains('^') || UNAMBIGUOUS_SUFFIXES.iter().any(|s| ticker.ends_with(s))
}

/// Trailing `W` (warrant) or `P` (preferred) on 5+ character symbols.
/// Shorter symbols are exempt: 4-letter commons like SNOW would otherwise
/// be false positives.
pub fn matches_ambiguous(ticker: &str) -> bool {
    ticker.len() >= 5
        && !ticker.contains('.')
        && (ticker.ends_with('W') || ticker.ends_with('P'))
}

/// Is this ticker acceptable for the candidate pool?
///
/// `reference` is the record when available; pass `None` both when the
/// provider has no record and when reference filtering is disabled.
pub fn is_clean(ticker: &str, reference: Option<&ReferenceRecord>) -> bool {
    if matches_unambiguous(ticker) {
        return false;
    }
    match reference {
        // Reference data is authoritative; ambiguous patterns are skipped.
        Some(record) => record.is_eligible(),
        None => !matches_ambiguous(ticker),
    }
}
