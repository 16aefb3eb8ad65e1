//! Value Objects - Immutable domain primitives
//!
//! Value objects are identified by their value rather than identity.
//! `NormalizedKey` is the only form in which a postcode reaches the
//! resolution cache or the geocoding provider.

use crate::domain::error::GeocodeError;
use serde::Serialize;
use std::fmt;

/// Shortest compact UK postcode ("A9 9AA" without the space).
const MIN_COMPACT_LEN: usize = 5;
/// Longest compact UK postcode ("AA9A 9AA" without the space).
const MAX_COMPACT_LEN: usize = 7;
/// The inward code is always the last three characters.
const INWARD_LEN: usize = 3;

/// Canonical lookup key for a postcode.
///
/// Uppercase, with exactly one space between the outward and inward
/// codes (e.g. `"SW1A 1AA"`). Can only be built through [`normalize`],
/// so every instance is structurally valid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NormalizedKey(String);

impl NormalizedKey {
    /// Parse a raw postcode. Same as [`normalize`].
    pub fn parse(raw: &str) -> Result<Self, GeocodeError> {
        normalize(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Outward code (area + district), e.g. `"SW1A"`.
    pub fn outward(&self) -> &str {
        let split = self.0.len() - INWARD_LEN - 1;
        &self.0[..split]
    }

    /// Inward code (sector + unit), e.g. `"1AA"`.
    pub fn inward(&self) -> &str {
        &self.0[self.0.len() - INWARD_LEN..]
    }
}

impl fmt::Display for NormalizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Canonicalize a raw postcode string.
///
/// Whitespace anywhere in the input is dropped, letters are uppercased and
/// the result is re-split into `OUTWARD INWARD`. Fails with
/// [`GeocodeError::InvalidFormat`] when the input is empty, contains
/// anything other than ASCII letters, digits and whitespace, or does not
/// have the shape of a UK postcode.
///
/// Pure and idempotent: `normalize(normalize(x)?.as_str()) == normalize(x)`.
///
/// # Examples
/// ```
/// use postcode_geocoder::domain::value_objects::normalize;
///
/// assert_eq!(normalize(" sw1a1aa ").unwrap().as_str(), "SW1A 1AA");
/// assert!(normalize("").is_err());
/// ```
pub fn normalize(raw: &str) -> Result<NormalizedKey, GeocodeError> {
    let mut compact = String::with_capacity(MAX_COMPACT_LEN);

    for c in raw.chars() {
        if c.is_whitespace() {
            continue;
        }
        if !c.is_ascii_alphanumeric() {
            return Err(GeocodeError::invalid(raw, "unexpected character"));
        }
        compact.push(c.to_ascii_uppercase());
    }

    if compact.is_empty() {
        return Err(GeocodeError::invalid(raw, "empty postcode"));
    }
    if !(MIN_COMPACT_LEN..=MAX_COMPACT_LEN).contains(&compact.len()) {
        return Err(GeocodeError::invalid(raw, "wrong length"));
    }

    let (outward, inward) = compact.split_at(compact.len() - INWARD_LEN);

    if !is_valid_outward(outward) {
        return Err(GeocodeError::invalid(raw, "malformed outward code"));
    }
    if !is_valid_inward(inward) {
        return Err(GeocodeError::invalid(raw, "malformed inward code"));
    }

    Ok(NormalizedKey(format!("{} {}", outward, inward)))
}

/// Outward code: starts with a letter and carries the district digit.
fn is_valid_outward(outward: &str) -> bool {
    let bytes = outward.as_bytes();
    !bytes.is_empty()
        && bytes[0].is_ascii_alphabetic()
        && bytes.iter().any(|b| b.is_ascii_digit())
}

/// Inward code: one digit followed by two letters.
fn is_valid_inward(inward: &str) -> bool {
    let bytes = inward.as_bytes();
    bytes.len() == INWARD_LEN
        && bytes[0].is_ascii_digit()
        && bytes[1].is_ascii_alphabetic()
        && bytes[2].is_ascii_alphabetic()
}
