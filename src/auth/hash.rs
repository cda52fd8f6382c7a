//! bcrypt password hashing.
//!
//! Hashes are stored in Modular Crypt Format:
//!
//! ```text
//! $2b$10$N9qo8uLOickgx2ZMRZoMyeIjZAgcfl7p92ldGxad68LJZdL17lhWy
//! \__/\_/\____________________/\_____________________________/
//! tag cost    salt (22 chars)          digest (31 chars)
//! ```
//!
//! The string carries everything needed to verify a password later, so the
//! cost used at creation time does not have to match the current default.

use thiserror::Error;

pub const DEFAULT_COST: u32 = 10;
pub const MIN_COST: u32 = 4;
pub const MAX_COST: u32 = 31;

/// bcrypt only reads this many bytes of a password.
pub const MAX_PASSWORD_BYTES: usize = 72;

const HASH_LEN: usize = 60;
const SALT_AND_DIGEST_LEN: usize = 53;
const SUPPORTED_TAGS: [&str; 4] = ["2a", "2b", "2x", "2y"];

#[derive(Debug, Error)]
pub enum HashError {
    #[error("cost {0} is outside the supported range 4..=31")]
    InvalidCost(u32),
    #[error("password is {0} bytes; bcrypt only uses the first 72")]
    PasswordTooLong(usize),
    #[error("bcrypt failed: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),
}

/// A stored hash that cannot be parsed. This is a data-integrity problem with
/// the record, not a failed login.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MalformedHash {
    #[error("expected 60 characters, found {0}")]
    Length(usize),
    #[error("expected layout $<tag>$<cost>$<salt+digest>")]
    Layout,
    #[error("unknown algorithm tag {0:?}")]
    UnknownTag(String),
    #[error("invalid cost field {0:?}")]
    Cost(String),
    #[error("salt or digest is not bcrypt base64")]
    Encoding,
    #[error("bcrypt rejected the stored hash: {0}")]
    Unparseable(String),
}

/// Hash `password` with a fresh random salt.
///
/// # Errors
/// Returns an error if `cost` is out of range, the password exceeds
/// [`MAX_PASSWORD_BYTES`], or the system RNG fails.
pub fn hash(password: &str, cost: u32) -> Result<String, HashError> {
    if !(MIN_COST..=MAX_COST).contains(&cost) {
        return Err(HashError::InvalidCost(cost));
    }

    if password.len() > MAX_PASSWORD_BYTES {
        return Err(HashError::PasswordTooLong(password.len()));
    }

    Ok(bcrypt::hash(password, cost)?)
}

/// Check `password` against a stored hash.
///
/// `Ok(false)` is a mismatch. The digest comparison inside bcrypt is
/// constant-time.
///
/// # Errors
/// Returns [`MalformedHash`] if `stored` is not a well-formed bcrypt string.
pub fn verify(password: &str, stored: &str) -> Result<bool, MalformedHash> {
    parse(stored)?;

    bcrypt::verify(password, stored).map_err(|err| MalformedHash::Unparseable(err.to_string()))
}

/// Cost factor embedded in a stored hash.
///
/// # Errors
/// Returns [`MalformedHash`] if `stored` is not a well-formed bcrypt string.
pub fn cost_of(stored: &str) -> Result<u32, MalformedHash> {
    parse(stored)
}

/// Validate the layout of a stored hash and return its cost.
fn parse(stored: &str) -> Result<u32, MalformedHash> {
    if stored.len() != HASH_LEN {
        return Err(MalformedHash::Length(stored.len()));
    }

    // "", tag, cost, salt+digest
    let mut fields = stored.split('$');
    let (Some(""), Some(tag), Some(cost), Some(salt_and_digest), None) = (
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
    ) else {
        return Err(MalformedHash::Layout);
    };

    if !SUPPORTED_TAGS.contains(&tag) {
        return Err(MalformedHash::UnknownTag(tag.to_string()));
    }

    let cost = match cost.parse::<u32>() {
        Ok(value) if cost.len() == 2 && (MIN_COST..=MAX_COST).contains(&value) => value,
        _ => return Err(MalformedHash::Cost(cost.to_string())),
    };

    if salt_and_digest.len() != SALT_AND_DIGEST_LEN
        || !salt_and_digest
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'/')
    {
        return Err(MalformedHash::Encoding);
    }

    Ok(cost)
}
