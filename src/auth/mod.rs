//! Credential verification: bcrypt hashing, credential lookup and the
//! login decision that combines them.

pub mod decision;
pub mod hash;
pub mod storage;

pub use self::decision::{Verifier, VerifierError};
pub use self::hash::{HashError, MalformedHash};
pub use self::storage::{CredentialStore, MemoryCredentialStore, PgCredentialStore, StoreError};

use secrecy::SecretString;
use std::fmt;

/// A stored credential row.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub username: String,
    pub password_hash: String,
    pub role: String,
}

impl CredentialRecord {
    #[must_use]
    pub fn new(
        username: impl Into<String>,
        password_hash: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password_hash: password_hash.into(),
            role: role.into(),
        }
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("username", &self.username)
            .field("password_hash", &"***")
            .field("role", &self.role)
            .finish()
    }
}

/// Operator-supplied credentials for a single verification attempt.
///
/// The password is zeroized when the candidate is dropped and never shows up
/// in `Debug` output.
#[derive(Debug)]
pub struct Candidate {
    username: String,
    password: SecretString,
}

impl Candidate {
    #[must_use]
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn password(&self) -> &SecretString {
        &self.password
    }
}

/// Result of one verification attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Authenticated { role: String },
    /// Unknown username or wrong password; the two are never distinguished.
    Rejected,
    StoreUnavailable { detail: String },
    MalformedStoredHash { detail: String },
    /// The bcrypt task was cancelled before a decision was reached.
    Interrupted,
}

impl Outcome {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }
}
