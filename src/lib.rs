//! # seccheck (Command-line Credential Verifier)
//!
//! `seccheck` verifies an operator's username and password against a
//! credential record stored in PostgreSQL and reports the record's role.
//!
//! ## Verification
//!
//! Passwords are stored as self-describing bcrypt strings
//! (`$2b$<cost>$<salt><digest>`), so a record never needs a separate salt
//! column and the cost factor can be raised without invalidating old hashes.
//!
//! - **Parameterized lookup:** the username is always bound as `$1`; the
//!   query text is a constant.
//! - **Anti-enumeration:** an unknown username and a wrong password produce the
//!   same outcome and the same message. When no record exists a placeholder
//!   hash is verified instead so both paths pay one bcrypt computation.
//! - **Infrastructure failures** (store outage, lookup timeout, malformed stored
//!   hash) are reported separately and never rendered as a rejected login.
//!
//! ## Hash generation
//!
//! `seccheck hash <password>` prints a hash for an administrator to insert
//! into the `users` table. It runs offline and needs no configuration.

pub mod auth;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
