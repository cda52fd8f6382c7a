//! The login decision.
//!
//! ```text
//! Idle -> LookupIssued -> Found    -> Verified | Rejected
//!                      -> NotFound -> (placeholder verify) -> Rejected
//!                      -> StoreError -> StoreUnavailable
//! ```
//!
//! An unknown username and a wrong password both end in [`Outcome::Rejected`].
//! The not-found path verifies the candidate password against a placeholder
//! hash of the same cost, so both paths spend one bcrypt computation. This
//! narrows the timing difference between them; it does not remove it.
//!
//! bcrypt always runs on the blocking pool. If that task is cancelled (e.g.
//! at runtime shutdown) the decision is [`Outcome::Interrupted`].

use super::{
    Candidate, Outcome,
    hash::{self, HashError, MalformedHash},
    storage::{CredentialStore, StoreError},
};
use rand::{Rng, distributions::Alphanumeric};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use thiserror::Error;
use tokio::{task, time::timeout};
use tracing::{debug, error, info, instrument};

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

const PLACEHOLDER_PASSWORD_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum VerifierError {
    #[error(transparent)]
    Hash(#[from] HashError),
    #[error("placeholder hash task was cancelled")]
    Interrupted,
}

pub struct Verifier<S> {
    store: S,
    placeholder_hash: String,
    lookup_timeout: Duration,
}

impl<S: CredentialStore> Verifier<S> {
    /// Create a verifier whose placeholder hash uses `cost`.
    ///
    /// `cost` should match the cost of the stored hashes, otherwise the
    /// not-found path is measurably faster or slower than a wrong password.
    ///
    /// # Errors
    /// Returns an error if `cost` is out of range or the RNG fails.
    pub fn new(store: S, cost: u32) -> Result<Self, HashError> {
        let throwaway: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(PLACEHOLDER_PASSWORD_LEN)
            .map(char::from)
            .collect();

        Ok(Self {
            store,
            placeholder_hash: hash::hash(&throwaway, cost)?,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        })
    }

    /// Like [`Verifier::new`], but computes the placeholder hash on the
    /// blocking pool.
    ///
    /// # Errors
    /// Returns an error if `cost` is out of range or the task is cancelled.
    pub async fn build(store: S, cost: u32) -> Result<Self, VerifierError>
    where
        S: 'static,
    {
        let verifier = run_blocking(move || Self::new(store, cost))
            .await
            .ok_or(VerifierError::Interrupted)??;

        Ok(verifier)
    }

    #[must_use]
    pub fn with_lookup_timeout(mut self, lookup_timeout: Duration) -> Self {
        self.lookup_timeout = lookup_timeout;
        self
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Decide whether `candidate` is a valid login.
    ///
    /// Every call ends in exactly one [`Outcome`]; nothing is retried.
    #[instrument(skip_all, fields(username = %candidate.username()))]
    pub async fn decide(&self, candidate: &Candidate) -> Outcome {
        let lookup = timeout(
            self.lookup_timeout,
            self.store.find_by_username(candidate.username()),
        )
        .await
        .unwrap_or_else(|_| Err(StoreError::Timeout(self.lookup_timeout)));

        let record = match lookup {
            Ok(record) => record,
            Err(err) => {
                error!(error = %err, "credential lookup failed");

                return Outcome::StoreUnavailable {
                    detail: err.to_string(),
                };
            }
        };

        let Some(record) = record else {
            // Result is irrelevant; only the work matters.
            let placeholder =
                verify_blocking(candidate.password().clone(), self.placeholder_hash.clone()).await;

            if placeholder.is_none() {
                return interrupted();
            }

            debug!("credentials rejected");

            return Outcome::Rejected;
        };

        let Some(verified) =
            verify_blocking(candidate.password().clone(), record.password_hash).await
        else {
            return interrupted();
        };

        match verified {
            Ok(true) => {
                info!(role = %record.role, "credentials verified");

                Outcome::Authenticated { role: record.role }
            }
            Ok(false) => {
                debug!("credentials rejected");

                Outcome::Rejected
            }
            Err(err) => {
                error!(error = %err, "stored password hash is malformed");

                Outcome::MalformedStoredHash {
                    detail: err.to_string(),
                }
            }
        }
    }
}

fn interrupted() -> Outcome {
    error!("password verification task was cancelled");

    Outcome::Interrupted
}

/// Run bcrypt on the blocking pool so concurrent decisions don't stall the
/// async workers. `None` if the task was cancelled.
async fn verify_blocking(
    password: SecretString,
    stored: String,
) -> Option<Result<bool, MalformedHash>> {
    run_blocking(move || hash::verify(password.expose_secret(), &stored)).await
}

async fn run_blocking<T, F>(f: F) -> Option<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    settle(task::spawn_blocking(f).await)
}

/// A panic in the task is re-raised here; a cancellation is `None`.
fn settle<T>(joined: Result<T, task::JoinError>) -> Option<T> {
    match joined {
        Ok(value) => Some(value),
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(_) => None,
    }
}
