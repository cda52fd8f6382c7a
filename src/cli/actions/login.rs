use crate::{
    auth::{Candidate, CredentialStore, Outcome, PgCredentialStore, Verifier},
    cli::{commands::login::Options, globals::GlobalArgs},
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::{
    io::{self, BufRead, IsTerminal, Write},
    process::ExitCode,
};
use tracing::debug;

pub const MSG_REJECTED: &str = "Invalid username or password.";
pub const MSG_STORE_ERROR: &str = "Database error: unable to verify credentials.";
pub const MSG_INTERRUPTED: &str = "Verification interrupted: no decision was made.";

const PROMPT_USERNAME: &str = "Username: ";
const PROMPT_PASSWORD: &str = "Password: ";

/// Source of operator input.
pub trait Prompt {
    /// # Errors
    /// Returns an error if input cannot be read.
    fn username(&mut self) -> io::Result<String>;

    /// # Errors
    /// Returns an error if input cannot be read.
    fn password(&mut self) -> io::Result<SecretString>;
}

/// Reads from the controlling terminal. The password is not echoed when
/// stdin is a TTY; otherwise a plain line is read.
pub struct TerminalPrompt;

impl TerminalPrompt {
    fn read_line(prompt: &str) -> io::Result<String> {
        let mut stdout = io::stdout().lock();
        write!(stdout, "{prompt}")?;
        stdout.flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;

        Ok(strip_line_ending(line))
    }
}

impl Prompt for TerminalPrompt {
    fn username(&mut self) -> io::Result<String> {
        Self::read_line(PROMPT_USERNAME)
    }

    fn password(&mut self) -> io::Result<SecretString> {
        let password = if io::stdin().is_terminal() {
            rpassword::prompt_password(PROMPT_PASSWORD)?
        } else {
            Self::read_line(PROMPT_PASSWORD)?
        };

        Ok(SecretString::from(password))
    }
}

fn strip_line_ending(mut line: String) -> String {
    let len = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(len);
    line
}

/// # Errors
/// Returns an error if the prompt fails.
pub fn read_candidate<P: Prompt>(prompt: &mut P) -> Result<Candidate> {
    let username = prompt.username().context("failed to read username")?;
    let password = prompt.password().context("failed to read password")?;

    Ok(Candidate::new(username, password))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Stdout,
    Stderr,
}

/// What the operator sees for an [`Outcome`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rendered {
    pub channel: Channel,
    pub message: String,
    pub status: u8,
}

impl Rendered {
    /// # Errors
    /// Returns an error if the selected stream cannot be written.
    pub fn write<O: Write, E: Write>(&self, out: &mut O, err: &mut E) -> io::Result<()> {
        match self.channel {
            Channel::Stdout => writeln!(out, "{}", self.message),
            Channel::Stderr => writeln!(err, "{}", self.message),
        }
    }

    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.status)
    }
}

#[must_use]
pub fn render(outcome: &Outcome) -> Rendered {
    match outcome {
        Outcome::Authenticated { role } => Rendered {
            channel: Channel::Stdout,
            message: format!("Login successful. Role: {role}"),
            status: 0,
        },
        Outcome::Rejected => Rendered {
            channel: Channel::Stdout,
            message: MSG_REJECTED.to_string(),
            status: 1,
        },
        // Details were logged by the verifier.
        Outcome::StoreUnavailable { .. } | Outcome::MalformedStoredHash { .. } => Rendered {
            channel: Channel::Stderr,
            message: MSG_STORE_ERROR.to_string(),
            status: 1,
        },
        Outcome::Interrupted => Rendered {
            channel: Channel::Stderr,
            message: MSG_INTERRUPTED.to_string(),
            status: 1,
        },
    }
}

/// Prompt for one candidate, decide, and render the outcome.
/// # Errors
/// Returns an error if the prompt fails.
pub async fn login<S, P>(verifier: &Verifier<S>, prompt: &mut P) -> Result<Rendered>
where
    S: CredentialStore,
    P: Prompt,
{
    let candidate = read_candidate(prompt)?;

    let outcome = verifier.decide(&candidate).await;

    Ok(render(&outcome))
}

/// Load settings, then prompt and verify against PostgreSQL.
///
/// Settings are validated before `prompt` is used and before the pool is
/// created, so a misconfigured run never asks for a password.
/// # Errors
/// Returns an error if settings are missing or invalid, or operator I/O fails.
pub async fn run<P: Prompt>(options: &Options, prompt: &mut P) -> Result<Rendered> {
    let globals = GlobalArgs::load(&options.env_file)?;

    debug!(?globals, "loaded database settings");

    let dsn = globals.dsn().context("failed to build database URL")?;

    let store = PgCredentialStore::connect_lazy(dsn.expose_secret(), options.store_timeout)
        .context("failed to configure database pool")?;

    let verifier = Verifier::build(store, options.bcrypt_cost)
        .await
        .context("failed to prepare verifier")?
        .with_lookup_timeout(options.store_timeout);

    let rendered = login(&verifier, prompt).await;

    verifier.store().close().await;

    rendered
}

/// Handle the login action
/// # Errors
/// Returns an error if settings are missing or invalid, or operator I/O fails.
pub async fn execute(options: Options) -> Result<ExitCode> {
    let rendered = run(&options, &mut TerminalPrompt).await?;

    rendered
        .write(&mut io::stdout().lock(), &mut io::stderr().lock())
        .context("failed to write result")?;

    Ok(rendered.exit_code())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{
        auth::{CredentialRecord, MemoryCredentialStore, hash},
        cli::globals::{ConfigError, KEY_DB_PASSWORD, KEY_DB_URL, KEY_DB_USER},
    };
    use std::{path::PathBuf, time::Duration};

    const TEST_COST: u32 = 4;

    struct Scripted {
        username: &'static str,
        password: &'static str,
    }

    impl Prompt for Scripted {
        fn username(&mut self) -> io::Result<String> {
            Ok(self.username.to_string())
        }

        fn password(&mut self) -> io::Result<SecretString> {
            Ok(SecretString::from(self.password))
        }
    }

    struct Closed;

    impl Prompt for Closed {
        fn username(&mut self) -> io::Result<String> {
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed"))
        }

        fn password(&mut self) -> io::Result<SecretString> {
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed"))
        }
    }

    /// Counts every request for operator input.
    #[derive(Default)]
    struct Untouched {
        asked: usize,
    }

    impl Prompt for Untouched {
        fn username(&mut self) -> io::Result<String> {
            self.asked += 1;
            Err(io::Error::other("username requested"))
        }

        fn password(&mut self) -> io::Result<SecretString> {
            self.asked += 1;
            Err(io::Error::other("password requested"))
        }
    }

    fn options(env_file: PathBuf) -> Options {
        Options {
            env_file,
            store_timeout: Duration::from_secs(1),
            bcrypt_cost: TEST_COST,
        }
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(future)
    }

    #[test]
    fn missing_settings_stop_before_the_prompt() {
        temp_env::with_vars(
            [
                (KEY_DB_URL, Some("postgres://127.0.0.1:1/seccheck")),
                (KEY_DB_USER, None),
                (KEY_DB_PASSWORD, None),
            ],
            || {
                let mut prompt = Untouched::default();
                let err = block_on(run(&options(PathBuf::from("/nonexistent/.env")), &mut prompt))
                    .unwrap_err();

                assert_eq!(prompt.asked, 0);
                assert!(matches!(
                    err.downcast_ref::<ConfigError>(),
                    Some(ConfigError::Missing(keys)) if keys == &vec![KEY_DB_USER, KEY_DB_PASSWORD]
                ));
            },
        );
    }

    #[test]
    fn unreachable_store_renders_the_database_message() {
        temp_env::with_vars(
            [
                (KEY_DB_URL, Some("postgres://127.0.0.1:1/seccheck?sslmode=disable")),
                (KEY_DB_USER, Some("seccheck")),
                (KEY_DB_PASSWORD, Some("seccheck")),
            ],
            || {
                let mut prompt = Scripted {
                    username: "admin",
                    password: "itsasecret",
                };
                let rendered =
                    block_on(run(&options(PathBuf::from("/nonexistent/.env")), &mut prompt))
                        .unwrap();

                assert_eq!(rendered.channel, Channel::Stderr);
                assert_eq!(rendered.message, MSG_STORE_ERROR);
                assert_eq!(rendered.status, 1);
            },
        );
    }

    fn verifier(store: MemoryCredentialStore) -> Verifier<MemoryCredentialStore> {
        Verifier::new(store, TEST_COST).unwrap()
    }

    fn admin() -> MemoryCredentialStore {
        MemoryCredentialStore::new().with_record(CredentialRecord::new(
            "admin",
            hash::hash("itsasecret", TEST_COST).unwrap(),
            "all",
        ))
    }

    async fn attempt(
        verifier: &Verifier<MemoryCredentialStore>,
        username: &'static str,
        password: &'static str,
    ) -> Rendered {
        login(verifier, &mut Scripted { username, password })
            .await
            .unwrap()
    }

    fn written(rendered: &Rendered) -> (String, String) {
        let (mut out, mut err) = (Vec::new(), Vec::new());
        rendered.write(&mut out, &mut err).unwrap();
        (String::from_utf8(out).unwrap(), String::from_utf8(err).unwrap())
    }

    #[tokio::test]
    async fn end_to_end_login() {
        let verifier = verifier(admin());

        let success = attempt(&verifier, "admin", "itsasecret").await;
        assert_eq!(success.channel, Channel::Stdout);
        assert_eq!(success.message, "Login successful. Role: all");
        assert_eq!(success.status, 0);

        let wrong_password = attempt(&verifier, "admin", "wrong").await;
        assert_eq!(wrong_password.message, MSG_REJECTED);
        assert_eq!(wrong_password.status, 1);

        let ghost = attempt(&verifier, "ghost", "whatever").await;
        assert_eq!(ghost, wrong_password);
    }

    #[tokio::test]
    async fn store_errors_use_the_database_message() {
        let offline = attempt(&verifier(admin().offline()), "admin", "itsasecret").await;
        assert_eq!(offline.channel, Channel::Stderr);
        assert_eq!(offline.message, MSG_STORE_ERROR);
        assert_eq!(offline.status, 1);

        let malformed = MemoryCredentialStore::new()
            .with_record(CredentialRecord::new("admin", "not-a-hash", "all"));
        let malformed = attempt(&verifier(malformed), "admin", "itsasecret").await;
        assert_eq!(malformed, offline);
        assert_ne!(malformed.message, MSG_REJECTED);
    }

    #[tokio::test]
    async fn prompt_failure_is_an_error() {
        let verifier = verifier(admin());
        assert!(login(&verifier, &mut Closed).await.is_err());
    }

    #[test]
    fn rendered_goes_to_one_stream() {
        let (out, err) = written(&render(&Outcome::Authenticated {
            role: "all".to_string(),
        }));
        assert_eq!(out, "Login successful. Role: all\n");
        assert!(err.is_empty());

        let (out, err) = written(&render(&Outcome::Rejected));
        assert_eq!(out, "Invalid username or password.\n");
        assert!(err.is_empty());

        let (out, err) = written(&render(&Outcome::StoreUnavailable {
            detail: "connection refused".to_string(),
        }));
        assert!(out.is_empty());
        assert_eq!(err, "Database error: unable to verify credentials.\n");
        assert!(!err.contains("connection refused"));
    }

    #[test]
    fn line_endings_are_stripped() {
        assert_eq!(strip_line_ending("admin\n".to_string()), "admin");
        assert_eq!(strip_line_ending("admin\r\n".to_string()), "admin");
        assert_eq!(strip_line_ending(" admin ".to_string()), " admin ");
        assert_eq!(strip_line_ending(String::new()), "");
    }

    #[test]
    fn interrupted_is_not_a_rejection() {
        let rendered = render(&Outcome::Interrupted);
        assert_eq!(rendered.channel, Channel::Stderr);
        assert_eq!(rendered.message, MSG_INTERRUPTED);
        assert_eq!(rendered.status, 1);
    }

    #[test]
    fn exit_codes() {
        assert_eq!(render(&Outcome::Rejected).status, 1);
        assert_eq!(
            render(&Outcome::MalformedStoredHash {
                detail: "bad".to_string()
            })
            .status,
            1
        );
    }
}
