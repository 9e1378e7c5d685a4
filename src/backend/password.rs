//! Keyring file password resolution
//!
//! `ZED_KEYRING_PASSWORD` is checked first; otherwise the user is prompted on
//! the controlling terminal with input echo disabled.

use std::env::VarError;
use std::io::{self, Write};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use zeroize::Zeroizing;

use super::KeyringError;
use crate::env::{ReadEnv, SystemEnv, KEYRING_PASSWORD_VAR};

/// Supplies the password protecting the encrypted keyring file
pub trait PasswordSource {
    fn password(&self, prompt: &str) -> Result<Zeroizing<String>, KeyringError>;
}

/// Signature of the interactive prompt
pub type PromptFn = fn(&str) -> io::Result<Zeroizing<String>>;

/// Environment override, falling back to an interactive prompt
pub struct EnvOrPrompt<E = SystemEnv, P = PromptFn> {
    env: E,
    prompt: P,
}

impl EnvOrPrompt {
    pub fn new() -> Self {
        Self::with_env(SystemEnv)
    }
}

impl Default for EnvOrPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ReadEnv> EnvOrPrompt<E> {
    pub fn with_env(env: E) -> Self {
        Self {
            env,
            prompt: read_masked,
        }
    }
}

impl<E: ReadEnv, P> EnvOrPrompt<E, P>
where
    P: Fn(&str) -> io::Result<Zeroizing<String>>,
{
    /// Replace the terminal prompt (for testing)
    pub fn with_prompt<Q>(self, prompt: Q) -> EnvOrPrompt<E, Q>
    where
        Q: Fn(&str) -> io::Result<Zeroizing<String>>,
    {
        EnvOrPrompt {
            env: self.env,
            prompt,
        }
    }
}

impl<E, P> PasswordSource for EnvOrPrompt<E, P>
where
    E: ReadEnv,
    P: Fn(&str) -> io::Result<Zeroizing<String>>,
{
    fn password(&self, prompt: &str) -> Result<Zeroizing<String>, KeyringError> {
        match self.env.var(KEYRING_PASSWORD_VAR) {
            Ok(password) => {
                tracing::debug!("Using keyring password from {}", KEYRING_PASSWORD_VAR);
                return Ok(Zeroizing::new(password));
            }
            Err(VarError::NotUnicode(_)) => {
                return Err(KeyringError::Password(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("{} is not valid unicode", KEYRING_PASSWORD_VAR),
                )));
            }
            Err(VarError::NotPresent) => {}
        }

        (self.prompt)(prompt).map_err(KeyringError::Password)
    }
}

/// Restores cooked mode when dropped
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Prompt on stderr and read a line from the terminal without echo.
///
/// Blocks until Enter. Ctrl-C aborts with `Interrupted`, Ctrl-D on an empty
/// line with `UnexpectedEof`.
pub fn read_masked(prompt: &str) -> io::Result<Zeroizing<String>> {
    let mut stderr = io::stderr();
    write!(stderr, "{}: ", prompt)?;
    stderr.flush()?;

    let result = {
        let _guard = RawModeGuard::enable()?;
        read_line_raw()
    };

    writeln!(stderr)?;
    result
}

fn read_line_raw() -> io::Result<Zeroizing<String>> {
    let mut input = Zeroizing::new(String::with_capacity(128));
    loop {
        let Event::Key(KeyEvent {
            code,
            modifiers,
            kind,
            ..
        }) = event::read()?
        else {
            continue;
        };
        if kind == KeyEventKind::Release {
            continue;
        }

        match code {
            KeyCode::Enter => return Ok(input),
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                return Err(io::Error::new(
                    io::ErrorKind::Interrupted,
                    "password prompt interrupted",
                ));
            }
            KeyCode::Char('d') if modifiers.contains(KeyModifiers::CONTROL) => {
                if input.is_empty() {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "no password entered",
                    ));
                }
            }
            KeyCode::Backspace => {
                input.pop();
            }
            KeyCode::Char(c) => input.push(c),
            _ => {}
        }
    }
}
