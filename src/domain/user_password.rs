use secrecy::{ExposeSecret, SecretString};
use std::fmt::Debug;

const MIN_LOGIN_PASSWORD_LENGTH: usize = 6;
const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;

/// A password that is allowed to be stored.
pub struct ValidPassword(SecretString);

impl ValidPassword {
    pub fn parse(s: SecretString) -> Result<Self, ValidPasswordError> {
        let len = s.expose_secret().chars().count();
        if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&len) {
            return Err(ValidPasswordError::InvalidLength);
        }

        Ok(Self(s))
    }

    /// Cheap shape check on the login form, before any hashing happens.
    pub fn check_login_shape(s: &SecretString) -> Result<(), ValidPasswordError> {
        if s.expose_secret().chars().count() < MIN_LOGIN_PASSWORD_LENGTH {
            return Err(ValidPasswordError::TooShortForLogin);
        }
        Ok(())
    }

    pub fn inner(self) -> SecretString {
        self.0
    }
}

impl Debug for ValidPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ValidPassword").field(&"[REDACTED]").finish()
    }
}

impl AsRef<SecretString> for ValidPassword {
    fn as_ref(&self) -> &SecretString {
        &self.0
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ValidPasswordError {
    #[error(
        "Passwords must be between {} and {} characters long.",
        MIN_PASSWORD_LENGTH,
        MAX_PASSWORD_LENGTH
    )]
    InvalidLength,
    #[error("Password must be at least {} characters", MIN_LOGIN_PASSWORD_LENGTH)]
    TooShortForLogin,
}
