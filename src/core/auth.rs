use crate::error::{AppError, AuthError, CliError};
use rpassword::read_password;
use std::io::{self, Write};

/// Interactive session-token input handler for `auth login`. The token is a
/// credential and is read without echo.
pub struct TokenInput {
    pub session_token: String,
}

impl TokenInput {
    pub fn collect() -> Result<Self, AppError> {
        print!("Session token: ");
        io::stdout().flush().map_err(|e| {
            AppError::Cli(CliError::InvalidArguments(format!(
                "Failed to flush stdout: {}",
                e
            )))
        })?;

        let session_token = read_password().map_err(|e| {
            AppError::Cli(CliError::InvalidArguments(format!(
                "Failed to read session token: {}",
                e
            )))
        })?;

        Ok(Self {
            session_token: session_token.trim().to_string(),
        })
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.session_token.is_empty() {
            return Err(AppError::Auth(AuthError::EmptyToken));
        }
        Ok(())
    }
}
