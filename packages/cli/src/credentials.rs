//! Portal credential resolution.
//!
//! Each value comes from the command line, then the environment, then an
//! interactive prompt.

use checknarc_batch::Credentials;
use dialoguer::{Input, Password};

/// Environment variable holding the portal username.
pub const USERNAME_ENV: &str = "CHECKNARC_USERNAME";

/// Environment variable holding the portal password.
pub const PASSWORD_ENV: &str = "CHECKNARC_PASSWORD";

/// Returns the first non-blank value.
fn first_given(flag: Option<String>, env: Option<String>) -> Option<String> {
    flag.into_iter()
        .chain(env)
        .find(|value| !value.trim().is_empty())
}

/// Resolves the username and password, prompting for whatever is missing.
///
/// # Errors
///
/// Returns an error if a prompt fails, or if the username or password is
/// still empty afterwards.
pub fn resolve(username: Option<String>) -> Result<Credentials, Box<dyn std::error::Error>> {
    let username = match first_given(username, std::env::var(USERNAME_ENV).ok()) {
        Some(username) => username,
        None => Input::<String>::new()
            .with_prompt("Username")
            .allow_empty(true)
            .interact_text()?,
    };

    let password = match first_given(None, std::env::var(PASSWORD_ENV).ok()) {
        Some(password) => password,
        None => Password::new()
            .with_prompt("Password")
            .allow_empty_password(true)
            .interact()?,
    };

    let credentials = Credentials {
        username: username.trim().to_owned(),
        password,
    };
    credentials.check()?;

    Ok(credentials)
}
