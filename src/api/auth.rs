//! Authentication handling for the SonarQube Web API.
//!
//! SonarQube accepts a user token as the Basic Auth user name with an empty
//! password. Tokens are kept in the OS keyring, one entry per profile.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use super::error::{ApiError, Result};

/// The keyring service name for stored tokens.
const KEYRING_SERVICE: &str = "hotspot-assignee";

/// Authentication credentials for SonarQube.
#[derive(Clone)]
pub struct Auth {
    /// The complete "Basic ..." header value.
    auth_header: String,
}

impl Auth {
    /// Create credentials from a user token.
    ///
    /// The token is immediately encoded and the raw token is not stored.
    pub fn new(token: &str) -> Self {
        Self {
            auth_header: build_auth_header(token),
        }
    }

    /// Create credentials for a profile using the OS keyring.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be retrieved from the keyring.
    pub fn from_keyring(profile_name: &str) -> Result<Self> {
        let token = get_token(profile_name)?;
        Ok(Self::new(&token))
    }

    /// Get the authorization header value for HTTP requests.
    pub fn header_value(&self) -> &str {
        &self.auth_header
    }
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auth").field("auth_header", &"<redacted>").finish()
    }
}

/// Build the Basic Auth header value for a token.
///
/// Encodes "token:" in Base64 and prepends "Basic ".
fn build_auth_header(token: &str) -> String {
    let credentials = format!("{}:", token);
    let encoded = BASE64.encode(credentials.as_bytes());
    format!("Basic {}", encoded)
}

fn entry(profile_name: &str) -> Result<keyring::Entry> {
    keyring::Entry::new(KEYRING_SERVICE, profile_name)
        .map_err(|e| ApiError::Keyring(format!("failed to access keyring: {}", e)))
}

/// Store a user token in the OS keyring.
///
/// # Errors
///
/// Returns an error if the token cannot be stored in the keyring.
pub fn store_token(profile_name: &str, token: &str) -> Result<()> {
    entry(profile_name)?
        .set_password(token)
        .map_err(|e| ApiError::Keyring(format!("failed to store token: {}", e)))
}

/// Retrieve a user token from the OS keyring.
///
/// # Errors
///
/// Returns an error if the token cannot be retrieved from the keyring.
pub fn get_token(profile_name: &str) -> Result<String> {
    entry(profile_name)?
        .get_password()
        .map_err(|e| ApiError::Keyring(format!("failed to retrieve token: {}", e)))
}

/// Delete a user token from the OS keyring.
///
/// # Errors
///
/// Returns an error if the token cannot be deleted from the keyring.
pub fn delete_token(profile_name: &str) -> Result<()> {
    entry(profile_name)?
        .delete_password()
        .map_err(|e| ApiError::Keyring(format!("failed to delete token: {}", e)))
}

/// Check if a token exists in the OS keyring for a profile.
pub fn has_token(profile_name: &str) -> bool {
    get_token(profile_name).is_ok()
}
