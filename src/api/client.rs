//! SonarQube Web API client implementation.
//!
//! This module provides the client used to validate credentials, look up
//! users and assign security hotspots. It handles authentication,
//! request/response processing, error handling, and retry logic.

use std::time::Duration;

use reqwest::{header, Client, Response, StatusCode};
use tracing::{debug, error, info, instrument, warn};

use super::auth::Auth;
use super::error::{ApiError, Result};
use super::types::{Hotspot, User, UserSearchResponse, ValidateResponse};
use crate::config::Profile;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for transient failures.
const MAX_RETRIES: u32 = 3;

/// Base delay between retries in milliseconds.
const RETRY_DELAY_MS: u64 = 1000;

/// Default number of users returned per search.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page size accepted by `api/users/search`.
const MAX_PAGE_SIZE: u32 = 500;

/// The SonarQube API client.
#[derive(Debug, Clone)]
pub struct SonarClient {
    /// The HTTP client.
    client: Client,
    /// The base URL for the SonarQube instance.
    base_url: String,
    /// Authentication credentials.
    auth: Auth,
    /// Number of users requested per search.
    page_size: u32,
}

impl SonarClient {
    /// Create a new client from a profile and validate the connection.
    ///
    /// When `token` is `None` the token is read from the OS keyring.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The token cannot be retrieved from the keyring
    /// - The HTTP client cannot be built
    /// - Connection validation fails
    #[instrument(skip(profile, token), fields(profile_name = %profile.name))]
    pub async fn new(profile: &Profile, token: Option<&str>) -> Result<Self> {
        info!("Creating SonarQube client for profile");

        let sonar = match token {
            Some(token) => Self::with_token(&profile.url, token)?,
            None => Self::with_auth(&profile.url, Auth::from_keyring(&profile.name)?)?,
        };

        sonar.validate_connection().await?;

        info!("SonarQube client created and connection validated");
        Ok(sonar)
    }

    /// Create a new client with an explicit token.
    ///
    /// Does NOT validate the connection.
    pub fn with_token(base_url: &str, token: &str) -> Result<Self> {
        Self::with_auth(base_url, Auth::new(token))
    }

    fn with_auth(base_url: &str, auth: Auth) -> Result<Self> {
        Ok(Self {
            client: Self::build_http_client()?,
            base_url: normalize_base_url(base_url)?,
            auth,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Set the number of users requested per search.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Get the configured search page size.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    fn build_http_client() -> Result<Client> {
        Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(ApiError::Network)
    }

    /// Validate the connection by calling `GET /api/authentication/validate`.
    ///
    /// SonarQube answers `{"valid": false}` with HTTP 200 for bad tokens, so
    /// that case is mapped to `Unauthorized` here.
    #[instrument(skip(self))]
    pub async fn validate_connection(&self) -> Result<()> {
        debug!("Validating SonarQube connection");

        let url = format!("{}/api/authentication/validate", self.base_url);
        let response: ValidateResponse = self.get(&url).await.map_err(|e| {
            error!("Connection validation failed: {}", e);
            match e {
                ApiError::Unauthorized => e,
                ApiError::Network(_) => ApiError::ConnectionFailed(format!(
                    "Cannot connect to {}: {}",
                    self.base_url, e
                )),
                _ => ApiError::ConnectionFailed(e.to_string()),
            }
        })?;

        if !response.valid {
            return Err(ApiError::Unauthorized);
        }

        info!("Connected to {}", self.base_url);
        Ok(())
    }

    /// Search the user directory.
    ///
    /// Calls `GET /api/users/search?q=<query>&ps=<page_size>`.
    #[instrument(skip(self), fields(query = %query))]
    pub async fn search_users(&self, query: &str, page_size: u32) -> Result<Vec<User>> {
        let url = format!(
            "{}/api/users/search?q={}&ps={}",
            self.base_url,
            urlencoding::encode(query),
            page_size.clamp(1, MAX_PAGE_SIZE)
        );

        let response: UserSearchResponse = self.get(&url).await?;
        debug!(
            page = response.paging.page_index,
            page_size = response.paging.page_size,
            "Found {} users (total: {})",
            response.users.len(),
            response.paging.total
        );
        Ok(response.users)
    }

    /// Get a single hotspot by key.
    #[instrument(skip(self), fields(hotspot_key = %key))]
    pub async fn get_hotspot(&self, key: &str) -> Result<Hotspot> {
        debug!("Fetching hotspot");

        let url = format!(
            "{}/api/hotspots/show?hotspot={}",
            self.base_url,
            urlencoding::encode(key)
        );
        self.get(&url).await.map_err(|e| {
            if matches!(e, ApiError::NotFound(_)) {
                ApiError::NotFound(format!("Hotspot '{}' not found", key))
            } else {
                e
            }
        })
    }

    /// Assign a hotspot to a user, or unassign it when `login` is `None`.
    ///
    /// Calls `POST /api/hotspots/assign`. Not retried.
    #[instrument(skip(self), fields(hotspot_key = %key))]
    pub async fn assign_hotspot(&self, key: &str, login: Option<&str>) -> Result<()> {
        info!(assignee = ?login, "Assigning hotspot");

        let url = format!("{}/api/hotspots/assign", self.base_url);
        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, self.auth.header_value())
            .header(header::ACCEPT, "application/json")
            .form(&[("hotspot", key), ("assignee", login.unwrap_or(""))])
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        debug!("Error response body: {}", body);
        Err(Self::error_from_response(status, &url, &body))
    }

    /// Perform a GET request with authentication and error handling.
    ///
    /// Includes retry logic for transient failures (rate limiting, server errors).
    #[instrument(skip(self), fields(url = %url))]
    async fn get<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut attempts = 0;
        let mut last_error: Option<ApiError> = None;

        while attempts < MAX_RETRIES {
            attempts += 1;
            debug!("Request attempt {}/{}", attempts, MAX_RETRIES);

            match self.execute_get::<T>(url).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if Self::is_retryable(&e) && attempts < MAX_RETRIES {
                        let delay = Self::calculate_retry_delay(attempts);
                        warn!(
                            "Request failed (attempt {}), retrying in {}ms: {}",
                            attempts, delay, e
                        );
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        last_error = Some(e);
                    } else {
                        return Err(e);
                    }
                }
            }
        }

        Err(last_error.unwrap_or(ApiError::ServerError("Max retries exceeded".to_string())))
    }

    async fn execute_get<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .header(header::AUTHORIZATION, self.auth.header_value())
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        self.handle_response(response).await
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: Response,
    ) -> Result<T> {
        let status = response.status();
        let url = response.url().to_string();

        if status.is_success() {
            response
                .json::<T>()
                .await
                .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response: {}", e)))
        } else {
            let error_body = response.text().await.unwrap_or_default();
            debug!("Error response body: {}", error_body);

            Err(Self::error_from_response(status, &url, &error_body))
        }
    }

    /// Create an appropriate error from an HTTP response.
    ///
    /// SonarQube reports failures as `{"errors": [{"msg": "..."}]}`.
    fn error_from_response(status: StatusCode, url: &str, body: &str) -> ApiError {
        let messages: Vec<String> = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|json| json.get("errors").and_then(|e| e.as_array()).cloned())
            .map(|errors| {
                errors
                    .iter()
                    .filter_map(|e| e.get("msg").and_then(|m| m.as_str()))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        if messages.is_empty() {
            ApiError::from_status(status, url)
        } else {
            ApiError::from_status(status, &messages.join(", "))
        }
    }

    /// Check if an error is retryable.
    fn is_retryable(error: &ApiError) -> bool {
        matches!(
            error,
            ApiError::RateLimited | ApiError::ServerError(_) | ApiError::Network(_)
        )
    }

    /// Calculate retry delay with exponential backoff.
    fn calculate_retry_delay(attempt: u32) -> u64 {
        RETRY_DELAY_MS * 2u64.pow(attempt - 1)
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Normalize the base URL by removing trailing slashes.
fn normalize_base_url(url: &str) -> Result<String> {
    let url = url.trim().trim_end_matches('/');

    if !url.starts_with("https://") && !url.starts_with("http://") {
        return Err(ApiError::InvalidUrl(url.to_string()));
    }

    // Warn if not HTTPS (but don't enforce for localhost/testing)
    if !url.starts_with("https://") && !url.contains("localhost") {
        warn!("URL does not use HTTPS: {}. This is insecure for production use.", url);
    }

    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url_removes_trailing_slash() {
        assert_eq!(
            normalize_base_url("https://sonar.example.com/").unwrap(),
            "https://sonar.example.com"
        );
    }

    #[test]
    fn test_normalize_base_url_handles_multiple_slashes() {
        assert_eq!(
            normalize_base_url("https://sonar.example.com///").unwrap(),
            "https://sonar.example.com"
        );
    }

    #[test]
    fn test_normalize_base_url_preserves_context_path() {
        assert_eq!(
            normalize_base_url("https://ci.example.com/sonarqube/").unwrap(),
            "https://ci.example.com/sonarqube"
        );
    }

    #[test]
    fn test_normalize_base_url_rejects_missing_scheme() {
        assert!(matches!(
            normalize_base_url("sonar.example.com"),
            Err(ApiError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_is_retryable() {
        assert!(SonarClient::is_retryable(&ApiError::RateLimited));
        assert!(SonarClient::is_retryable(&ApiError::ServerError(
            "test".to_string()
        )));
        assert!(!SonarClient::is_retryable(&ApiError::Unauthorized));
        assert!(!SonarClient::is_retryable(&ApiError::NotFound(
            "test".to_string()
        )));
    }

    #[test]
    fn test_retry_delay_exponential() {
        assert_eq!(SonarClient::calculate_retry_delay(1), 1000);
        assert_eq!(SonarClient::calculate_retry_delay(2), 2000);
        assert_eq!(SonarClient::calculate_retry_delay(3), 4000);
    }

    #[test]
    fn test_error_from_response_uses_sonar_messages() {
        let body = r#"{"errors":[{"msg":"Unknown user: ghost"},{"msg":"Hotspot is closed"}]}"#;
        let err = SonarClient::error_from_response(StatusCode::BAD_REQUEST, "url", body);
        match err {
            ApiError::AssignFailed(msg) => assert_eq!(msg, "Unknown user: ghost, Hotspot is closed"),
            other => panic!("Expected AssignFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_error_from_response_falls_back_to_url() {
        let err = SonarClient::error_from_response(
            StatusCode::NOT_FOUND,
            "https://sonar.example.com/api/hotspots/show",
            "<html>not json</html>",
        );
        match err {
            ApiError::NotFound(msg) => {
                assert_eq!(msg, "https://sonar.example.com/api/hotspots/show")
            }
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_with_page_size_clamps() {
        let client = SonarClient::with_token("https://sonar.example.com", "t").unwrap();
        assert_eq!(client.page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(client.clone().with_page_size(0).page_size(), 1);
        assert_eq!(client.with_page_size(10_000).page_size(), MAX_PAGE_SIZE);
    }

    #[tokio::test]
    async fn test_new_with_explicit_token_skips_keyring() {
        let profile = Profile::new("nokeyring".to_string(), "sonar.example.com".to_string());
        let result = SonarClient::new(&profile, Some("squ_abc")).await;
        assert!(matches!(result, Err(ApiError::InvalidUrl(_))));
    }
}
