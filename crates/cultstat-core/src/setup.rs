//! Credential validation for initial setup and reauthentication.

use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::graphql::{data_field, FetchError, FetchErrorKind, GraphqlClient};
use crate::queries::QuerySet;
use crate::{Credentials, QueryMode, ValidationError};

/// Setup-level failures, each mapped to a user-correctable message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SetupError {
    #[error("invalid credentials: {0}")]
    InvalidAuth(FetchError),
    #[error("user not found: {0}")]
    UnknownUser(FetchError),
    #[error("cannot connect: {0}")]
    CannotConnect(FetchError),
    #[error("unexpected error: {0}")]
    Unexpected(FetchError),
    #[error("initial refresh failed: {0}")]
    NotReady(FetchError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl SetupError {
    /// Short reason key for setup forms.
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::InvalidAuth(_) => "invalid_auth",
            Self::UnknownUser(_) => "unknown_user",
            Self::CannotConnect(_) => "cannot_connect",
            Self::Unexpected(_) => "unknown",
            Self::NotReady(_) => "not_ready",
            Self::Validation(_) => "invalid_input",
        }
    }
}

impl From<FetchError> for SetupError {
    fn from(error: FetchError) -> Self {
        match error.kind() {
            FetchErrorKind::Authentication => Self::InvalidAuth(error),
            FetchErrorKind::NotFound => Self::UnknownUser(error),
            FetchErrorKind::Transport | FetchErrorKind::Http | FetchErrorKind::RateLimited => {
                Self::CannotConnect(error)
            }
            FetchErrorKind::Schema | FetchErrorKind::GraphQl => Self::Unexpected(error),
        }
    }
}

/// Checks that the nickname exists and, when a key is set, that it is accepted.
///
/// Returns the query mode the credentials allow.
pub async fn validate_credentials(
    client: &GraphqlClient,
    queries: &QuerySet,
    credentials: &Credentials,
) -> Result<QueryMode, SetupError> {
    let authenticated = credentials.has_api_key();
    let response = client
        .execute(
            &queries.validation(authenticated),
            json!({ "nick": credentials.username() }),
            Some(credentials),
        )
        .await
        .inspect_err(|error| warn!(code = error.code(), error = %error, "credential validation failed"))?;

    if data_field(&response, "user")?.is_none() {
        return Err(SetupError::UnknownUser(FetchError::not_found(format!(
            "user '{}' not found",
            credentials.username()
        ))));
    }

    if !authenticated {
        return Ok(QueryMode::Public);
    }
    if data_field(&response, "myself")?.is_none() {
        return Err(SetupError::InvalidAuth(FetchError::authentication(
            "api key was not accepted",
        )));
    }

    debug!(username = credentials.username(), "credentials validated");
    Ok(QueryMode::Full)
}

/// Validates a replacement key for the stored account and returns the new credentials.
pub async fn reauthenticate(
    client: &GraphqlClient,
    queries: &QuerySet,
    stored: &Credentials,
    new_api_key: &str,
) -> Result<Credentials, SetupError> {
    let candidate = stored.with_api_key(new_api_key)?;
    validate_credentials(client, queries, &candidate).await?;
    Ok(candidate)
}
