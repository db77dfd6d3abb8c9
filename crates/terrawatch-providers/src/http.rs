//! Request plumbing shared by the provider clients.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use terrawatch_core::{NetworkError, ProviderError, ProviderKind, ReqwestErrorExt};

use crate::retry::{with_retry, RetryConfig};

const ERROR_BODY_LIMIT: usize = 200;

pub(crate) fn build_client(timeout: Duration) -> Result<Client, NetworkError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("terrawatch/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(ReqwestErrorExt::into_network_error)
}

/// Send with retries and return the body of a successful response.
pub(crate) async fn get_text<F>(
    provider: ProviderKind,
    retry: &RetryConfig,
    request: F,
) -> Result<String, ProviderError>
where
    F: Fn() -> RequestBuilder,
{
    let response = with_retry(retry, || request().send())
        .await
        .map_err(|e| ProviderError::network(provider, e.into_network_error()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ProviderError::network(provider, e.into_network_error()))?;

    if !status.is_success() {
        return Err(ProviderError::network(
            provider,
            NetworkError::ServerError {
                status: status.as_u16(),
                message: truncate(&body, ERROR_BODY_LIMIT),
            },
        ));
    }

    Ok(body)
}

/// Send with retries and decode a JSON body.
pub(crate) async fn get_json<T, F>(
    provider: ProviderKind,
    retry: &RetryConfig,
    request: F,
) -> Result<T, ProviderError>
where
    T: DeserializeOwned,
    F: Fn() -> RequestBuilder,
{
    let body = get_text(provider, retry, request).await?;
    serde_json::from_str(&body).map_err(|e| ProviderError::invalid_payload(provider, e.to_string()))
}

pub(crate) fn require_key(
    provider: ProviderKind,
    key: &Option<String>,
) -> Result<String, ProviderError> {
    key.as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .ok_or(ProviderError::MissingApiKey { provider })
}

fn truncate(body: &str, limit: usize) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("  short  ", 10), "short");
        assert_eq!(truncate("ééééé", 2), "éé...");
    }

    #[test]
    fn test_require_key() {
        let kind = ProviderKind::Fires;
        assert!(matches!(
            require_key(kind, &None),
            Err(ProviderError::MissingApiKey { .. })
        ));
        assert!(require_key(kind, &Some("   ".into())).is_err());
        assert_eq!(require_key(kind, &Some(" abc ".into())).unwrap(), "abc");
    }
}
