use anyhow::{Result, anyhow};
use console::{Emoji, style};
use reqwest::Response;
use serde::Deserialize;

static WARNING: Emoji = Emoji("⚠️  ", "");
static ERROR: Emoji = Emoji("❌ ", "");
static NO_ENTRY: Emoji = Emoji("⛔ ", "");

/// Error envelope returned by registries implementing the distribution API.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    errors: Vec<RegistryError>,
}

#[derive(Debug, Deserialize)]
struct RegistryError {
    code: String,
    #[serde(default)]
    message: String,
}

impl ErrorResponse {
    fn reason(&self) -> Option<String> {
        let reasons: Vec<String> = self
            .errors
            .iter()
            .map(|e| {
                if e.message.is_empty() {
                    e.code.clone()
                } else {
                    format!("{}: {}", e.code, e.message)
                }
            })
            .collect();

        if reasons.is_empty() {
            None
        } else {
            Some(reasons.join("; "))
        }
    }
}

fn registry_reason(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|r| r.reason())
}

pub async fn handle_http_error(response: Response, operation: &str) -> Result<()> {
    if response.status().is_success() {
        return Ok(());
    }

    Err(response_error(response, operation).await)
}

/// Describe a failed response, consuming its body.
pub async fn response_error(response: Response, operation: &str) -> anyhow::Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    describe_failure(status, &body, operation)
}

fn describe_failure(status: reqwest::StatusCode, body: &str, operation: &str) -> anyhow::Error {
    match status.as_u16() {
        401 | 403 => {
            let reason = registry_reason(body)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unauthorized").into());
            anyhow!(
                "{}Failed to {}: {}",
                NO_ENTRY,
                operation,
                style(format!("access denied ({reason})")).red()
            )
        }
        400..=499 => match registry_reason(body) {
            Some(reason) => anyhow!("{}Failed to {}: {}", ERROR, operation, style(reason).red()),
            None if !body.trim().is_empty() => anyhow!(
                "{}Client error ({}): {}",
                ERROR,
                status.as_u16(),
                body.trim()
            ),
            None => anyhow!(
                "{}Client error: {} - {}",
                ERROR,
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown error")
            ),
        },
        503 => match registry_reason(body) {
            Some(reason) => anyhow!(
                "{}{}",
                WARNING,
                style(format!("Registry temporarily unavailable: {reason}")).yellow()
            ),
            None => anyhow!("{}Registry temporarily unavailable", WARNING),
        },
        _ => anyhow!("Failed to {}: {} - {}", operation, status, body.trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn renders_registry_error_envelope() {
        let body = r#"{"errors":[{"code":"NAME_UNKNOWN","message":"repository name not known to registry","detail":{"name":"foo"}}]}"#;
        let err = describe_failure(StatusCode::NOT_FOUND, body, "list tags").to_string();
        assert!(err.contains("NAME_UNKNOWN: repository name not known to registry"));
        assert!(err.contains("list tags"));
    }

    #[test]
    fn unauthorized_is_access_denied() {
        let body = r#"{"errors":[{"code":"UNAUTHORIZED","message":"authentication required"}]}"#;
        let err = describe_failure(StatusCode::UNAUTHORIZED, body, "list repositories").to_string();
        assert!(err.contains("access denied"));
        assert!(err.contains("UNAUTHORIZED"));
    }

    #[test]
    fn plain_text_body_is_kept() {
        let err = describe_failure(StatusCode::BAD_REQUEST, "bad things\n", "ping").to_string();
        assert!(err.contains("Client error (400): bad things"));
    }

    #[test]
    fn empty_body_falls_back_to_status() {
        let err = describe_failure(StatusCode::NOT_FOUND, "", "ping").to_string();
        assert!(err.contains("404"));
        assert!(err.contains("Not Found"));
    }

    #[test]
    fn server_errors_include_status() {
        let err = describe_failure(StatusCode::INTERNAL_SERVER_ERROR, "boom", "ping").to_string();
        assert!(err.contains("500"));
        assert!(err.contains("boom"));
    }
}
