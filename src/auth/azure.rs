//! Azure AD credential sources: the Azure CLI and the instance metadata service.

use std::env;
use std::process::Command;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::error::Error;

use super::{AccessToken, TokenCredential};

/// Instance Metadata Service token endpoint.
pub const IMDS_TOKEN_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
const IMDS_TIMEOUT: Duration = Duration::from_secs(5);

/// Token from `az account get-access-token`.
#[derive(Debug, Clone)]
pub struct AzureCliCredential {
    program: String,
}

impl AzureCliCredential {
    pub fn new() -> Self {
        Self {
            program: "az".to_string(),
        }
    }

    /// Use a different `az` executable.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for AzureCliCredential {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    /// Epoch seconds; older CLI releases only emit the local-time `expiresOn` string
    #[serde(default, rename = "expires_on")]
    expires_on: Option<Value>,
}

/// Parse the JSON printed by `az account get-access-token --output json`.
pub(crate) fn parse_cli_output(stdout: &str) -> Result<AccessToken, Error> {
    let parsed: CliToken = serde_json::from_str(stdout)
        .map_err(|e| Error::Credential(format!("unexpected az output: {}", e)))?;
    Ok(AccessToken {
        expires_at: parsed
            .expires_on
            .as_ref()
            .and_then(epoch_seconds)
            .map(|s| std::time::UNIX_EPOCH + Duration::from_secs(s)),
        token: parsed.access_token,
    })
}

fn epoch_seconds(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl TokenCredential for AzureCliCredential {
    fn name(&self) -> &str {
        "azure_cli"
    }

    fn get_token(&self, scope: &str) -> Result<AccessToken, Error> {
        let output = Command::new(&self.program)
            .args(["account", "get-access-token", "--scope", scope, "--output", "json"])
            .output()
            .map_err(|e| Error::Credential(format!("cannot run '{}': {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Credential(format!(
                "'{} account get-access-token' failed: {}",
                self.program,
                stderr.trim()
            )));
        }
        parse_cli_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Token from the managed identity attached to the VM or container.
#[derive(Debug, Clone)]
pub struct ManagedIdentityCredential {
    endpoint: String,
    client_id: Option<String>,
}

impl ManagedIdentityCredential {
    /// `client_id` selects a user-assigned identity; `DEFAULT_IDENTITY_CLIENT_ID` is
    /// used when it is `None`.
    pub fn new(client_id: Option<String>) -> Self {
        Self {
            endpoint: IMDS_TOKEN_ENDPOINT.to_string(),
            client_id: client_id.or_else(|| env::var("DEFAULT_IDENTITY_CLIENT_ID").ok().filter(|s| !s.is_empty())),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }
}

/// IMDS speaks v1 resources, not v2 scopes.
fn resource_for_scope(scope: &str) -> &str {
    scope.strip_suffix("/.default").unwrap_or(scope)
}

impl TokenCredential for ManagedIdentityCredential {
    fn name(&self) -> &str {
        "managed_identity"
    }

    fn get_token(&self, scope: &str) -> Result<AccessToken, Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(IMDS_TIMEOUT)
            .no_proxy()
            .build()
            .map_err(|e| Error::Credential(format!("building IMDS client: {}", e)))?;

        let mut query = vec![
            ("api-version", IMDS_API_VERSION.to_string()),
            ("resource", resource_for_scope(scope).to_string()),
        ];
        if let Some(id) = &self.client_id {
            query.push(("client_id", id.clone()));
        }

        let resp = client
            .get(&self.endpoint)
            .header("Metadata", "true")
            .query(&query)
            .send()
            .map_err(|e| Error::Credential(format!("IMDS unreachable: {}", e)))?;

        let status = resp.status();
        let body: Value = resp
            .json()
            .map_err(|e| Error::Credential(format!("IMDS returned non-JSON (HTTP {}): {}", status.as_u16(), e)))?;
        if !status.is_success() {
            let reason = body
                .get("error_description")
                .and_then(|v| v.as_str())
                .unwrap_or("no description");
            return Err(Error::Credential(format!("IMDS HTTP {}: {}", status.as_u16(), reason)));
        }

        let token = body
            .get("access_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Credential("IMDS response has no access_token".to_string()))?;
        Ok(AccessToken {
            token: token.to_string(),
            expires_at: body
                .get("expires_on")
                .and_then(epoch_seconds)
                .map(|s| std::time::UNIX_EPOCH + Duration::from_secs(s)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[test]
    fn test_parse_cli_output_with_epoch() {
        let out = r#"{
            "accessToken": "eyJ0eXAi",
            "expiresOn": "2025-05-01 10:00:00.000000",
            "expires_on": 1746093600,
            "subscription": "sub",
            "tenant": "tenant",
            "tokenType": "Bearer"
        }"#;
        let token = parse_cli_output(out).unwrap();
        assert_eq!(token.token, "eyJ0eXAi");
        assert_eq!(
            token.expires_at,
            Some(std::time::UNIX_EPOCH + Duration::from_secs(1_746_093_600))
        );
    }

    #[test]
    fn test_parse_cli_output_without_epoch() {
        let token = parse_cli_output(r#"{"accessToken": "t", "expiresOn": "2025-05-01 10:00:00"}"#).unwrap();
        assert!(token.expires_at.is_none());
    }

    #[test]
    fn test_parse_cli_output_garbage() {
        assert!(matches!(parse_cli_output("ERROR: Please run 'az login'"), Err(Error::Credential(_))));
    }

    #[test]
    fn test_missing_cli_is_credential_error() {
        let cred = AzureCliCredential::with_program("definitely-not-an-az-binary-7f3c");
        assert!(matches!(cred.get_token("api://trapi/.default"), Err(Error::Credential(_))));
    }

    #[test]
    fn test_resource_for_scope() {
        assert_eq!(resource_for_scope("api://trapi/.default"), "api://trapi");
        assert_eq!(resource_for_scope("https://cognitiveservices.azure.com"), "https://cognitiveservices.azure.com");
    }

    #[test]
    fn test_managed_identity_token() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", Matcher::Regex("^/metadata/identity/oauth2/token".to_string()))
            .match_header("Metadata", "true")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("api-version".into(), IMDS_API_VERSION.into()),
                Matcher::UrlEncoded("resource".into(), "api://trapi".into()),
                Matcher::UrlEncoded("client_id".into(), "abc-123".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "imds-token", "expires_on": "1746093600", "token_type": "Bearer"}"#)
            .create();

        let cred = ManagedIdentityCredential::new(Some("abc-123".into()))
            .with_endpoint(format!("{}/metadata/identity/oauth2/token", server.url()));
        let token = cred.get_token("api://trapi/.default").unwrap();
        assert_eq!(token.token, "imds-token");
        assert!(token.expires_at.is_some());
        mock.assert();
    }

    #[test]
    fn test_managed_identity_error_status() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", Matcher::Regex("^/metadata/identity/oauth2/token".to_string()))
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error": "invalid_request", "error_description": "Identity not found"}"#)
            .create();

        let cred = ManagedIdentityCredential::new(Some("x".into()))
            .with_endpoint(format!("{}/metadata/identity/oauth2/token", server.url()));
        match cred.get_token("api://trapi/.default").unwrap_err() {
            Error::Credential(msg) => assert!(msg.contains("Identity not found")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
