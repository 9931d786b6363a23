use anyhow::{Context, Result, anyhow};
use reqwest::header::{HeaderMap, LINK, WWW_AUTHENTICATE};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

use super::Catalog;
use crate::docker_config::Credentials;
use crate::error;

#[derive(Debug, Deserialize)]
pub struct RegistryTokenResponse {
    pub token: Option<String>,
    pub access_token: Option<String>,
    pub expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    #[serde(default)]
    repositories: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// Client for the read-only part of the docker distribution API.
pub struct RegistryClient {
    http: Client,
    base_url: Url,
    credentials: Option<Credentials>,
    token: Option<String>,
}

impl RegistryClient {
    /// Build a client and ping `/v2/` to make sure the registry is reachable
    /// and accepts our credentials.
    pub async fn connect(registry: &str, credentials: Option<Credentials>) -> Result<Self> {
        let registry_url = registry_url(registry);
        let base_url = Url::parse(&registry_url)
            .with_context(|| format!("Invalid registry address '{}'", registry))?;

        let mut client = RegistryClient {
            http: Client::new(),
            base_url,
            credentials,
            token: None,
        };

        client.ping().await.map_err(|e| {
            anyhow!(
                "could not connect to docker registry at {}: {}",
                registry_url,
                e
            )
        })?;

        Ok(client)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn ping(&mut self) -> Result<()> {
        let url = self.base_url.join("/v2/")?;
        log::debug!("Checking registry endpoint: {}", url);
        let response = self.get(url).await?;
        error::handle_http_error(response, "ping registry").await
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        if let Some(token) = &self.token {
            request.bearer_auth(token)
        } else if let Some(creds) = &self.credentials {
            request.basic_auth(&creds.username, Some(&creds.password))
        } else {
            request
        }
    }

    /// GET with authentication. A bearer challenge triggers one token
    /// exchange and a single retry.
    async fn get(&mut self, url: Url) -> Result<Response> {
        let response = self.authorize(self.http.get(url.clone())).send().await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let challenge = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|h| h.to_str().ok())
            .filter(|h| h.starts_with("Bearer "))
            .map(str::to_string);
        let Some(challenge) = challenge else {
            return Ok(response);
        };

        log::debug!("WWW-Authenticate header: {}", challenge);
        self.token = self.fetch_token(&challenge).await?;

        Ok(self.authorize(self.http.get(url)).send().await?)
    }

    async fn fetch_token(&self, challenge: &str) -> Result<Option<String>> {
        let (realm, service, scope) = parse_www_authenticate(challenge)?;

        log::debug!(
            "Requesting token from {} - service: {:?}, scope: {:?}",
            realm,
            service,
            scope
        );

        let mut query = vec![];
        if let Some(svc) = service {
            query.push(("service", svc));
        }
        if let Some(scp) = scope {
            query.push(("scope", scp));
        }

        let mut auth_request = self.http.get(&realm).query(&query);
        if let Some(creds) = &self.credentials {
            auth_request = auth_request.basic_auth(&creds.username, Some(&creds.password));
            log::debug!("Using basic auth with username: {}", creds.username);
        }

        let auth_resp = auth_request.send().await?;
        if !auth_resp.status().is_success() {
            return Err(anyhow!(
                "Failed to authenticate with registry: HTTP {}",
                auth_resp.status()
            ));
        }

        let token_response: RegistryTokenResponse = auth_resp.json().await?;
        log::debug!(
            "Successfully obtained token, expires_in: {:?}",
            token_response.expires_in
        );

        Ok(token_response.token.or(token_response.access_token))
    }

    /// Fetch every page of a listing endpoint, following `Link: <..>; rel="next"`.
    async fn get_paginated<T, F>(
        &mut self,
        path: &str,
        operation: &str,
        mut items: F,
    ) -> Result<Vec<String>>
    where
        T: DeserializeOwned,
        F: FnMut(T) -> Vec<String>,
    {
        let mut url = self.base_url.join(path)?;
        let mut collected = Vec::new();

        loop {
            log::debug!("Fetching {}", url);
            let response = self.get(url.clone()).await?;
            if !response.status().is_success() {
                return Err(error::response_error(response, operation).await);
            }

            let next = next_link(response.headers())
                .map(|link| url.join(&link))
                .transpose()?;

            let page: T = response
                .json()
                .await
                .with_context(|| format!("Failed to decode response of {}", url))?;
            collected.extend(items(page));

            match next {
                Some(next) if next != url => url = next,
                _ => break,
            }
        }

        Ok(collected)
    }
}

impl Catalog for RegistryClient {
    async fn repositories(&mut self) -> Result<Vec<String>> {
        self.get_paginated("/v2/_catalog", "list repositories", |page: CatalogResponse| {
            page.repositories
        })
        .await
    }

    async fn tags(&mut self, repository: &str) -> Result<Vec<String>> {
        let path = format!("/v2/{}/tags/list", repository);
        let operation = format!("list tags of {}", repository);
        self.get_paginated(&path, &operation, |page: TagsResponse| {
            page.tags.unwrap_or_default()
        })
        .await
    }
}

/// Normalize a registry host to a url, defaulting to https.
pub fn registry_url(registry: &str) -> String {
    let registry = registry.trim_end_matches('/');
    if registry.starts_with("http://") || registry.starts_with("https://") {
        registry.to_string()
    } else {
        format!("https://{}", registry)
    }
}

/// Parse WWW-Authenticate header
/// Format: Bearer realm="https://auth.example.com/token",service="registry.example.com",scope="repository:user/image:pull"
fn parse_www_authenticate(header: &str) -> Result<(String, Option<String>, Option<String>)> {
    let params_str = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| anyhow!("Unsupported authentication scheme, expected Bearer auth"))?;

    let mut params: HashMap<String, String> = HashMap::new();
    for part in split_params(params_str) {
        if let Some((key, value)) = part.split_once('=') {
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim().trim_matches('"');
            params.insert(key, value.to_string());
        }
    }

    let realm = params
        .remove("realm")
        .ok_or_else(|| anyhow!("No realm found in WWW-Authenticate header"))?;

    Ok((realm, params.remove("service"), params.remove("scope")))
}

/// Split on commas outside of quotes; scopes like `repository:a:pull,push` contain commas.
fn split_params(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(s[start..].trim());
    parts
}

fn next_link(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .find_map(parse_next_link)
}

/// Extract the target of `rel="next"` from a Link header value.
fn parse_next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|link| {
        let mut segments = link.split(';');
        let target = segments.next()?.trim();
        let is_next = segments.any(|param| {
            param
                .trim()
                .split_once('=')
                .is_some_and(|(k, v)| k.trim() == "rel" && v.trim().trim_matches('"') == "next")
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}
