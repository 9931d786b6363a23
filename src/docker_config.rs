use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

/// Subset of `~/.docker/config.json` needed to authenticate against a registry.
#[derive(Debug, Default, Deserialize)]
pub struct DockerConfig {
    /// Keyed by registry url, as written by `docker login`.
    #[serde(default)]
    pub auths: HashMap<String, AuthEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthEntry {
    #[serde(default)]
    pub auth: String,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl DockerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("Failed to read docker config {}", path.display()))?;
        serde_json::from_slice(&data)
            .with_context(|| format!("Failed to parse docker config {}", path.display()))
    }

    /// Find the auth entry for a registry. Exact key match wins, otherwise keys
    /// like `https://host/v1/` are compared by host.
    pub fn auth_for(&self, registry: &str) -> Option<&AuthEntry> {
        if let Some(entry) = self.auths.get(registry) {
            return Some(entry);
        }

        let wanted = registry_host(registry);
        self.auths
            .iter()
            .find(|(key, _)| registry_host(key) == wanted)
            .map(|(_, entry)| entry)
    }
}

impl AuthEntry {
    pub fn credentials(&self) -> Result<Credentials> {
        let data = STANDARD
            .decode(self.auth.trim())
            .map_err(|e| anyhow!("Failed to decode registry auth: {}", e))?;
        let data = String::from_utf8(data)
            .map_err(|_| anyhow!("Registry auth is not valid UTF-8"))?;

        let (username, password) = data
            .split_once(':')
            .ok_or_else(|| anyhow!("unknown credentials format: expected <user>:<password>"))?;

        Ok(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

/// Parse the basic-auth credentials stored for `registry` in a docker config file.
/// A missing file or a registry without stored auth yields `Ok(None)`.
pub fn parse_credentials_from_docker_config(
    path: &Path,
    registry: &str,
) -> Result<Option<Credentials>> {
    if !path.try_exists()? {
        log::debug!("Docker config {} does not exist", path.display());
        return Ok(None);
    }

    let config = DockerConfig::load(path)?;
    match config.auth_for(registry) {
        Some(entry) => {
            log::debug!("Found credentials for {} in {}", registry, path.display());
            entry.credentials().map(Some)
        }
        None => {
            log::debug!("No credentials for {} in {}", registry, path.display());
            Ok(None)
        }
    }
}

/// Strip scheme and path: `https://index.docker.io/v1/` -> `index.docker.io`.
fn registry_host(key: &str) -> &str {
    let key = key
        .strip_prefix("https://")
        .or_else(|| key.strip_prefix("http://"))
        .unwrap_or(key);
    key.split('/').next().unwrap_or(key)
}
