use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches};
use yapp::PasswordReader;

use crate::docker_config::{self, Credentials};
use crate::registry::RegistryClient;

pub const DEFAULT_REGISTRY: &str = "docker.wahtari.m";
pub const DEFAULT_USER: &str = "docker";

/// Where the credentials for the registry come from.
#[derive(Debug, PartialEq, Eq)]
pub enum CredentialSource {
    DockerConfig(PathBuf),
    Explicit(Credentials),
}

pub struct CliConfig {
    pub registry: String,
    pub docker_config: Option<PathBuf>,
    pub user: String,
    pub password: Option<String>,
}

/// Global flags shared by one-shot commands and the interactive shell.
pub fn global_args() -> Vec<Arg> {
    vec![
        Arg::new("verbose")
            .short('v')
            .long("verbose")
            .help("Verbose mode")
            .global(true)
            .action(ArgAction::SetTrue),
        Arg::new("json")
            .short('j')
            .long("json")
            .help("JSON log mode")
            .global(true)
            .action(ArgAction::SetTrue),
        Arg::new("docker_config")
            .long("docker-config")
            .value_name("FILE")
            .help("The config.json file of the local .docker dir (defaults to ~/.docker/config.json, pass an empty value to disable)"),
        Arg::new("registry")
            .short('r')
            .long("registry")
            .value_name("HOST")
            .help(format!("The hostname of the docker registry [default: {DEFAULT_REGISTRY}]")),
        Arg::new("user")
            .short('u')
            .long("user")
            .value_name("USER")
            .help("The user used to access the docker registry")
            .default_value(DEFAULT_USER),
        Arg::new("password")
            .short('p')
            .long("password")
            .value_name("PASSWORD")
            .help("The password used to access the docker registry (takes precedence over the docker config)")
            .conflicts_with("ask_password"),
        Arg::new("ask_password")
            .short('P')
            .long("ask-password")
            .help("Prompt for the registry password")
            .action(ArgAction::SetTrue),
    ]
}

impl CliConfig {
    pub fn init(matches: &ArgMatches) -> Result<Self> {
        let registry = resolve_registry(
            matches.get_one::<String>("registry"),
            std::env::var("DREGU_REGISTRY").ok(),
        );
        log::debug!("Using registry: {registry}");

        let docker_config = match matches.get_one::<String>("docker_config") {
            Some(path) if path.is_empty() => None,
            Some(path) => Some(PathBuf::from(path)),
            None => default_docker_config(std::env::var_os("DOCKER_CONFIG"), home::home_dir()),
        };

        let password = if matches.get_flag("ask_password") {
            let mut yapp = yapp::Yapp::new().with_echo_symbol('*');
            let password = yapp
                .read_password_with_prompt("Enter password: ")
                .map_err(|e| anyhow::anyhow!("Failed to read password from stdin: {}", e))?;
            Some(password)
        } else {
            matches.get_one::<String>("password").cloned()
        };

        Ok(CliConfig {
            registry,
            docker_config,
            user: matches
                .get_one::<String>("user")
                .cloned()
                .unwrap_or_else(|| DEFAULT_USER.to_string()),
            password,
        })
    }

    /// An explicit password wins, then the docker config, then the user
    /// without a password.
    pub fn credential_source(&self) -> CredentialSource {
        match (&self.password, &self.docker_config) {
            (Some(password), _) => CredentialSource::Explicit(Credentials {
                username: self.user.clone(),
                password: password.clone(),
            }),
            (None, Some(path)) => CredentialSource::DockerConfig(path.clone()),
            (None, None) => CredentialSource::Explicit(Credentials {
                username: self.user.clone(),
                password: String::new(),
            }),
        }
    }

    pub async fn connect(&self) -> Result<RegistryClient> {
        match self.credential_source() {
            CredentialSource::DockerConfig(path) => {
                let credentials =
                    match docker_config::parse_credentials_from_docker_config(&path, &self.registry) {
                        Ok(credentials) => credentials,
                        Err(e) => {
                            log::debug!("parse credentials from docker config: {e:#}");
                            None
                        }
                    };
                RegistryClient::connect(&self.registry, credentials).await
            }
            CredentialSource::Explicit(credentials) => {
                RegistryClient::connect(&self.registry, Some(credentials)).await
            }
        }
    }
}

/// The `--registry` flag, then `$DREGU_REGISTRY`, then the built-in default.
fn resolve_registry(flag: Option<&String>, env: Option<String>) -> String {
    flag.cloned()
        .or(env.filter(|r| !r.is_empty()))
        .unwrap_or_else(|| DEFAULT_REGISTRY.to_string())
}

/// `$DOCKER_CONFIG/config.json`, else `~/.docker/config.json`.
fn default_docker_config(
    docker_config_dir: Option<OsString>,
    home: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(dir) = docker_config_dir.filter(|d| !d.is_empty()) {
        return Some(PathBuf::from(dir).join("config.json"));
    }
    home.map(|home| home.join(".docker").join("config.json"))
}
