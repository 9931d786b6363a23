use anyhow::Result;

pub mod client;

pub use client::RegistryClient;

/// Read access to the repositories and tags stored in a registry.
#[allow(async_fn_in_trait)]
pub trait Catalog {
    /// Names of all repositories, in the order the registry returns them.
    async fn repositories(&mut self) -> Result<Vec<String>>;

    async fn tags(&mut self, repository: &str) -> Result<Vec<String>>;
}
