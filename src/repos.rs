use anyhow::Result;
use clap::{Arg, Command};

use crate::default_spinner;
use crate::list::match_repositories;
use crate::registry::Catalog;

pub fn command() -> Command {
    Command::new("repos")
        .alias("catalog")
        .about("List all repository names, optionally only those starting with a prefix")
        .arg(
            Arg::new("prefix")
                .help("Only list repositories starting with this prefix")
                .required(false)
                .index(1),
        )
}

pub async fn handle<C: Catalog>(catalog: &mut C, args: &clap::ArgMatches) -> Result<()> {
    let prefix = args
        .get_one::<String>("prefix")
        .map(String::as_str)
        .unwrap_or("");

    let progress = default_spinner();
    progress.set_prefix("Fetching repositories");
    let repositories = catalog.repositories().await;
    progress.finish_and_clear();

    let repositories = match_repositories(repositories?, prefix, true);
    if repositories.is_empty() {
        println!("{} No repositories found.", console::style("ℹ️").dim());
        return Ok(());
    }

    println!("{}", repositories.join("\n"));
    Ok(())
}
