use anyhow::{Result, anyhow};
use clap::{Arg, ArgAction, Command};
use console::style;

use crate::default_spinner;
use crate::registry::Catalog;

pub fn command() -> Command {
    Command::new("list")
        .alias("ls")
        .about("List all repositories with their versions matching the given name")
        .arg(
            Arg::new("repository")
                .help("Repository name")
                .value_name("REPOSITORY-NAME")
                .num_args(0..)
                .index(1),
        )
        .arg(
            Arg::new("prefix")
                .long("prefix")
                .help("All repositories are listed whose name contains the given name as a prefix")
                .action(ArgAction::SetTrue),
        )
}

pub async fn handle<C: Catalog>(catalog: &mut C, args: &clap::ArgMatches) -> Result<()> {
    let names: Vec<&String> = args
        .get_many::<String>("repository")
        .map(|v| v.collect())
        .unwrap_or_default();
    let [name] = names.as_slice() else {
        return Err(anyhow!("invalid arguments, see help"));
    };
    let prefix = args.get_flag("prefix");

    for line in list(catalog, name, prefix).await? {
        println!("{line}");
    }
    Ok(())
}

/// Produce the output lines for `list`: one `<repo>: [ tags ]` line per
/// matching repository, or a single notice when nothing matches.
pub async fn list<C: Catalog>(catalog: &mut C, name: &str, prefix: bool) -> Result<Vec<String>> {
    let progress = default_spinner();
    progress.set_prefix("Fetching repositories");
    let repositories = catalog.repositories().await;
    progress.finish_and_clear();
    let repositories = repositories?;

    let matching = match_repositories(repositories, name, prefix);
    log::debug!("{} repositories match '{}'", matching.len(), name);

    if matching.is_empty() {
        let kind = if prefix { "prefix" } else { "name" };
        return Ok(vec![format!("no repository found with {kind} '{name}'")]);
    }

    let mut lines = Vec::with_capacity(matching.len());
    for repository in matching {
        let mut tags = catalog.tags(&repository).await?;
        tags.sort();
        lines.push(format!(
            "{}: {}",
            style(&repository).cyan(),
            format_tags(&tags)
        ));
    }
    Ok(lines)
}

pub fn match_repositories(repositories: Vec<String>, name: &str, prefix: bool) -> Vec<String> {
    let mut matching: Vec<String> = repositories
        .into_iter()
        .filter(|repo| {
            if prefix {
                repo.starts_with(name)
            } else {
                repo == name
            }
        })
        .collect();
    matching.sort();
    matching.dedup();
    matching
}

pub fn format_tags(tags: &[String]) -> String {
    format!("[ {} ]", tags.join(", "))
}
