use std::fmt;

use anyhow::Result;
use clap::Command;
use console::{Term, style};
use dialoguer::Input;
use dialoguer::theme::Theme;

use crate::registry::Catalog;
use crate::{list, repos};

/// What the shell should do after a line was read.
#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    Continue,
    Exit,
}

const PROMPT: &str = "dregu »";

/// Renders the prompt as `dregu » ` in green and bold, without the default `: ` suffix.
struct ShellTheme;

impl Theme for ShellTheme {
    fn format_input_prompt(
        &self,
        f: &mut dyn fmt::Write,
        prompt: &str,
        _default: Option<&str>,
    ) -> fmt::Result {
        write!(f, "{} ", style(prompt).green().bold())
    }

    fn format_input_prompt_selection(
        &self,
        f: &mut dyn fmt::Write,
        prompt: &str,
        sel: &str,
    ) -> fmt::Result {
        write!(f, "{} {}", style(prompt).green().bold(), sel)
    }
}

fn command() -> Command {
    Command::new("dregu")
        .multicall(true)
        .subcommand_required(true)
        .subcommand(list::command())
        .subcommand(repos::command())
        .subcommand(Command::new("clear").about("Clear the screen"))
        .subcommand(Command::new("exit").alias("quit").about("Exit the shell"))
}

/// Run the interactive shell until `exit` or end of input.
pub async fn run<C: Catalog>(catalog: &mut C, registry: &str) -> Result<()> {
    println!(
        "{} {}",
        style("Connected to").dim(),
        style(registry).cyan().bold()
    );
    println!("{}", style("Type 'help' for a list of commands.").dim());

    loop {
        let line: String = match Input::<String>::with_theme(&ShellTheme)
            .with_prompt(PROMPT)
            .allow_empty(true)
            .interact_text()
        {
            Ok(line) => line,
            Err(e) => {
                log::debug!("Leaving shell: {e}");
                return Ok(());
            }
        };

        if execute(catalog, &line).await? == Action::Exit {
            return Ok(());
        }
    }
}

/// Dispatch a single shell line. Command errors are printed, not returned.
pub async fn execute<C: Catalog>(catalog: &mut C, line: &str) -> Result<Action> {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty() {
        return Ok(Action::Continue);
    }

    let matches = match command().try_get_matches_from(words) {
        Ok(matches) => matches,
        Err(e) => {
            e.print()?;
            return Ok(Action::Continue);
        }
    };

    let result = match matches.subcommand() {
        Some(("list", args)) => list::handle(catalog, args).await,
        Some(("repos", args)) => repos::handle(catalog, args).await,
        Some(("clear", _)) => {
            Term::stdout().clear_screen()?;
            Ok(())
        }
        Some(("exit", _)) => return Ok(Action::Exit),
        _ => Ok(()),
    };

    if let Err(e) = result {
        log::debug!("Error: {e:?}");
        eprintln!("{} {}", style("error:").red().bold(), e);
    }
    Ok(Action::Continue)
}
