use anyhow::Result;
use clap::Command;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let matches = Command::new("dregu")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Docker-REGistry-Utility offers a convenient API to a docker-registry")
        .args(dregu::config::global_args())
        .subcommand(dregu::list::command())
        .subcommand(dregu::repos::command())
        .subcommand(Command::new("shell").about("Start the interactive shell (default)"))
        .get_matches();

    if let Err(e) = run(&matches).await {
        log::debug!("Error: {e:?}");
        eprintln!("{} {}", console::style("error:").red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(matches: &clap::ArgMatches) -> Result<()> {
    dregu::logging::init(matches.get_flag("verbose"), matches.get_flag("json"));
    let config = dregu::config::CliConfig::init(matches)?;

    let mut registry = config.connect().await?;
    log::debug!("Connected to {}", registry.base_url());

    match matches.subcommand() {
        Some(("list", args)) => dregu::list::handle(&mut registry, args).await,
        Some(("repos", args)) => dregu::repos::handle(&mut registry, args).await,
        _ => dregu::shell::run(&mut registry, &config.registry).await,
    }
}
