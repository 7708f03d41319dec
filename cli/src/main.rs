mod campaign;
mod subscriber;

use clap::{Arg, ArgMatches, Command};
use dripline::{config, Config, Database};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cmd().get_matches();

    // Fall back to defaults when run outside a directory with a config file.
    let mut config: Config = match matches.get_one::<String>("config") {
        Some(path) => config::load_from(path)?,
        None => config::load().unwrap_or_default(),
    };

    if let Some(level) = matches.get_one::<String>("verbosity") {
        config.tracing.level = level.as_str().into();
    }

    match matches.subcommand() {
        Some(("serve", _)) => dripline::axum::start(config).await?,
        Some((name, m)) => {
            if let Err(e) = dripline::tracing::init(&config) {
                eprintln!("failed to initialize tracing: {e}");
            }
            let db = Database::new(&config.db)?;
            dispatch(name, m, &config, &db).await?;
            db.flush().await?;
        }
        None => unreachable!("subcommand is required"),
    }

    Ok(())
}

async fn dispatch(name: &str, m: &ArgMatches, config: &Config, db: &Database) -> anyhow::Result<()> {
    match name {
        "run" => campaign::run(m, config, db).await,
        "stats" => campaign::stats(m, db),
        "subscriber" => subscriber::run(m, db),
        other => anyhow::bail!("unknown command: {other}"),
    }
}

pub fn cmd() -> Command {
    Command::new("dripline")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .infer_subcommands(true)
        .version(VERSION)
        .about("Drip-campaign email sender and dashboard backend")
        .subcommand(Command::new("serve").about("Start the http server"))
        .subcommand(campaign::run_cmd())
        .subcommand(campaign::stats_cmd())
        .subcommand(subscriber::cmd())
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("PATH")
                .global(true)
                .help("Path to the config file"),
        )
        .arg(
            Arg::new("verbosity")
                .long("verbosity")
                .short('v')
                .display_order(100)
                .value_name("level")
                .value_parser(["trace", "debug", "info", "warn", "error", "none"])
                .global(true)
                .help("Set the verbosity of the log output"),
        )
}
