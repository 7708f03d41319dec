use anyhow::Result;
use clap::{value_parser, Arg, ArgAction, ArgMatches};

use dripline::campaign::delivery;
use dripline::email::{Mailer, SmtpMailer};
use dripline::{stats, Config, Database, Notifier};

pub fn run_cmd() -> clap::Command {
    clap::Command::new("run")
        .display_order(10)
        .about("Send one day of the sequence to eligible subscribers")
        .arg(
            Arg::new("day")
                .long("day")
                .short('d')
                .value_parser(value_parser!(u32).range(1..))
                .default_value("1")
                .help("Day of the sequence to send"),
        )
        .arg(
            Arg::new("batch-size")
                .long("batch-size")
                .short('b')
                .value_parser(value_parser!(usize))
                .help("Maximum number of emails to send, defaults to the configured batch size"),
        )
}

pub async fn run(matches: &ArgMatches, config: &Config, db: &Database) -> Result<()> {
    let day = matches.get_one::<u32>("day").copied().unwrap_or(1);
    let batch_size = matches
        .get_one::<usize>("batch-size")
        .copied()
        .unwrap_or(config.campaign.default_batch_size);

    let stuck = delivery::in_doubt(db)?;
    if !stuck.is_empty() {
        println!(
            "warning: {} deliveries were reserved by an interrupted run and won't be retried",
            stuck.len()
        );
    }

    let mailer = SmtpMailer::new(&config.email)?;
    let results =
        dripline::campaign::run(db, &mailer as &dyn Mailer, config, &Notifier::new(), day, batch_size)
            .await?;
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

pub fn stats_cmd() -> clap::Command {
    clap::Command::new("stats")
        .display_order(20)
        .about("Print campaign statistics")
        .arg(
            Arg::new("by-day")
                .long("by-day")
                .action(ArgAction::SetTrue)
                .help("Break the activity down by sequence day"),
        )
        .arg(
            Arg::new("bounces")
                .long("bounces")
                .action(ArgAction::SetTrue)
                .help("Show bounce statistics"),
        )
}

pub fn stats(matches: &ArgMatches, db: &Database) -> Result<()> {
    let out = if matches.get_flag("by-day") {
        serde_json::to_string_pretty(&stats::by_day(db)?)?
    } else if matches.get_flag("bounces") {
        serde_json::to_string_pretty(&stats::bounce_stats(db)?)?
    } else {
        serde_json::to_string_pretty(&stats::campaign_stats(db)?)?
    };
    println!("{out}");
    Ok(())
}
