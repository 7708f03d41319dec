use anyhow::Result;
use clap::{arg, value_parser, Arg, ArgMatches};
use uuid::Uuid;

use dripline::subscriber::{self, NewSubscriber, Status};
use dripline::Database;

pub fn cmd() -> clap::Command {
    clap::Command::new("subscriber")
        .subcommand_required(true)
        .display_order(30)
        .about("Inspect and manipulate subscribers")
        .subcommand(
            clap::Command::new("add")
                .arg_required_else_help(true)
                .about("Adds new subscriber")
                .arg(arg!(<email> "Subscriber email"))
                .arg(arg!(--first_name [first_name] "Subscriber first name"))
                .arg(arg!(--bar_name [bar_name] "Name of the subscriber's bar")),
        )
        .subcommand(
            clap::Command::new("list")
                .about("Lists subscribers, newest first")
                .arg(
                    Arg::new("status")
                        .long("status")
                        .short('s')
                        .value_parser(["active", "bounced", "unsubscribed"]),
                )
                .arg(
                    Arg::new("limit")
                        .long("limit")
                        .short('l')
                        .value_parser(value_parser!(usize)),
                ),
        )
        .subcommand(
            clap::Command::new("remove")
                .arg_required_else_help(true)
                .about("Removes subscriber by id")
                .arg(Arg::new("id").value_parser(value_parser!(Uuid))),
        )
}

pub fn run(matches: &ArgMatches, db: &Database) -> Result<()> {
    match matches.subcommand() {
        Some(("add", m)) => {
            let new = NewSubscriber {
                email: m.get_one::<String>("email").cloned(),
                first_name: m.get_one::<String>("first_name").cloned(),
                bar_name: m.get_one::<String>("bar_name").cloned(),
                status: None,
            };
            let sub = subscriber::create(db, new)?;
            println!("{}", serde_json::to_string_pretty(&sub)?);
        }
        Some(("list", m)) => {
            let status = m.get_one::<String>("status").map(|s| parse_status(s));
            let limit = m.get_one::<usize>("limit").copied();
            for sub in subscriber::list(db, status, limit)? {
                println!(
                    "{}\t{}\t{}\tday {}",
                    sub.id, sub.email, sub.status, sub.current_day
                );
            }
        }
        Some(("remove", m)) => {
            let id = m
                .get_one::<Uuid>("id")
                .copied()
                .ok_or_else(|| anyhow::anyhow!("missing subscriber id"))?;
            let sub = subscriber::delete(db, id)?;
            println!("removed {}", sub.email);
        }
        _ => unreachable!(),
    }
    Ok(())
}

fn parse_status(s: &str) -> Status {
    match s {
        "bounced" => Status::Bounced,
        "unsubscribed" => Status::Unsubscribed,
        _ => Status::Active,
    }
}
