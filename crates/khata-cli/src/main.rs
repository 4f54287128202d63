// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod commands;
mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result};
use commands::{Command, Session};
use config::Config;
use khata_api::Client;
use khata_app::{AppState, Category, Customer, Product};
use runtime::CliRuntime;
use std::env;
use std::io;
use std::path::PathBuf;
use time::OffsetDateTime;
use tracing::info;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `khata --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;
    let log_path = logging::init_logging(&config)?;

    let base_url = config.api_base_url();
    let client = Client::new(&base_url, config.api_timeout()?).with_context(|| {
        format!(
            "invalid [api] config in {}; fix base_url/timeout values",
            options.config_path.display()
        )
    })?;
    if options.check_only {
        println!("config ok: {}", options.config_path.display());
        println!("api       {} (timeout {:?})", client.base_url(), client.timeout());
        println!("log       {}", log_path.display());
        return Ok(());
    }

    let command = commands::parse_command(&options.command)?;
    info!(?command, api = client.base_url(), "starting");
    if command == Command::Ping {
        let version = client
            .ping()
            .with_context(|| format!("reach {} -- is the shop API running?", client.base_url()))?;
        println!("{} is up: {version}", client.base_url());
        return Ok(());
    }

    let today = OffsetDateTime::now_utc().date();
    let mut session = Session::new(
        client.collection::<Customer>(),
        client.collection::<Product>(),
        client.collection::<Category>(),
        client.clone(),
        config.page_size(),
        config.fetch_limit(),
        today,
    );
    if command == Command::Tui {
        let mut state = AppState::default();
        let mut runtime = CliRuntime::new(today, env::current_dir()?);
        return khata_tui::run_app(&mut state, &mut session.shop, &mut runtime);
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    commands::execute(&command, &mut session, &mut out)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
    /// Words after the global options, handed to the subcommand parser.
    command: Vec<String>,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_example: false,
        check_only: false,
        show_help: false,
        command: Vec::new(),
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            word if !word.starts_with('-') => {
                options.command.push(word.to_owned());
                options
                    .command
                    .extend(iter.by_ref().map(|rest| rest.as_ref().to_owned()));
            }
            unknown => {
                return Err(anyhow::anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("khata: shop ledger client");
    println!();
    println!("usage: khata [options] [command]");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --check                  Validate config and API settings");
    println!("  --help                   Show this help");
    println!();
    println!("commands (default: tui):");
    println!("  tui                                   Browse customers, products, categories");
    println!("  ping                                  Check the API is reachable");
    println!("  list <entity> [filters] [--page N]    Print one page of rows");
    println!("  export <entity> [filters] [--out P]   Write CSV (--out - for stdout, --remote");
    println!("                                        to let the server render it)");
    println!("  add <entity> --name ... [fields]      Create a row");
    println!("  edit <entity> <id> [fields]           Update a row");
    println!("  delete <entity> <id> --yes            Delete a row");
    println!("  loans <customer>                      Show a customer's loans");
    println!("  lend <customer> --product P --amount Rs --due YYYY-MM-DD [--date YYYY-MM-DD]");
    println!("  mark-paid <customer> <loan>           Mark a loan paid today");
    println!("  dashboard [--from D --to D]           Totals and monthly chart");
    println!();
    println!("entities: customers, products, categories");
    println!("filters:  --search Q, --category ID (products), --unpaid (customers),");
    println!("          --from YYYY-MM-DD --to YYYY-MM-DD");
    println!("fields:   --name, --mobile, --address, --photo (customers);");
    println!("          --name, --unit, --category, --photo (products);");
    println!("          --name, --description, --image (categories)");
}
