// This file is part of the product taxbox.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use log::{LevelFilter, info};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use taxbox::cli::{self, Flow, ShellCommand};
use taxbox::config::Config;
use taxbox::item::RestPost;
use taxbox::registry::EditingSession;
use taxbox::store::RestClient;
use taxbox::util;
use tokio::io::BufReader;

fn main() {
    let exit_code = run();
    std::process::exit(exit_code);
}

#[derive(Debug)]
struct ParsedArgs {
    root: PathBuf,
    item: Option<u64>,
    help: bool,
}

fn run() -> i32 {
    let parsed_args = match parse_args() {
        Ok(args) => args,
        Err(error) => {
            eprintln!("❌ Invalid command line arguments: {}", error);
            eprintln!("❌ Use -C <root> to set the directory holding config.yaml.");
            return 2;
        }
    };

    if parsed_args.help {
        print!("{}", cli::help_text());
        return 0;
    }

    let mut config = match Config::load_and_validate(&parsed_args.root) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("❌ {}", error);
            eprintln!("❌ taxbox cannot start with invalid configuration.");
            return 1;
        }
    };
    if let Some(id) = parsed_args.item {
        config.item.id = id;
    }

    if let Err(error) = install_logger(config.logging.level_filter()) {
        eprintln!("❌ Failed to initialize logger: {}", error);
        return 1;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => {
            eprintln!("❌ Failed to start async runtime: {}", error);
            return 1;
        }
    };
    runtime.block_on(run_session(config))
}

fn install_logger(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    // Logs go to stderr so they never interleave with shell output.
    let logger = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}: {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f UTC"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .build();
    util::init_logger(util::quiet_transport_rules(), logger)
}

async fn run_session(config: Config) -> i32 {
    let client = match RestClient::new(&config.api) {
        Ok(client) => client,
        Err(error) => {
            eprintln!("❌ Failed to build REST client: {}", error);
            return 1;
        }
    };
    info!("Using REST endpoint {}", client.endpoint());

    let item_ref = config.item_ref();
    let backend = Arc::new(client.clone());
    let mut session = EditingSession::new(
        backend.clone(),
        backend,
        item_ref.clone(),
        config.session_settings(),
    );
    match session.run().await {
        Ok(count) => info!(
            "Editing {} {} with {} taxonomies",
            item_ref.post_type, item_ref.id, count
        ),
        Err(error) => {
            eprintln!("❌ {}", error);
            return 1;
        }
    }

    let mut item = RestPost::new(client, item_ref);
    match cli::execute(&mut session, ShellCommand::Show { taxonomy: None }, &mut item).await {
        Ok(Flow::Continue(output)) => println!("{}", output.trim_end()),
        Ok(Flow::Quit) => {}
        Err(error) => eprintln!("❌ {}", error),
    }

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let result = cli::run_shell(&mut session, &mut item, stdin, &mut stdout).await;
    session.shutdown();
    match result {
        Ok(()) => 0,
        Err(error) => {
            eprintln!("❌ Shell failed: {}", error);
            1
        }
    }
}

fn parse_args() -> Result<ParsedArgs, String> {
    parse_args_from(std::env::args().skip(1))
}

fn parse_args_from<I>(args: I) -> Result<ParsedArgs, String>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut root = PathBuf::from(".");
    let mut item = None;
    let mut help = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--" => continue,
            "-h" | "--help" | "help" => help = true,
            "-C" => {
                let value = args
                    .next()
                    .ok_or_else(|| "Missing value for -C".to_string())?;
                root = PathBuf::from(value);
            }
            "--item" => {
                let value = args
                    .next()
                    .ok_or_else(|| "Missing value for --item".to_string())?;
                let id = value
                    .parse::<u64>()
                    .map_err(|_| format!("Invalid item id '{}'", value))?;
                item = Some(id);
            }
            other => return Err(format!("Unexpected argument '{}'", other)),
        }
    }

    Ok(ParsedArgs {
        root: make_root_absolute(root)?,
        item,
        help,
    })
}

fn make_root_absolute(root: PathBuf) -> Result<PathBuf, String> {
    if root.is_absolute() {
        return Ok(root);
    }

    let current_dir = std::env::current_dir()
        .map_err(|error| format!("Failed to resolve current directory: {}", error))?;
    Ok(current_dir.join(root))
}

#[cfg(test)]
mod tests {
    use super::parse_args_from;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn parse_args_defaults_to_current_dir() {
        let parsed = parse_args_from(Vec::new()).expect("parse args");
        assert!(parsed.root.is_absolute());
        assert_eq!(parsed.item, None);
        assert!(!parsed.help);
    }

    #[test]
    fn parse_args_accepts_root_and_item() {
        let parsed = parse_args_from(args(&["-C", "site", "--item", "42"])).expect("parse args");
        assert!(parsed.root.ends_with("site"));
        assert_eq!(parsed.item, Some(42));
    }

    #[test]
    fn parse_args_accepts_help() {
        assert!(parse_args_from(args(&["--help"])).expect("parse args").help);
        assert!(parse_args_from(args(&["-C", "site", "help"])).expect("parse args").help);
    }

    #[test]
    fn parse_args_rejects_bad_values() {
        assert!(parse_args_from(args(&["--item", "first"])).is_err());
        assert!(parse_args_from(args(&["-C"])).is_err());
        assert!(parse_args_from(args(&["serve"])).is_err());
    }
}
