// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod runtime;

use anyhow::{Context, Result, anyhow};
use config::Config;
use juxta_app::AppState;
use juxta_db::Store;
use juxta_source::{Client, DemoSource, PayloadSource};
use runtime::SourceRuntime;
use std::env;
use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use time::OffsetDateTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_LOG_FILTER: &str = "juxta=info";
const DEMO_LATENCY: Duration = Duration::from_millis(250);

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
            "load config {}; run `juxta --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    let db_path = if options.demo {
        PathBuf::from(":memory:")
    } else {
        config.db_path()?
    };
    if options.print_db_path {
        println!("{}", db_path.display());
        return Ok(());
    }

    init_logging()?;

    let store = Store::open(&db_path).with_context(|| {
        format!(
            "open database {} -- if this path is wrong, set [storage].db_path or JUXTA_DB_PATH",
            db_path.display()
        )
    })?;
    store.bootstrap()?;

    if let Some(entity) = &options.clear_history {
        let entity = juxta_app::normalize_entity_name(entity);
        if store.clear_history(&entity)? {
            println!("cleared stored versions for {entity}");
        } else {
            println!("no stored versions for {entity}");
        }
        return Ok(());
    }
    if options.reset_session {
        store.reset_session()?;
        println!("session cleared");
        return Ok(());
    }

    let source = build_source(&config, options.demo).with_context(|| {
        format!(
            "invalid [source] config in {}; fix base_url/timeout values",
            options.config_path.display()
        )
    })?;
    tracing::info!(source = %source.describe(), db = %db_path.display(), "starting");
    if options.check_only {
        return Ok(());
    }

    let mut state = AppState::default();
    state.options.diff_only = config.diff_only();
    state.show_keys = config.show_keys();

    let mut runtime = SourceRuntime::new(&store, source);
    juxta_tui::run_app(&mut state, &mut runtime, &options.entities)
}

/// Demo data when asked for or when no source URL is configured.
fn build_source(config: &Config, demo: bool) -> Result<Arc<dyn PayloadSource>> {
    match config.base_url() {
        Some(base_url) if !demo => Ok(Arc::new(Client::new(
            base_url,
            config.source_timeout()?,
        )?)),
        _ => {
            let salt = OffsetDateTime::now_utc().unix_timestamp_nanos() as u64;
            Ok(Arc::new(DemoSource::new(salt).with_latency(DEMO_LATENCY)))
        }
    }
}

fn log_path() -> Result<PathBuf> {
    let data_root = dirs::data_local_dir()
        .ok_or_else(|| anyhow!("cannot resolve data directory for the log file"))?;
    let app_dir = data_root.join(juxta_db::APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("juxta.log"))
}

/// File-backed subscriber filtered by `JUXTA_LOG`.
fn init_logging() -> Result<()> {
    let path = log_path()?;
    let file = File::options()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {}", path.display()))?;

    let filter = tracing_subscriber::EnvFilter::try_from_env("JUXTA_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .context("install log subscriber")
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_db_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
    clear_history: Option<String>,
    reset_session: bool,
    entities: Vec<String>,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_db_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        show_help: false,
        clear_history: None,
        reset_session: false,
        entities: Vec::new(),
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-path" => {
                options.print_db_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--clear-history" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--clear-history requires an entity name"))?;
                options.clear_history = Some(value.as_ref().to_owned());
            }
            "--reset-session" => {
                options.reset_session = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown if unknown.starts_with('-') => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
            entity => {
                options.entities.extend(
                    entity
                        .split(',')
                        .map(str::trim)
                        .filter(|name| !name.is_empty())
                        .map(str::to_owned),
                );
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("juxta [options] [entity ...]");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-path             Print resolved database path");
    println!("  --print-example-config   Print a config template");
    println!("  --demo                   Browse generated demo data (in-memory)");
    println!("  --check                  Validate config + DB + source settings");
    println!("  --clear-history <entity> Delete stored versions for one entity");
    println!("  --reset-session          Forget the entities restored at startup");
    println!("  --help                   Show this help");
    println!("Entities named on the command line are loaded next to the restored session.");
}

#[cfg(test)]
mod tests {
    use super::{CliOptions, build_source, parse_cli_args};
    use crate::config::Config;
    use anyhow::Result;
    use std::path::PathBuf;

    fn default_options_path() -> PathBuf {
        PathBuf::from("/tmp/juxta-config.toml")
    }

    #[test]
    fn parse_cli_args_defaults_to_provided_config_path() -> Result<()> {
        let options = parse_cli_args(Vec::<String>::new(), default_options_path())?;
        assert_eq!(
            options,
            CliOptions {
                config_path: default_options_path(),
                print_config_path: false,
                print_db_path: false,
                demo: false,
                print_example: false,
                check_only: false,
                show_help: false,
                clear_history: None,
                reset_session: false,
                entities: Vec::new(),
            }
        );
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_config_path_override() -> Result<()> {
        let options = parse_cli_args(
            vec!["--config", "/custom/config.toml"],
            default_options_path(),
        )?;
        assert_eq!(options.config_path, PathBuf::from("/custom/config.toml"));
        Ok(())
    }

    #[test]
    fn parse_cli_args_errors_for_missing_values() {
        let error = parse_cli_args(vec!["--config"], default_options_path())
            .expect_err("missing config value should fail");
        assert!(error.to_string().contains("--config requires a file path"));

        let error = parse_cli_args(vec!["--clear-history"], default_options_path())
            .expect_err("missing entity should fail");
        assert!(error.to_string().contains("requires an entity name"));
    }

    #[test]
    fn parse_cli_args_errors_for_unknown_flag() {
        let error = parse_cli_args(vec!["--wat"], default_options_path())
            .expect_err("unknown flag should fail");
        let message = error.to_string();
        assert!(message.contains("unknown argument"));
        assert!(message.contains("--help"));
    }

    #[test]
    fn parse_cli_args_collects_positional_entities() -> Result<()> {
        let options = parse_cli_args(
            vec!["acme", "--demo", "globex, initech", ""],
            default_options_path(),
        )?;
        assert!(options.demo);
        assert_eq!(options.entities, vec!["acme", "globex", "initech"]);
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_maintenance_flags() -> Result<()> {
        let options = parse_cli_args(
            vec!["--clear-history", "acme", "--reset-session", "--check"],
            default_options_path(),
        )?;
        assert_eq!(options.clear_history.as_deref(), Some("acme"));
        assert!(options.reset_session);
        assert!(options.check_only);
        assert!(options.entities.is_empty());
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_help_flag_for_long_and_short_variants() -> Result<()> {
        let long = parse_cli_args(vec!["--help"], default_options_path())?;
        assert!(long.show_help);

        let short = parse_cli_args(vec!["-h"], default_options_path())?;
        assert!(short.show_help);
        Ok(())
    }

    #[test]
    fn source_falls_back_to_demo_data() -> Result<()> {
        let config = Config::default();
        assert_eq!(build_source(&config, false)?.describe(), "demo data");

        let mut config = Config::default();
        config.source.base_url = Some("https://admin.example.com/".to_owned());
        assert_eq!(
            build_source(&config, false)?.describe(),
            "https://admin.example.com"
        );
        assert_eq!(build_source(&config, true)?.describe(), "demo data");
        Ok(())
    }
}
