#![deny(unsafe_code)]

//! termbank CLI: validate resource configuration and inspect readers.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::json;
use termbank_config::AppConfig;
use termbank_core::{ResourceContext, RowReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// termbank: shared data sources and query-backed word lists.
#[derive(Parser)]
#[command(name = "termbank", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "termbank.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build every configured resource and open every reader.
    Check {
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the content served by a reader.
    Dump {
        /// Reader name from `[readers.<name>]`.
        reader: String,
    },

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, found) = load_config(&cli.config).await?;

    let filter = match cli.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if !found {
        info!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    match cli.command {
        Commands::Check { json } => cmd_check(&config, json)?,
        Commands::Dump { reader } => cmd_dump(&config, &reader)?,
        Commands::Config { show } => cmd_config(&cli.config, &config, show)?,
    }

    Ok(())
}

fn cmd_check(config: &AppConfig, as_json: bool) -> Result<()> {
    let context = ResourceContext::from_config(config)?;
    let report = check_report(config, &context);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_report(&report));
    }

    if report["ok"] != json!(true) {
        bail!("configuration check failed");
    }
    Ok(())
}

fn cmd_dump(config: &AppConfig, name: &str) -> Result<()> {
    let context = ResourceContext::from_config(config)?;
    let stdout = io::stdout();
    dump_reader(config, &context, name, &mut stdout.lock())
}

fn cmd_config(config_path: &Path, config: &AppConfig, show: bool) -> Result<()> {
    if show {
        let toml_str =
            toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {e}"))?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(())
}

async fn load_config(path: &Path) -> Result<(AppConfig, bool)> {
    if path.exists() {
        let config = AppConfig::load(path)
            .await
            .with_context(|| format!("failed to load '{}'", path.display()))?;
        Ok((config, true))
    } else {
        Ok((AppConfig::default(), false))
    }
}

/// Availability of every configured resource and reader.
fn check_report(config: &AppConfig, context: &ResourceContext) -> serde_json::Value {
    let mut ok = true;

    let resources: Vec<_> = config
        .resources
        .keys()
        .map(|name| {
            let resource = context.registry().lookup(name);
            json!({
                "name": name,
                "available": resource.is_some(),
                "kind": resource.map(|r| r.kind().to_string()),
            })
        })
        .collect();

    let readers: Vec<_> = config
        .readers
        .iter()
        .map(|(name, reader)| match context.reader(reader) {
            Ok(reader) => json!({
                "name": name,
                "available": reader.is_available(),
                "error": null,
            }),
            Err(e) => {
                ok = false;
                json!({
                    "name": name,
                    "available": false,
                    "error": e.to_string(),
                })
            }
        })
        .collect();

    json!({
        "ok": ok,
        "resources": resources,
        "readers": readers,
    })
}

fn render_report(report: &serde_json::Value) -> String {
    let mut out = String::new();
    for (section, label) in [("resources", "resource"), ("readers", "reader")] {
        for entry in report[section].as_array().into_iter().flatten() {
            let status = match (&entry["available"], &entry["error"]) {
                (_, serde_json::Value::String(error)) => format!("error: {error}"),
                (serde_json::Value::Bool(true), _) => "available".to_string(),
                _ => "unavailable".to_string(),
            };
            let name = entry["name"].as_str().unwrap_or_default();
            out.push_str(&format!("{label:<8} {name:<24} {status}\n"));
        }
    }
    out
}

fn dump_reader(
    config: &AppConfig,
    context: &ResourceContext,
    name: &str,
    out: &mut impl Write,
) -> Result<()> {
    let Some(reader_config) = config.readers.get(name) else {
        bail!("no reader named '{name}' in [readers]");
    };
    let reader = context.reader(reader_config)?;
    let mut stream = reader.reader()?;
    io::copy(&mut stream, out)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use termbank_config::{ReaderConfig, ResourceDefinition};
    use termbank_test_utils::config::TestConfigBuilder;
    use termbank_test_utils::fixtures::SqliteFixture;

    fn sample() -> (SqliteFixture, AppConfig) {
        let fixture = SqliteFixture::with_words(&["a", "an", "the"]);
        let config = TestConfigBuilder::new()
            .sqlite_resource("words", fixture.path())
            .resource("legacy", ResourceDefinition::with_class("com.example.Pool"))
            .reader("stop", "words", "SELECT word FROM stopwords ORDER BY id")
            .build();
        (fixture, config)
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["termbank", "-vv", "dump", "stop"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Dump { ref reader } if reader == "stop"));

        let cli = Cli::try_parse_from(["termbank", "-c", "x.toml", "check", "--json"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("x.toml"));
        assert!(matches!(cli.command, Commands::Check { json: true }));
    }

    #[test_log::test]
    fn test_check_report_lists_availability() {
        let (_fixture, config) = sample();
        let context = ResourceContext::from_config(&config).unwrap();
        let report = check_report(&config, &context);

        assert_eq!(report["ok"], json!(true));
        assert_eq!(report["resources"][0]["available"], json!(true));
        assert_eq!(report["resources"][0]["kind"], json!("data source"));
        assert_eq!(report["resources"][1]["available"], json!(false));
        assert_eq!(report["readers"][0]["available"], json!(true));

        let text = render_report(&report);
        assert!(text.contains("legacy"));
        assert!(text.contains("unavailable"));
    }

    #[test]
    fn test_check_report_flags_reader_errors() {
        let mut config = AppConfig::default();
        config.readers.insert(
            "strict".to_string(),
            ReaderConfig {
                data_source: Some("missing".to_string()),
                directory_name: None,
                sql: "SELECT 1".to_string(),
                ignore_missing_database: Some(false),
            },
        );
        let context = ResourceContext::from_config(&config).unwrap();
        let report = check_report(&config, &context);
        assert_eq!(report["ok"], json!(false));
        assert!(render_report(&report).contains("error: "));
    }

    #[test_log::test]
    fn test_dump_reader_writes_joined_lines() {
        let (_fixture, config) = sample();
        let context = ResourceContext::from_config(&config).unwrap();

        let mut out = Vec::new();
        dump_reader(&config, &context, "stop", &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a\nan\nthe");

        assert!(dump_reader(&config, &context, "nope", &mut Vec::new()).is_err());
    }

    #[tokio::test]
    async fn test_load_config_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (config, found) = load_config(&dir.path().join("absent.toml")).await.unwrap();
        assert!(!found);
        assert!(config.resources.is_empty());
    }
}
