mod correct_cmd;
mod extract_cmd;
mod lookup_cmd;
mod runtime;
mod validate_cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::debug;

use juso_config::{config_dir, config_file_path, load_and_prepare, redact};
use juso_tools::LookupQuery;

use extract_cmd::ExtractInput;
use runtime::Runtime;

#[derive(Parser)]
#[command(name = "juso")]
#[command(about = "Korean contact and address extraction from OCR text")]
#[command(version)]
struct Cli {
    /// Config file (default: $JUSO_CONFIG_DIR/config.yaml or ~/.juso/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every contact from OCR text or an image
    Extract {
        /// File holding raw OCR text
        #[arg(long, conflicts_with = "image", required_unless_present = "image")]
        text: Option<PathBuf>,
        /// Image to run through OCR first
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Correct and standardize a single address
    Correct {
        address: String,
    },
    /// Detect phone numbers and address components without an LLM
    Validate {
        text: String,
    },
    /// Check address components against the reference store
    Lookup {
        #[arg(long)]
        sido: Option<String>,
        #[arg(long)]
        sigungu: Option<String>,
        #[arg(long)]
        road: Option<String>,
        #[arg(long)]
        building: Option<String>,
    },
    /// Print the effective config with secrets masked
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| config_file_path(&config_dir()));
    let config = load_and_prepare(&path).await?;

    let logging = config.logging();
    juso_logging::init_logger(logging.dir.as_deref(), logging.level(), logging.json());
    debug!(path = %path.display(), "Config loaded");

    let runtime = Runtime::new(config);
    let output = run(&runtime, cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run(runtime: &Runtime, command: Commands) -> Result<Value> {
    match command {
        Commands::Extract { text, image } => {
            let input = match (&text, &image) {
                (Some(path), _) => ExtractInput::Text(path),
                (None, Some(path)) => ExtractInput::Image(path),
                (None, None) => anyhow::bail!("Pass --text <file> or --image <file>"),
            };
            extract_cmd::run(runtime, input).await
        }
        Commands::Correct { address } => correct_cmd::run(runtime, &address).await,
        Commands::Validate { text } => validate_cmd::run(&text),
        Commands::Lookup {
            sido,
            sigungu,
            road,
            building,
        } => {
            let query = LookupQuery {
                sido,
                sigungu,
                road_name: road,
                building_number: building,
            };
            lookup_cmd::run(&runtime.store, &query)
        }
        Commands::Config => Ok(redact(&serde_json::to_value(&runtime.config)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn extract_requires_one_input() {
        assert!(Cli::try_parse_from(["juso", "extract"]).is_err());
        assert!(Cli::try_parse_from(["juso", "extract", "--text", "a.txt", "--image", "b.jpg"]).is_err());
        assert!(Cli::try_parse_from(["juso", "extract", "--image", "b.jpg"]).is_ok());
    }

    #[test]
    fn global_config_flag() {
        let cli = Cli::try_parse_from(["juso", "validate", "010-1234-5678", "--config", "/tmp/c.yaml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.yaml")));
    }

    #[tokio::test]
    async fn config_command_masks_keys() {
        let runtime = Runtime::new(juso_config::JusoConfig {
            llm: Some(juso_config::LlmConfig {
                api_key: Some("sk-or-v1-secret-value".into()),
                ..Default::default()
            }),
            ..Default::default()
        });
        let value = run(&runtime, Commands::Config).await.unwrap();
        assert_eq!(value["llm"]["apiKey"], "sk-o***");
    }
}
