pub mod commands;
pub mod provider;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use netops_core::config::{ConfigOverrides, LoadOptions};

#[derive(Debug, Parser)]
#[command(
    name = "netops",
    about = "Network operations assistant over NetBox",
    long_about = "Chat with a local language model that answers network questions by calling NetBox inventory tools over MCP.",
    after_help = "Examples:\n  netops chat\n  netops ask \"which devices are in the core layer?\"\n  netops topology\n  netops doctor --json"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a netops.toml config file")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override the language model name")]
    model: Option<String>,
    #[arg(long, global = true, help = "Override the log level (trace|debug|info|warn|error)")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Start an interactive chat session (type 'quit' or 'exit' to leave)")]
    Chat,
    #[command(about = "Ask a single question and print the answer")]
    Ask {
        #[arg(required = true, help = "The question to ask")]
        question: Vec<String>,
    },
    #[command(about = "List the tools advertised by the tool provider")]
    Tools,
    #[command(about = "Generate the layered network topology and its Mermaid diagram")]
    Topology {
        #[arg(long, help = "Emit the full topology report as JSON")]
        json: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, language model readiness, and tool provider reachability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

impl Cli {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                log_level: self.log_level.clone(),
                llm_model: self.model.clone(),
                ..ConfigOverrides::default()
            },
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.load_options();

    let result = match cli.command {
        Command::Chat => commands::chat::run(options),
        Command::Ask { question } => commands::ask::run(options, &question.join(" ")),
        Command::Tools => commands::tools::run(options),
        Command::Topology { json } => commands::topology::run(options, json),
        Command::Config => {
            let config_path = options.config_path.clone();
            commands::CommandResult {
                exit_code: 0,
                output: commands::config::run(options, config_path.as_deref()),
            }
        }
        Command::Doctor { json } => commands::doctor::run(options, json),
    };

    if !result.output.is_empty() {
        println!("{}", result.output);
    }
    ExitCode::from(result.exit_code)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn ask_joins_words_and_applies_global_overrides() {
        let cli = Cli::try_parse_from([
            "netops",
            "ask",
            "list",
            "all",
            "devices",
            "--model",
            "qwen2.5",
            "--log-level",
            "debug",
        ])
        .unwrap_or_else(|error| panic!("parse failed: {error}"));

        let options = cli.load_options();
        assert_eq!(options.overrides.llm_model.as_deref(), Some("qwen2.5"));
        assert_eq!(options.overrides.log_level.as_deref(), Some("debug"));
        assert!(!options.require_file);
        match cli.command {
            Command::Ask { question } => assert_eq!(question.join(" "), "list all devices"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn explicit_config_path_must_exist() {
        let cli = Cli::try_parse_from(["netops", "--config", "site.toml", "doctor", "--json"])
            .unwrap_or_else(|error| panic!("parse failed: {error}"));

        let options = cli.load_options();
        assert!(options.require_file);
        assert!(matches!(cli.command, Command::Doctor { json: true }));
    }

    #[test]
    fn ask_requires_a_question() {
        assert!(Cli::try_parse_from(["netops", "ask"]).is_err());
    }
}
