use netops_agent::prompt::load_system_prompt;
use netops_agent::{OllamaClient, ToolProvider};
use netops_core::config::{AppConfig, LoadOptions};
use serde::Serialize;

use super::{init_logging, runtime, tool_provider, CommandResult};

const CHECKS_AFTER_CONFIG: [&str; 3] = ["system_prompt", "llm_readiness", "tool_provider"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(options: LoadOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return CommandResult::text(exit_code, output);
    }

    CommandResult::text(exit_code, render_human(&report))
}

fn build_report(options: LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options) {
        Ok(config) => {
            init_logging(&config);
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_system_prompt(&config));
            checks.extend(check_services(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in CHECKS_AFTER_CONFIG {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    finalize(checks)
}

fn finalize(checks: Vec<DoctorCheck>) -> DoctorReport {
    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_system_prompt(config: &AppConfig) -> DoctorCheck {
    match load_system_prompt(&config.agent) {
        Ok(prompt) => DoctorCheck {
            name: "system_prompt",
            status: CheckStatus::Pass,
            details: match &config.agent.system_prompt_path {
                Some(path) => format!("loaded {} chars from `{}`", prompt.len(), path.display()),
                None => "using built-in prompt".to_string(),
            },
        },
        Err(error) => {
            DoctorCheck { name: "system_prompt", status: CheckStatus::Fail, details: error.to_string() }
        }
    }
}

fn check_services(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match runtime("doctor") {
        Ok(runtime) => runtime,
        Err(_) => {
            return ["llm_readiness", "tool_provider"]
                .into_iter()
                .map(|name| DoctorCheck {
                    name,
                    status: CheckStatus::Fail,
                    details: "failed to initialize async runtime".to_string(),
                })
                .collect();
        }
    };

    runtime.block_on(async { vec![check_llm(config).await, check_tool_provider(config).await] })
}

async fn check_llm(config: &AppConfig) -> DoctorCheck {
    let name = "llm_readiness";
    let client = match OllamaClient::new(&config.llm) {
        Ok(client) => client,
        Err(error) => return DoctorCheck { name, status: CheckStatus::Fail, details: error.to_string() },
    };

    match client.check_health().await {
        Ok(true) => DoctorCheck {
            name,
            status: CheckStatus::Pass,
            details: format!("model `{}` available at {}", client.model(), config.llm.base_url),
        },
        Ok(false) => DoctorCheck {
            name,
            status: CheckStatus::Fail,
            details: format!(
                "model `{}` not listed at {} (try `ollama pull {}`)",
                client.model(),
                config.llm.base_url,
                client.model()
            ),
        },
        Err(error) => DoctorCheck {
            name,
            status: CheckStatus::Fail,
            details: format!("could not reach {}: {error}", config.llm.base_url),
        },
    }
}

async fn check_tool_provider(config: &AppConfig) -> DoctorCheck {
    let name = "tool_provider";
    match tool_provider(config).list_tools().await {
        Ok(tools) if tools.is_empty() => DoctorCheck {
            name,
            status: CheckStatus::Fail,
            details: format!("`{}` advertised no tools", config.mcp.command),
        },
        Ok(tools) => DoctorCheck {
            name,
            status: CheckStatus::Pass,
            details: format!("`{}` advertised {} tools", config.mcp.command, tools.len()),
        },
        Err(error) => DoctorCheck { name, status: CheckStatus::Fail, details: error.to_string() },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
