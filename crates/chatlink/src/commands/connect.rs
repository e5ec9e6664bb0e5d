//! Connection and tool command handlers.

use crate::runtime::Runtime;
use anyhow::{bail, Context};
use chatlink_core::{Config, ConnectionStatus, FailureReporter};
use chatlink_tools::ModelTool;
use serde_json::json;
use std::sync::Arc;

/// Connect to every enabled server and print per-server status.
pub async fn handle_connect(config: &Config) -> anyhow::Result<()> {
    let runtime = Runtime::new(config)?;
    let progress = runtime.print_progress();

    let summary = runtime.orchestrator.connect_to_all_servers().await;
    let statuses = runtime.orchestrator.statuses().await;

    println!();
    for server in config.servers.iter().filter(|s| s.enabled()) {
        match statuses.get(server.url()) {
            Some(ConnectionStatus::Connected) => {
                println!("  ✓ {}", server.display_name());
            }
            Some(ConnectionStatus::Failed(reason)) => {
                println!("  ✗ {}: {reason}", server.display_name());
            }
            None => println!("  ? {}", server.display_name()),
        }
    }
    println!();
    println!("{}", summary.status_line());

    runtime.orchestrator.disconnect_all().await;
    progress.abort();
    Ok(())
}

/// Connect and list the merged tool set.
pub async fn handle_tools(config: &Config, json: bool) -> anyhow::Result<()> {
    let runtime = Runtime::new(config)?;
    let progress = (!json).then(|| runtime.print_progress());

    let summary = runtime.orchestrator.connect_to_all_servers().await;
    let tools = runtime.orchestrator.merged_tools().await;

    if json {
        let specs: Vec<_> = tools.iter().map(|t| t.spec()).collect();
        println!("{}", serde_json::to_string_pretty(&specs)?);
    } else {
        println!();
        println!("{}", summary.status_line());
        println!();
        print_tools(&tools);
    }

    runtime.orchestrator.disconnect_all().await;
    if let Some(progress) = progress {
        progress.abort();
    }
    Ok(())
}

fn print_tools(tools: &[Arc<ModelTool>]) {
    if tools.is_empty() {
        println!("No tools available");
        return;
    }
    for tool in tools {
        println!("  {} ({})", tool.name(), tool.server_name());
        if let Some(line) = tool.description().lines().next() {
            println!("    {line}");
        }
    }
}

/// Connect, call one tool and print its reply.
pub async fn handle_call(
    config: &Config,
    tool_name: &str,
    input: &str,
    additional_args: Option<&str>,
) -> anyhow::Result<()> {
    let runtime = Runtime::new(config)?;
    let progress = runtime.print_progress();

    runtime.orchestrator.connect_to_all_servers().await;
    let tools = runtime.orchestrator.merged_tools().await;

    let Some(tool) = tools.iter().find(|t| t.name() == tool_name) else {
        runtime.orchestrator.disconnect_all().await;
        progress.abort();
        bail!("No connected server offers a tool named '{tool_name}'");
    };

    let mut arguments = json!({ "input": input });
    if let Some(extra) = additional_args {
        arguments["additional_args"] = json!(extra);
    }

    let result = tool.call(&arguments).await;
    if let Err(e) = &result {
        runtime
            .orchestrator
            .report_failure(tool, &e.to_string())
            .await;
    }

    runtime.orchestrator.disconnect_all().await;
    progress.abort();

    let reply = result.with_context(|| format!("Calling {tool_name} failed"))?;
    println!("{reply}");
    Ok(())
}
