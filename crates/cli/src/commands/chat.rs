//! `cartloop chat`: Interactive or single-message sales chat.

use cartloop_agent::{AgentResponse, CommerceAgent};
use cartloop_config::AppConfig;
use cartloop_core::event::{DomainEvent, EventBus};
use cartloop_tools::{CommerceClient, HttpCommerceClient, InMemoryCatalog};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

pub async fn run(message: Option<String>, offline: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let provider = match cartloop_providers::build_from_config(&config) {
        Ok(provider) => provider,
        Err(e) => {
            eprintln!();
            eprintln!("  ERROR: {e}");
            eprintln!();
            eprintln!("  Set one of these environment variables:");
            eprintln!("    OPENAI_API_KEY   = 'sk-...'");
            eprintln!("    CARTLOOP_API_KEY = 'sk-...'   (any OpenAI-compatible endpoint)");
            eprintln!();
            eprintln!("  Or add api_key to {}", AppConfig::config_dir().join("config.toml").display());
            eprintln!();
            return Err("No usable oracle provider. See above for setup instructions.".into());
        }
    };

    let client: Arc<dyn CommerceClient> = if offline {
        Arc::new(InMemoryCatalog::demo())
    } else {
        Arc::new(
            HttpCommerceClient::from_config(&config.commerce)
                .map_err(|e| format!("{e} (or run with --offline)"))?,
        )
    };
    let tools = cartloop_tools::commerce_registry(client, &config.commerce);
    let sink = cartloop_telemetry::build_sink(&config.telemetry)?;

    let event_bus = Arc::new(EventBus::default());
    let mut agent = CommerceAgent::from_config(&config, provider, tools, sink, event_bus.clone());

    if let Some(msg) = message {
        eprint!("  Thinking...");
        let response = agent.process_message(&msg).await;
        eprint!("\r              \r");
        print_response(&response);
        agent.end_conversation().await;
        return Ok(());
    }

    spawn_tool_notices(&event_bus);

    println!();
    println!("  Cartloop: Interactive Sales Chat");
    println!("  ================================");
    println!();
    println!("  Model:     {}", config.default_model);
    println!("  Catalog:   {}", if offline { "demo (offline)" } else { config.commerce.api_url.as_str() });
    println!();
    println!("  Commands: /status, /clear, /restart, exit");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "exit" | "quit" => break,
            "/status" => {
                println!("{}", serde_json::to_string_pretty(&agent.session_status())?);
                continue;
            }
            "/clear" => {
                agent.clear_conversation_history();
                println!("  (history cleared)\n");
                continue;
            }
            "/restart" => {
                agent.restart_conversation().await;
                println!("  (new conversation started)\n");
                continue;
            }
            _ => {}
        }

        eprint!("  ...");
        let response = agent.process_message(line).await;
        eprint!("\r     \r");
        print_response(&response);

        if response.data.as_ref().is_some_and(|d| d.session_ended) {
            println!("  (conversation closed; type again to start a new one)\n");
        }
    }

    agent.end_conversation().await;
    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

fn print_response(response: &AgentResponse) {
    println!();
    for line in response.message.lines() {
        println!("  Assistant > {line}");
    }
    println!();
}

/// Print a short line to stderr whenever a tool runs.
fn spawn_tool_notices(event_bus: &EventBus) {
    let mut rx = event_bus.subscribe();
    tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            };
            if let DomainEvent::ToolExecuted {
                tool_name,
                success,
                duration_ms,
                ..
            } = event.as_ref()
            {
                let mark = if *success { "✓" } else { "✗" };
                eprintln!("  [{mark} {tool_name} {duration_ms}ms]");
            }
        }
    });
}
