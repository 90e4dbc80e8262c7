//! One-shot chat and conversation history commands.

use std::io::Write;

use anyhow::{Result, bail};
use console::style;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};

use confab_core::chat::ChatStream;
use confab_types::chat::{ChatRequest, MessageRole, StreamFragment};

use crate::state::AppState;

/// User id recorded on turns written from the command line.
const CLI_USER: &str = "cli";

/// Stream a reply to stdout.
///
/// With `--json` the fragments are printed one JSON object per line.
pub async fn ask(
    state: &AppState,
    message: String,
    model: Option<String>,
    app: Option<String>,
    conversation: Option<String>,
    json: bool,
) -> Result<()> {
    let request = ChatRequest {
        conversation_id: conversation,
        message,
        app_id: app,
        model_id: model,
        user_id: CLI_USER.to_string(),
        ..Default::default()
    };

    let ChatStream {
        conversation_id,
        mut fragments,
        task,
    } = state.orchestrator.chat(request);

    let spinner = (!json).then(|| {
        let spinner = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            spinner.set_style(spinner_style);
        }
        spinner.set_message("Thinking...");
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        spinner
    });

    let mut stdout = std::io::stdout();
    let mut failure = None;
    let mut first = true;

    while let Some(fragment) = fragments.recv().await {
        if first {
            if let Some(spinner) = &spinner {
                spinner.finish_and_clear();
            }
            first = false;
        }

        if json {
            println!("{}", serde_json::to_string(&fragment)?);
            continue;
        }

        match fragment {
            StreamFragment::Text { text } => {
                print!("{text}");
                stdout.flush()?;
            }
            StreamFragment::Done {
                prompt_tokens,
                completion_tokens,
                elapsed_ms,
                ..
            } => {
                println!();
                println!();
                println!(
                    "  {}",
                    style(format!(
                        "conversation {conversation_id} · {prompt_tokens} in / {completion_tokens} out · {elapsed_ms}ms"
                    ))
                    .dim()
                );
            }
            StreamFragment::Error { message } => failure = Some(message),
        }
    }

    if let Some(spinner) = &spinner {
        spinner.finish_and_clear();
    }
    let _ = task.await;

    if let Some(message) = failure {
        bail!(message);
    }
    Ok(())
}

/// Print a conversation's recent turns, oldest first.
pub async fn history(state: &AppState, conversation_id: &str, json: bool) -> Result<()> {
    let turns = state.conversations.history(conversation_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&turns)?);
        return Ok(());
    }

    if turns.is_empty() {
        println!(
            "  {} No messages in conversation {}",
            style("i").blue().bold(),
            style(conversation_id).cyan()
        );
        return Ok(());
    }

    println!();
    for turn in &turns {
        let who = match turn.role {
            MessageRole::User => style("you").green().bold(),
            MessageRole::Assistant => style("assistant").cyan().bold(),
            MessageRole::System => style("system").yellow().bold(),
        };
        let when = turn.created_at.format("%Y-%m-%d %H:%M");
        println!("  {who} {}", style(when).dim());
        for line in turn.text.lines() {
            println!("    {line}");
        }
        println!();
    }
    Ok(())
}

/// Delete every turn of a conversation.
pub async fn clear(state: &AppState, conversation_id: &str, force: bool, json: bool) -> Result<()> {
    if !force && !json && console::Term::stdout().is_term() {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete all messages in {conversation_id}?"))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    state.conversations.clear(conversation_id).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "conversation_id": conversation_id, "cleared": true })
        );
    } else {
        println!(
            "  {} Cleared conversation {}",
            style("✓").green().bold(),
            style(conversation_id).cyan()
        );
    }
    Ok(())
}
