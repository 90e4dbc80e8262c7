//! Model configuration commands: list, check, add, remove.

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Password;
use indicatif::{ProgressBar, ProgressStyle};

use confab_core::provider::catalog::{self, ProviderSpec};
use confab_types::provider::{CredentialField, ModelConfig, ModelType};

use crate::state::AppState;

/// Flags of `confab models add`.
pub struct AddModel {
    pub provider: String,
    pub model: String,
    pub id: Option<String>,
    pub model_type: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub secret_key: Option<String>,
    pub deployment: Option<String>,
}

/// List model configs in a table. Secrets are masked.
pub async fn list_models(state: &AppState, model_type: Option<String>, json: bool) -> Result<()> {
    let model_type = model_type
        .map(|t| t.parse::<ModelType>().map_err(anyhow::Error::msg))
        .transpose()?;
    let models = state.models.list(model_type).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&models)?);
        return Ok(());
    }

    if models.is_empty() {
        println!();
        println!(
            "  {} No models configured. Add one with: {}",
            style("i").blue().bold(),
            style("confab models add --provider OLLAMA --model llama3 --base-url http://localhost:11434").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("ID").fg(Color::White),
        Cell::new("Type").fg(Color::White),
        Cell::new("Provider").fg(Color::White),
        Cell::new("Model").fg(Color::White),
        Cell::new("Status").fg(Color::White),
    ]);

    for model in &models {
        let status = match catalog::validate(model) {
            Ok(_) => Cell::new("● ready").fg(Color::Green),
            Err(e) => Cell::new(format!("○ {e}")).fg(Color::Yellow),
        };
        table.add_row(vec![
            Cell::new(&model.id).fg(Color::Cyan),
            Cell::new(model.model_type.to_string()),
            Cell::new(&model.provider),
            Cell::new(&model.model),
            status,
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

/// Report a config's capabilities, optionally with a live probe.
pub async fn check_model(state: &AppState, id: &str, probe: bool, json: bool) -> Result<()> {
    let report = state.models.capabilities(id)?;

    let probe_report = if probe {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
        spinner.set_message(format!("Probing {id}..."));
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        let result = state.models.probe(id).await;
        spinner.finish_and_clear();
        Some(result?)
    } else {
        None
    };

    if json {
        let out = serde_json::json!({ "capabilities": report, "probe": probe_report });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let check_mark = |ok: bool| {
        if ok {
            format!("{}", style("✓").green())
        } else {
            format!("{}", style("✗").red())
        }
    };

    println!();
    println!(
        "  Model {} ({})",
        style(&report.model_id).cyan().bold(),
        report.provider
    );
    println!();
    match &report.problem {
        None => println!("  {} configuration complete", check_mark(true)),
        Some(problem) => println!("  {} {problem}", check_mark(false)),
    }
    let capabilities: Vec<String> = report.capabilities.iter().map(ToString::to_string).collect();
    println!("  {} {}", style("Capabilities:").bold(), capabilities.join(", "));

    if let Some(probe) = probe_report {
        println!(
            "  {} live request in {}ms: {}",
            check_mark(probe.ok),
            probe.latency_ms,
            style(&probe.detail).dim()
        );
    }
    println!();
    Ok(())
}

/// Store a new config, prompting for required secrets that were not given.
pub async fn add_model(state: &AppState, args: AddModel, json: bool) -> Result<()> {
    let mut config = ModelConfig::new(args.id.unwrap_or_default(), args.provider, args.model);
    config.model_type = args.model_type.parse().map_err(anyhow::Error::msg)?;
    config.base_url = args.base_url;
    config.api_key = args.api_key;
    config.secret_key = args.secret_key;
    config.azure_deployment_name = args.deployment;

    let kind = catalog::identify(&config)?;
    let interactive = !json && console::Term::stdout().is_term();
    for field in ProviderSpec::of(kind).required {
        if config.credential(*field).is_some() || !interactive {
            continue;
        }
        match field {
            CredentialField::ApiKey => {
                config.api_key = Some(Password::new().with_prompt("API key").interact()?);
            }
            CredentialField::SecretKey => {
                config.secret_key = Some(Password::new().with_prompt("Secret key").interact()?);
            }
            CredentialField::BaseUrl | CredentialField::AzureDeploymentName => {}
        }
    }

    let created = state
        .models
        .create(config)
        .await
        .context("failed to store model config")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&created)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Added model {} ({} {})",
        style("✓").green().bold(),
        style(&created.id).cyan(),
        created.provider,
        created.model
    );
    if let Err(e) = catalog::validate(&created) {
        println!("  {} {e}", style("!").yellow().bold());
    }
    println!();
    Ok(())
}

pub async fn remove_model(state: &AppState, id: &str, json: bool) -> Result<()> {
    state.models.delete(id).await?;
    if json {
        println!("{}", serde_json::json!({ "id": id, "deleted": true }));
    } else {
        println!("  {} Removed model {}", style("✓").green().bold(), style(id).cyan());
    }
    Ok(())
}
