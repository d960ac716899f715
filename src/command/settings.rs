//! `settings` and `models`.

use anyhow::{Context, bail};
use clap::Parser;
use colored::Colorize;

use super::{GlobalArgs, Workspace};
use crate::internal::{
    ai::providers::anthropic::{AVAILABLE_MODELS, display_name},
    session::DEFAULT_MODEL,
};

#[derive(Parser, Debug)]
pub struct SettingsArgs {
    /// Instruction sent with every turn; pass "" to clear it
    #[arg(long, value_name = "TEXT")]
    pub system_prompt: Option<String>,

    /// Model used for replies
    #[arg(long, value_name = "ID")]
    pub model: Option<String>,
}

pub async fn execute(global: &GlobalArgs, args: SettingsArgs) -> anyhow::Result<()> {
    if let Some(model) = &args.model
        && !AVAILABLE_MODELS.iter().any(|m| m.id == model.as_str())
    {
        bail!("unknown model '{model}'; run `anchorchat models` to list them");
    }

    let workspace = Workspace::open(global).await?;
    let store = workspace.session_store().await?;
    let mut settings = store.load_settings().await.context("cannot read settings")?;

    let changed = args.system_prompt.is_some() || args.model.is_some();
    if let Some(prompt) = args.system_prompt {
        settings.system_prompt = prompt;
    }
    if let Some(model) = args.model {
        settings.default_model = model;
    }
    if changed {
        store
            .save_settings(&settings)
            .await
            .context("failed to save settings")?;
    }

    println!(
        "{} {} ({})",
        "model:".bold(),
        display_name(&settings.default_model),
        settings.default_model
    );
    if settings.system_prompt.is_empty() {
        println!("{} {}", "system prompt:".bold(), "(none)".dimmed());
    } else {
        println!("{} {}", "system prompt:".bold(), settings.system_prompt);
    }
    Ok(())
}

pub fn models() {
    for model in AVAILABLE_MODELS {
        let marker = if model.id == DEFAULT_MODEL { "*" } else { " " };
        println!("{marker} {:<18} {}", model.id, model.name);
    }
}
