//! Saved session listing, display and deletion.

use anyhow::{Context, bail};
use chrono::{DateTime, Local, Utc};
use clap::Parser;
use colored::Colorize;

use super::{GlobalArgs, Workspace};
use crate::internal::session::{Message, Role};

#[derive(Parser, Debug)]
pub struct ShowArgs {
    #[arg(help = "Session id")]
    pub id: String,
}

#[derive(Parser, Debug)]
pub struct DeleteArgs {
    #[arg(help = "Session id")]
    pub id: String,
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

pub async fn list(global: &GlobalArgs) -> anyhow::Result<()> {
    let workspace = Workspace::open(global).await?;
    let store = workspace.session_store().await?;
    let sessions = store.list().await.context("cannot read the session index")?;
    if sessions.is_empty() {
        println!("No saved sessions.");
        return Ok(());
    }
    for entry in sessions {
        println!(
            "{}  {}  {}",
            entry.id.yellow(),
            local_time(entry.updated_at).dimmed(),
            entry.title
        );
    }
    Ok(())
}

pub async fn show(global: &GlobalArgs, args: ShowArgs) -> anyhow::Result<()> {
    let workspace = Workspace::open(global).await?;
    let store = workspace.session_store().await?;
    let Some(session) = store.load_session(&args.id).await? else {
        bail!("no session with id '{}'", args.id);
    };

    println!("{} {}", session.title.bold(), local_time(session.updated_at).dimmed());
    if let Some(anchor) = &session.memory_anchor {
        println!("{}", "Memory anchor:".cyan());
        println!("{anchor}");
    }
    for message in &session.messages {
        println!();
        print_message(message);
    }
    Ok(())
}

fn print_message(message: &Message) {
    let label = match message.role {
        Role::User => "you".green().bold(),
        Role::Assistant => "claude".blue().bold(),
        Role::System => "system".red().bold(),
    };
    println!("{label} {}", local_time(message.timestamp).dimmed());
    for attachment in message.attachments() {
        println!(
            "  [{} {} ({} bytes)]",
            attachment.name, attachment.mime_type, attachment.size
        );
    }
    println!("{}", message.content);
}

pub async fn delete(global: &GlobalArgs, args: DeleteArgs) -> anyhow::Result<()> {
    let workspace = Workspace::open(global).await?;
    let store = workspace.session_store().await?;
    store
        .delete_session(&args.id)
        .await
        .with_context(|| format!("failed to delete session '{}'", args.id))?;
    println!("Deleted session {}", args.id);
    Ok(())
}
