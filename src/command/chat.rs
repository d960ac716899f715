//! `chat`: one turn of a conversation, with the reply streamed to stdout.

use std::{
    io::{self, Write},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{Context, bail};
use clap::Parser;
use colored::Colorize;

use super::{GlobalArgs, Workspace};
use crate::{
    internal::{
        ai::providers::anthropic::{AnthropicBackend, Client},
        conversation::{ChatController, TurnOutcome},
        session::{Message, Role},
    },
    utils::upload::{AttachmentUploader, LocalFile},
};

#[derive(Parser, Debug)]
pub struct ChatArgs {
    /// Continue this session instead of starting a new one
    #[arg(long, short, value_name = "ID")]
    pub session: Option<String>,

    /// Attach a file to the message
    #[arg(long, short, value_name = "FILE")]
    pub attach: Option<PathBuf>,

    #[arg(required = true, help = "The message to send")]
    pub message: Vec<String>,
}

pub async fn execute(global: &GlobalArgs, args: ChatArgs) -> anyhow::Result<()> {
    let workspace = Workspace::open(global).await?;
    let client = Client::from_env().context("ANTHROPIC_API_KEY is not set")?;

    let mut backend = AnthropicBackend::new(client);
    if let Some(cloud) = &workspace.cloud {
        backend = backend.with_files(cloud.fs.clone(), cloud.retry.clone());
    }
    let mut controller = ChatController::new(workspace.context.clone(), Arc::new(backend));
    if let Some(cloud) = &workspace.cloud {
        controller = controller
            .with_uploader(AttachmentUploader::new(cloud.fs.clone(), cloud.retry.clone()))
            .with_auth(cloud.auth.clone());
    }
    controller.initialize().await.with_context(|| {
        format!(
            "cannot open {} storage at '{}'; check access and try again",
            workspace.mode(),
            workspace.location
        )
    })?;

    if let Some(id) = &args.session
        && !controller.open_session(id).await?
    {
        bail!("no session with id '{id}'");
    }

    let file = match &args.attach {
        Some(path) => {
            if workspace.cloud.is_none() {
                eprintln!(
                    "{} attachments need a cloud store; sending without {}",
                    "warning:".yellow(),
                    path.display()
                );
            }
            Some(LocalFile::from_path(path).await?)
        }
        None => None,
    };

    let content = args.message.join(" ");
    let mut printer = ReplyPrinter::default();
    let outcome = controller
        .send(&content, file.as_ref(), |message| printer.observe(message))
        .await
        .context("failed to save the session")?;
    printer.finish();

    eprintln!("{} {}", "session:".dimmed(), outcome.session_id());
    match outcome {
        TurnOutcome::Completed { .. } => Ok(()),
        TurnOutcome::Failed { error, .. } => bail!(error),
    }
}

/// Writes each fragment as the assistant message grows.
#[derive(Default)]
struct ReplyPrinter {
    printed: usize,
}

impl ReplyPrinter {
    fn observe(&mut self, message: &Message) {
        match message.role {
            Role::Assistant => {
                let fresh = message.content.get(self.printed..).unwrap_or_default();
                if !fresh.is_empty() {
                    let mut stdout = io::stdout().lock();
                    // a closed pipe should not fail the turn
                    let _ = stdout.write_all(fresh.as_bytes());
                    let _ = stdout.flush();
                    self.printed = message.content.len();
                }
            }
            Role::System => {
                if self.printed > 0 {
                    println!();
                    self.printed = 0;
                }
                eprintln!("{}", message.content.red());
            }
            Role::User => {}
        }
    }

    fn finish(&self) {
        if self.printed > 0 {
            println!();
        }
    }
}
