//! Storage mode selection: `setup`, `switch` and `whoami`.

use std::path::PathBuf;

use anyhow::Context;
use clap::Subcommand;
use colored::Colorize;

use super::{CloudParts, GlobalArgs, Workspace};
use crate::{
    internal::config::Preferences,
    utils::storage::{StorageMode, auth::CloudAuth},
};

#[derive(Subcommand, Debug)]
pub enum SetupCmds {
    #[command(about = "Keep chats in a local directory")]
    Local {
        #[arg(help = "Directory to keep the chats in")]
        dir: PathBuf,
    },
    #[command(about = "Keep chats in the cloud store")]
    Cloud {
        #[arg(help = "Root path in the cloud store")]
        path: Option<String>,
    },
}

pub async fn execute(global: &GlobalArgs, cmd: SetupCmds) -> anyhow::Result<()> {
    let (workspace, cloud_path) = match cmd {
        SetupCmds::Local { dir } => (Workspace::local(&dir, None), None),
        SetupCmds::Cloud { path } => {
            let path = path.or_else(|| global.cloud_path.clone());
            (
                Workspace::cloud(CloudParts::from_env()?, path.as_deref())?,
                path,
            )
        }
    };
    workspace.initialize().await?;

    let path = global.preferences_path()?;
    let mut preferences = Preferences::load(&path).await;
    let remembered_path = match workspace.mode() {
        StorageMode::Cloud => cloud_path.or(Some(workspace.location.clone())),
        StorageMode::Local => None,
    };
    preferences.remember(workspace.mode(), remembered_path.as_deref());
    preferences
        .save(&path)
        .await
        .context("failed to save preferences")?;

    println!(
        "Storing chats in {} storage at {}",
        workspace.mode().to_string().bold(),
        workspace.location.green()
    );
    if workspace.mode() == StorageMode::Local {
        println!("Pass --local {} on every run to use it.", workspace.location);
    }
    Ok(())
}

/// Forget the chosen mode. Nothing stored is touched.
pub async fn switch(global: &GlobalArgs) -> anyhow::Result<()> {
    let path = global.preferences_path()?;
    let mut preferences = Preferences::load(&path).await;
    preferences.forget_mode();
    preferences
        .save(&path)
        .await
        .context("failed to save preferences")?;
    println!("Storage mode cleared; run `anchorchat setup` to choose again.");
    Ok(())
}

pub async fn whoami(global: &GlobalArgs) -> anyhow::Result<()> {
    let workspace = Workspace::open(global).await?;
    let Some(cloud) = &workspace.cloud else {
        println!("{} (no cloud account)", "local".bold());
        return Ok(());
    };
    if !cloud.auth.is_signed_in() {
        cloud.auth.sign_in().await.context("sign-in failed")?;
    }
    let user = cloud.auth.get_user().await.context("cannot fetch cloud user")?;
    println!("{}", user.username.bold());
    Ok(())
}
