//! CLI entry for anchorchat, defining clap subcommands and dispatching each command handler.
use clap::{Parser, Subcommand};

use crate::command::{self, GlobalArgs};

// The Cli struct represents the root of the command line interface.
#[derive(Parser, Debug)]
#[command(
    name = "anchorchat",
    about = "Chat with Claude, keeping sessions in a local folder or a cloud bucket",
    version
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Subcommands. Their args and execute functions live in the `command` module.
#[derive(Subcommand, Debug)]
enum Commands {
    #[command(subcommand, about = "Choose where chats are stored")]
    Setup(command::setup::SetupCmds),
    #[command(about = "Forget the chosen storage mode")]
    Switch,
    #[command(about = "Send a message and stream the reply")]
    Chat(command::chat::ChatArgs),
    #[command(about = "List saved sessions")]
    List,
    #[command(about = "Show a saved session")]
    Show(command::session::ShowArgs),
    #[command(about = "Delete a saved session")]
    Delete(command::session::DeleteArgs),
    #[command(about = "Show or change the system prompt and default model")]
    Settings(command::settings::SettingsArgs),
    #[command(about = "List the selectable models")]
    Models,
    #[command(about = "Show the signed-in cloud user")]
    Whoami,
}

/// Parses the command line (or `args` when given) and runs the command.
/// - Caution: This is a `synchronous` function, it's declared as `async` to be able to use `[tokio::main]`
#[tokio::main]
pub async fn parse(args: Option<&[&str]>) -> anyhow::Result<()> {
    parse_async(args).await
}

/// `async` version of the [parse] function
pub async fn parse_async(args: Option<&[&str]>) -> anyhow::Result<()> {
    let cli = match args {
        Some(args) => Cli::try_parse_from(args)?,
        None => Cli::parse(),
    };
    let global = cli.global;
    match cli.command {
        Commands::Setup(cmd) => command::setup::execute(&global, cmd).await,
        Commands::Switch => command::setup::switch(&global).await,
        Commands::Chat(args) => command::chat::execute(&global, args).await,
        Commands::List => command::session::list(&global).await,
        Commands::Show(args) => command::session::show(&global, args).await,
        Commands::Delete(args) => command::session::delete(&global, args).await,
        Commands::Settings(args) => command::settings::execute(&global, args).await,
        Commands::Models => {
            command::settings::models();
            Ok(())
        }
        Commands::Whoami => command::setup::whoami(&global).await,
    }
}

/// this test is to verify that the CLI can be built without panicking
/// according [clap dock](https://docs.rs/clap/latest/clap/_derive/_tutorial/chapter_4/index.html)
#[test]
fn verify_cli() {
    use clap::CommandFactory;

    Cli::command().debug_assert()
}
