use anyhow::Result;
use clap::{Parser, Subcommand};
use phichat::{Config, app, commands, logging};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "phichat")]
#[command(version)]
#[command(about = "Chat with Gemini from the terminal", long_about = None)]
struct Cli {
    /// Directory holding config.toml, saved history and logs (default: ~/.phichat)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one prompt and print the reply
    Ask {
        /// Include the saved conversation as context and save the exchange
        #[arg(short = 'c', long = "continue")]
        resume: bool,

        /// The prompt; multiple words are joined with spaces
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
    },
    /// Print the saved conversation
    History,
    /// Delete the saved conversation
    Clear,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.data_dir {
        Some(dir) => Config::load_from(dir)?,
        None => Config::load()?,
    };

    match cli.command {
        None => {
            let _guard = logging::init_file(&config.log_dir())?;
            tracing::info!(model = %config.model, "Starting chat");
            app::run(config).await
        }
        Some(Commands::Ask { resume, prompt }) => {
            logging::init_stderr();
            commands::ask(&config, &prompt.join(" "), resume).await
        }
        Some(Commands::History) => {
            logging::init_stderr();
            commands::show_history(&config)
        }
        Some(Commands::Clear) => {
            logging::init_stderr();
            commands::clear_history(&config)
        }
    }
}
