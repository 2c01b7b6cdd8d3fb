use clap::{builder::styling, Parser, Subcommand};

const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::Green.on_default().bold())
    .usage(styling::AnsiColor::Green.on_default().bold())
    .literal(styling::AnsiColor::Cyan.on_default().bold())
    .placeholder(styling::AnsiColor::Cyan.on_default());

#[derive(Parser)]
#[command(name = "llm-stream-gateway")]
#[command(author, version, long_about = None)]
#[command(styles = STYLES)]
/// Thin command-line harness over the gateway core, for manual smoke
/// testing without a desktop shell.
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Configuration operations.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Start a stream against a named provider and print deltas as
    /// they arrive.
    Stream {
        /// Provider name from the catalogue.
        provider: String,

        /// User prompt.
        prompt: String,

        /// Optional system prompt.
        #[arg(short, long)]
        system: Option<String>,
    },

    /// Probe connectivity for a named provider.
    Test {
        /// Provider name from the catalogue.
        provider: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the resolved configuration document path.
    Path,
    /// Print the catalogue.
    Show,
    /// Set the default provider.
    SetDefault {
        /// Provider name.
        name: String,
    },
}
