use clap::Parser;
use llm_stream_gateway::cli::{Cli, Commands, ConfigAction};
use llm_stream_gateway::config::{ConfigStore, PromptPair};
use llm_stream_gateway::dispatcher::Dispatcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();

    // reqwest's rustls-no-provider feature requires installing a process-level
    // crypto provider before the first TLS handshake.
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("no other crypto provider installed yet");

    let store = ConfigStore::at_default_path()?;
    let dispatcher = Dispatcher::new(store);

    match cli.command {
        Commands::Config { action } => match action {
            ConfigAction::Path => println!("{}", dispatcher.config_path()),
            ConfigAction::Show => {
                let config = dispatcher.load_config()?;
                println!("{}", toml::to_string_pretty(&config)?);
            }
            ConfigAction::SetDefault { name } => {
                dispatcher.set_default_provider(&name)?;
                println!("default provider set to {name}");
            }
        },
        Commands::Stream { provider, prompt, system } => {
            let config = dispatcher.load_config()?;
            let record = config
                .providers
                .get(&provider)
                .ok_or_else(|| anyhow::anyhow!("unknown provider: {provider}"))?
                .clone();

            let mut rx = dispatcher.subscribe();
            let stream_id = dispatcher.start_stream(record, PromptPair { user: prompt, system })?;

            loop {
                let event = rx.recv().await?;
                if event.stream_id != stream_id {
                    continue;
                }
                if !event.delta.is_empty() {
                    print!("{}", event.delta);
                    use std::io::Write;
                    std::io::stdout().flush().ok();
                }
                if event.done {
                    println!();
                    if let Some(error) = event.error {
                        eprintln!("error: {error}");
                        std::process::exit(1);
                    }
                    break;
                }
            }
        }
        Commands::Test { provider } => {
            let config = dispatcher.load_config()?;
            let record = config
                .providers
                .get(&provider)
                .ok_or_else(|| anyhow::anyhow!("unknown provider: {provider}"))?
                .clone();
            dispatcher.test_connection(record).await?;
            println!("{provider}: ok");
        }
    }

    Ok(())
}
