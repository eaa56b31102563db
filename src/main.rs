//! Chat relay: service entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Init logger at the configured level
//!   4. Build the LLM provider and session manager
//!   5. Spawn Ctrl-C → shutdown signal watcher
//!   6. Run the HTTP channel until shutdown

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use chat_relay::config;
use chat_relay::error::AppError;
use chat_relay::llm::providers;
use chat_relay::logger;
use chat_relay::subsystems::chat::ChatRelay;
use chat_relay::subsystems::chat::credential::CredentialSources;
use chat_relay::subsystems::comms::AxumChannel;
use chat_relay::subsystems::memory::SessionManager;
use chat_relay::subsystems::runtime::{Component, run_components};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present; the file is optional.
    let _ = dotenvy::dotenv();

    let config = config::load()?;
    logger::init(&config.log_level)?;

    info!(
        bind = %config.bind,
        provider = %config.llm.provider,
        model = %config.llm.gemini.model,
        log_level = %config.log_level,
        "config loaded"
    );

    let provider = providers::build(&config.llm).map_err(|e| AppError::Config(e.to_string()))?;
    let credentials = CredentialSources::from_env_names(&config.llm.gemini.credential_env);
    if provider.requires_credential() && credentials.resolve().is_none() {
        warn!(
            source = credentials.primary_name(),
            "no API key found; chat requests will fail until one is set"
        );
    }

    let sessions = Arc::new(SessionManager::new(&config.chat.system_prompt, &config.memory));
    let relay = Arc::new(ChatRelay::new(provider, credentials, sessions, &config.chat));

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("ctrl-c received, shutting down");
                    shutdown.cancel();
                }
                Err(e) => warn!("cannot listen for ctrl-c: {e}"),
            }
        });
    }

    let components: Vec<Box<dyn Component>> =
        vec![Box::new(AxumChannel::new("http", config.bind.clone(), relay))];
    run_components(components, shutdown).await
}
