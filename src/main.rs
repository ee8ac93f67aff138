use std::process::ExitCode;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use coin_ledger::auth::StaticTokens;
use coin_ledger::config::Config;
use coin_ledger::http::{AppState, router};
use coin_ledger::ledger::MemoryLog;
use coin_ledger::notify::MemoryConversations;
use coin_ledger::store::MemoryStore;
use coin_ledger::voucher::StaticVouchers;
use coin_ledger::Ledger;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with_writer(std::io::stderr)
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let store = Arc::new(MemoryStore::new());
    for (account, balance) in &config.seeds {
        store.seed(account.clone(), *balance).await;
    }

    let mut tokens = StaticTokens::new();
    for (token, account, role) in &config.tokens {
        tokens = tokens.with_token(token.clone(), account.clone(), *role);
    }

    let ledger = Ledger::new(
        store,
        Arc::new(MemoryLog::new()),
        Arc::new(StaticVouchers::new()),
        Arc::new(MemoryConversations::new()),
        config.webhook_secret.as_bytes().to_vec(),
        config.limits,
        config.packages.clone(),
    );

    let state = AppState {
        ledger: Arc::new(ledger),
        identity: Arc::new(tokens),
    };

    let listener = match TcpListener::bind(config.addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %config.addr, "failed to bind: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!(addr = %config.addr, "coin ledger listening");

    if let Err(e) = axum::serve(listener, router(state)).await {
        error!("server error: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
