use std::sync::Arc;

use intake_assist::config::ServiceConfig;
use intake_assist::flow::Engine;
use intake_assist::flow::survey::chart_audit_catalog;
use intake_assist::llm::{LlmConfig, create_provider};
use intake_assist::retry::RetryPolicy;
use intake_assist::server::{AppState, app_router};
use intake_assist::store::{LibSqlStore, SessionStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ServiceConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export ANTHROPIC_API_KEY=sk-ant-...");
        std::process::exit(1);
    });

    // The catalog is validated here; a bad rule aborts startup instead of
    // disqualifying respondents at runtime.
    let catalog = Arc::new(chart_audit_catalog()?);
    let engine = Engine::new(Arc::clone(&catalog));

    let store: Arc<dyn SessionStore> = Arc::new(LibSqlStore::new_local(&config.db_path).await?);

    let llm = create_provider(&LlmConfig {
        api_key: config.api_key.clone(),
        model: config.model.clone(),
    })?;

    eprintln!("🩺 Intake Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.model);
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   Survey: {} steps (entry {})", catalog.len(), catalog.entry());
    eprintln!("   Intake WS: ws://0.0.0.0:{}/ws/intake/{{session_id}}", config.port);
    eprintln!("   Form API: http://0.0.0.0:{}/api/survey\n", config.port);

    let state = AppState {
        engine,
        store,
        llm,
        save_interval: config.save_interval,
        retry_policy: RetryPolicy::with_max_retries(config.save_max_retries),
    };

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, "Intake server started");
    axum::serve(listener, app_router(state)).await?;

    Ok(())
}
