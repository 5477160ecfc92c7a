use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use quitcoach::auth::SupabaseTokenVerifier;
use quitcoach::config::ProxyConfig;
use quitcoach::db::profile_repository::ProfileRepository;
use quitcoach::routes::build_router;
use quitcoach::runtime::VoiceflowRuntime;
use quitcoach::service::proxy_service::ProxyService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (development convenience)
    dotenvy::dotenv().ok();

    // Initialise tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quitcoach=debug,tower_http=debug".into()),
        )
        .init();

    let config = ProxyConfig::from_env()?;

    // ── Upstreams ─────────────────────────────────────────────────────────────
    let http = reqwest::Client::builder()
        .user_agent(concat!("quitcoach/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let verifier = SupabaseTokenVerifier::new(http.clone(), &config.supabase_url, &config.supabase_anon_key);
    let runtime = VoiceflowRuntime::new(
        http,
        &config.runtime_url,
        &config.runtime_api_key,
        &config.runtime_version,
        config.upstream_timeout,
    );
    let mut svc = ProxyService::new(Arc::new(verifier), Arc::new(runtime));

    // ── Database (optional) ───────────────────────────────────────────────────
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
            info!("Profile lookups enabled");
            svc = svc.with_profiles(Arc::new(ProfileRepository::new(pool)));
        }
        None => warn!("DATABASE_URL not set; launch turns rely on client-supplied context"),
    }

    // ── Listen ────────────────────────────────────────────────────────────────
    let app = build_router(svc);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Coach proxy listening on http://{addr}/");

    axum::serve(listener, app).await?;
    Ok(())
}
