use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use engine::{IdentityVerifier, Notifier, SystemClock, TracingNotifier, VotingEngine};
use storage::{Database, PgStore};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod error;
mod extract;
mod features;
mod identity;
mod middleware;
mod notify;
mod state;

use config::Config;
use features::{advancement, competitions, leaderboard, participants, votes};
use identity::{HttpIdentityVerifier, TrustAllVerifier};
use middleware::auth::ApiKeys;
use notify::WebhookNotifier;
use state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        competitions::handlers::get_competition,
        competitions::handlers::create_competition,
        competitions::handlers::transition_status,
        participants::handlers::apply,
        participants::handlers::approve,
        participants::handlers::reject,
        participants::handlers::withdraw,
        participants::handlers::audit,
        votes::handlers::cast_vote,
        leaderboard::handlers::get_leaderboard,
        advancement::handlers::advance,
    ),
    components(
        schemas(
            storage::dto::competition::CreateCompetitionRequest,
            storage::dto::competition::TransitionStatusRequest,
            storage::dto::participant::ApplyRequest,
            storage::dto::vote::CastVoteRequest,
            storage::dto::vote::VoteReceipt,
            storage::dto::vote::LedgerAudit,
            storage::dto::ranking::LeaderboardEntry,
            storage::dto::ranking::Trend,
            storage::dto::advancement::AdvanceRequest,
            storage::dto::advancement::AdvancementCriteria,
            storage::dto::advancement::AdvancementOutcome,
            storage::dto::common::PaginationMeta,
            storage::models::Competition,
            storage::models::CompetitionStatus,
            storage::models::Tier,
            storage::models::TimeWindow,
            storage::models::QualificationRules,
            storage::models::AdvancementInfo,
            storage::models::Participant,
            storage::models::ParticipantStatus,
            storage::models::Submission,
        )
    ),
    tags(
        (name = "competitions", description = "Competition lifecycle"),
        (name = "participants", description = "Applications and review"),
        (name = "votes", description = "Vote casting"),
        (name = "leaderboard", description = "Live standings"),
        (name = "advancement", description = "Tier promotion"),
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("API Key")
                        .build(),
                ),
            )
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("Starting competition voting API");

    let config = Config::from_env().context("Failed to load API configuration")?;
    tracing::info!("Configuration loaded successfully");

    tracing::info!(
        "Connecting to database at: {}",
        config
            .database_url
            .split('@')
            .next_back()
            .unwrap_or("unknown")
    );
    let db = Database::new(&config.database_url)
        .await
        .context("Failed to initialize database")?;
    tracing::info!("Database connection established");

    tracing::info!("Running database migrations");
    db.run_migrations()
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Database migrations completed successfully");

    let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
        Some(url) => {
            tracing::info!("Delivering engine events to webhook");
            Arc::new(WebhookNotifier::new(url))
        }
        None => Arc::new(TracingNotifier),
    };
    let identity: Arc<dyn IdentityVerifier> = match &config.identity_url {
        Some(url) => Arc::new(HttpIdentityVerifier::new(url)),
        None => {
            tracing::warn!("ALLOW_UNVERIFIED_VOTERS set, every voter is treated as verified");
            Arc::new(TrustAllVerifier)
        }
    };

    let engine = VotingEngine::new(
        Arc::new(PgStore::new(db)),
        config.engine.clone(),
        Arc::new(SystemClock),
        notifier,
    );
    spawn_velocity_sweeper(engine.clone(), config.velocity_sweep);

    let api_keys = ApiKeys::from_comma_separated(&config.api_keys);
    if api_keys.is_empty() {
        tracing::warn!("API_KEYS is empty, organizer endpoints will reject every request");
    }

    let state = AppState {
        engine,
        identity,
        trusted_proxy_hops: config.trusted_proxy_hops,
    };

    let competition_routes = competitions::routes::routes(api_keys.clone())
        .merge(participants::routes::competition_routes())
        .merge(votes::routes::routes())
        .merge(leaderboard::routes::routes())
        .merge(advancement::routes::routes(api_keys.clone()));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api/competitions", competition_routes)
        .nest("/api/participants", participants::routes::routes(api_keys))
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(state);

    let bind_address = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting server at http://{}", bind_address);
    tracing::info!(
        "Swagger UI available at http://{}/swagger-ui/",
        bind_address
    );

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}

/// Periodically evict velocity keys whose window has fully elapsed
fn spawn_velocity_sweeper(engine: VotingEngine, every: std::time::Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            engine.sweep_velocity();
        }
    });
}
