//! Pharmacy checkout service

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use pharmacy_checkout::api::{self, AppState};
use pharmacy_checkout::config::{Config, StorageBackend};
use pharmacy_checkout::messaging::EventPublisher;
use pharmacy_checkout::notification::{LogMailTransport, MailTransport, NatsMailTransport, OrderNotifier};
use pharmacy_checkout::payment::VnPayGateway;
use pharmacy_checkout::services::{CartService, OrderService, PaymentService};
use pharmacy_checkout::store::{CommerceStore, MemoryStore, PostgresStore};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("invalid configuration")?;

    let store: Arc<dyn CommerceStore> = match config.storage {
        StorageBackend::Postgres => {
            let url = config.database_url.as_deref().context("DATABASE_URL must be set")?;
            let db = PgPoolOptions::new().max_connections(config.database_max_connections).connect(url).await?;
            sqlx::migrate!("./migrations").run(&db).await?;
            Arc::new(PostgresStore::new(db))
        }
        StorageBackend::Memory => {
            tracing::warn!("using in-memory storage, data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, %url, "NATS unavailable, events and mail relay disabled");
                None
            }
        },
        None => None,
    };

    let transport: Arc<dyn MailTransport> = match &nats {
        Some(client) => Arc::new(NatsMailTransport::new(client.clone(), config.mail.relay_subject.clone())),
        None => Arc::new(LogMailTransport),
    };
    let notifier = OrderNotifier::new(
        transport,
        config.mail.from.clone(),
        config.mail.subject_prefix.clone(),
        config.mail.timeout,
    );
    let events = EventPublisher::new(nats, config.nats_subject_prefix.clone());
    let gateway = Arc::new(VnPayGateway::new(config.vnpay.clone()));

    let state = AppState {
        carts: CartService::new(store.clone()),
        orders: OrderService::new(store.clone(), gateway.clone(), notifier.clone(), events.clone()),
        payments: PaymentService::new(store, gateway, notifier, events),
    };

    let app = api::router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .layer(TimeoutLayer::new(config.request_timeout)),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Pharmacy checkout listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(addr).await?,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
