use anyhow::Context;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cinegate_core::SystemClock;
use cinegate_store::{
    app_config::Config, DbClient, EventProducer, KafkaNotifier, PgBookingRepository, PgCatalog,
    PgInventoryRepository,
};
use cinegate_worker::{worker, App, Backends, Topics};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cinegate_worker=debug,cinegate_booking=debug,cinegate_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Cinegate worker");

    let db = DbClient::new(&config.database)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let producer = EventProducer::new(&config.kafka.brokers).context("Failed to create Kafka producer")?;

    let app = App::new(
        Backends {
            bookings: Arc::new(PgBookingRepository::new(db.pool.clone())),
            inventory: Arc::new(PgInventoryRepository::new(db.pool.clone())),
            catalog: Arc::new(PgCatalog::new(db.pool.clone())),
            notifier: Arc::new(KafkaNotifier::new(producer, config.kafka.confirmation_topic.clone())),
            clock: Arc::new(SystemClock),
        },
        &config.business_rules,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweeper = app.sweeper.clone();
    let sweeper_rx = shutdown_rx.clone();
    let sweeper_task = tokio::spawn(async move { sweeper.run(sweeper_rx).await });

    let handler = Arc::new(app.message_handler(Topics {
        payment: config.kafka.payment_topic.clone(),
        showtime: config.kafka.showtime_topic.clone(),
    }));
    let consumer = worker::create_consumer(&config.kafka.brokers, &config.kafka.group_id)
        .context("Failed to create Kafka consumer")?;
    let consumer_task = tokio::spawn(worker::run_consumer(
        consumer,
        handler,
        worker::RetryPolicy::default(),
        shutdown_rx,
    ));

    tokio::signal::ctrl_c().await.context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown requested");
    shutdown_tx.send(true).ok();

    sweeper_task.await?;
    consumer_task.await??;
    tracing::info!("Cinegate worker stopped");
    Ok(())
}
