//! Purchasing workflow engine for construction projects.
//!
//! Purchase requests are approved against a configurable threshold,
//! converted into purchase orders, and received against through receipts.
//! Every transition runs in one database transaction and appends to the
//! status log; domain events are published after commit.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod commands;
pub mod common;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod metrics;
pub mod migrator;
pub mod services;

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use crate::{
    config::AppConfig,
    db::DbPool,
    errors::ServiceError,
    events::{Event, EventSender},
    services::factory::{ServiceContainer, ServiceFactory},
};

/// A wired engine: the pool, the event channel and every service.
#[derive(Clone)]
pub struct PurchasingEngine {
    pub db: Arc<DbPool>,
    pub event_sender: Arc<EventSender>,
    pub services: ServiceContainer,
}

impl PurchasingEngine {
    /// Wires services over an existing pool and seeds the settings row.
    ///
    /// The returned receiver must be drained (for example with
    /// [`events::process_events`]) or publishing will block once the channel
    /// fills up.
    pub async fn from_pool(
        db: DbPool,
        config: &AppConfig,
    ) -> Result<(Self, mpsc::Receiver<Event>), ServiceError> {
        let (event_sender, event_rx) = events::channel(config.event_channel_capacity);
        let db = Arc::new(db);
        let event_sender = Arc::new(event_sender);

        let factory = ServiceFactory::new(db.clone(), event_sender.clone());
        let services = ServiceContainer::new(&factory);
        services
            .settings
            .initialize(config.purchasing_defaults())
            .await?;

        Ok((
            Self {
                db,
                event_sender,
                services,
            },
            event_rx,
        ))
    }
}

/// Connects to the configured database, applies migrations when enabled and
/// wires the engine.
pub async fn bootstrap(
    config: &AppConfig,
) -> Result<(PurchasingEngine, mpsc::Receiver<Event>), ServiceError> {
    let pool = db::establish_connection_from_app_config(config).await?;
    if config.auto_migrate {
        db::run_migrations(&pool).await?;
    }
    let engine = PurchasingEngine::from_pool(pool, config).await?;
    info!(environment = %config.environment, "Purchasing engine ready");
    Ok(engine)
}
