// Wiring of stores, services and router

use crate::api::{create_router, AppState};
use crate::clock::Clock;
use crate::config::Config;
use crate::db::{IncidentStore, MemoryStore, PgStore, UserStore};
use crate::errors::Result;
use crate::notify::{DispatcherConfig, Mailer, NotificationDispatcher};
use crate::observability::HealthChecker;
use crate::services::Services;
use axum::Router;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// The two store ports, backed by one implementation
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub incidents: Arc<dyn IncidentStore>,
}

impl Stores {
    pub fn memory() -> Self {
        Self::from_shared(Arc::new(MemoryStore::new()))
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self::from_shared(Arc::new(PgStore::new(pool)))
    }

    pub fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: UserStore + IncidentStore + 'static,
    {
        Self {
            users: store.clone(),
            incidents: store,
        }
    }
}

/// A ready-to-serve router plus the notification worker behind it
pub struct Application {
    pub router: Router,
    /// Finishes once the router (and every dispatcher handle) is dropped
    pub notification_worker: JoinHandle<()>,
}

/// Build the application. Must run inside a tokio runtime.
pub fn build(
    config: &Config,
    stores: Stores,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
) -> Result<Application> {
    let (dispatcher, notification_worker) = NotificationDispatcher::spawn(
        mailer.clone(),
        DispatcherConfig::from(&config.notifications),
    );

    let services = Services::new(
        config,
        stores.users.clone(),
        stores.incidents,
        mailer,
        dispatcher,
        clock,
    )?;

    let state = AppState {
        services,
        health_checker: Arc::new(HealthChecker::new(stores.users)),
        metrics_enabled: config.observability.metrics_enabled,
    };

    Ok(Application {
        router: create_router(state, &config.security),
        notification_worker,
    })
}
