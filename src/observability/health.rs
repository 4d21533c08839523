use crate::db::UserStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthChecks {
    pub database: ComponentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentStatus {
    pub status: String,
    pub message: Option<String>,
}

impl ComponentStatus {
    fn unknown() -> Self {
        Self {
            status: "unknown".to_string(),
            message: None,
        }
    }
}

#[derive(Clone)]
pub struct HealthChecker {
    store: Arc<dyn UserStore>,
}

impl HealthChecker {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Liveness check - is the service running?
    pub async fn liveness(&self) -> HealthStatus {
        HealthStatus {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            checks: HealthChecks {
                database: ComponentStatus::unknown(),
            },
        }
    }

    /// Readiness check - can the service handle requests?
    pub async fn readiness(&self) -> HealthStatus {
        let db_status = self.check_database().await;

        let overall_status = if db_status.status == "ok" {
            "ok"
        } else {
            "degraded"
        };

        HealthStatus {
            status: overall_status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            checks: HealthChecks {
                database: db_status,
            },
        }
    }

    async fn check_database(&self) -> ComponentStatus {
        match self.store.ping().await {
            Ok(_) => ComponentStatus {
                status: "ok".to_string(),
                message: None,
            },
            Err(e) => ComponentStatus {
                status: "error".to_string(),
                message: Some(format!("Database check failed: {}", e)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    #[tokio::test]
    async fn test_readiness_with_memory_store() {
        let checker = HealthChecker::new(Arc::new(MemoryStore::new()));

        let ready = checker.readiness().await;
        assert_eq!(ready.status, "ok");
        assert_eq!(ready.checks.database.status, "ok");

        let live = checker.liveness().await;
        assert_eq!(live.checks.database.status, "unknown");
    }
}
