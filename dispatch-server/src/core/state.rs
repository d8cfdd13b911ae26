use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::auth::JwtService;
use crate::core::{Config, ServerError};
use crate::live::DispatchHub;
use crate::orders::{DispatchManager, OrderStorage};
use crate::riders::RiderRegistry;
use crate::services::{LocalProofStorage, StripeGateway};

/// Server state - shared handles to every service
///
/// Cloning is cheap; every field is reference counted.
///
/// | Field | Type | Meaning |
/// |-------|------|---------|
/// | config | Config | immutable settings |
/// | manager | Arc<DispatchManager> | dispatch façade (orders, riders, hub) |
/// | jwt_service | Arc<JwtService> | bearer token validation |
/// | shutdown | CancellationToken | cancelled on graceful shutdown |
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub manager: Arc<DispatchManager>,
    pub jwt_service: Arc<JwtService>,
    pub shutdown: CancellationToken,
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Config carries provider secrets
        f.debug_struct("ServerState")
            .field("environment", &self.config.environment)
            .field("manager", &self.manager)
            .field("jwt_service", &self.jwt_service)
            .finish_non_exhaustive()
    }
}

impl ServerState {
    pub fn new(config: Config, manager: Arc<DispatchManager>, jwt_service: Arc<JwtService>) -> Self {
        Self {
            config,
            manager,
            jwt_service,
            shutdown: CancellationToken::new(),
        }
    }

    /// Initialize server state
    ///
    /// In order:
    /// 1. Work dir layout (`uploads/proofs`, `logs`)
    /// 2. Order and rider databases (`orders.redb`, `riders.redb`)
    /// 3. Proof storage and, when `STRIPE_SECRET_KEY` is set, the checkout gateway
    pub async fn initialize(config: &Config) -> Result<Self, ServerError> {
        for dir in [config.proofs_dir(), config.logs_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| {
                ServerError::Config(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }

        let storage = OrderStorage::open(config.orders_db_path())
            .map_err(|e| ServerError::Storage(e.to_string()))?;
        let riders = RiderRegistry::open(config.riders_db_path())
            .map_err(|e| ServerError::Storage(e.to_string()))?;
        let proofs = Arc::new(LocalProofStorage::new(config.proofs_dir(), config.max_proof_size));

        let mut manager = DispatchManager::new(storage, DispatchHub::new(), riders, proofs);

        match &config.stripe_secret_key {
            Some(key) => {
                let gateway = StripeGateway::new(
                    key.clone(),
                    config.checkout_currency.clone(),
                    config.checkout_exchange_rate,
                    config.frontend_url.clone(),
                    config.payment_timeout(),
                )
                .map_err(|e| ServerError::Config(format!("Payment gateway: {}", e)))?;
                manager.set_payment_gateway(Arc::new(gateway));
            }
            None => tracing::warn!("STRIPE_SECRET_KEY not set, orders are placed without checkout sessions"),
        }

        let jwt_service = Arc::new(JwtService::with_config(config.jwt.clone()));

        tracing::info!(
            work_dir = %config.work_dir,
            orders = manager.storage().count().unwrap_or(0),
            "Server state initialized"
        );

        Ok(Self::new(config.clone(), Arc::new(manager), jwt_service))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn manager(&self) -> &DispatchManager {
        &self.manager
    }

    pub fn jwt_service(&self) -> &JwtService {
        &self.jwt_service
    }

    pub fn hub(&self) -> &DispatchHub {
        self.manager.hub()
    }
}
