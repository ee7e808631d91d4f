//! Arbiter - a model-variant registry with request routing and A/B test
//! arbitration.
//!
//! Arbiter routes inference requests to one of several registered predictive
//! model variants, records every request/response pair for later auditing,
//! and supports controlled experimentation between two variants of an
//! algorithm family, including automatic promotion of the winner based on
//! observed accuracy.
//!
//! # Features
//!
//! - **Variant Registry**: model variants grouped by algorithm family, each
//!   with an auditable status history.
//! - **Status Ledger**: atomic status transitions with exactly one active
//!   record per variant at any instant.
//! - **Request Routing**: deterministic selection under `production` and
//!   `testing`, unbiased random traffic splitting under `ab_testing`.
//! - **Outcome Log**: every prediction logged with later-attachable ground
//!   truth feedback.
//! - **A/B Arbitration**: accuracy-based winner promotion with a stable
//!   tie-break.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Arbiter                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Access Layer: REST Gateway | Service Facade                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Core: Router | Status Ledger | A/B Test Coordinator        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Evidence: Variant Registry | Outcome Log                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Datastore: transactional in-memory tables                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use arbiter::config::ArbiterConfig;
//!
//! #[tokio::main]
//! async fn main() -> arbiter::Result<()> {
//!     // Use development configuration
//!     let config = ArbiterConfig::development();
//!
//!     // Start the arbiter server
//!     arbiter::run(config).await
//! }
//! ```

pub mod config;
pub mod error;
pub mod types;

pub mod abtest;
pub mod gateway;
pub mod ledger;
pub mod observability;
pub mod outcome;
pub mod predict;
pub mod registry;
pub mod router;
pub mod service;
pub mod store;

// Re-exports
pub use error::{ArbiterError, Result};
pub use types::*;

use config::ArbiterConfig;
use predict::{PredictorSetBuilder, ThresholdClassifier};
use registry::{VariantRegistry, VariantSpec};
use router::ThreadRngSource;
use service::ArbiterService;
use store::MemoryStore;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Register the reference income models, as a deployment's startup hook
/// would register its own. The predictor set is frozen once this returns.
async fn seed_reference_models(
    registry: &VariantRegistry,
    builder: &mut PredictorSetBuilder,
    owner: &str,
) -> Result<()> {
    registry
        .register(
            VariantSpec {
                endpoint: "income".to_string(),
                name: "threshold baseline".to_string(),
                version: "0.1.0".to_string(),
                owner: owner.to_string(),
                description: "Linear threshold scorer with census fill defaults".to_string(),
                source_ref: "arbiter::predict::threshold::income_baseline".to_string(),
                status: StatusTag::Production,
            },
            Arc::new(ThresholdClassifier::income_baseline()),
            builder,
        )
        .await?;

    registry
        .register(
            VariantSpec {
                endpoint: "income".to_string(),
                name: "threshold tuned".to_string(),
                version: "0.1.0".to_string(),
                owner: owner.to_string(),
                description: "Retuned threshold scorer with heavier education weight".to_string(),
                source_ref: "arbiter::predict::threshold::income_tuned".to_string(),
                status: StatusTag::Testing,
            },
            Arc::new(ThresholdClassifier::income_tuned()),
            builder,
        )
        .await?;

    Ok(())
}

/// Run the arbiter server with the given configuration.
pub async fn run(config: ArbiterConfig) -> Result<()> {
    info!("Starting arbiter node: {}", config.node.name);

    // Initialize observability
    observability::init(&config.observability)?;

    // Assemble the shared store and load the model variants. The predictor
    // set is immutable from here on; adding models requires a restart.
    let store = Arc::new(MemoryStore::new());
    let registry = VariantRegistry::new(store.clone());
    let mut builder = PredictorSetBuilder::new();
    seed_reference_models(&registry, &mut builder, &config.node.name).await?;

    let service = Arc::new(ArbiterService::new(
        store,
        Arc::new(builder.build()),
        Arc::new(ThreadRngSource),
    ));

    let mut handles = Vec::new();

    if config.gateway.enabled {
        info!("Starting gateway on {}", config.gateway.bind_addr);
        let gateway_config = config.gateway.clone();
        let gateway_service = service.clone();

        let handle = tokio::spawn(async move {
            if let Err(e) = gateway::run_gateway(gateway_config, gateway_service).await {
                error!("Gateway error: {}", e);
            }
        });
        handles.push(("gateway", handle));
    }

    if config.observability.metrics_enabled {
        info!("Starting metrics server on {}", config.observability.metrics_addr);
        let obs_config = config.observability.clone();

        let handle = tokio::spawn(async move {
            if let Err(e) = observability::run_metrics_server(obs_config).await {
                error!("Metrics server error: {}", e);
            }
        });
        handles.push(("metrics", handle));
    }

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutting down arbiter gracefully...");

    for (name, handle) in handles {
        if !handle.is_finished() {
            warn!(service = %name, "Force aborting service");
            handle.abort();
        }
    }

    info!("Arbiter shutdown complete");
    Ok(())
}
