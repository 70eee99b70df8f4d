//! Demo binary: wires echo backends into the full engine and runs one
//! routed request plus both workflow shapes, logging each stage.
//!
//! Run with `RUST_LOG=info cargo run`. Set `LOG_FORMAT=json` for
//! structured output.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::sync::Arc;

use tracing::info;

use model_orchestra::backend::{BackendRegistry, EchoBackend};
use model_orchestra::routing::{Router, RoutingConfig};
use model_orchestra::workflow::{WorkflowConfig, WorkflowEngine};
use model_orchestra::{init_tracing, OrchestraError, RequestContext};

#[tokio::main]
async fn main() -> Result<(), OrchestraError> {
    init_tracing()?;

    let config = RoutingConfig::default();

    // Register an echo adapter for every backend the routing table names,
    // so the demo runs without any API keys.
    let mut registry = BackendRegistry::new();
    for entry in config.table.values() {
        registry.register(entry.primary.clone(), Arc::new(EchoBackend::with_delay(25)));
        registry.register(entry.fallback.clone(), Arc::new(EchoBackend::with_delay(25)));
    }
    registry.register(
        config.strong_backend.clone(),
        Arc::new(EchoBackend::with_delay(25)),
    );
    info!(backends = ?registry.names(), "registry ready");

    let router = Arc::new(Router::new(Arc::new(registry), config)?);
    let engine = WorkflowEngine::new(Arc::clone(&router), WorkflowConfig::default());

    // Single routed request.
    let context = RequestContext::new();
    let result = router
        .route("research", "Summarise the tradeoffs of async runtimes", &context)
        .await?;
    info!(
        backend = %result.backend_used.as_deref().unwrap_or("none"),
        confidence = result.confidence_or_zero(),
        success = result.success,
        "routed request finished"
    );

    // Linear workflow: research, plan, build.
    let mut params = RequestContext::new();
    params.insert(
        "seed".to_string(),
        serde_json::json!("a rate limiter for outbound HTTP calls"),
    );
    let record = engine.start("linear", &params).await?;
    info!(
        workflow = %record.id,
        status = ?record.status,
        steps = record.steps.len(),
        "linear workflow finished"
    );

    // Bounded-retry workflow: test and fix until it passes or the budget
    // runs out.
    let mut params = RequestContext::new();
    params.insert(
        "artifact".to_string(),
        serde_json::json!("fn add(a: u32, b: u32) -> u32 { a + b }"),
    );
    let record = engine.start("bounded_retry", &params).await?;
    info!(
        workflow = %record.id,
        status = ?record.status,
        steps = record.steps.len(),
        "bounded-retry workflow finished"
    );

    for record in engine.list() {
        info!(workflow = %record.id, kind = %record.kind, status = ?record.status, "retained");
    }

    Ok(())
}
