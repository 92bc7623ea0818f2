//! API layer - state, routes and handlers
//!
//! Every resource in `facilities::RESOURCES` is served by the same generic
//! handlers. Routes are registered with and without the trailing slash.

pub mod extractors;
pub mod handlers;
pub mod pagination;

use axum::{
    routing::{get, MethodRouter},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::i18n::MessageRegistry;
use crate::upsert::{RecordStore, UpsertEngine};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<MessageRegistry>,
    pub engine: UpsertEngine,
}

impl AppState {
    pub fn new(config: Config, registry: MessageRegistry, store: Arc<dyn RecordStore>) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            engine: UpsertEngine::new(store),
        }
    }
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    use handlers::*;

    let collection = || -> MethodRouter<AppState> { get(list_records).post(create_record) };
    let member = || -> MethodRouter<AppState> {
        get(retrieve_record)
            .put(update_record)
            .patch(partial_update_record)
            .delete(destroy_record)
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/:resource", collection())
        .route("/:resource/", collection())
        .route("/:resource/:id", member())
        .route("/:resource/:id/", member())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
