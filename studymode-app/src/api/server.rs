use axum::{routing::{get, post}, Router};
use std::{net::SocketAddr, sync::Arc};
use studymode_core::CardStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::routes::*;

pub fn router(store: Arc<dyn CardStore>) -> Router {
    let state = Arc::new(AppState { store });

    Router::new()
        .route("/cards", get(list_cards).post(add_card).delete(clear_cards))
        .route("/cards/bulk", post(bulk_add))
        .route("/cards/generated", post(add_generated))
        .route("/cards/due", get(due_cards))
        .route("/cards/:id", get(get_card))
        .route("/cards/:id/review", post(review_card))
        .route("/stats", get(deck_stats))
        .route("/export", get(export_deck))
        .route("/import", post(import_deck))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn run(store: Arc<dyn CardStore>, addr: SocketAddr) -> anyhow::Result<()> {
    let app = router(store);
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "api listening");
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
