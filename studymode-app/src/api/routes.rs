use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use studymode_core::{
    export_records, import_records, stats, Card, CardId, CardStore, ExportRecord, ImportSummary,
};
use studymode_ingest::parse_generated;

use crate::api::dto::{AddedOut, BulkIn, CardIn, DueQuery, GeneratedIn, ReviewIn, StatsOut};
use crate::api::error::ApiResult;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CardStore>,
}

pub async fn list_cards(State(st): State<Arc<AppState>>) -> ApiResult<Json<Vec<Card>>> {
    Ok(Json(st.store.list_cards().await?))
}

pub async fn add_card(State(st): State<Arc<AppState>>, Json(body): Json<CardIn>)
    -> ApiResult<(StatusCode, Json<Card>)>
{
    let card = st.store.add_card(&body.question, &body.answer, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(card)))
}

pub async fn bulk_add(State(st): State<Arc<AppState>>, Json(body): Json<BulkIn>) -> ApiResult<Json<AddedOut>> {
    let submitted = body.pairs.len();
    let pairs: Vec<(String, String)> = body
        .pairs
        .into_iter()
        .filter(|p| !p.q.trim().is_empty() && !p.a.trim().is_empty())
        .map(|p| (p.q, p.a))
        .collect();
    let added = st.store.bulk_add(&pairs, Utc::now()).await?;
    Ok(Json(AddedOut::new(added, pairs.len(), submitted - pairs.len())))
}

pub async fn add_generated(State(st): State<Arc<AppState>>, Json(body): Json<GeneratedIn>)
    -> ApiResult<Json<AddedOut>>
{
    let parsed = parse_generated(&body.text)?;
    let added = st.store.bulk_add(&parsed.pairs, Utc::now()).await?;
    Ok(Json(AddedOut::new(added, parsed.pairs.len(), parsed.dropped)))
}

pub async fn get_card(State(st): State<Arc<AppState>>, Path(id): Path<CardId>) -> ApiResult<Json<Card>> {
    Ok(Json(st.store.get_card(id).await?))
}

pub async fn due_cards(State(st): State<Arc<AppState>>, Query(q): Query<DueQuery>) -> ApiResult<Json<Vec<Card>>> {
    let as_of = q.as_of.unwrap_or_else(Utc::now);
    Ok(Json(st.store.due_cards(as_of, q.limit).await?))
}

pub async fn review_card(
    State(st): State<Arc<AppState>>,
    Path(id): Path<CardId>,
    Json(body): Json<ReviewIn>,
) -> ApiResult<Json<Card>> {
    let as_of = body.as_of.unwrap_or_else(Utc::now);
    Ok(Json(st.store.review_card(id, body.quality, as_of).await?))
}

pub async fn deck_stats(State(st): State<Arc<AppState>>) -> ApiResult<Json<StatsOut>> {
    let cards = st.store.list_cards().await?;
    let stats = stats::summarize(&cards, Utc::now());
    let quiz_difficulty = stats.quiz_difficulty();
    Ok(Json(StatsOut { stats, quiz_difficulty }))
}

pub async fn export_deck(State(st): State<Arc<AppState>>) -> ApiResult<Json<Vec<ExportRecord>>> {
    Ok(Json(export_records(&*st.store).await?))
}

pub async fn import_deck(State(st): State<Arc<AppState>>, Json(records): Json<Vec<ExportRecord>>)
    -> ApiResult<Json<ImportSummary>>
{
    Ok(Json(import_records(&*st.store, &records, Utc::now()).await?))
}

pub async fn clear_cards(State(st): State<Arc<AppState>>) -> ApiResult<StatusCode> {
    st.store.clear().await?;
    Ok(StatusCode::NO_CONTENT)
}
