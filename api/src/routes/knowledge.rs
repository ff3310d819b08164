//! DOC ingestion endpoint: walk a server-local tree for markdown and store
//! it in the knowledge base. Never part of the review hot path.

use std::sync::Arc;

use axum::{Json, extract::State, http::HeaderMap};
use review_store::knowledge::{KnowledgeUpsert, UpsertOutcome};
use review_store::KnowledgeType;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::app_state::AppState;
use crate::error_handler::{AppError, AppResult};
use crate::routes::auth::authorize;

#[derive(Deserialize)]
pub struct IngestDocsRequest {
    /// Server-local directory to walk.
    pub path: String,
}

#[derive(Serialize)]
pub struct IngestDocsBody {
    pub ingested: usize,
    pub updated: usize,
    pub unchanged: usize,
}

/// `POST /knowledge/ingest-docs`
pub async fn ingest_docs_route(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<IngestDocsRequest>,
) -> AppResult<Json<IngestDocsBody>> {
    let tenant = authorize(&state, &headers).await?;

    let docs = precedent_index::walk_docs(std::path::Path::new(&req.path))
        .map_err(|e| AppError::BadRequest(format!("doc walk failed: {e}")))?;

    let mut body = IngestDocsBody {
        ingested: 0,
        updated: 0,
        unchanged: 0,
    };
    for doc in docs {
        let (_, outcome) = state
            .store
            .upsert_knowledge_source(
                &tenant.id,
                &KnowledgeUpsert {
                    source_type: KnowledgeType::Doc,
                    provider: "filesystem".into(),
                    provider_id: doc.rel_path.clone(),
                    title: doc.title.clone(),
                    source_url: None,
                    content_text: doc.content_text.clone(),
                    content_hash: doc.content_hash.clone(),
                    metadata: None,
                    feature_tokens: doc.signature.tokens.clone(),
                },
            )
            .await?;
        match outcome {
            UpsertOutcome::Inserted => body.ingested += 1,
            UpsertOutcome::Updated => body.updated += 1,
            UpsertOutcome::Unchanged => body.unchanged += 1,
        }
    }

    info!(
        tenant = %tenant.slug,
        ingested = body.ingested,
        updated = body.updated,
        unchanged = body.unchanged,
        "doc ingest finished"
    );
    state.activity.record(
        "docs_ingested",
        Some(&tenant.slug),
        format!(
            "{} new / {} updated / {} unchanged",
            body.ingested, body.updated, body.unchanged
        ),
    );
    Ok(Json(body))
}
