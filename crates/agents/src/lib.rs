//! Conversational agent for the tour concierge. Owns the query loop:
//! classify the incoming text against the session state, run the matching
//! handler, persist the updated session and hand back a uniform envelope.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::{Duration, Utc};
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;
use vietgo_completion::CompletionService;
use vietgo_core::{
    classify, find_tour_by_similar_name, find_tour_by_title, find_tours_by_activity, match_route,
    match_single_location, normalize_text, price_comparison, ChatInput, ConversationSession,
    ConversationState, Intent, ResponseEnvelope, TourCatalog, TourHit,
};
use vietgo_observability::AppMetrics;
use vietgo_retrieval::RetrievalService;
use vietgo_storage::SessionRepository;

mod handlers;
mod prompt;

/// Session lifetime extension applied on every turn.
const SESSION_TTL_HOURS: i64 = 24;

/// Keyword cues that send a free-form search to the catalog overview
/// handler instead of the retrieval fallback.
const GENERAL_LIST_CUES: &[&str] = &[
    "tour hiện tại",
    "tour nào",
    "các tour",
    "tour du lịch",
    "danh sách tour",
    "giới thiệu tour",
    "tour phổ biến",
];

pub struct TourConciergeAgent<S, C, R>
where
    S: SessionRepository,
    C: CompletionService,
    R: RetrievalService,
{
    catalog: Arc<TourCatalog>,
    retriever: Arc<R>,
    completion: Arc<C>,
    store: Arc<S>,
    metrics: Arc<AppMetrics>,
}

impl<S, C, R> TourConciergeAgent<S, C, R>
where
    S: SessionRepository,
    C: CompletionService,
    R: RetrievalService,
{
    pub fn new(
        catalog: Arc<TourCatalog>,
        retriever: Arc<R>,
        completion: Arc<C>,
        store: Arc<S>,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        Self {
            catalog,
            retriever,
            completion,
            store,
            metrics,
        }
    }

    pub fn catalog(&self) -> &TourCatalog {
        &self.catalog
    }

    #[instrument(skip(self, input))]
    pub async fn handle_query(&self, input: ChatInput) -> Result<ResponseEnvelope> {
        let started = Instant::now();
        self.metrics.inc_request();

        let query = normalize_text(&input.text);
        let session_id = input
            .session_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut session = self
            .store
            .load_session(&session_id)
            .await?
            .unwrap_or_else(|| ConversationSession {
                session_id: session_id.clone(),
                state: ConversationState::default(),
                expires_at: Utc::now() + Duration::hours(SESSION_TTL_HOURS),
            });

        let intent = classify(&query, &session.state, &self.catalog);
        let mut reply = self.dispatch(&query, intent, &mut session.state).await?;

        session.expires_at = Utc::now() + Duration::hours(SESSION_TTL_HOURS);
        self.store.upsert_session(&session).await?;

        if let Some(data) = reply.data.as_mut().and_then(|value| value.as_object_mut()) {
            data.insert("session_id".to_string(), json!(session_id));
        }

        self.metrics.observe_latency(started.elapsed());
        info!(
            session_id = %session_id,
            intent = ?intent,
            status = ?reply.status,
            "query handled"
        );
        Ok(reply)
    }

    pub async fn search_tours(&self, query: &str, limit: usize) -> Result<Vec<TourHit>> {
        self.retriever.search(query, limit).await
    }

    pub async fn purge_expired_sessions(&self) -> Result<u64> {
        self.store.purge_expired(Utc::now()).await
    }

    async fn dispatch(
        &self,
        query: &str,
        intent: Intent,
        state: &mut ConversationState,
    ) -> Result<ResponseEnvelope> {
        match intent {
            Intent::Empty => Ok(ResponseEnvelope::error("Vui lòng nhập câu hỏi hợp lệ!")),
            Intent::NonTour => Ok(ResponseEnvelope::error(
                "Câu hỏi không liên quan đến tour. Vui lòng hỏi về các tour hoặc điểm đến.",
            )),
            Intent::Region => self.handle_region(query, state).await,
            Intent::GeneralTour => self.handle_general(query, state).await,
            Intent::Activity => self.handle_activity(query, state).await,
            Intent::FollowUp => self.handle_follow_up(query, state).await,
            Intent::SingleDestination | Intent::SingleDeparture => {
                match match_single_location(query, &self.catalog) {
                    Some(found) => self.handle_single_location(query, &found, state).await,
                    None => self.handle_search(query, state).await,
                }
            }
            Intent::NewTour => {
                // A pivot to a new search abandons the tracked tour.
                state.reset();
                match match_route(query, &self.catalog) {
                    Some(matched) => self.handle_route(query, &matched.route, state).await,
                    None => Ok(ResponseEnvelope::warning(
                        "Xin lỗi, không tìm thấy thông tin tour phù hợp với yêu cầu của bạn.",
                    )),
                }
            }
            Intent::PriceQuery => match price_comparison(query) {
                Some(order) => {
                    let route = match_route(query, &self.catalog)
                        .map(|matched| matched.route)
                        .filter(|route| self.catalog.is_supported_route(route));
                    self.handle_price(query, order, route, state).await
                }
                None => self.handle_search(query, state).await,
            },
            Intent::SpecificTour | Intent::Search => self.handle_search(query, state).await,
        }
    }

    /// Free-form search cascade: named tour, single location, route,
    /// activity keywords, catalog overview, then semantic retrieval.
    async fn handle_search(
        &self,
        query: &str,
        state: &mut ConversationState,
    ) -> Result<ResponseEnvelope> {
        if let Some(tour) = find_tour_by_similar_name(query, &self.catalog) {
            let tour = tour.clone();
            return self.handle_specific_tour(query, &tour, state).await;
        }
        if let Some(tour) = find_tour_by_title(query, &self.catalog) {
            let tour = tour.clone();
            return self.handle_specific_tour(query, &tour, state).await;
        }
        if let Some(found) = match_single_location(query, &self.catalog) {
            return self.handle_single_location(query, &found, state).await;
        }
        if let Some(matched) = match_route(query, &self.catalog) {
            if !self.catalog.is_supported_route(&matched.route) {
                return Ok(ResponseEnvelope::warning(format!(
                    "Xin lỗi, hiện tại không có thông tin về tour tuyến {}.",
                    matched.route.display()
                )));
            }
            return self.handle_route(query, &matched.route, state).await;
        }

        let by_activity: Vec<_> = find_tours_by_activity(query, &self.catalog)
            .into_iter()
            .cloned()
            .collect();
        if !by_activity.is_empty() {
            return self.handle_tour_list(query, &by_activity, state).await;
        }

        let lower = query.to_lowercase();
        if GENERAL_LIST_CUES.iter().any(|cue| lower.contains(cue)) {
            return self.handle_general(query, state).await;
        }

        let hits = self.retriever.search(query, 3).await?;
        self.metrics.add_retrieval_hits(hits.len());
        self.metrics.inc_fallback();
        self.handle_retrieval_fallback(query, &hits, state).await
    }
}
