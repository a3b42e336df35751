//! Intent handlers. Each one gathers catalog facts, mutates the session
//! state, then asks the completion backend to phrase the reply around a
//! structured data payload.

use anyhow::Result;
use rand::seq::SliceRandom;
use serde_json::{json, Value};
use vietgo_completion::CompletionService;
use vietgo_core::{
    find_tours_by_activity, fold_diacritics, parse_price_bound, question_focus, ConversationState,
    LocationMatch, PriceOrder, ResponseEnvelope, RouteKey, Topic, TourHit, TourRecord, TourView,
    VnRegion,
};
use vietgo_retrieval::RetrievalService;
use vietgo_storage::SessionRepository;

use crate::{prompt, TourConciergeAgent};

/// Interest cues scanned in retrieval fallbacks; a hit narrows the reply
/// to one tour and is remembered on the session.
const INTEREST_KEYWORDS: &[&str] = &[
    "ẩm thực",
    "giải trí",
    "nghỉ dưỡng",
    "khám phá",
    "văn hóa",
    "tham quan",
    "phiêu lưu",
    "hoạt động",
    "lịch sử",
    "ăn uống",
    "đi chơi",
    "tắm biển",
    "leo núi",
    "cắm trại",
    "check-in",
    "chụp ảnh",
    "mua sắm",
    "spa",
    "massage",
    "thể thao",
    "hải sản",
    "món ngon",
    "đặc sản",
];

/// Follow-up phrasings that actually mean "show me something else".
const PIVOT_CUES: &[&str] = &["tour khac", "con tour nao", "tour moi"];

fn specific_data(tour: &TourRecord, focus: Topic) -> Value {
    match focus {
        Topic::Price => json!({
            "focus": "price", "value": tour.price, "tourTitle": tour.title,
        }),
        Topic::Duration => json!({
            "focus": "duration", "value": tour.duration, "tourTitle": tour.title,
        }),
        Topic::MaxParticipants => json!({
            "focus": "maxParticipants", "value": tour.max_participants, "tourTitle": tour.title,
        }),
        Topic::Description => json!({
            "focus": "description", "value": tour.description,
            "destination": tour.destination, "tourTitle": tour.title,
        }),
        _ => json!({ "focus": focus.as_key(), "tour": TourView::from(tour) }),
    }
}

fn focus_data(tour: &TourRecord, focus: Topic) -> Value {
    match focus {
        Topic::Price => json!({ "focus": "price", "price": tour.price, "tourTitle": tour.title }),
        Topic::Duration => json!({
            "focus": "duration", "duration": tour.duration, "tourTitle": tour.title,
        }),
        Topic::Description => json!({
            "focus": "description", "description": tour.description, "tourTitle": tour.title,
        }),
        Topic::MaxParticipants => json!({
            "focus": "maxParticipants", "maxParticipants": tour.max_participants,
            "tourTitle": tour.title,
        }),
        _ => json!({ "focus": focus.as_key(), "tour": TourView::from(tour) }),
    }
}

impl<S, C, R> TourConciergeAgent<S, C, R>
where
    S: SessionRepository,
    C: CompletionService,
    R: RetrievalService,
{
    /// Runs the completion backend and wraps the outcome: a generated
    /// message becomes a success envelope carrying `data`, a backend
    /// failure becomes an error envelope instead of propagating.
    async fn respond(&self, prompt: &str, data: Value) -> Result<ResponseEnvelope> {
        self.metrics.inc_completion_call();
        match self.completion.complete(prompt).await {
            Ok(message) => Ok(ResponseEnvelope::success(message, data)),
            Err(err) => Ok(ResponseEnvelope::error(format!(
                "Lỗi khi gọi model AI: {err}"
            ))),
        }
    }

    pub(crate) async fn handle_specific_tour(
        &self,
        query: &str,
        tour: &TourRecord,
        state: &mut ConversationState,
    ) -> Result<ResponseEnvelope> {
        let focus = question_focus(query);
        state.set_current_tour(tour, focus);
        state.query_counter += 1;

        let data = specific_data(tour, focus);
        let prompt = prompt::specific_tour(query, tour, focus);
        self.respond(&prompt, data).await
    }

    pub(crate) async fn handle_route(
        &self,
        query: &str,
        route: &RouteKey,
        state: &mut ConversationState,
    ) -> Result<ResponseEnvelope> {
        let tours: Vec<TourRecord> = self
            .catalog
            .by_route(route)
            .into_iter()
            .take(2)
            .cloned()
            .collect();
        if tours.is_empty() {
            // A known route with no inventory invalidates the tracked tour.
            state.current_tour = None;
            state.last_tour_code = None;
            state.current_topic = None;
            return Ok(ResponseEnvelope::warning(format!(
                "Không tìm thấy tour nào đi tuyến {}.",
                route.display()
            )));
        }
        if let [only] = tours.as_slice() {
            state.set_current_tour(only, Topic::Route);
        }

        let views: Vec<TourView> = tours.iter().map(TourView::from).collect();
        let data = json!({
            "route": route.display(),
            "departure": route.departure,
            "destination": route.destination,
            "tours": views,
        });
        let prompt = prompt::route_overview(query, &route.display(), &views);
        self.respond(&prompt, data).await
    }

    /// Catalog overview: two routes sampled at random, up to two tours each.
    /// An explicit price bracket turns the overview into a filtered listing.
    pub(crate) async fn handle_general(
        &self,
        query: &str,
        state: &mut ConversationState,
    ) -> Result<ResponseEnvelope> {
        if let Some(bound) = parse_price_bound(query) {
            let tours: Vec<TourRecord> = self
                .catalog
                .all()
                .iter()
                .filter(|tour| bound.accepts(tour.price_value()))
                .take(3)
                .cloned()
                .collect();
            if tours.is_empty() {
                return Ok(ResponseEnvelope::warning(
                    "Không tìm thấy tour nào trong khoảng giá bạn yêu cầu.",
                ));
            }
            return self.handle_tour_list(query, &tours, state).await;
        }

        let picked: Vec<RouteKey> = {
            let mut rng = rand::thread_rng();
            self.catalog
                .supported_routes()
                .choose_multiple(&mut rng, 2)
                .cloned()
                .collect()
        };

        let mut groups: Vec<(String, Vec<TourView>)> = Vec::new();
        let mut flat: Vec<TourView> = Vec::new();
        for route in &picked {
            let views: Vec<TourView> = self
                .catalog
                .by_route(route)
                .into_iter()
                .take(2)
                .map(TourView::from)
                .collect();
            if views.is_empty() {
                continue;
            }
            flat.extend(views.iter().cloned());
            groups.push((
                format!(
                    "🌟 Tour từ {} đến {}:",
                    route.departure, route.destination
                ),
                views,
            ));
        }
        if groups.is_empty() {
            return Ok(ResponseEnvelope::warning(
                "Hiện tại không có tour nào để giới thiệu.",
            ));
        }

        let data = json!({ "tours": flat });
        let prompt = prompt::grouped_overview(query, &groups);
        self.respond(&prompt, data).await
    }

    pub(crate) async fn handle_region(
        &self,
        query: &str,
        state: &mut ConversationState,
    ) -> Result<ResponseEnvelope> {
        let folded = fold_diacritics(query);
        let Some(region) = VnRegion::from_query(&folded) else {
            return Ok(ResponseEnvelope::warning(
                "Không xác định được miền bạn muốn du lịch. \
                 Vui lòng nêu rõ miền Bắc, miền Trung hay miền Nam.",
            ));
        };

        // One tour per destination, at most two destinations in the region.
        let mut groups: Vec<(String, Vec<TourView>)> = Vec::new();
        let mut flat: Vec<TourView> = Vec::new();
        let mut seen: Vec<String> = Vec::new();
        for route in self.catalog.supported_routes() {
            if VnRegion::of_destination(&route.destination) != Some(region) {
                continue;
            }
            let key = route.destination.to_lowercase();
            if seen.contains(&key) {
                continue;
            }
            let Some(tour) = self.catalog.by_route(route).into_iter().next() else {
                continue;
            };
            seen.push(key);
            let view = TourView::from(tour);
            flat.push(view.clone());
            groups.push((format!("📍 {}:", route.destination), vec![view]));
            if groups.len() == 2 {
                break;
            }
        }
        if groups.is_empty() {
            return Ok(ResponseEnvelope::warning(format!(
                "Hiện tại không có thông tin về tour du lịch ở {}.",
                region.display()
            )));
        }

        state.last_region = Some(region);
        let data = json!({ "region": region.display(), "tours": flat });
        let prompt = prompt::grouped_overview(query, &groups);
        self.respond(&prompt, data).await
    }

    pub(crate) async fn handle_single_location(
        &self,
        query: &str,
        found: &LocationMatch,
        state: &mut ConversationState,
    ) -> Result<ResponseEnvelope> {
        let wanted = fold_diacritics(&found.location);
        let mut routes: Vec<&RouteKey> = self
            .catalog
            .supported_routes()
            .iter()
            .filter(|route| {
                if found.is_departure {
                    fold_diacritics(&route.departure) == wanted
                } else {
                    fold_diacritics(&route.destination) == wanted
                }
            })
            .collect();
        if routes.is_empty() {
            // The place may sit on the other side of its routes.
            routes = self
                .catalog
                .supported_routes()
                .iter()
                .filter(|route| {
                    fold_diacritics(&route.destination) == wanted
                        || fold_diacritics(&route.departure) == wanted
                })
                .collect();
        }

        let mut tours: Vec<TourRecord> = Vec::new();
        for route in routes {
            for tour in self.catalog.by_route(route) {
                if !tours.iter().any(|seen| seen.code == tour.code) {
                    tours.push(tour.clone());
                }
            }
        }
        tours.truncate(2);
        if tours.is_empty() {
            return Ok(ResponseEnvelope::warning(format!(
                "Không tìm thấy tour nào liên quan đến {}.",
                found.location
            )));
        }
        if let [only] = tours.as_slice() {
            state.set_current_tour(only, Topic::Destination);
        }

        let views: Vec<TourView> = tours.iter().map(TourView::from).collect();
        let data = json!({
            "destination": found.location,
            "isDeparture": found.is_departure,
            "tours": views,
        });
        let prompt = prompt::tour_list(query, &views);
        self.respond(&prompt, data).await
    }

    pub(crate) async fn handle_price(
        &self,
        query: &str,
        order: PriceOrder,
        route: Option<RouteKey>,
        state: &mut ConversationState,
    ) -> Result<ResponseEnvelope> {
        let mut tours = self.catalog.sorted_by_price(order, route.as_ref());
        if tours.is_empty() && route.is_some() {
            // No inventory on the mentioned route; widen to the whole catalog.
            tours = self.catalog.sorted_by_price(order, None);
        }
        if let Some(bound) = parse_price_bound(query) {
            tours.retain(|tour| bound.accepts(tour.price_value()));
        }
        let cheapest = matches!(order, PriceOrder::Ascending);
        let label = if cheapest { "rẻ nhất" } else { "đắt nhất" };
        let Some(tour) = tours.first().map(|tour| (*tour).clone()) else {
            return Ok(ResponseEnvelope::warning(format!(
                "Không tìm thấy tour nào phù hợp với yêu cầu tìm tour {label}."
            )));
        };

        state.set_current_tour(&tour, Topic::Price);
        let view = TourView::from(&tour);
        let mut data = json!({
            "priceType": if cheapest { "min" } else { "max" },
            "tours": [view.clone()],
        });
        if let Some(route) = &route {
            data["route"] = json!(route.display());
        }
        let prompt = prompt::price_pick(query, &view, cheapest);
        self.respond(&prompt, data).await
    }

    pub(crate) async fn handle_follow_up(
        &self,
        query: &str,
        state: &mut ConversationState,
    ) -> Result<ResponseEnvelope> {
        let folded = fold_diacritics(query);
        if PIVOT_CUES.iter().any(|cue| folded.contains(cue)) {
            return self.handle_general(query, state).await;
        }

        let code = state
            .current_tour
            .clone()
            .or_else(|| state.last_tour_code.clone());
        let tour = code
            .as_deref()
            .and_then(|code| self.catalog.by_code(code))
            .cloned();
        let Some(tour) = tour else {
            // The tracked tour has left the catalog; start over.
            return self.handle_search(query, state).await;
        };

        let focus = question_focus(query);
        state.current_topic = Some(focus);
        state.query_counter += 1;

        let data = focus_data(&tour, focus);
        let prompt = prompt::follow_up(query, &tour, focus);
        self.respond(&prompt, data).await
    }

    pub(crate) async fn handle_activity(
        &self,
        query: &str,
        state: &mut ConversationState,
    ) -> Result<ResponseEnvelope> {
        let tours: Vec<TourRecord> = find_tours_by_activity(query, &self.catalog)
            .into_iter()
            .cloned()
            .collect();
        if tours.is_empty() {
            return Ok(ResponseEnvelope::warning(
                "Xin lỗi, không tìm thấy tour nào có hoạt động phù hợp với yêu cầu của bạn.",
            ));
        }
        self.handle_tour_list(query, &tours, state).await
    }

    pub(crate) async fn handle_tour_list(
        &self,
        query: &str,
        tours: &[TourRecord],
        state: &mut ConversationState,
    ) -> Result<ResponseEnvelope> {
        if let [only] = tours {
            return self.handle_specific_tour(query, only, state).await;
        }

        let views: Vec<TourView> = tours.iter().map(TourView::from).collect();
        let data = json!({ "tours": views });
        let prompt = prompt::tour_list(query, &views);
        self.respond(&prompt, data).await
    }

    pub(crate) async fn handle_retrieval_fallback(
        &self,
        query: &str,
        hits: &[TourHit],
        state: &mut ConversationState,
    ) -> Result<ResponseEnvelope> {
        if hits.is_empty() {
            return Ok(ResponseEnvelope::warning(
                "Không tìm thấy tour phù hợp với yêu cầu của bạn.",
            ));
        }

        // A named destination must actually appear among the hits,
        // otherwise the retriever drifted and the reply would mislead.
        let folded = fold_diacritics(query);
        let mentioned = self
            .catalog
            .all()
            .iter()
            .map(|tour| tour.destination.clone())
            .find(|dest| folded.contains(&fold_diacritics(dest)));
        if let Some(dest) = mentioned {
            let wanted = fold_diacritics(&dest);
            let covered = hits.iter().any(|hit| {
                fold_diacritics(&hit.record.destination) == wanted
                    || hit
                        .record
                        .departure
                        .as_deref()
                        .is_some_and(|dep| fold_diacritics(dep) == wanted)
            });
            if !covered {
                return Ok(ResponseEnvelope::warning(format!(
                    "Không tìm thấy tour nào tại {dest} phù hợp với yêu cầu của bạn."
                )));
            }
        }

        let lower = query.to_lowercase();
        if let Some(interest) = INTEREST_KEYWORDS.iter().copied().find(|kw| lower.contains(kw)) {
            let tour = hits[0].record.clone();
            state.set_current_tour(&tour, Topic::Interest);
            if !state.user_interests.iter().any(|seen| seen.as_str() == interest) {
                state.user_interests.push(interest.to_string());
            }

            let views = vec![TourView::from(&tour)];
            let data = json!({ "tours": views });
            let prompt = prompt::interest_pick(query, &tour);
            return self.respond(&prompt, data).await;
        }

        if let [only] = hits {
            state.set_current_tour(&only.record, Topic::All);
        }
        let views: Vec<TourView> = hits.iter().map(|hit| TourView::from(&hit.record)).collect();
        let data = json!({ "tours": views });
        let prompt = prompt::tour_list(query, &views);
        self.respond(&prompt, data).await
    }
}
