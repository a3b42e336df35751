use std::sync::Arc;

use vietgo_agents::TourConciergeAgent;
use vietgo_completion::TemplateCompletion;
use vietgo_core::{ChatInput, ResponseEnvelope, ResponseStatus, TourCatalog, TourRecord};
use vietgo_observability::AppMetrics;
use vietgo_retrieval::{EmbeddingModel, HashEmbeddingModel, TourIndex};
use vietgo_storage::{MemoryStore, SessionRepository};

type Agent = TourConciergeAgent<MemoryStore, TemplateCompletion, TourIndex>;

fn record(
    code: &str,
    title: &str,
    description: &str,
    departure: &str,
    destination: &str,
    price: &str,
    duration: &str,
) -> TourRecord {
    TourRecord {
        code: code.into(),
        title: title.into(),
        description: description.into(),
        destination: destination.into(),
        departure: Some(departure.into()),
        price: price.into(),
        duration: duration.into(),
        max_participants: 20,
    }
}

fn sample_tours() -> Vec<TourRecord> {
    vec![
        record(
            "T1",
            "Tour Đà Nẵng 3 ngày",
            "Tham quan Bà Nà Hills và Cầu Rồng",
            "Hà Nội",
            "Đà Nẵng",
            "3.000.000 Đồng",
            "3 Ngày",
        ),
        record(
            "T2",
            "Tour Hội An khám phá",
            "Dạo phố cổ và thả đèn hoa đăng",
            "Đà Nẵng",
            "Hội An",
            "1.000.000 Đồng",
            "2 Ngày",
        ),
        record(
            "T3",
            "Tour Hội An cao cấp",
            "Nghỉ dưỡng resort ven sông",
            "Đà Nẵng",
            "Hội An",
            "5.000.000 Đồng",
            "3 Ngày",
        ),
        record(
            "T4",
            "Tour Vũng Tàu hải sản",
            "Thưởng thức hải sản tươi và ẩm thực địa phương",
            "Sài Gòn",
            "Vũng Tàu",
            "2.000.000 Đồng",
            "2 Ngày",
        ),
    ]
}

fn build_agent(records: Vec<TourRecord>) -> (Agent, Arc<MemoryStore>, Arc<AppMetrics>) {
    let catalog = Arc::new(TourCatalog::from_records(records.clone()));
    let embedder: Arc<dyn EmbeddingModel> = Arc::new(HashEmbeddingModel::default());
    let index = Arc::new(TourIndex::from_records(records, Some(embedder)));
    let store = Arc::new(MemoryStore::new());
    let metrics = AppMetrics::shared();

    let agent = TourConciergeAgent::new(
        catalog,
        index,
        Arc::new(TemplateCompletion),
        store.clone(),
        metrics.clone(),
    );
    (agent, store, metrics)
}

async fn ask(agent: &Agent, session: &str, text: &str) -> ResponseEnvelope {
    agent
        .handle_query(ChatInput {
            session_id: Some(session.to_string()),
            text: text.to_string(),
        })
        .await
        .expect("query should be handled")
}

#[tokio::test]
async fn route_query_lists_matching_tours() {
    let (agent, _, _) = build_agent(sample_tours());

    let reply = ask(&agent, "s-route", "Tôi muốn đi từ Hà Nội đến Đà Nẵng").await;

    assert_eq!(reply.status, ResponseStatus::Success);
    let data = reply.data.expect("route reply carries data");
    assert_eq!(data["route"], "Hà Nội - Đà Nẵng");
    assert_eq!(data["tours"].as_array().map(Vec::len), Some(1));
    assert_eq!(data["tours"][0]["code"], "T1");
    assert_eq!(data["session_id"], "s-route");
}

#[tokio::test]
async fn garbage_input_is_rejected() {
    let (agent, _, _) = build_agent(sample_tours());

    let reply = ask(&agent, "s-garbage", "???").await;

    assert_eq!(reply.status, ResponseStatus::Error);
    assert_eq!(reply.error.as_deref(), Some("Vui lòng nhập câu hỏi hợp lệ!"));
    assert!(reply.data.is_none());
}

#[tokio::test]
async fn small_talk_never_reaches_the_model() {
    let (agent, _, metrics) = build_agent(sample_tours());

    let reply = ask(&agent, "s-smalltalk", "Tôi buồn quá").await;

    assert_eq!(reply.status, ResponseStatus::Error);
    assert_eq!(
        reply.error.as_deref(),
        Some("Câu hỏi không liên quan đến tour. Vui lòng hỏi về các tour hoặc điểm đến.")
    );

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.requests_total, 1);
    assert_eq!(snapshot.completion_calls_total, 0);
}

#[tokio::test]
async fn cheapest_tour_wins_the_price_query() {
    let (agent, _, _) = build_agent(sample_tours());

    let reply = ask(&agent, "s-price", "Cho tôi tour rẻ nhất").await;

    assert_eq!(reply.status, ResponseStatus::Success);
    let data = reply.data.expect("price reply carries data");
    assert_eq!(data["priceType"], "min");
    assert_eq!(data["tours"][0]["code"], "T2");
    assert_eq!(data["tours"][0]["price"], "1.000.000 Đồng");
}

#[tokio::test]
async fn cheapest_query_with_a_destination_picks_the_cheaper_one_there() {
    let (agent, _, _) = build_agent(sample_tours());

    let reply = ask(&agent, "s-price-dest", "tour rẻ nhất Hội An").await;

    assert_eq!(reply.status, ResponseStatus::Success);
    let data = reply.data.expect("price reply carries data");
    assert_eq!(data["priceType"], "min");
    assert_eq!(data["tours"][0]["code"], "T2");
    assert_eq!(data["tours"][0]["destination"], "Hội An");
    assert_eq!(data["tours"][0]["price"], "1.000.000 Đồng");
}

#[tokio::test]
async fn price_bracket_filters_the_listing() {
    let (agent, _, _) = build_agent(sample_tours());

    let reply = ask(&agent, "s-bracket", "tour giá dưới 2 triệu").await;

    assert_eq!(reply.status, ResponseStatus::Success);
    let data = reply.data.expect("bracket reply carries data");
    let tours = data["tours"].as_array().expect("tours listed");
    assert_eq!(tours.len(), 2);
    assert_eq!(tours[0]["code"], "T2");
    assert_eq!(tours[1]["code"], "T4");
}

#[tokio::test]
async fn named_tour_question_answers_with_the_asked_facet() {
    let (agent, _, _) = build_agent(sample_tours());

    let reply = ask(&agent, "s-specific", "Tour Đà Nẵng giá bao nhiêu?").await;

    assert_eq!(reply.status, ResponseStatus::Success);
    let data = reply.data.expect("specific reply carries data");
    assert_eq!(data["focus"], "price");
    assert_eq!(data["value"], "3.000.000 Đồng");
    assert_eq!(data["tourTitle"], "Tour Đà Nẵng 3 ngày");
}

#[tokio::test]
async fn follow_up_sticks_to_the_current_tour() {
    let (agent, _, _) = build_agent(sample_tours());

    let first = ask(&agent, "s-follow", "Tour Đà Nẵng giá bao nhiêu?").await;
    assert_eq!(first.status, ResponseStatus::Success);

    let second = ask(&agent, "s-follow", "Mấy ngày?").await;
    assert_eq!(second.status, ResponseStatus::Success);
    let data = second.data.expect("follow-up reply carries data");
    assert_eq!(data["focus"], "duration");
    assert_eq!(data["duration"], "3 Ngày");
    assert_eq!(data["tourTitle"], "Tour Đà Nẵng 3 ngày");
}

#[tokio::test]
async fn pivot_to_another_tour_clears_the_session_state() {
    let (agent, store, _) = build_agent(sample_tours());

    let first = ask(&agent, "s-pivot", "Tour Đà Nẵng giá bao nhiêu?").await;
    assert_eq!(first.status, ResponseStatus::Success);

    let tracked = store
        .load_session("s-pivot")
        .await
        .unwrap()
        .expect("session persisted");
    assert_eq!(tracked.state.current_tour.as_deref(), Some("T1"));

    let second = ask(&agent, "s-pivot", "tour khác").await;
    assert_eq!(second.status, ResponseStatus::Warning);

    let cleared = store
        .load_session("s-pivot")
        .await
        .unwrap()
        .expect("session persisted");
    assert!(cleared.state.current_tour.is_none());
    assert!(cleared.state.current_topic.is_none());
    assert_eq!(cleared.state.query_counter, 0);
}

#[tokio::test]
async fn single_destination_lists_every_tour_there() {
    let (agent, _, _) = build_agent(sample_tours());

    let reply = ask(&agent, "s-dest", "Tôi muốn đi Hội An").await;

    assert_eq!(reply.status, ResponseStatus::Success);
    let data = reply.data.expect("destination reply carries data");
    assert_eq!(data["destination"], "Hội An");
    assert_eq!(data["isDeparture"], false);
    assert_eq!(data["tours"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn region_reply_groups_by_destination() {
    let (agent, _, _) = build_agent(sample_tours());

    let reply = ask(&agent, "s-region", "Tôi muốn du lịch miền Trung").await;

    assert_eq!(reply.status, ResponseStatus::Success);
    let data = reply.data.expect("region reply carries data");
    assert_eq!(data["region"], "miền Trung");
    assert_eq!(data["tours"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn activity_query_finds_the_food_tour() {
    let (agent, _, _) = build_agent(sample_tours());

    let reply = ask(&agent, "s-activity", "tour ẩm thực").await;

    assert_eq!(reply.status, ResponseStatus::Success);
    let data = reply.data.expect("activity reply carries data");
    assert_eq!(data["tours"][0]["code"], "T4");
}

#[tokio::test]
async fn empty_catalog_degrades_to_a_warning() {
    let (agent, _, _) = build_agent(Vec::new());

    let reply = ask(&agent, "s-empty", "Có tour nào đi Đà Nẵng không?").await;

    assert_eq!(reply.status, ResponseStatus::Warning);
    assert!(reply.data.is_none());
}
