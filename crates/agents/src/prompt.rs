//! Prompt builders for the completion backend. All prompts are written in
//! Vietnamese and always embed the catalog facts the model is allowed to
//! talk about, so the generated answer stays grounded in real tour data.

use vietgo_core::{Topic, TourRecord, TourView};

/// Flat rendering of one tour, used wherever a single tour is the subject.
pub(crate) fn tour_context(tour: &TourRecord) -> String {
    format!(
        "Tiêu đề: {}, Mô tả: {}, Giá: {}, Thời gian: {}, Điểm khởi hành: {}, Điểm đến: {}, Số người tối đa: {}",
        tour.title,
        tour.description,
        tour.price,
        tour.duration,
        tour.departure.as_deref().unwrap_or("Không rõ"),
        tour.destination,
        tour.max_participants,
    )
}

fn focus_phrase(focus: Topic) -> &'static str {
    match focus {
        Topic::Price => "giá của",
        Topic::Duration => "thời gian của",
        Topic::Description => "mô tả chi tiết của",
        Topic::MaxParticipants => "số người tối đa của",
        _ => "thông tin chung của",
    }
}

fn numbered_listing(views: &[TourView]) -> String {
    views
        .iter()
        .enumerate()
        .map(|(idx, view)| {
            format!(
                "{}. {}\n - Giá: {}\n - Thời gian: {}\n - Điểm đến: {}\n - Mô tả: {}",
                idx + 1,
                view.title,
                view.price,
                view.duration,
                view.destination,
                view.description,
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub(crate) fn specific_tour(query: &str, tour: &TourRecord, focus: Topic) -> String {
    format!(
        "Dựa trên thông tin tour sau:\n\n{}\n\nTrả lời câu hỏi sau của người dùng: '{}'. \
         Người dùng đang hỏi về {} tour. Chỉ trả lời về thông tin của tour này, \
         không đề cập đến các tour khác. Trả lời ngắn gọn, súc tích và đầy đủ thông tin.",
        tour_context(tour),
        query,
        focus_phrase(focus),
    )
}

pub(crate) fn follow_up(query: &str, tour: &TourRecord, focus: Topic) -> String {
    format!(
        "Dựa trên thông tin tour sau:\n\n{}\n\nNgười dùng hỏi tiếp: '{}'. \
         Người dùng quan tâm đến {} tour. Chỉ đề cập đến tour này, không giới thiệu \
         tour khác. Trả lời ngắn gọn và đúng trọng tâm câu hỏi.",
        tour_context(tour),
        query,
        focus_phrase(focus),
    )
}

pub(crate) fn route_overview(query: &str, route_display: &str, views: &[TourView]) -> String {
    format!(
        "Có {} tour đi tuyến {}:\n\n{}\n\nDựa trên danh sách tour trên, trả lời câu hỏi \
         sau của người dùng: '{}'. Giới thiệu ngắn gọn từng tour, nêu rõ giá và thời gian.",
        views.len(),
        route_display,
        numbered_listing(views),
        query,
    )
}

/// Overview grouped under per-section headers, used for the catalog and
/// region introductions.
pub(crate) fn grouped_overview(query: &str, groups: &[(String, Vec<TourView>)]) -> String {
    let sections = groups
        .iter()
        .map(|(header, views)| format!("{}\n{}", header, numbered_listing(views)))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "Dưới đây là các tour hiện có:\n\n{}\n\nDựa trên danh sách trên, trả lời câu hỏi \
         sau của người dùng: '{}'. Giới thiệu ngắn gọn từng tour, nêu rõ giá và thời gian, \
         không bịa thêm tour nào khác.",
        sections, query,
    )
}

pub(crate) fn tour_list(query: &str, views: &[TourView]) -> String {
    format!(
        "Các tour phù hợp với yêu cầu:\n\n{}\n\nDựa trên danh sách tour trên, trả lời câu \
         hỏi sau của người dùng: '{}'. Giới thiệu ngắn gọn từng tour và nêu lý do tour phù \
         hợp với yêu cầu.",
        numbered_listing(views),
        query,
    )
}

/// Single-tour introduction for interest-driven matches, with the reply
/// shape spelled out so the model keeps the listing compact.
pub(crate) fn interest_pick(query: &str, tour: &TourRecord) -> String {
    format!(
        "Dựa trên thông tin tour sau:\n\n{}\n\nTrả lời câu hỏi sau của người dùng: '{}'. \
         Hãy giới thiệu tour phù hợp nhất với yêu cầu của người dùng theo mẫu:\n\n\
         [Tên Tour]\n - Điểm đến/Hoạt động: [Mô tả ngắn gọn]\n - Giá: [Giá] | Thời gian: [Thời gian]\n\n\
         Bắt đầu với một câu giới thiệu ngắn gọn về tour này.",
        tour_context(tour),
        query,
    )
}

pub(crate) fn price_pick(query: &str, view: &TourView, cheapest: bool) -> String {
    let label = if cheapest { "rẻ nhất" } else { "đắt nhất" };
    format!(
        "Tour {} hiện có:\n\n{}\n\nTrả lời câu hỏi sau của người dùng: '{}'. \
         Giới thiệu tour này, nêu rõ giá {} và thời gian. Không đề cập đến tour khác.",
        label,
        numbered_listing(std::slice::from_ref(view)),
        query,
        label,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tour() -> TourRecord {
        TourRecord {
            code: "T1".into(),
            title: "Tour Đà Nẵng 3 ngày".into(),
            description: "Tham quan Bà Nà Hills".into(),
            destination: "Đà Nẵng".into(),
            departure: Some("Hà Nội".into()),
            price: "3.000.000 Đồng".into(),
            duration: "3 Ngày".into(),
            max_participants: 20,
        }
    }

    #[test]
    fn tour_context_includes_every_field() {
        let rendered = tour_context(&tour());
        assert!(rendered.contains("Tiêu đề: Tour Đà Nẵng 3 ngày"));
        assert!(rendered.contains("Giá: 3.000.000 Đồng"));
        assert!(rendered.contains("Điểm khởi hành: Hà Nội"));
        assert!(rendered.contains("Số người tối đa: 20"));
    }

    #[test]
    fn tour_context_marks_missing_departure() {
        let mut record = tour();
        record.departure = None;
        assert!(tour_context(&record).contains("Điểm khởi hành: Không rõ"));
    }

    #[test]
    fn specific_prompt_carries_focus_phrase() {
        let rendered = specific_tour("Tour Đà Nẵng giá bao nhiêu?", &tour(), Topic::Price);
        assert!(rendered.contains("giá của"));
        assert!(rendered.contains("Tour Đà Nẵng giá bao nhiêu?"));
    }

    #[test]
    fn interest_prompt_introduces_a_single_tour() {
        let rendered = interest_pick("tôi thích leo núi", &tour());
        assert!(rendered.contains("Tiêu đề: Tour Đà Nẵng 3 ngày"));
        assert!(rendered.contains("[Tên Tour]"));
        assert!(rendered.contains("tôi thích leo núi"));
    }

    #[test]
    fn listing_is_numbered() {
        let views = vec![TourView::from(&tour()), TourView::from(&tour())];
        let rendered = tour_list("tour nghỉ dưỡng", &views);
        assert!(rendered.contains("1. Tour Đà Nẵng 3 ngày"));
        assert!(rendered.contains("2. Tour Đà Nẵng 3 ngày"));
    }
}
