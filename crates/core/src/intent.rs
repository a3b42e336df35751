//! Rule-cascade query classifier.
//!
//! Classification is single shot: one pass over an ordered rule list,
//! first match wins. Rules that hinge on Vietnamese place names work on
//! diacritic-folded text so that unaccented typing still matches; rules
//! built from short function words keep their diacritics, folding those
//! would collide with unrelated words ("ăn" vs "an").

use once_cell::sync::Lazy;
use regex::Regex;

use crate::catalog::TourCatalog;
use crate::extract::{match_single_location, ACTIVITY_GROUPS};
use crate::models::{ConversationState, Intent, PriceOrder};
use crate::normalize::fold_diacritics;

struct RuleInput<'a> {
    lower: String,
    folded: String,
    state: &'a ConversationState,
    catalog: &'a TourCatalog,
}

type Rule = fn(&RuleInput) -> Option<Intent>;

/// Priority-ordered rule list. Earlier rules intentionally shadow later
/// ones where cues overlap.
const RULES: &[Rule] = &[
    empty_rule,
    specific_tour_rule,
    qualified_route_rule,
    region_rule,
    single_location_rule,
    personal_rule,
    activity_rule,
    new_tour_rule,
    follow_up_rule,
    general_tour_rule,
    relatedness_rule,
    price_rule,
];

pub fn classify(query: &str, state: &ConversationState, catalog: &TourCatalog) -> Intent {
    let input = RuleInput {
        lower: query.to_lowercase().trim().to_string(),
        folded: fold_diacritics(query),
        state,
        catalog,
    };
    RULES
        .iter()
        .find_map(|rule| rule(&input))
        .unwrap_or(Intent::Search)
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

fn empty_rule(input: &RuleInput) -> Option<Intent> {
    let trimmed = input.lower.trim();
    if trimmed.is_empty() || !trimmed.chars().any(char::is_alphanumeric) {
        return Some(Intent::Empty);
    }
    None
}

static SPECIFIC_TOUR_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(cho\s+\w+\s+biet|thong tin)\s+ve\s+tour\s+[\w\s]+",
        r"(thong tin|chi tiet|mo ta|lich trinh|gia|chi phi|thoi gian cua|so nguoi tham gia)\s+tour\s+[\w\s]+",
        r"(gioi thieu|noi|ke)\s+ve\s+tour\s+[\w\s]+",
        r"tour\s+[\w\s]+(\d+\s+ngay|\d+\s+dem)",
        r"tour\s+[\w\s]+(co gi|nhu the nao|ra sao|the nao|dac biet|hay ho|dang chu y)",
        r"tour\s+[\w\s]+(phun lua|am thuc|kham pha|trai nghiem|tham quan)",
        r"tour\s+[^?]+\?$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("specific tour pattern"))
    .collect()
});

fn specific_tour_rule(input: &RuleInput) -> Option<Intent> {
    SPECIFIC_TOUR_PATTERNS
        .iter()
        .any(|re| re.is_match(&input.folded))
        .then_some(Intent::SpecificTour)
}

/// "Has tour" phrasings qualified by a full supported route. The route
/// display string ("Hà Nội - Đà Nẵng") is what gets probed, lone place
/// names fall through to the single-location rule instead.
fn qualified_route_rule(input: &RuleInput) -> Option<Intent> {
    for route in input.catalog.supported_routes() {
        let display = fold_diacritics(&route.display());
        let escaped = regex::escape(&display);

        let has_tour =
            format!(r"{escaped}\s+(co|nhung|cac|co nhung|co cac)\s+.*(tour|chuyen di|du lich)");
        if Regex::new(&has_tour).ok()?.is_match(&input.folded) {
            return Some(Intent::NewTour);
        }

        let dep = regex::escape(&fold_diacritics(&route.departure));
        let dest = regex::escape(&fold_diacritics(&route.destination));
        let directional = format!(r"tu\s+{dep}\s+(di|den)\s+{dest}");
        if Regex::new(&directional).ok()?.is_match(&input.folded) {
            return Some(Intent::NewTour);
        }

        let loose = format!(r"{escaped}.*co.*nhung.*tour");
        if Regex::new(&loose).ok()?.is_match(&input.folded) {
            return Some(Intent::NewTour);
        }

        // A full route mention defaults to a new search even without a
        // tour keyword nearby.
        if input.folded.contains(&display) {
            return Some(Intent::NewTour);
        }
    }
    None
}

fn region_rule(input: &RuleInput) -> Option<Intent> {
    ["mien bac", "mien trung", "mien nam"]
        .iter()
        .any(|region| input.folded.contains(region))
        .then_some(Intent::Region)
}

fn single_location_rule(input: &RuleInput) -> Option<Intent> {
    let matched = match_single_location(&input.lower, input.catalog)?;
    if matched.is_departure {
        Some(Intent::SingleDeparture)
    } else {
        Some(Intent::SingleDestination)
    }
}

static PERSONAL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\b(tôi|mình|t|tao|ta|mik|mk)\s+(buồn|chán|vui|khỏe|mệt|ốm|đau)",
        r"\b(cảm thấy|cảm giác|thấy)\s+(buồn|chán|vui|khỏe|mệt|ốm|đau)",
        r"\b(bạn|cậu|mày)\s+(là ai|tên gì|có khỏe|tuổi|làm gì)",
        r"^\s*(chào|hello|hi|hey|hola)\s*$",
        r"\b(thời tiết|tin tức|bóng đá|covid)\b",
        r"\b(làm thế nào để|cách để)\s+(nấu ăn|học|kiếm tiền)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("personal pattern"))
    .collect()
});

const TOUR_TERMS: &[&str] = &["tour", "du lịch", "chuyến đi", "đi đâu", "điểm đến"];

fn personal_rule(input: &RuleInput) -> Option<Intent> {
    let personal = PERSONAL_PATTERNS.iter().any(|re| re.is_match(&input.lower));
    if personal && !TOUR_TERMS.iter().any(|term| input.lower.contains(term)) {
        return Some(Intent::NonTour);
    }
    None
}

static ACTIVITY_STRUCTURAL: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(tour|chuyến đi).*(nào).*(có).*(hoạt động|lặn|bơi|ăn uống|ẩm thực)",
        r"(có).*(tour|chuyến đi).*(nào).*(về|có).*(hoạt động|lặn|bơi|ăn uống|ẩm thực)",
        r"(tìm|kiếm).*(tour).*(lặn|bơi|ăn uống|ẩm thực)",
        r"(tour|chuyến đi).*(để).*(lặn|bơi|ăn uống)",
        r"(tour|chuyến đi).*(phù hợp).*(lặn|bơi|ăn uống)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("activity pattern"))
    .collect()
});

fn activity_rule(input: &RuleInput) -> Option<Intent> {
    if ACTIVITY_STRUCTURAL.iter().any(|re| re.is_match(&input.lower)) {
        return Some(Intent::Activity);
    }
    for group in ACTIVITY_GROUPS {
        for keyword in group.keywords {
            if !input.lower.contains(keyword) {
                continue;
            }
            let short = input.lower.split_whitespace().count() <= 5;
            if input.lower.contains("tour") && short {
                return Some(Intent::Activity);
            }
            let paired = format!(r"tour\s+(có|với)\s+{}", regex::escape(keyword));
            if Regex::new(&paired).ok()?.is_match(&input.lower) {
                return Some(Intent::Activity);
            }
        }
    }
    None
}

const NEW_TOUR_INDICATORS: &[&str] = &[
    "tour khác",
    "còn tour nào",
    "tour mới",
    "tìm tour",
    "giới thiệu tour",
    "có tour nào",
    "tour du lịch",
    "thông tin tour",
    "giá của tour",
    "thời gian tour",
    "mô tả tour",
    "danh sách tour",
    "tour ở",
    "tour tại",
    "tour đi",
    "tour đến",
];

fn new_tour_rule(input: &RuleInput) -> Option<Intent> {
    NEW_TOUR_INDICATORS
        .iter()
        .any(|indicator| input.lower.contains(indicator))
        .then_some(Intent::NewTour)
}

fn follow_up_rule(input: &RuleInput) -> Option<Intent> {
    if input.state.current_tour.is_some()
        && is_follow_up(&input.lower, input.state, input.catalog)
    {
        return Some(Intent::FollowUp);
    }
    None
}

static GENERAL_TOUR_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(tour|chuyến đi).*(phổ biến|nổi tiếng|hay|đẹp|tốt)",
        r"(giới thiệu|gợi ý|cho xem|đề xuất|danh sách).*(tour|chuyến đi)",
        r"(có).*(những|một số|các).*(tour|chuyến đi|du lịch)",
        r"(tour|chuyến đi).*(giá).*(dưới|trên|khoảng|từ|bao nhiêu)",
        r"(tour|chuyến đi).*(nào).*(giá)",
        r"(tour|chuyến đi).*(phù hợp|thích hợp).*(với|cho)",
        r"(tour|chuyến đi).*(số lượng|nhóm|gia đình|bạn bè)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("general tour pattern"))
    .collect()
});

fn general_tour_rule(input: &RuleInput) -> Option<Intent> {
    GENERAL_TOUR_PATTERNS
        .iter()
        .any(|re| re.is_match(&input.lower))
        .then_some(Intent::GeneralTour)
}

fn relatedness_rule(input: &RuleInput) -> Option<Intent> {
    if !is_tour_related(&input.lower) {
        return Some(Intent::NonTour);
    }
    None
}

fn price_rule(input: &RuleInput) -> Option<Intent> {
    price_comparison(&input.lower).map(|_| Intent::PriceQuery)
}

// ---------------------------------------------------------------------------
// Relatedness gate
// ---------------------------------------------------------------------------

const EMOTION_WORDS: &[&str] = &[
    "buồn", "chán", "vui", "hạnh phúc", "đau", "mệt", "khỏe", "ốm", "bệnh", "nhớ", "ghét",
    "yêu", "thương", "thích", "lo", "sợ",
];

const PRONOUNS: &[&str] = &[
    "tôi", "mình", "tớ", "t", "ta", "tao", "mik", "mk", "bạn", "cậu", "mày",
];

const CORE_TOUR_WORDS: &[&str] = &["tour", "du lịch", "đi", "chuyến"];

const RELATED_KEYWORDS: &[&str] = &[
    "tour", "du lịch", "tham quan", "khám phá", "trải nghiệm", "hành trình", "đi", "chuyến",
    "lịch trình", "chương trình", "giá", "chi phí", "trả", "tiền", "đặt cọc", "thanh toán",
    "bao nhiêu", "mắc", "rẻ", "đắt", "tiết kiệm", "giá cả", "thời gian", "mấy ngày",
    "bao lâu", "kéo dài", "lịch", "ngày", "tuần", "tháng", "giờ", "số người",
    "người tham gia", "tối đa", "quy mô", "sức chứa", "đoàn", "nhóm", "gia đình", "bạn bè",
    "người lớn", "trẻ em", "địa điểm", "điểm đến", "ghé thăm", "dừng chân", "khách sạn",
    "resort", "nghỉ dưỡng", "nhà nghỉ", "lưu trú", "hoạt động", "tham gia", "vui chơi",
    "giải trí", "ẩm thực", "món ăn", "đặc sản", "mua sắm", "chụp ảnh", "mô tả", "chi tiết",
    "có những gì", "bao gồm", "gồm có", "thông tin", "diễn ra", "như thế nào", "ra sao",
    "ntn",
];

static UNRELATED_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\b(tôi|mình|tớ|t|ta|tao|mik|mk)\s+(buồn|chán|vui|hạnh phúc|đau|mệt|khỏe|ốm|bệnh)(\s+|$|\.|\?)",
        r"\b(cảm thấy|cảm giác|thấy)\s+(buồn|chán|vui|hạnh phúc|đau|mệt|khỏe|ốm|bệnh)(\s+|$|\.|\?)",
        r"\b(bạn|cậu|mày|bồ)\s+(là ai|tên gì|có khỏe|thế nào|ra sao|làm gì)(\s+|$|\.|\?)",
        r"^(chào|hello|hi|hey|xin chào)(\s+|$|\.|\?)",
        r"(thời tiết|tin tức|bóng đá|covid|dịch bệnh)",
        r"(làm thế nào để|cách để|hướng dẫn)\s+(nấu ăn|học|kiếm tiền|giảm cân)",
        r"(yêu|thương|ghét|nhớ|thích)",
        r"(gia đình|công việc|trường học|bạn bè)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("unrelated pattern"))
    .collect()
});

/// Gate deciding whether a query is about travel at all. Emotion-only
/// utterances and small talk are rejected before the keyword acceptance
/// pass; very short queries must carry a core travel word.
pub fn is_tour_related(query: &str) -> bool {
    let lower = query.to_lowercase().trim().to_string();
    let word_count = lower.split_whitespace().count();

    if word_count <= 4 {
        let emotional = EMOTION_WORDS.iter().any(|word| lower.contains(word));
        let travel = CORE_TOUR_WORDS.iter().any(|word| lower.contains(word));
        if emotional && !travel {
            return false;
        }
    }

    for pronoun in PRONOUNS {
        for emotion in EMOTION_WORDS {
            if lower.contains(&format!("{pronoun} {emotion}")) {
                return false;
            }
        }
    }

    if word_count <= 3 {
        let words: Vec<&str> = lower.split_whitespace().collect();
        return words
            .iter()
            .any(|word| ["tour", "đi", "chuyến"].contains(word))
            || lower.contains("du lịch");
    }

    if UNRELATED_PATTERNS.iter().any(|re| re.is_match(&lower)) {
        return false;
    }

    RELATED_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

// ---------------------------------------------------------------------------
// Follow-up detector
// ---------------------------------------------------------------------------

const NEW_SEARCH_INDICATORS: &[&str] = &[
    "tìm tour", "tour ở", "tour tại", "tour đi", "tour đến", "muốn đi", "có tour",
    "tour nào", "tour khác", "tour mới",
];

const EXPLICIT_FOLLOW_UP: &[&str] = &[
    "còn", "vậy", "thì", "thì sao", "thế còn", "còn về", "về việc", "giá?", "mấy ngày?",
    "bao lâu?", "bao nhiêu?", "khi nào?", "ở đâu?", "như thế nào", "ra sao", "như nào",
    "thế nào", "làm sao", "kiểu gì", "có gì", "gồm những gì", "bao gồm gì", "có những gì",
    "có bao nhiêu", "nó", "đó", "này", "kia", "họ", "chúng", "tour này", "tour đó",
];

const SPECIFIC_INFO_KEYWORDS: &[&str] = &[
    "giá cả", "chi phí", "thời gian", "lịch trình", "số người", "hoạt động", "giảm giá",
    "khuyến mãi", "ưu đãi", "đặt tour", "thanh toán", "hủy tour",
];

/// Is this query a continuation about the currently discussed tour?
/// New-search phrasings veto everything else.
pub fn is_follow_up(query: &str, state: &ConversationState, catalog: &TourCatalog) -> bool {
    let lower = query.to_lowercase();
    let folded = fold_diacritics(query);
    let word_count = lower.split_whitespace().count();

    if NEW_SEARCH_INDICATORS.iter().any(|ind| lower.contains(ind)) {
        return false;
    }

    if EXPLICIT_FOLLOW_UP.iter().any(|ind| lower.contains(ind)) {
        return true;
    }

    if state.current_topic.is_some()
        && SPECIFIC_INFO_KEYWORDS.iter().any(|kw| lower.contains(kw))
    {
        return true;
    }

    let current_destination = state
        .last_tour_code
        .as_deref()
        .and_then(|code| catalog.by_code(code))
        .map(|tour| fold_diacritics(&tour.destination));

    if let Some(destination) = &current_destination {
        if folded.contains(destination.as_str()) && word_count <= 5 {
            return true;
        }
    }

    if word_count <= 2 && state.current_tour.is_some() {
        let mentions_other = catalog.supported_routes().iter().any(|route| {
            let dest = fold_diacritics(&route.destination);
            folded.contains(&dest) && Some(&dest) != current_destination.as_ref()
        });
        if !mentions_other {
            return true;
        }
    }

    false
}

// ---------------------------------------------------------------------------
// Price comparison
// ---------------------------------------------------------------------------

const PRICE_KEYWORDS: &[&str] = &[
    "giá", "chi phí", "phí", "tiền", "đắt", "rẻ", "giá cả", "giá thành", "giá tiền", "tốn",
    "kinh phí",
];

const MIN_PRICE_INDICATORS: &[&str] = &[
    "rẻ nhất", "thấp nhất", "ít nhất", "ít tiền nhất", "tiết kiệm nhất", "giá thấp",
    "giá rẻ", "giảm giá", "phải chăng", "hợp lý", "kinh tế nhất",
];

const MAX_PRICE_INDICATORS: &[&str] = &[
    "đắt nhất", "cao nhất", "nhiều nhất", "tốn nhất", "đắt đỏ nhất", "giá cao", "cao cấp",
    "vip", "sang trọng", "đắt tiền",
];

/// Comparative price request: cheapest ascending, priciest descending.
/// Requires a price keyword alongside the superlative cue.
pub fn price_comparison(query: &str) -> Option<PriceOrder> {
    let lower = query.to_lowercase();
    if !PRICE_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return None;
    }
    if MIN_PRICE_INDICATORS.iter().any(|ind| lower.contains(ind)) {
        Some(PriceOrder::Ascending)
    } else if MAX_PRICE_INDICATORS.iter().any(|ind| lower.contains(ind)) {
        Some(PriceOrder::Descending)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Topic, TourRecord};

    fn record(code: &str, title: &str, departure: &str, destination: &str) -> TourRecord {
        TourRecord {
            code: code.into(),
            title: title.into(),
            description: "Tham quan và nghỉ dưỡng".into(),
            destination: destination.into(),
            departure: Some(departure.into()),
            price: "2.000.000 Đồng".into(),
            duration: "3 Ngày".into(),
            max_participants: 20,
        }
    }

    fn catalog() -> TourCatalog {
        TourCatalog::from_records(vec![
            record("T1", "Tour Đà Nẵng 3 ngày", "Hà Nội", "Đà Nẵng"),
            record("T2", "Tour Hội An phố cổ", "Đà Nẵng", "Hội An"),
        ])
    }

    #[test]
    fn empty_and_punctuation_only() {
        let catalog = catalog();
        let state = ConversationState::default();
        assert_eq!(classify("", &state, &catalog), Intent::Empty);
        assert_eq!(classify("???", &state, &catalog), Intent::Empty);
        assert_eq!(classify("....", &state, &catalog), Intent::Empty);
    }

    #[test]
    fn specific_tour_question_mark_pattern() {
        let catalog = catalog();
        let state = ConversationState::default();
        assert_eq!(
            classify("Tour Đà Nẵng giá bao nhiêu?", &state, &catalog),
            Intent::SpecificTour
        );
    }

    #[test]
    fn full_route_mention_is_new_tour() {
        let catalog = catalog();
        let state = ConversationState::default();
        assert_eq!(
            classify("Hà Nội - Đà Nẵng có những tour nào", &state, &catalog),
            Intent::NewTour
        );
        assert_eq!(
            classify("từ hà nội đi đà nẵng", &state, &catalog),
            Intent::NewTour
        );
    }

    #[test]
    fn region_mention() {
        let catalog = catalog();
        let state = ConversationState::default();
        assert_eq!(
            classify("gợi ý tour miền trung", &state, &catalog),
            Intent::Region
        );
    }

    #[test]
    fn lone_destination_and_departure() {
        let catalog = catalog();
        let state = ConversationState::default();
        assert_eq!(
            classify("muốn đi hội an thì sao", &state, &catalog),
            Intent::SingleDestination
        );
        assert_eq!(
            classify("tour nào khởi hành từ đà nẵng", &state, &catalog),
            Intent::SingleDeparture
        );
    }

    #[test]
    fn emotional_small_talk_is_non_tour() {
        let catalog = catalog();
        let state = ConversationState::default();
        assert_eq!(classify("tôi buồn", &state, &catalog), Intent::NonTour);
        assert_eq!(
            classify("thời tiết hôm nay thế nào nhỉ", &state, &catalog),
            Intent::NonTour
        );
    }

    #[test]
    fn new_search_phrase_overrides_follow_up() {
        let catalog = catalog();
        let mut state = ConversationState::default();
        state.set_current_tour(&catalog.all()[0], Topic::Price);
        // "tour khác" also contains follow-up cues but must never be one.
        assert!(!is_follow_up("còn tour khác không", &state, &catalog));
        assert_eq!(
            classify("tour khác", &state, &catalog),
            Intent::NewTour
        );
    }

    #[test]
    fn follow_up_needs_current_tour() {
        let catalog = catalog();
        let mut state = ConversationState::default();
        state.set_current_tour(&catalog.all()[0], Topic::Price);
        assert_eq!(
            classify("kéo dài bao lâu?", &state, &catalog),
            Intent::FollowUp
        );
    }

    #[test]
    fn price_superlative() {
        assert_eq!(price_comparison("tour nào giá rẻ nhất"), Some(PriceOrder::Ascending));
        assert_eq!(price_comparison("tour đắt nhất"), Some(PriceOrder::Descending));
        assert_eq!(price_comparison("tour vui nhất"), None);
    }

    #[test]
    fn classification_is_idempotent() {
        let catalog = catalog();
        let state = ConversationState::default();
        for query in ["tour khác", "tôi buồn", "gợi ý tour miền trung", "???"] {
            let first = classify(query, &state, &catalog);
            let second = classify(query, &state, &catalog);
            assert_eq!(first, second, "{query}");
        }
    }

    #[test]
    fn relatedness_gate() {
        assert!(is_tour_related("tour du lịch đà nẵng có những hoạt động gì"));
        assert!(!is_tour_related("hôm nay trời mưa chán ghê"));
        assert!(is_tour_related("tour"));
        assert!(!is_tour_related("xin chào"));
    }
}
