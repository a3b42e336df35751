use once_cell::sync::Lazy;
use regex::Regex;

use crate::catalog::TourCatalog;
use crate::models::{LocationMatch, PriceBound, RouteKey, RouteMatch, TourRecord, Topic};
use crate::normalize::{
    contains_phrase, containment_score, fold_diacritics, phrase_position, tokenize,
};

/// Minimum containment ratio for resolving a free-text span against a
/// known location name.
const LOCATION_MATCH_THRESHOLD: f32 = 0.7;
/// Minimum token-overlap score for the title matcher.
const TITLE_MATCH_THRESHOLD: f32 = 0.3;
/// Minimum symmetric score for the similar-name matcher.
const SIMILAR_NAME_THRESHOLD: f32 = 0.4;

// ---------------------------------------------------------------------------
// Route matching
// ---------------------------------------------------------------------------

/// Explicit route phrasings, highest confidence. `{a}` departs, `{b}`
/// arrives; instantiated per supported route over diacritic-folded text.
const EXPLICIT_ROUTE_PATTERNS: &[&str] = &[
    r"{a}\s*[-–—]\s*{b}",
    r"tu\s+{a}\s+(?:di|den|toi|ra)\s+{b}",
    r"{a}\s+(?:di|den|toi|ra)\s+{b}",
];

const EXPLICIT_CONFIDENCE: f32 = 0.9;
const CONTEXT_CONFIDENCE: f32 = 0.8;
const LOOSE_CONFIDENCE: f32 = 0.7;
/// Synthesized reverse routes score this much under the forward match.
const REVERSE_PENALTY: f32 = 0.05;

fn route_regex(template: &str, a: &str, b: &str) -> Regex {
    let pattern = template
        .replace("{a}", &regex::escape(a))
        .replace("{b}", &regex::escape(b));
    Regex::new(&pattern).expect("route pattern template is valid")
}

/// Ordered co-occurrence cues: the first phrase must appear before the
/// second one.
fn context_pairs(a: &str, b: &str) -> [(String, String); 5] {
    [
        (format!("tu {a}"), format!("den {b}")),
        (format!("tu {a}"), format!("toi {b}")),
        (format!("tu {a}"), format!("ra {b}")),
        (a.to_string(), format!("di {b}")),
        (format!("tour {a}"), b.to_string()),
    ]
}

fn context_matches(folded: &str, a: &str, b: &str) -> bool {
    context_pairs(a, b).iter().any(|(start, end)| {
        match (phrase_position(folded, start), phrase_position(folded, end)) {
            (Some(from), Some(to)) => from < to,
            _ => false,
        }
    })
}

/// Scan every supported route for directional phrasings, in priority
/// order. The reverse direction is tested symmetrically: if the reversed
/// pair is itself a supported route it wins the forward confidence,
/// otherwise a synthesized reversed key is scored slightly lower. The
/// highest-confidence candidate wins, ties broken by scan order.
pub fn match_route(query: &str, catalog: &TourCatalog) -> Option<RouteMatch> {
    let folded = fold_diacritics(query);
    let mut candidates: Vec<RouteMatch> = Vec::new();

    for route in catalog.supported_routes() {
        let dep = fold_diacritics(&route.departure);
        let dest = fold_diacritics(&route.destination);

        if EXPLICIT_ROUTE_PATTERNS
            .iter()
            .any(|tpl| route_regex(tpl, &dep, &dest).is_match(&folded))
        {
            candidates.push(RouteMatch {
                route: route.clone(),
                confidence: EXPLICIT_CONFIDENCE,
            });
        }
        if EXPLICIT_ROUTE_PATTERNS
            .iter()
            .any(|tpl| route_regex(tpl, &dest, &dep).is_match(&folded))
        {
            candidates.push(reverse_candidate(catalog, route, EXPLICIT_CONFIDENCE));
        }

        if context_matches(&folded, &dep, &dest) {
            candidates.push(RouteMatch {
                route: route.clone(),
                confidence: CONTEXT_CONFIDENCE,
            });
        }
        if context_matches(&folded, &dest, &dep) {
            candidates.push(reverse_candidate(catalog, route, CONTEXT_CONFIDENCE));
        }

        if contains_phrase(&folded, &format!("tour {dep} {dest}")) {
            candidates.push(RouteMatch {
                route: route.clone(),
                confidence: LOOSE_CONFIDENCE,
            });
        } else if contains_phrase(&folded, &format!("tour {dest} {dep}")) {
            candidates.push(reverse_candidate(catalog, route, LOOSE_CONFIDENCE));
        }
    }

    // Stable sort keeps scan order among equal confidences.
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    candidates.into_iter().next()
}

fn reverse_candidate(catalog: &TourCatalog, route: &RouteKey, confidence: f32) -> RouteMatch {
    let reversed = route.reversed();
    if catalog.is_supported_route(&reversed) {
        RouteMatch {
            route: reversed,
            confidence,
        }
    } else {
        RouteMatch {
            route: reversed,
            confidence: confidence - REVERSE_PENALTY,
        }
    }
}

// ---------------------------------------------------------------------------
// Single-location matching
// ---------------------------------------------------------------------------

static DEPARTURE_INDICATORS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?:di|khoi hanh|xuat phat)\s+tu",
        r"tu\s+[\w ]+?\s+(?:di|khoi hanh|toi|den)",
        r"tour\s+(?:di|khoi hanh)\s+tu",
        r"bat dau\s+tu",
        r"khoi\s+hanh\s+o",
        r"co\s+tour\s+(?:nao|gi)\s+o",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("departure indicator pattern"))
    .collect()
});

static DESTINATION_CAPTURES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"co\s+tour\s+(?:nao|gi|j)\s+(?:di|toi|ra|den)\s+([^?]+?)(?:\s+khong|\?|$)",
        r"tour\s+(?:di|toi|ra|den)\s+([^?]+?)(?:\s+thi\s+sao|\s+khong|\?|$)",
        r"(?:di|toi|ra|den)\s+([^?]+?)(?:\s+co\s+tour\s+nao|\s+khong|\?|$)",
        r"co\s+di\s+([^?]+?)(?:\s+khong|\?|$)",
        r"muon\s+di\s+([^?]+?)(?:\s+thi\s+sao|\s+co\s+khong|\?|$)",
        r"tour\s+([^?]+?)(?:\s+gia|\s+bao\s+nhieu|\s+the\s+nao|\s+co\s+khong|\?|$)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("destination capture pattern"))
    .collect()
});

static DEPARTURE_CAPTURES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?:di|khoi hanh|xuat phat)\s+tu\s+([^?]+?)(?:\s+khong|\?|$)",
        r"tu\s+([^?]+?)\s+(?:di|khoi hanh|toi|den)",
        r"tour\s+(?:di|khoi hanh)\s+tu\s+([^?]+?)(?:\s+khong|\?|$)",
        r"(?:co|duoc)\s+tour\s+(?:nao|gi)\s+(?:di|khoi hanh|xuat phat)\s+(?:tu|o)\s+([^?]+?)(?:\s+khong|\?|$)",
        r"tour\s+(?:nao|gi)\s+khoi\s+hanh\s+o\s+([^?]+?)(?:\s+khong|\?|$)",
        r"tour\s+tu\s+([^?]+?)(?:\s+khong|\?|$)",
        r"co\s+tour\s+(?:nao|gi)\s+o\s+([^?]+?)(?:\s+khong|\?|$)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("departure capture pattern"))
    .collect()
});

/// A lone departure or destination mentioned in the query, resolved
/// against the catalog's known locations. Direction is decided by the
/// departure-indicator phrasings.
pub fn match_single_location(query: &str, catalog: &TourCatalog) -> Option<LocationMatch> {
    let folded = fold_diacritics(query);
    let locations = catalog.known_locations();
    let folded_pairs: Vec<(String, &String)> = locations
        .iter()
        .map(|display| (fold_diacritics(display), display))
        .collect();

    let location = locate(&folded, &folded_pairs)?;
    let is_departure = DEPARTURE_INDICATORS.iter().any(|re| re.is_match(&folded));

    Some(LocationMatch {
        location,
        is_departure,
    })
}

fn locate(folded: &str, known: &[(String, &String)]) -> Option<String> {
    // Contextual substring probes first.
    for (folded_loc, display) in known {
        let probes = [
            format!("tour {folded_loc}"),
            format!("di {folded_loc}"),
            format!("tu {folded_loc}"),
            format!("o {folded_loc}"),
        ];
        if probes.iter().any(|probe| contains_phrase(folded, probe)) {
            return Some((*display).clone());
        }
    }

    // Then capture templates resolved fuzzily against the known set.
    for patterns in [&*DESTINATION_CAPTURES, &*DEPARTURE_CAPTURES] {
        for pattern in patterns {
            if let Some(captures) = pattern.captures(folded) {
                let span = captures.get(1).map(|m| m.as_str().trim()).unwrap_or("");
                if let Some(resolved) = best_location_match(span, known) {
                    return Some(resolved);
                }
            }
        }
    }

    None
}

/// Containment-ratio fuzzy resolution of a captured span against the
/// known locations.
fn best_location_match(candidate: &str, known: &[(String, &String)]) -> Option<String> {
    let mut best: Option<(f32, &String)> = None;
    for (folded_loc, display) in known {
        let score = containment_score(candidate, folded_loc);
        if score >= 1.0 {
            return Some((*display).clone());
        }
        if best.map_or(true, |(s, _)| score > s) {
            best = Some((score, *display));
        }
    }
    best.and_then(|(score, display)| {
        (score >= LOCATION_MATCH_THRESHOLD).then(|| display.clone())
    })
}

// ---------------------------------------------------------------------------
// Price bounds
// ---------------------------------------------------------------------------

static PRICE_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"tu\s*([\d.,]+)\s*(trieu|tr|nghin|ngan|k)?\s*(?:den|toi|-)\s*([\d.,]+)\s*(trieu|tr|nghin|ngan|k)?",
    )
    .expect("price range pattern")
});
static PRICE_MAX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"duoi\s*([\d.,]+)\s*(trieu|tr|nghin|ngan|k)?").expect("price max"));
static PRICE_MIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"tren\s*([\d.,]+)\s*(trieu|tr|nghin|ngan|k)?").expect("price min"));
static PRICE_APPROX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"khoang\s*([\d.,]+)\s*(trieu|tr|nghin|ngan|k)?").expect("price approx")
});

fn parse_amount(digits: &str, suffix: Option<&str>) -> Option<u64> {
    let cleaned: String = digits.chars().filter(char::is_ascii_digit).collect();
    let base: u64 = cleaned.parse().ok()?;
    let multiplier = match suffix {
        Some("trieu") | Some("tr") => 1_000_000,
        Some("nghin") | Some("ngan") | Some("k") => 1_000,
        _ => 1,
    };
    base.checked_mul(multiplier)
}

/// "dưới N" → max, "trên N" → min, "từ N đến M" → min+max,
/// "khoảng N" → approx. Amounts accept dot/comma thousand separators and
/// the "triệu"/"nghìn" shorthand.
pub fn parse_price_bound(query: &str) -> Option<PriceBound> {
    let folded = fold_diacritics(query);

    if let Some(captures) = PRICE_RANGE.captures(&folded) {
        let min = parse_amount(&captures[1], captures.get(2).map(|m| m.as_str()));
        let max = parse_amount(&captures[3], captures.get(4).map(|m| m.as_str()));
        if min.is_some() || max.is_some() {
            return Some(PriceBound {
                min,
                max,
                approx: None,
            });
        }
    }
    if let Some(captures) = PRICE_MAX.captures(&folded) {
        if let Some(max) = parse_amount(&captures[1], captures.get(2).map(|m| m.as_str())) {
            return Some(PriceBound {
                max: Some(max),
                ..Default::default()
            });
        }
    }
    if let Some(captures) = PRICE_MIN.captures(&folded) {
        if let Some(min) = parse_amount(&captures[1], captures.get(2).map(|m| m.as_str())) {
            return Some(PriceBound {
                min: Some(min),
                ..Default::default()
            });
        }
    }
    if let Some(captures) = PRICE_APPROX.captures(&folded) {
        if let Some(approx) = parse_amount(&captures[1], captures.get(2).map(|m| m.as_str())) {
            return Some(PriceBound {
                approx: Some(approx),
                ..Default::default()
            });
        }
    }

    None
}

// ---------------------------------------------------------------------------
// Fuzzy title matching
// ---------------------------------------------------------------------------

static TITLE_NOISE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(thong tin|chi tiet|tour|ve)\s+").expect("title noise pattern"));

/// Two-pass title matcher: substring containment either direction over
/// folded text, then token-overlap scoring against every title.
pub fn find_tour_by_title<'a>(query: &str, catalog: &'a TourCatalog) -> Option<&'a TourRecord> {
    let folded = fold_diacritics(query);
    let cleaned = TITLE_NOISE.replace_all(&folded, "").trim().to_string();
    if cleaned.is_empty() {
        return None;
    }
    let query_tokens = tokenize(&cleaned);

    let mut best: Option<(f32, &TourRecord)> = None;
    for tour in catalog.all() {
        let title = fold_diacritics(&tour.title);
        if title.contains(&cleaned) || cleaned.contains(&title) {
            return Some(tour);
        }

        let title_tokens = tokenize(&title);
        let matched = query_tokens
            .iter()
            .filter(|token| title_tokens.contains(token))
            .count();
        if matched == 0 {
            continue;
        }
        let score = matched as f32 / query_tokens.len().max(title_tokens.len()) as f32;
        if best.map_or(true, |(s, _)| score > s) {
            best = Some((score, tour));
        }
    }

    best.and_then(|(score, tour)| (score >= TITLE_MATCH_THRESHOLD).then_some(tour))
}

/// Symmetric token-set matcher: mean of the query-side and title-side
/// overlap ratios.
pub fn find_tour_by_similar_name<'a>(
    query: &str,
    catalog: &'a TourCatalog,
) -> Option<&'a TourRecord> {
    let query_tokens = tokenize(query);
    if query_tokens.is_empty() {
        return None;
    }

    let mut best: Option<(f32, &TourRecord)> = None;
    for tour in catalog.all() {
        let title_tokens = tokenize(&tour.title);
        if title_tokens.is_empty() {
            continue;
        }
        let common = query_tokens
            .iter()
            .filter(|token| title_tokens.contains(token))
            .count();
        if common == 0 {
            continue;
        }
        let query_ratio = common as f32 / query_tokens.len() as f32;
        let title_ratio = common as f32 / title_tokens.len() as f32;
        let score = (query_ratio + title_ratio) / 2.0;
        if best.map_or(true, |(s, _)| score > s) {
            best = Some((score, tour));
        }
    }

    best.and_then(|(score, tour)| (score >= SIMILAR_NAME_THRESHOLD).then_some(tour))
}

// ---------------------------------------------------------------------------
// Activity keyword search
// ---------------------------------------------------------------------------

pub struct ActivityGroup {
    pub label: &'static str,
    pub keywords: &'static [&'static str],
    pub weight: f32,
}

/// Activity synonym table. Keywords stay diacritic-spelled and are matched
/// on lowercase text: folding would turn "ăn" into the far-too-common "an".
pub const ACTIVITY_GROUPS: &[ActivityGroup] = &[
    ActivityGroup {
        label: "lặn biển",
        keywords: &["lặn", "biển", "snorkeling", "diving", "bơi"],
        weight: 2.0,
    },
    ActivityGroup {
        label: "ẩm thực",
        keywords: &["ăn uống", "đồ ăn", "món ăn", "ẩm thực", "ăn", "uống", "đặc sản", "hải sản"],
        weight: 2.0,
    },
    ActivityGroup {
        label: "bbq",
        keywords: &["bbq", "nướng", "tiệc nướng", "barbeque"],
        weight: 2.0,
    },
    ActivityGroup {
        label: "tham quan",
        keywords: &["tham quan", "khám phá", "du lịch", "check-in"],
        weight: 1.5,
    },
    ActivityGroup {
        label: "cầu rồng",
        keywords: &["cầu rồng", "phun lửa", "cầu"],
        weight: 1.5,
    },
    ActivityGroup {
        label: "biển",
        keywords: &["biển", "bãi biển", "bờ biển", "đại dương"],
        weight: 1.5,
    },
    ActivityGroup {
        label: "văn hóa",
        keywords: &["văn hóa", "lịch sử", "di sản", "truyền thống"],
        weight: 1.5,
    },
    ActivityGroup {
        label: "phố cổ",
        keywords: &["phố cổ", "làng chài", "nhà cổ"],
        weight: 1.5,
    },
];

const GENERIC_STOPWORDS: &[&str] = &[
    "tour", "du", "lịch", "về", "ở", "tại", "có", "những", "các", "và", "không", "nào", "gì",
    "thú", "vị",
];

const TITLE_BOOST: f32 = 1.5;
const GENERIC_TITLE_WEIGHT: f32 = 2.0;
const ACTIVITY_RESULT_LIMIT: usize = 2;
const GENERIC_RESULT_LIMIT: usize = 3;

fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(needle).count()
}

fn score_tours<'a>(
    catalog: &'a TourCatalog,
    keywords: &[&str],
    base_weight: f32,
    title_weight_is_flat: bool,
) -> Vec<(f32, &'a TourRecord)> {
    let mut results: Vec<(f32, &TourRecord)> = Vec::new();

    for tour in catalog.all() {
        let title = tour.title.to_lowercase();
        let description = tour.description.to_lowercase();
        let combined = format!("{title} {description}");

        let mut matched = 0usize;
        let mut total_weight = 0.0f32;
        for keyword in keywords {
            let weight = if title.contains(keyword) {
                if title_weight_is_flat {
                    GENERIC_TITLE_WEIGHT
                } else {
                    base_weight * TITLE_BOOST
                }
            } else {
                base_weight
            };
            let count = count_occurrences(&combined, keyword);
            if count > 0 {
                matched += 1;
                total_weight += weight * count as f32;
            }
        }

        if matched > 0 {
            let score = (matched as f32 / keywords.len() as f32) * total_weight;
            results.push((score, tour));
        }
    }

    results.sort_by(|a, b| b.0.total_cmp(&a.0));
    results
}

/// Weighted keyword-expansion search over titles and descriptions. A
/// direct activity hit searches with that group's synonyms and weight;
/// otherwise the query is stopword-stripped, expanded through the synonym
/// table, and scored with flat weights.
pub fn find_tours_by_activity<'a>(query: &str, catalog: &'a TourCatalog) -> Vec<&'a TourRecord> {
    let lower = query.to_lowercase();

    for group in ACTIVITY_GROUPS {
        if group.keywords.iter().any(|kw| lower.contains(kw)) {
            let scored = score_tours(catalog, group.keywords, group.weight, false);
            return scored
                .into_iter()
                .take(ACTIVITY_RESULT_LIMIT)
                .map(|(_, tour)| tour)
                .collect();
        }
    }

    let mut expanded: Vec<String> = Vec::new();
    for word in lower.split_whitespace() {
        if GENERIC_STOPWORDS.contains(&word) || word.chars().count() < 2 {
            continue;
        }
        if !expanded.iter().any(|seen| seen == word) {
            expanded.push(word.to_string());
        }
        for group in ACTIVITY_GROUPS {
            if group.keywords.contains(&word) {
                for keyword in group.keywords {
                    if !expanded.iter().any(|seen| seen == keyword) {
                        expanded.push((*keyword).to_string());
                    }
                }
                break;
            }
        }
    }

    if expanded.is_empty() {
        return Vec::new();
    }
    let keyword_refs: Vec<&str> = expanded.iter().map(String::as_str).collect();
    score_tours(catalog, &keyword_refs, 1.0, true)
        .into_iter()
        .take(GENERIC_RESULT_LIMIT)
        .map(|(_, tour)| tour)
        .collect()
}

// ---------------------------------------------------------------------------
// Question focus
// ---------------------------------------------------------------------------

const PRICE_FOCUS: &[&str] = &["giá bao nhiêu", "giá", "chi phí"];
const DURATION_FOCUS: &[&str] = &["thời gian", "kéo dài", "mấy ngày", "bao lâu"];
const DESCRIPTION_FOCUS: &[&str] = &["đặc điểm", "mô tả", "lịch trình", "có gì", "chương trình"];
const PARTICIPANTS_FOCUS: &[&str] = &["số người", "số lượng", "tối đa", "sức chứa", "quy mô"];

/// Which facet of a tour the user is asking about.
pub fn question_focus(query: &str) -> Topic {
    let lower = query.to_lowercase();
    if PRICE_FOCUS.iter().any(|kw| lower.contains(kw)) {
        Topic::Price
    } else if DURATION_FOCUS.iter().any(|kw| lower.contains(kw)) {
        Topic::Duration
    } else if DESCRIPTION_FOCUS.iter().any(|kw| lower.contains(kw)) {
        Topic::Description
    } else if PARTICIPANTS_FOCUS.iter().any(|kw| lower.contains(kw)) {
        Topic::MaxParticipants
    } else {
        Topic::All
    }
}
