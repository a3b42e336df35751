use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One tour as loaded from the retrieval service. Immutable after catalog
/// load; `price` and `duration` stay display strings ("3.000.000 Đồng",
/// "3 Ngày") exactly as the source system stores them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TourRecord {
    pub code: String,
    pub title: String,
    pub description: String,
    pub destination: String,
    #[serde(default)]
    pub departure: Option<String>,
    pub price: String,
    pub duration: String,
    #[serde(default)]
    pub max_participants: u32,
}

impl TourRecord {
    /// Numeric price in đồng, extracted by stripping every non-digit
    /// character from the display string.
    pub fn price_value(&self) -> u64 {
        let digits: String = self.price.chars().filter(char::is_ascii_digit).collect();
        digits.parse().unwrap_or(0)
    }

    pub fn route_key(&self) -> Option<RouteKey> {
        self.departure.as_ref().map(|departure| RouteKey {
            departure: departure.clone(),
            destination: self.destination.clone(),
        })
    }

    /// Text blob the embedding index is built over.
    pub fn search_text(&self) -> String {
        format!(
            "{} {} {} {} {} {} {} {}",
            self.code,
            self.title,
            self.description,
            self.destination,
            self.departure.as_deref().unwrap_or(""),
            self.price,
            self.max_participants,
            self.duration
        )
    }
}

/// Retrieval projection: a scored match coming back from the vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TourHit {
    pub score: f32,
    #[serde(flatten)]
    pub record: TourRecord,
    pub text: String,
}

/// Client-facing projection used inside envelope `data.tours`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourView {
    pub title: String,
    pub description: String,
    pub price: String,
    pub duration: String,
    pub destination: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departure: Option<String>,
    pub max_participants: u32,
    pub code: String,
}

impl From<&TourRecord> for TourView {
    fn from(tour: &TourRecord) -> Self {
        Self {
            title: tour.title.clone(),
            description: tour.description.clone(),
            price: tour.price.clone(),
            duration: tour.duration.clone(),
            destination: tour.destination.clone(),
            departure: tour.departure.clone(),
            max_participants: tour.max_participants,
            code: tour.code.clone(),
        }
    }
}

/// A supported departure–destination pair, displayed as
/// "{departure} - {destination}".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteKey {
    pub departure: String,
    pub destination: String,
}

impl RouteKey {
    pub fn display(&self) -> String {
        format!("{} - {}", self.departure, self.destination)
    }

    pub fn parse(value: &str) -> Option<Self> {
        let (departure, destination) = value.split_once(" - ")?;
        let departure = departure.trim();
        let destination = destination.trim();
        if departure.is_empty() || destination.is_empty() {
            return None;
        }
        Some(Self {
            departure: departure.to_string(),
            destination: destination.to_string(),
        })
    }

    pub fn reversed(&self) -> Self {
        Self {
            departure: self.destination.clone(),
            destination: self.departure.clone(),
        }
    }

    /// Case-insensitive field equality against a tour record. Records
    /// without a departure degrade to destination-only matching.
    pub fn matches(&self, tour: &TourRecord) -> bool {
        let dest_ok = tour.destination.to_lowercase() == self.destination.to_lowercase();
        match tour.departure.as_deref() {
            Some(departure) => {
                dest_ok && departure.to_lowercase() == self.departure.to_lowercase()
            }
            None => dest_ok,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Empty,
    Region,
    Activity,
    SpecificTour,
    NewTour,
    FollowUp,
    SingleDestination,
    SingleDeparture,
    GeneralTour,
    PriceQuery,
    NonTour,
    Search,
}

/// Conversational focus: which facet of a tour the user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Price,
    Duration,
    Description,
    MaxParticipants,
    Route,
    Destination,
    Region,
    Interest,
    All,
}

impl Topic {
    pub fn as_key(self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Duration => "duration",
            Self::Description => "description",
            Self::MaxParticipants => "maxParticipants",
            Self::Route => "route",
            Self::Destination => "destination",
            Self::Region => "region",
            Self::Interest => "interest",
            Self::All => "all",
        }
    }
}

/// The three Vietnamese regions, with the fixed destination lookup the
/// region handler uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VnRegion {
    North,
    Central,
    South,
}

const NORTH_DESTINATIONS: &[&str] = &["ha noi", "ha long"];
const CENTRAL_DESTINATIONS: &[&str] = &["da nang", "hoi an", "da lat"];
const SOUTH_DESTINATIONS: &[&str] = &["sai gon", "vung tau", "nha trang"];

impl VnRegion {
    pub fn from_query(folded_query: &str) -> Option<Self> {
        if folded_query.contains("mien bac") {
            Some(Self::North)
        } else if folded_query.contains("mien trung") {
            Some(Self::Central)
        } else if folded_query.contains("mien nam") {
            Some(Self::South)
        } else {
            None
        }
    }

    pub fn of_destination(destination: &str) -> Option<Self> {
        let folded = crate::normalize::fold_diacritics(&destination.to_lowercase());
        if NORTH_DESTINATIONS.iter().any(|d| folded.contains(d)) {
            Some(Self::North)
        } else if CENTRAL_DESTINATIONS.iter().any(|d| folded.contains(d)) {
            Some(Self::Central)
        } else if SOUTH_DESTINATIONS.iter().any(|d| folded.contains(d)) {
            Some(Self::South)
        } else {
            None
        }
    }

    pub fn display(self) -> &'static str {
        match self {
            Self::North => "miền Bắc",
            Self::Central => "miền Trung",
            Self::South => "miền Nam",
        }
    }
}

/// Explicit price constraint parsed from the query. `approx` is applied
/// downstream as ±20%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PriceBound {
    pub min: Option<u64>,
    pub max: Option<u64>,
    pub approx: Option<u64>,
}

impl PriceBound {
    pub fn accepts(&self, price: u64) -> bool {
        if let Some(approx) = self.approx {
            let lo = approx - approx / 5;
            let hi = approx + approx / 5;
            return (lo..=hi).contains(&price);
        }
        if let Some(min) = self.min {
            if price < min {
                return false;
            }
        }
        if let Some(max) = self.max {
            if price > max {
                return false;
            }
        }
        true
    }
}

/// Cheapest-first or priciest-first, from "rẻ nhất" / "đắt nhất" cues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatch {
    pub route: RouteKey,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationMatch {
    pub location: String,
    pub is_departure: bool,
}

/// Per-session mutable record. Mutated only by the query handlers, after a
/// successful turn; fully cleared when the user pivots to a new search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub current_tour: Option<String>,
    pub last_tour_code: Option<String>,
    pub current_topic: Option<Topic>,
    pub query_counter: u64,
    pub last_destination: Option<String>,
    pub last_region: Option<VnRegion>,
    #[serde(default)]
    pub user_interests: Vec<String>,
}

impl ConversationState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn set_current_tour(&mut self, tour: &TourRecord, topic: Topic) {
        self.current_tour = Some(tour.code.clone());
        self.last_tour_code = Some(tour.code.clone());
        self.current_topic = Some(topic);
        self.last_destination = Some(tour.destination.clone());
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    pub session_id: String,
    pub state: ConversationState,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatInput {
    pub session_id: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    Warning,
    Error,
}

/// Uniform reply shape handed back to the caller for every query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub status: ResponseStatus,
    pub message: String,
    pub data: Option<Value>,
    pub error: Option<String>,
}

impl ResponseEnvelope {
    pub fn success(message: impl Into<String>, data: Value) -> Self {
        Self {
            status: ResponseStatus::Success,
            message: message.into(),
            data: Some(data),
            error: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Warning,
            message: message.into(),
            data: None,
            error: None,
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            message: String::new(),
            data: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tour() -> TourRecord {
        TourRecord {
            code: "T1".into(),
            title: "Tour Đà Nẵng 3 ngày".into(),
            description: "Khám phá biển".into(),
            destination: "Đà Nẵng".into(),
            departure: Some("Hà Nội".into()),
            price: "3.000.000 Đồng".into(),
            duration: "3 Ngày".into(),
            max_participants: 20,
        }
    }

    #[test]
    fn price_value_strips_formatting() {
        assert_eq!(tour().price_value(), 3_000_000);
    }

    #[test]
    fn route_key_roundtrip() {
        let key = RouteKey::parse("Hà Nội - Đà Nẵng").unwrap();
        assert_eq!(key.display(), "Hà Nội - Đà Nẵng");
        assert!(key.matches(&tour()));
    }

    #[test]
    fn route_key_degrades_without_departure() {
        let mut record = tour();
        record.departure = None;
        let key = RouteKey::parse("Sài Gòn - Đà Nẵng").unwrap();
        assert!(key.matches(&record));
    }

    #[test]
    fn region_lookup_matches_fixed_table() {
        assert_eq!(VnRegion::of_destination("Đà Nẵng"), Some(VnRegion::Central));
        assert_eq!(VnRegion::of_destination("Hà Nội"), Some(VnRegion::North));
        assert_eq!(VnRegion::of_destination("Vũng Tàu"), Some(VnRegion::South));
        assert_eq!(VnRegion::of_destination("Mặt Trăng"), None);
    }

    #[test]
    fn approx_bound_is_twenty_percent() {
        let bound = PriceBound {
            approx: Some(1_000_000),
            ..Default::default()
        };
        assert!(bound.accepts(900_000));
        assert!(bound.accepts(1_200_000));
        assert!(!bound.accepts(1_300_000));
    }
}
