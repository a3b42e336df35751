use std::collections::HashMap;

use crate::models::{PriceOrder, RouteKey, TourHit, TourRecord};

/// Destination value meaning "unknown" in the source data; never surfaced
/// as a supported route.
const UNKNOWN_DESTINATION: &str = "Khác";

/// Read-only snapshot of every known tour, indexed by code and by route.
/// Built once per process from the retrieval service and never updated
/// within a run.
#[derive(Debug, Default, Clone)]
pub struct TourCatalog {
    tours: Vec<TourRecord>,
    by_code: HashMap<String, usize>,
    route_buckets: Vec<(RouteKey, Vec<usize>)>,
    supported: Vec<RouteKey>,
}

impl TourCatalog {
    pub fn from_records(records: Vec<TourRecord>) -> Self {
        let mut catalog = Self::default();

        for record in records {
            let idx = catalog.tours.len();
            if catalog.by_code.contains_key(&record.code) {
                continue;
            }
            catalog.by_code.insert(record.code.clone(), idx);

            if let Some(route) = record.route_key() {
                if record.destination != UNKNOWN_DESTINATION {
                    let bucket = catalog
                        .route_buckets
                        .iter_mut()
                        .find(|(key, _)| *key == route);
                    match bucket {
                        Some((_, indices)) => indices.push(idx),
                        None => {
                            catalog.route_buckets.push((route.clone(), vec![idx]));
                            catalog.supported.push(route);
                        }
                    }
                }
            }

            catalog.tours.push(record);
        }

        catalog
    }

    pub fn from_hits(hits: Vec<TourHit>) -> Self {
        Self::from_records(hits.into_iter().map(|hit| hit.record).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.tours.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tours.len()
    }

    pub fn all(&self) -> &[TourRecord] {
        &self.tours
    }

    pub fn by_code(&self, code: &str) -> Option<&TourRecord> {
        self.by_code.get(code).map(|&idx| &self.tours[idx])
    }

    /// Case-insensitive exact match on the destination field.
    pub fn by_destination(&self, destination: &str) -> Vec<&TourRecord> {
        let wanted = destination.to_lowercase();
        self.tours
            .iter()
            .filter(|tour| tour.destination.to_lowercase() == wanted)
            .collect()
    }

    /// Tours on a route. Bucket membership alone is not trusted: every
    /// record is re-validated against both route fields to exclude
    /// anything mis-bucketed.
    pub fn by_route(&self, route: &RouteKey) -> Vec<&TourRecord> {
        let wanted = route.display().to_lowercase();
        self.route_buckets
            .iter()
            .find(|(key, _)| key.display().to_lowercase() == wanted)
            .map(|(key, indices)| {
                indices
                    .iter()
                    .map(|&idx| &self.tours[idx])
                    .filter(|tour| key.matches(tour))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Supported routes in first-seen order.
    pub fn supported_routes(&self) -> &[RouteKey] {
        &self.supported
    }

    pub fn is_supported_route(&self, route: &RouteKey) -> bool {
        let wanted = route.display().to_lowercase();
        self.supported
            .iter()
            .any(|key| key.display().to_lowercase() == wanted)
    }

    /// Every departure and destination seen across supported routes,
    /// deduplicated, first-seen order.
    pub fn known_locations(&self) -> Vec<String> {
        let mut locations: Vec<String> = Vec::new();
        for route in &self.supported {
            for place in [&route.departure, &route.destination] {
                if !locations
                    .iter()
                    .any(|seen| seen.to_lowercase() == place.to_lowercase())
                {
                    locations.push(place.clone());
                }
            }
        }
        locations
    }

    /// Tours ordered by numeric price, optionally restricted to one route
    /// bucket. Ties keep catalog order.
    pub fn sorted_by_price(
        &self,
        order: PriceOrder,
        route: Option<&RouteKey>,
    ) -> Vec<&TourRecord> {
        let mut tours: Vec<&TourRecord> = match route {
            Some(route) => self.by_route(route),
            None => self.tours.iter().collect(),
        };

        match order {
            PriceOrder::Ascending => tours.sort_by_key(|tour| tour.price_value()),
            PriceOrder::Descending => {
                tours.sort_by_key(|tour| std::cmp::Reverse(tour.price_value()))
            }
        }
        tours
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(code: &str, title: &str, departure: &str, destination: &str, price: &str) -> TourRecord {
        TourRecord {
            code: code.into(),
            title: title.into(),
            description: String::new(),
            destination: destination.into(),
            departure: Some(departure.into()),
            price: price.into(),
            duration: "3 Ngày".into(),
            max_participants: 20,
        }
    }

    fn catalog() -> TourCatalog {
        TourCatalog::from_records(vec![
            record("T1", "Tour Đà Nẵng 3 ngày", "Hà Nội", "Đà Nẵng", "3.000.000 Đồng"),
            record("T2", "Tour Hội An", "Đà Nẵng", "Hội An", "1.000.000 Đồng"),
            record("T3", "Tour Hội An cao cấp", "Đà Nẵng", "Hội An", "5.000.000 Đồng"),
            record("T4", "Tour bí ẩn", "Hà Nội", "Khác", "9.000.000 Đồng"),
        ])
    }

    #[test]
    fn destination_lookup_is_exact_and_unique() {
        let catalog = catalog();
        let hits = catalog.by_destination("đà nẵng");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].code, "T1");
        assert!(hits.iter().all(|t| t.destination.to_lowercase() == "đà nẵng"));
    }

    #[test]
    fn route_lookup_revalidates_fields() {
        let catalog = catalog();
        let route = RouteKey::parse("Đà Nẵng - Hội An").unwrap();
        let hits = catalog.by_route(&route);
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|t| route.matches(t)));
    }

    #[test]
    fn unknown_destination_is_not_supported() {
        let catalog = catalog();
        assert!(!catalog
            .supported_routes()
            .iter()
            .any(|route| route.destination == "Khác"));
        // but the tour itself is still reachable by code
        assert!(catalog.by_code("T4").is_some());
    }

    #[test]
    fn supported_routes_keep_first_seen_order() {
        let catalog = catalog();
        let displays: Vec<String> = catalog
            .supported_routes()
            .iter()
            .map(RouteKey::display)
            .collect();
        assert_eq!(displays, vec!["Hà Nội - Đà Nẵng", "Đà Nẵng - Hội An"]);
    }

    #[test]
    fn duplicate_codes_are_loaded_once() {
        let twice = TourCatalog::from_records(vec![
            record("T1", "Tour Đà Nẵng", "Hà Nội", "Đà Nẵng", "3.000.000 Đồng"),
            record("T1", "Tour Đà Nẵng", "Hà Nội", "Đà Nẵng", "3.000.000 Đồng"),
        ]);
        assert_eq!(twice.len(), 1);
        assert_eq!(twice.by_destination("Đà Nẵng").len(), 1);
    }

    #[test]
    fn price_ordering() {
        let catalog = catalog();
        let route = RouteKey::parse("Đà Nẵng - Hội An").unwrap();
        let cheapest = catalog.sorted_by_price(PriceOrder::Ascending, Some(&route));
        assert_eq!(cheapest[0].code, "T2");
        let priciest = catalog.sorted_by_price(PriceOrder::Descending, None);
        assert_eq!(priciest[0].code, "T4");
    }

    #[test]
    fn empty_catalog_never_panics() {
        let empty = TourCatalog::default();
        assert!(empty.by_destination("Đà Nẵng").is_empty());
        assert!(empty
            .by_route(&RouteKey::parse("A - B").unwrap())
            .is_empty());
        assert!(empty.known_locations().is_empty());
        assert!(empty.sorted_by_price(PriceOrder::Ascending, None).is_empty());
    }
}
