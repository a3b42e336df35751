pub mod catalog;
pub mod extract;
pub mod intent;
pub mod models;
pub mod normalize;

pub use catalog::TourCatalog;
pub use extract::{
    find_tour_by_similar_name, find_tour_by_title, find_tours_by_activity, match_route,
    match_single_location, parse_price_bound, question_focus,
};
pub use intent::{classify, is_follow_up, is_tour_related, price_comparison};
pub use models::*;
pub use normalize::{fold_diacritics, normalize_text, tokenize};
