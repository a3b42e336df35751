use unicode_segmentation::UnicodeSegmentation;

/// Collapse runs of whitespace and trim.
pub fn normalize_text(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// Lowercase and strip Vietnamese diacritics. All pattern matching and
/// fuzzy scoring runs over this folded form so that queries typed without
/// tone marks ("da nang") still hit "Đà Nẵng".
pub fn fold_diacritics(input: &str) -> String {
    input
        .to_lowercase()
        .chars()
        .map(fold_char)
        .collect::<String>()
}

fn fold_char(c: char) -> char {
    match c {
        'à' | 'á' | 'ả' | 'ã' | 'ạ' | 'ă' | 'ằ' | 'ắ' | 'ẳ' | 'ẵ' | 'ặ' | 'â' | 'ầ' | 'ấ'
        | 'ẩ' | 'ẫ' | 'ậ' => 'a',
        'è' | 'é' | 'ẻ' | 'ẽ' | 'ẹ' | 'ê' | 'ề' | 'ế' | 'ể' | 'ễ' | 'ệ' => 'e',
        'ì' | 'í' | 'ỉ' | 'ĩ' | 'ị' => 'i',
        'ò' | 'ó' | 'ỏ' | 'õ' | 'ọ' | 'ô' | 'ồ' | 'ố' | 'ổ' | 'ỗ' | 'ộ' | 'ơ' | 'ờ' | 'ớ'
        | 'ở' | 'ỡ' | 'ợ' => 'o',
        'ù' | 'ú' | 'ủ' | 'ũ' | 'ụ' | 'ư' | 'ừ' | 'ứ' | 'ử' | 'ữ' | 'ự' => 'u',
        'ỳ' | 'ý' | 'ỷ' | 'ỹ' | 'ỵ' => 'y',
        'đ' => 'd',
        other => other,
    }
}

/// Folded lowercase word tokens.
pub fn tokenize(input: &str) -> Vec<String> {
    fold_diacritics(input)
        .unicode_words()
        .map(str::to_string)
        .collect()
}

/// Whole-word phrase containment on folded text.
pub fn contains_phrase(folded_haystack: &str, folded_phrase: &str) -> bool {
    if folded_phrase.is_empty() {
        return false;
    }
    let padded = format!(" {} ", folded_haystack);
    padded.contains(&format!(" {} ", folded_phrase))
}

/// Byte offset of the first whole-word occurrence, for ordered
/// co-occurrence checks.
pub fn phrase_position(folded_haystack: &str, folded_phrase: &str) -> Option<usize> {
    let padded = format!(" {} ", folded_haystack);
    padded.find(&format!(" {} ", folded_phrase))
}

/// Fraction of `query` tokens found in `other`.
pub fn token_overlap(query: &[String], other: &[String]) -> f32 {
    if query.is_empty() || other.is_empty() {
        return 0.0;
    }
    let matched = query.iter().filter(|token| other.contains(token)).count();
    matched as f32 / query.len() as f32
}

/// Containment score in either direction, used to resolve a free-text span
/// against a known location name.
pub fn containment_score(candidate: &str, known: &str) -> f32 {
    if candidate.is_empty() || known.is_empty() {
        return 0.0;
    }
    if candidate == known {
        return 1.0;
    }
    if known.contains(candidate) {
        return candidate.chars().count() as f32 / known.chars().count() as f32;
    }
    if candidate.contains(known) {
        return known.chars().count() as f32 / candidate.chars().count() as f32;
    }
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_vietnamese_place_names() {
        assert_eq!(fold_diacritics("Đà Nẵng"), "da nang");
        assert_eq!(fold_diacritics("Hà Nội"), "ha noi");
        assert_eq!(fold_diacritics("từ Hạ Long đến Vũng Tàu"), "tu ha long den vung tau");
    }

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize_text("  tour   Đà Nẵng \n"), "tour Đà Nẵng");
    }

    #[test]
    fn phrase_containment_is_word_bounded() {
        assert!(contains_phrase("co tour nao di da nang", "da nang"));
        assert!(!contains_phrase("dana tour", "da nang"));
        assert!(!contains_phrase("tourist season", "tour"));
    }

    #[test]
    fn ordered_positions() {
        let folded = "tu ha noi den da nang";
        let from = phrase_position(folded, "tu ha noi").unwrap();
        let to = phrase_position(folded, "den da nang").unwrap();
        assert!(from < to);
    }

    #[test]
    fn containment_score_either_direction() {
        assert!(containment_score("nang", "da nang") > 0.4);
        assert!(containment_score("da nang city", "da nang") > 0.7);
        assert_eq!(containment_score("hue", "da nang"), 0.0);
    }
}
