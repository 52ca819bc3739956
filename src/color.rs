//! Perceptual color matching
//!
//! Colors are compared in plain RGB space:
//! - Parse a 6-digit hex color ("#RRGGBB" or "RRGGBB")
//! - Euclidean distance between the two RGB triples
//! - Normalize by the largest possible distance, √(3·255²)
//! - Similarity = 1 - normalized distance

/// Lowest precision a caller may ask for; anything below matches almost everything
pub const MIN_PRECISION: f64 = 0.1;
pub const MAX_PRECISION: f64 = 1.0;

/// Parse a 6-hex-digit color into RGB components
///
/// # Returns
/// * `None` if the string is not exactly six hex digits (after an optional '#')
pub fn hex_to_rgb(hex: &str) -> Option<[u8; 3]> {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }

    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

/// Similarity of two RGB colors in [0.0, 1.0]; identical colors give 1.0
pub fn rgb_similarity(a: [u8; 3], b: [u8; 3]) -> f64 {
    let distance: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt();
    let max_distance = (3.0 * 255.0_f64 * 255.0).sqrt();
    1.0 - distance / max_distance
}

/// Similarity of two hex colors, or None if either fails to parse
pub fn color_similarity(a: &str, b: &str) -> Option<f64> {
    Some(rgb_similarity(hex_to_rgb(a)?, hex_to_rgb(b)?))
}

/// Check whether two hex colors match at the given precision.
///
/// Precision is clamped to [0.1, 1.0]. Unparsable colors never match.
pub fn is_similar(a: &str, b: &str, precision: f64) -> bool {
    let threshold = precision.clamp(MIN_PRECISION, MAX_PRECISION);
    color_similarity(a, b).is_some_and(|similarity| similarity >= threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_parsing() {
        assert_eq!(hex_to_rgb("#FF8000"), Some([255, 128, 0]));
        assert_eq!(hex_to_rgb("00ff00"), Some([0, 255, 0]));
        assert_eq!(hex_to_rgb("#FFF"), None);
        assert_eq!(hex_to_rgb("#GGGGGG"), None);
        assert_eq!(hex_to_rgb("#ÿÿÿ"), None);
    }

    #[test]
    fn test_black_and_white_are_opposites() {
        assert!((color_similarity("#FFFFFF", "#000000").unwrap()).abs() < 1e-9);
        assert!(!is_similar("#FFFFFF", "#000000", 0.8));
    }

    #[test]
    fn test_near_colors_match() {
        assert!(is_similar("#FF0000", "#FE0101", 0.8));
        assert!(is_similar("#123456", "#123456", 1.0));
    }

    #[test]
    fn test_precision_is_clamped() {
        // 0.0 behaves like 0.1, so fully opposite colors still fail
        assert!(!is_similar("#FFFFFF", "#000000", 0.0));
        // Anything above 1.0 behaves like 1.0
        assert!(is_similar("#ABCDEF", "#ABCDEF", 7.0));
        assert!(!is_similar("#ABCDEF", "#ABCDEE", 7.0));
    }

    #[test]
    fn test_invalid_color_never_matches() {
        assert!(!is_similar("red", "#FF0000", 0.1));
    }
}
