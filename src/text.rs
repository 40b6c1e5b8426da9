//! String helpers shared by the finders, the matcher and the sanity pass.

use chrono::Datelike;

/// Keep letters, digits, whitespace and ASCII punctuation.
///
/// The metadata service rejects queries containing control characters and
/// assorted symbols, so every query string goes through this first.
pub fn restrict_chars(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || c.is_ascii_punctuation())
        .collect()
}

/// Lowercase and drop everything except letters and digits.
pub fn squash(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// True if the strings match once case, whitespace and punctuation are ignored.
pub fn about_equal(a: &str, b: &str) -> bool {
    squash(a) == squash(b)
}

/// Non-empty and only ASCII digits.
pub fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

pub fn current_year() -> i32 {
    chrono::Local::now().year()
}

/// 1 through 99 inclusive.
pub fn is_track_number(n: i64) -> bool {
    (1..=99).contains(&n)
}

/// 1600 through next year inclusive.
pub fn is_year(n: i64) -> bool {
    (1600..=i64::from(current_year()) + 1).contains(&n)
}

/// Left-pad with zeros to at least two characters.
pub fn zero_pad(s: &str) -> String {
    format!("{:0>2}", s)
}

/// Leading integer of a tag such as `"3/12"` or `" 07 "`.
pub fn leading_number(s: &str) -> Option<String> {
    let digits: String = s.trim().chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() { None } else { Some(digits) }
}

/// The year part of a `YYYY`, `YYYY-MM` or `YYYY-MM-DD` date.
pub fn year_of(date: &str) -> Option<&str> {
    date.split('-').next().filter(|y| !y.is_empty())
}

/// Replace path separators and colons so a value is safe as one file name.
pub fn translate_for_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '-',
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restrict_chars() {
        assert_eq!(restrict_chars("Sigur Rós\u{0007} ™"), "Sigur Rós ");
        assert_eq!(restrict_chars("AC/DC (Live)"), "AC/DC (Live)");
    }

    #[test]
    fn test_about_equal() {
        assert!(about_equal("Song Of Singing", "song of singing"));
        assert!(about_equal("Don't Stop", "dont stop"));
        assert!(!about_equal("Help", "Help!  Again"));
    }

    #[test]
    fn test_year_bounds() {
        assert!(is_year(1600));
        assert!(!is_year(1599));
        assert!(is_year(i64::from(current_year()) + 1));
        assert!(!is_year(i64::from(current_year()) + 2));
    }

    #[test]
    fn test_track_number_bounds() {
        assert!(!is_track_number(0));
        assert!(is_track_number(1));
        assert!(is_track_number(99));
        assert!(!is_track_number(100));
    }

    #[test]
    fn test_zero_pad() {
        assert_eq!(zero_pad("3"), "03");
        assert_eq!(zero_pad("10"), "10");
        assert_eq!(zero_pad("101"), "101");
    }

    #[test]
    fn test_leading_number() {
        assert_eq!(leading_number("3/12"), Some("3".to_string()));
        assert_eq!(leading_number(" 07 "), Some("07".to_string()));
        assert_eq!(leading_number("A1"), None);
    }

    #[test]
    fn test_year_of() {
        assert_eq!(year_of("1969-09-26"), Some("1969"));
        assert_eq!(year_of("1969"), Some("1969"));
        assert_eq!(year_of(""), None);
    }

    #[test]
    fn test_translate_for_filename() {
        assert_eq!(translate_for_filename("AC/DC: Live\\Dead"), "AC-DC- Live-Dead");
    }
}
