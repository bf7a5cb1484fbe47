//! Normalization of marketplace price strings.
//!
//! Steam renders prices per currency (`"$12.34"`, `"1 234,56 pуб."`, `"12,34€"`),
//! so everything except digits and separators is discarded before parsing.

/// Parse a textual price into a number.
///
/// Returns `0.0` when nothing numeric remains. Callers treat `0.0` as "no valid price".
pub fn parse_price(text: &str) -> f64 {
    let kept: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    let trimmed = kept.trim_matches('.');
    if trimmed.is_empty() {
        return 0.0;
    }

    // Only the last separator is a decimal point; earlier ones are digit grouping.
    let normalized = match trimmed.rfind('.') {
        Some(idx) => {
            let (int_part, frac_part) = trimmed.split_at(idx);
            format!("{}{}", int_part.replace('.', ""), frac_part)
        }
        None => trimmed.to_string(),
    };

    match normalized.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => value,
        _ => 0.0,
    }
}

/// Parse an optional price, treating absence like empty text.
pub fn parse_price_opt(text: Option<&str>) -> f64 {
    text.map(parse_price).unwrap_or(0.0)
}

/// Parse an integer count such as a trade volume (`"1,234"`), ignoring grouping.
pub fn parse_count(text: &str) -> u64 {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rouble_with_space_grouping() {
        assert_eq!(parse_price("1 234,56 ₽"), 1234.56);
    }

    #[test]
    fn test_dollar_price() {
        assert_eq!(parse_price("$12.34"), 12.34);
        assert_eq!(parse_price("$12.34 USD"), 12.34);
    }

    #[test]
    fn test_trailing_abbreviation_dot() {
        assert_eq!(parse_price("12,34 pуб."), 12.34);
    }

    #[test]
    fn test_mixed_grouping_and_decimal() {
        assert_eq!(parse_price("1,234.56"), 1234.56);
        assert_eq!(parse_price("1.234,56€"), 1234.56);
    }

    #[test]
    fn test_comma_is_decimal_alias() {
        assert_eq!(parse_price("0,03"), 0.03);
    }

    #[test]
    fn test_already_numeric() {
        assert_eq!(parse_price("42"), 42.0);
        assert_eq!(parse_price("42.5"), 42.5);
    }

    #[test]
    fn test_no_numeric_content_is_zero() {
        assert_eq!(parse_price(""), 0.0);
        assert_eq!(parse_price("₽"), 0.0);
        assert_eq!(parse_price("N/A"), 0.0);
        assert_eq!(parse_price(".,."), 0.0);
        assert_eq!(parse_price_opt(None), 0.0);
    }

    #[test]
    fn test_never_negative() {
        for input in ["-5", "-0,5 ₽", "--", "−12.00", "1e5", "∞"] {
            let value = parse_price(input);
            assert!(value >= 0.0, "{input} parsed to {value}");
            assert!(value.is_finite());
        }
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("1,234"), 1234);
        assert_eq!(parse_count("87"), 87);
        assert_eq!(parse_count(""), 0);
        assert_eq!(parse_count("none"), 0);
    }
}
