use anyhow::{Result, bail};

pub fn escape_xml(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Splits a comma separated id list, dropping blanks: `"a, b,,c"` -> `[a, b, c]`.
pub fn split_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses an ownership share such as `40`, `12.5` or `60%`.
pub fn parse_percentage(raw: &str) -> Result<f64> {
    let trimmed = raw.trim();
    let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
    let Ok(value) = number.parse::<f64>() else {
        bail!("'{raw}' is not a percentage");
    };
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        bail!("percentage must be within 0..=100, got {value}");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_trims_ids() {
        assert_eq!(split_ids(" a, b,,c "), vec!["a", "b", "c"]);
        assert!(split_ids("").is_empty());
    }

    #[test]
    fn parses_percentages() {
        assert_eq!(parse_percentage("60%").unwrap(), 60.0);
        assert_eq!(parse_percentage(" 12.5 ").unwrap(), 12.5);
        assert!(parse_percentage("101").is_err());
        assert!(parse_percentage("lots").is_err());
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_xml("A & <B>"), "A &amp; &lt;B&gt;");
    }
}
