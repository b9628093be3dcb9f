/// Shorten a long event description for the report.
///
/// Descriptions over `max_len` characters keep their first sentence (plus the
/// second one if the first is short), falling back to a hard cut, and always
/// end in an ellipsis.
pub fn truncate_description(description: &str, max_len: usize) -> String {
    let description = description.trim();
    if description.chars().count() <= max_len {
        return description.to_string();
    }

    let mut sentences = description.split(". ");
    let mut truncated = sentences.next().unwrap_or_default().to_string();
    if truncated.chars().count() < max_len * 2 / 3 {
        if let Some(second) = sentences.next() {
            truncated.push_str(". ");
            truncated.push_str(second);
        }
    }
    if truncated.chars().count() > max_len {
        truncated = description.chars().take(max_len).collect();
    }
    format!("{}...", truncated)
}

/// Format an integer with thousands separators: 12345 -> "12,345"
pub fn format_count(value: usize) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Percentage of `part` in `whole`, 0.0 when `whole` is zero
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
