use std::sync::OnceLock;

use regex::Regex;

use crate::error::AppError;

const ENTITY_ID_MAX: usize = 128;

/// Entity ids are opaque store document ids. They are never empty, never
/// oversized, and never contain path separators or whitespace.
pub fn validate_entity_id(id: &str) -> Result<(), AppError> {
    if id.is_empty() {
        return Err(AppError::Validation("empty entity id".to_string()));
    }

    if id.len() > ENTITY_ID_MAX {
        return Err(AppError::Validation(format!(
            "entity id longer than {ENTITY_ID_MAX} bytes"
        )));
    }

    if id
        .chars()
        .any(|c| c == '/' || c.is_whitespace() || c.is_control())
    {
        return Err(AppError::Validation(format!("malformed entity id: {id}")));
    }

    Ok(())
}

/// Truncates on a character boundary, never mid code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

static DURATION_RE: OnceLock<Regex> = OnceLock::new();

/// Parses an ISO-8601 duration of the `PT#H#M#S` shape into seconds.
/// Anything unparseable counts as zero seconds.
pub fn parse_iso8601_duration(raw: &str) -> u32 {
    let re = DURATION_RE.get_or_init(|| {
        Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?$").expect("duration regex")
    });

    let Some(captures) = re.captures(raw.trim()) else {
        return 0;
    };

    let part = |index: usize| {
        captures
            .get(index)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .unwrap_or(0)
    };

    part(1) * 3600 + part(2) * 60 + part(3)
}
