//! Turns a raw model reply into a single SQL candidate.

use crate::{
    errors::AskError, prompts::core::CANNOT_ANSWER_SENTINEL, validator::forbidden_keyword,
};
use regex::Regex;
use std::sync::LazyLock;

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```(?:sql|query|postgresql)?\s*\n?([\s\S]*?)```").expect("valid code fence regex")
});

static SELECT_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bSELECT\b").expect("valid select regex"));

static LINE_START_SELECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*(SELECT)\b").expect("valid line start select regex")
});

/// Extracts the SQL candidate from a model reply.
///
/// Code fences are stripped. A reply that starts with the cannot-answer
/// sentinel, is empty, or contains no `SELECT` is a generation failure.
///
/// When prose surrounds the query, the query starts at the first line that
/// begins with `SELECT` (else at the first `SELECT` word) and ends at the first
/// semicolon or blank line. If the reply contains a denylisted keyword anywhere,
/// nothing is cut and the whole reply is returned, so the validator rejects it
/// and the rejection keeps what the model wrote.
pub fn parse_generated_sql(raw: &str) -> Result<String, AskError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AskError::GenerationFailed(
            "the model returned an empty response".to_string(),
        ));
    }
    if let Some(reason) = sentinel_reason(trimmed) {
        return Err(AskError::GenerationFailed(reason));
    }

    let unfenced = CODE_FENCE
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or(trimmed);
    if let Some(reason) = sentinel_reason(unfenced) {
        return Err(AskError::GenerationFailed(reason));
    }

    let upper = unfenced.to_ascii_uppercase();
    let candidate = if upper.starts_with("SELECT") || upper.starts_with("WITH") {
        unfenced
    } else {
        let start = select_start(unfenced).ok_or_else(|| {
            AskError::GenerationFailed(format!(
                "the model did not return a query: {}",
                first_line(unfenced)
            ))
        })?;
        if forbidden_keyword(unfenced).is_some() {
            unfenced
        } else {
            let tail = &unfenced[start..];
            let end = [tail.find(';'), tail.find("\n\n")]
                .into_iter()
                .flatten()
                .min()
                .unwrap_or(tail.len());
            &tail[..end]
        }
    };

    let sql = candidate.trim().trim_end_matches(';').trim_end();
    if sql.is_empty() {
        return Err(AskError::GenerationFailed(
            "the model returned an empty query".to_string(),
        ));
    }
    Ok(sql.to_string())
}

// A `SELECT` opening a line beats the verb "select" used earlier in prose.
fn select_start(text: &str) -> Option<usize> {
    LINE_START_SELECT
        .captures(text)
        .and_then(|caps| caps.get(1))
        .or_else(|| SELECT_WORD.find(text))
        .map(|m| m.start())
}

fn sentinel_reason(text: &str) -> Option<String> {
    let rest = text.strip_prefix(CANNOT_ANSWER_SENTINEL)?;
    let reason = rest.trim();
    Some(if reason.is_empty() {
        "the model could not answer the question".to_string()
    } else {
        format!("the model could not answer the question: {reason}")
    })
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default().trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::is_safe;

    #[test]
    fn test_plain_select_passes_through() {
        assert_eq!(
            parse_generated_sql("SELECT COUNT(*) FROM orders").unwrap(),
            "SELECT COUNT(*) FROM orders"
        );
    }

    #[test]
    fn test_code_fences_and_semicolons_are_stripped() {
        let raw = "```sql\nSELECT id FROM users;\n```";
        assert_eq!(parse_generated_sql(raw).unwrap(), "SELECT id FROM users");
        let raw = "```\nselect 1\n```";
        assert_eq!(parse_generated_sql(raw).unwrap(), "select 1");
    }

    #[test]
    fn test_query_is_rescued_from_prose() {
        let raw = "Sure! Here is the query:\nSELECT name FROM products WHERE price > 10;\nIt lists products.";
        assert_eq!(
            parse_generated_sql(raw).unwrap(),
            "SELECT name FROM products WHERE price > 10"
        );
    }

    #[test]
    fn test_with_queries_are_returned_unchanged() {
        let raw = "WITH t AS (SELECT 1) SELECT * FROM t";
        assert_eq!(parse_generated_sql(raw).unwrap(), raw);
    }

    #[test]
    fn test_sentinel_is_a_generation_failure() {
        let err = parse_generated_sql("ERROR: no table holds weather data").unwrap_err();
        assert!(matches!(&err, AskError::GenerationFailed(m) if m.contains("no table holds weather data")));
        let err = parse_generated_sql("```\nERROR:\n```").unwrap_err();
        assert!(matches!(err, AskError::GenerationFailed(_)));
    }

    #[test]
    fn test_empty_or_queryless_reply_fails() {
        assert!(matches!(
            parse_generated_sql("   "),
            Err(AskError::GenerationFailed(_))
        ));
        assert!(matches!(
            parse_generated_sql("I am not sure what you mean."),
            Err(AskError::GenerationFailed(_))
        ));
    }

    #[test]
    fn test_line_start_select_beats_prose_verb() {
        let raw = "I'll select the orders table:\nSELECT COUNT(*) FROM orders";
        assert_eq!(parse_generated_sql(raw).unwrap(), "SELECT COUNT(*) FROM orders");
    }

    #[test]
    fn test_inline_select_is_rescued_when_no_line_starts_with_one() {
        let raw = "Here you go: SELECT id FROM users; hope that helps";
        assert_eq!(parse_generated_sql(raw).unwrap(), "SELECT id FROM users");
    }

    #[test]
    fn test_forbidden_keywords_are_never_cut_away() {
        let raw = "Here you go: SELECT * FROM users; DELETE FROM users";
        let sql = parse_generated_sql(raw).unwrap();
        assert_eq!(sql, raw);
        assert!(!is_safe(&sql));

        let sql = parse_generated_sql("DROP TABLE orders; SELECT 1").unwrap();
        assert_eq!(sql, "DROP TABLE orders; SELECT 1");
        assert!(!is_safe(&sql));

        let raw = "Sure:\nSELECT 1;\n\nThen run DROP TABLE orders;";
        assert_eq!(
            parse_generated_sql(raw).unwrap(),
            "Sure:\nSELECT 1;\n\nThen run DROP TABLE orders"
        );
    }

    #[test]
    fn test_statements_starting_with_select_are_kept_whole() {
        assert_eq!(
            parse_generated_sql("SELECT 1; DROP TABLE orders").unwrap(),
            "SELECT 1; DROP TABLE orders"
        );
    }
}
