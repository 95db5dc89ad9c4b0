//! # Default Prompt Templates
//!
//! Templates for the SQL generation stage. Placeholders are substituted with
//! [`build_user_prompt`].

/// Sentinel the model must reply with when the question cannot be answered.
pub const CANNOT_ANSWER_SENTINEL: &str = "ERROR:";

/// The system prompt for SQL generation.
pub const SQL_SYSTEM_PROMPT: &str = r#"You are a PostgreSQL expert. Write one read-only SQL query that answers the user's question using the schema provided.

# Rules
1. Output a single `SELECT` statement and nothing else: no explanations, no comments, no trailing semicolon.
2. Never write statements that change data or structure (INSERT, UPDATE, DELETE, DROP, ALTER, CREATE, TRUNCATE, GRANT, REVOKE, EXECUTE).
3. Use only tables and columns that appear in the schema. Do not use placeholders for table or column names.
4. Alias aggregates with a short, lowercase name (e.g. `COUNT(*) AS count`).
5. Unless the user asks for everything, select only the columns needed to answer, not `SELECT *`.
6. If the schema is marked as possibly incomplete, prefer the columns that are listed over guessing new ones.
7. If the question cannot be answered from the schema, reply with `ERROR:` followed by a one-line reason."#;

/// The user prompt for SQL generation.
///
/// Placeholders: `{schema}`, `{question}`
pub const SQL_USER_PROMPT: &str = "# Schema\n{schema}\n\n# Question\n{question}";

/// Fills [`SQL_USER_PROMPT`] with a schema context and a question.
pub fn build_user_prompt(schema: &str, question: &str) -> String {
    SQL_USER_PROMPT
        .replace("{schema}", schema.trim_end())
        .replace("{question}", question.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_user_prompt() {
        let prompt = build_user_prompt("CREATE TABLE orders (\n  id BIGINT\n);\n", "  How many orders? ");
        assert_eq!(
            prompt,
            "# Schema\nCREATE TABLE orders (\n  id BIGINT\n);\n\n# Question\nHow many orders?"
        );
    }

    #[test]
    fn test_system_prompt_mentions_sentinel() {
        assert!(SQL_SYSTEM_PROMPT.contains(CANNOT_ANSWER_SENTINEL));
    }
}
