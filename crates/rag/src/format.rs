//! Input sanitization and response formatting

use crate::retriever::RetrievalResult;
use docquery_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};

/// Maximum characters of source content echoed back to callers
const SOURCE_PREVIEW_CHARS: usize = 500;

/// Ratio of non-alphanumeric characters above which a message is
/// rejected as likely garbage or obfuscation
const MAX_SPECIAL_CHAR_RATIO: f64 = 0.3;

/// One turn of conversation history, owned by the (external) chat store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl ConversationTurn {
    pub fn user(message: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            message: message.into(),
        }
    }

    pub fn assistant(message: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            message: message.into(),
        }
    }
}

/// A source reference returned with an answer
#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    /// Content preview, capped at 500 characters
    pub content: String,
    pub document_name: String,
    pub department: String,
    pub relevance_score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

/// Strip control characters (keeping newline and tab) and collapse
/// whitespace
pub fn sanitize_input(text: &str) -> String {
    let filtered: String = text
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();

    filtered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reject empty or oversized messages
pub fn validate_message_length(message: &str, max_length: usize) -> Result<()> {
    if message.trim().is_empty() {
        return Err(AppError::Validation {
            message: "Message cannot be empty".to_string(),
            field: Some("question".to_string()),
        });
    }
    if message.len() > max_length {
        return Err(AppError::Validation {
            message: format!("Message too long. Maximum {} characters allowed", max_length),
            field: Some("question".to_string()),
        });
    }
    Ok(())
}

/// Reject messages with SQL-injection shapes or excessive symbol noise
pub fn validate_message_content(message: &str) -> Result<()> {
    let sql_patterns = [
        r"(?i)(\bDROP\b|\bDELETE\b|\bINSERT\b|\bUPDATE\b).*\bTABLE\b",
        r"(?i);\s*(DROP|DELETE|INSERT|UPDATE)",
    ];

    for pattern in sql_patterns {
        let re = regex_lite::Regex::new(pattern).map_err(|e| AppError::Internal {
            message: format!("invalid validation pattern: {}", e),
        })?;
        if re.is_match(message) {
            return Err(AppError::Validation {
                message: "Invalid characters or patterns detected".to_string(),
                field: Some("question".to_string()),
            });
        }
    }

    let total = message.chars().count();
    if total > 0 {
        let special = message
            .chars()
            .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
            .count();
        if special as f64 / total as f64 > MAX_SPECIAL_CHAR_RATIO {
            return Err(AppError::Validation {
                message: "Message contains too many special characters".to_string(),
                field: Some("question".to_string()),
            });
        }
    }

    Ok(())
}

/// Render history turns as `User:` / `Assistant:` lines for prompts
pub fn format_chat_history(turns: &[ConversationTurn]) -> String {
    turns
        .iter()
        .map(|turn| match turn.role {
            TurnRole::User => format!("User: {}", turn.message),
            TurnRole::Assistant => format!("Assistant: {}", turn.message),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Concatenate retrieved chunks into the context block, tagged with
/// source, department, and section, in retrieval order
pub fn format_context(retrieved: &[RetrievalResult]) -> String {
    retrieved
        .iter()
        .enumerate()
        .map(|(i, result)| {
            let section = result
                .metadata
                .section_path
                .as_deref()
                .map(|path| format!(", section: {}", path))
                .unwrap_or_default();
            format!(
                "[Source {n} - {file} from {dept} department{section}]\n{content}",
                n = i + 1,
                file = result.metadata.filename,
                dept = result.department,
                section = section,
                content = result.content,
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Clean an LLM completion: collapse whitespace and strip leading
/// role-echo artifacts
pub fn clean_response(response: &str) -> String {
    let mut cleaned = response.split_whitespace().collect::<Vec<_>>().join(" ");

    for artifact in ["Answer:", "Response:", "AI:", "Assistant:"] {
        if let Some(rest) = cleaned.strip_prefix(artifact) {
            cleaned = rest.trim_start().to_string();
        }
    }

    cleaned
}

/// Confidence is the average similarity of the sources used, clamped
/// to [0, 1] and rounded to 3 decimals
pub fn calculate_confidence(retrieved: &[RetrievalResult]) -> f32 {
    if retrieved.is_empty() {
        return 0.0;
    }

    let avg = retrieved.iter().map(|r| r.score).sum::<f32>() / retrieved.len() as f32;
    let clamped = avg.clamp(0.0, 1.0);
    (clamped * 1000.0).round() / 1000.0
}

/// Shape retrieved chunks into caller-facing source references
pub fn format_sources(retrieved: &[RetrievalResult]) -> Vec<SourceRef> {
    retrieved
        .iter()
        .map(|result| SourceRef {
            content: result.content.chars().take(SOURCE_PREVIEW_CHARS).collect(),
            document_name: result.metadata.filename.clone(),
            department: result.department.clone(),
            relevance_score: (result.score * 1000.0).round() / 1000.0,
            section: result.metadata.section_path.clone(),
            page: result.metadata.page,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use docquery_common::index::ChunkMetadata;
    use uuid::Uuid;

    fn result(content: &str, score: f32, section: Option<&str>) -> RetrievalResult {
        RetrievalResult {
            content: content.to_string(),
            metadata: ChunkMetadata {
                document_id: Uuid::new_v4(),
                filename: "handbook.md".to_string(),
                department: "HR".to_string(),
                section_path: section.map(|s| s.to_string()),
                header_level: None,
                page: None,
            },
            score,
            department: "HR".to_string(),
        }
    }

    #[test]
    fn test_sanitize_strips_control_chars() {
        assert_eq!(sanitize_input("hello\u{0000}world"), "helloworld");
        assert_eq!(sanitize_input("a\tb\nc"), "a b c");
        assert_eq!(sanitize_input("  spaced   out  "), "spaced out");
    }

    #[test]
    fn test_validate_length() {
        assert!(validate_message_length("fine", 100).is_ok());
        assert!(validate_message_length("", 100).is_err());
        assert!(validate_message_length("   ", 100).is_err());
        assert!(validate_message_length(&"x".repeat(101), 100).is_err());
    }

    #[test]
    fn test_validate_content_sql_shape() {
        assert!(validate_message_content("DROP the TABLE now").is_err());
        assert!(validate_message_content("weird; DELETE stuff").is_err());
        assert!(validate_message_content("How do I update my address?").is_ok());
    }

    #[test]
    fn test_validate_content_special_chars() {
        assert!(validate_message_content("$$$###@@@!!!").is_err());
        assert!(validate_message_content("What is the leave policy?").is_ok());
    }

    #[test]
    fn test_format_chat_history() {
        let history = vec![
            ConversationTurn::user("How much leave do I get?"),
            ConversationTurn::assistant("Twenty days per year."),
        ];
        let formatted = format_chat_history(&history);
        assert_eq!(
            formatted,
            "User: How much leave do I get?\nAssistant: Twenty days per year."
        );
    }

    #[test]
    fn test_format_context_tags() {
        let retrieved = vec![
            result("Twenty days of leave.", 0.9, Some("Handbook > Leave")),
            result("Dental starts day one.", 0.8, None),
        ];
        let context = format_context(&retrieved);

        assert!(context.contains(
            "[Source 1 - handbook.md from HR department, section: Handbook > Leave]"
        ));
        assert!(context.contains("[Source 2 - handbook.md from HR department]"));
        assert!(context.contains("Twenty days of leave."));
    }

    #[test]
    fn test_clean_response_strips_artifacts() {
        assert_eq!(clean_response("Answer:  Twenty days."), "Twenty days.");
        assert_eq!(clean_response("Assistant: Sure."), "Sure.");
        assert_eq!(clean_response("Plain reply"), "Plain reply");
        assert_eq!(clean_response("Spread   over\n\nlines"), "Spread over lines");
    }

    #[test]
    fn test_confidence_is_average() {
        let retrieved = vec![result("a", 0.8, None), result("b", 0.6, None)];
        assert!((calculate_confidence(&retrieved) - 0.7).abs() < 1e-6);
        assert_eq!(calculate_confidence(&[]), 0.0);
    }

    #[test]
    fn test_source_preview_capped() {
        let long = "y".repeat(600);
        let sources = format_sources(&[result(&long, 0.5, Some("S"))]);
        assert_eq!(sources[0].content.len(), 500);
        assert_eq!(sources[0].section.as_deref(), Some("S"));
        assert_eq!(sources[0].department, "HR");
    }
}
