use crate::database::entities::QueryRecord;
use crate::error::AppError;
use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use std::fmt::Write;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Markdown,
    /// Rendered as markdown; the client turns it into a PDF
    Pdf,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Markdown => "markdown",
            ExportFormat::Pdf => "pdf",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Markdown | ExportFormat::Pdf => "text/markdown",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(ExportFormat::Json),
            "markdown" => Ok(ExportFormat::Markdown),
            "pdf" => Ok(ExportFormat::Pdf),
            other => Err(AppError::BadRequest(format!(
                "unsupported export format: {}",
                other
            ))),
        }
    }
}

pub fn filename(format: ExportFormat, now: DateTime<Utc>) -> String {
    format!(
        "peekai-history-{}.{}",
        now.format("%Y-%m-%d"),
        format.extension()
    )
}

/// Render records in `format` and wrap them in a base64 `data:` URL
pub fn render(
    format: ExportFormat,
    records: &[QueryRecord],
    now: DateTime<Utc>,
) -> Result<String, AppError> {
    let content = match format {
        ExportFormat::Json => serde_json::to_string_pretty(records)
            .map_err(|e| AppError::Internal(format!("Failed to serialize history: {}", e)))?,
        ExportFormat::Markdown | ExportFormat::Pdf => markdown(records, now),
    };

    Ok(format!(
        "data:{};base64,{}",
        format.content_type(),
        STANDARD.encode(content.as_bytes())
    ))
}

/// Decode a `data:` URL produced by [`render`] back into its text content
pub fn decode_data_url(url: &str) -> Option<String> {
    let (_, encoded) = url.strip_prefix("data:")?.split_once(";base64,")?;
    let bytes = STANDARD.decode(encoded).ok()?;
    String::from_utf8(bytes).ok()
}

fn markdown(records: &[QueryRecord], now: DateTime<Utc>) -> String {
    let mut out = format!(
        "# PeekAI Query History Export\n\nExported on: {}\nTotal queries: {}\n\n---\n\n",
        now.to_rfc3339(),
        records.len()
    );

    // Writing into a String cannot fail
    for (index, record) in records.iter().enumerate() {
        let _ = write!(
            out,
            "## Query {}\n\n**Date:** {}\n\n**Question:** {}\n\n**Answer:**\n{}\n\n",
            index + 1,
            record.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            record.question,
            record.answer
        );
        if let Some(title) = &record.page_title {
            let _ = write!(out, "**Page:** {}\n\n", title);
        }
        if let Some(url) = &record.page_url {
            let _ = write!(out, "**URL:** {}\n\n", url);
        }
        let _ = write!(
            out,
            "**Model:** {}\n\n**Response Time:** {}ms\n\n---\n\n",
            record.model_used, record.response_time_ms
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(question: &str) -> QueryRecord {
        QueryRecord {
            id: 7,
            user_id: "alice".to_string(),
            question: question.to_string(),
            answer: "Because.".to_string(),
            page_title: Some("Rust Book".to_string()),
            page_url: Some("https://doc.rust-lang.org/book/".to_string()),
            page_domain: Some("doc.rust-lang.org".to_string()),
            context_text: Some("Ownership is...".to_string()),
            selected_text: Some("borrow".to_string()),
            model_used: "openai/gpt-3.5-turbo".to_string(),
            response_time_ms: 321,
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("pdf".parse::<ExportFormat>().unwrap(), ExportFormat::Pdf);
        assert!(matches!(
            "docx".parse::<ExportFormat>(),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_filename_uses_export_date() {
        let now = Utc.with_ymd_and_hms(2025, 4, 9, 23, 59, 0).unwrap();
        assert_eq!(
            filename(ExportFormat::Markdown, now),
            "peekai-history-2025-04-09.markdown"
        );
    }

    #[test]
    fn test_markdown_layout() {
        let now = Utc::now();
        let url = render(ExportFormat::Markdown, &[record("Why?")], now).unwrap();
        assert!(url.starts_with("data:text/markdown;base64,"));

        let text = decode_data_url(&url).unwrap();
        assert!(text.starts_with("# PeekAI Query History Export\n"));
        assert!(text.contains("Total queries: 1"));
        assert!(text.contains("## Query 1"));
        assert!(text.contains("**Question:** Why?"));
        assert!(text.contains("**Page:** Rust Book"));
        assert!(text.contains("**Response Time:** 321ms"));
    }

    #[test]
    fn test_pdf_falls_back_to_markdown() {
        let url = render(ExportFormat::Pdf, &[], Utc::now()).unwrap();
        assert!(url.starts_with("data:text/markdown;base64,"));
        assert!(decode_data_url(&url).unwrap().contains("Total queries: 0"));
    }

    #[test]
    fn test_json_keeps_context_and_hides_owner() {
        let url = render(ExportFormat::Json, &[record("Why?")], Utc::now()).unwrap();
        let text = decode_data_url(&url).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value[0]["pageDomain"], "doc.rust-lang.org");
        assert_eq!(value[0]["selectedText"], "borrow");
        assert!(value[0].get("userId").is_none());

        let parsed: Vec<QueryRecord> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed[0].question, "Why?");
        assert_eq!(parsed[0].context_text.as_deref(), Some("Ownership is..."));
    }
}
