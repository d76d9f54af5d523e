use crate::relay::types::AskContext;

/// Surrounding text is cut to this many characters before it enters the prompt
pub const SURROUNDING_TEXT_LIMIT: usize = 500;

/// Build the user message sent to the provider.
///
/// With any context present the prompt is a `Context:` block (page title, domain,
/// quoted selection, truncated surrounding text) followed by `Question: <question>`;
/// otherwise it is the raw question.
pub fn build_prompt(question: &str, context: Option<&AskContext>) -> String {
    let Some(context) = context else {
        return question.to_string();
    };

    let mut parts = Vec::new();

    if let Some(title) = non_empty(&context.page_title) {
        parts.push(format!("Page: {}", title));
    }
    if let Some(domain) = non_empty(&context.page_domain) {
        parts.push(format!("Domain: {}", domain));
    }
    if let Some(selected) = non_empty(&context.selected_text) {
        parts.push(format!("Selected text: \"{}\"", selected));
    }
    if let Some(surrounding) = non_empty(&context.surrounding_text) {
        let truncated: String = surrounding.chars().take(SURROUNDING_TEXT_LIMIT).collect();
        parts.push(format!("Context: {}...", truncated));
    }

    if parts.is_empty() {
        return question.to_string();
    }

    format!("Context:\n{}\n\nQuestion: {}", parts.join("\n"), question)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
