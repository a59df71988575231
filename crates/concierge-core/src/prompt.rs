//! System-instruction assembly for the concierge.

use std::collections::BTreeMap;

use serde_json::Value;

/// Settings key under which an operator-edited template is stored.
pub const SYSTEM_PROMPT_KEY: &str = "assistant.system_prompt";

/// Built-in template used when no template has been stored.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are the concierge on a consulting firm's website. You help visitors \
understand the firm's services, published ideas, case studies and tools, and \
decide whether to start a conversation with the team.

Company facts:
- The firm helps organisations plan and ship AI, data and software projects.
- Engagements start with a free discovery call; pricing is scoped per project.
- Ideas, case studies and tools on the site are written by the firm's experts.

Guidelines:
- Be concise, friendly and concrete. Never invent clients, figures or prices.
- If you cannot answer from the facts above, say so plainly and offer to pass \
the question to the team.
- To pass a question on, ask for an email address or phone number, then call \
the `notify_team` tool with the contact details and the question. Tell the \
visitor whether the hand-off succeeded using the tool's result.";

/// Visitor-supplied context (page, name, company, ...).
pub type UserContext = BTreeMap<String, Value>;

/// Build the system instruction from an optional stored template and
/// optional visitor context.
pub fn compose(template: Option<&str>, context: Option<&UserContext>) -> String {
    let base = template
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);

    let lines: Vec<String> = context
        .into_iter()
        .flatten()
        .filter_map(|(key, value)| render_value(value).map(|v| format!("- {key}: {v}")))
        .collect();

    if lines.is_empty() {
        return base.to_owned();
    }

    format!("{base}\n\nVisitor context:\n{}", lines.join("\n"))
}

fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_owned())
        }
        Value::Array(a) if a.is_empty() => None,
        Value::Object(o) if o.is_empty() => None,
        other => Some(other.to_string()),
    }
}
