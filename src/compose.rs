use crate::providers::{Fact, Section};

pub const GREETING: &str = "*Всем привет!👋*";

/// Assemble facts into the Markdown message. Never empty: the greeting is always there.
pub fn compose(facts: &[Fact]) -> String {
    let mut ordered: Vec<&Fact> = facts.iter().collect();
    ordered.sort_by_key(|f| f.section);

    let mut message = format!("{GREETING}\n");
    for fact in ordered {
        if let Some(line) = render(fact) {
            message.push_str(&line);
            message.push('\n');
        }
    }
    message
}

fn render(fact: &Fact) -> Option<String> {
    match &fact.content {
        Some(content) if content.trim().is_empty() => None,
        Some(content) => Some(content.trim().to_string()),
        None if fact.is_critical => Some(failure_line(fact)),
        None => None,
    }
}

/// Line shown in place of a critical fact that could not be produced.
pub fn failure_line(fact: &Fact) -> String {
    match fact.section {
        Section::Weather => crate::providers::weather::DEGRADED_TEXT.to_string(),
        _ => format!("Ошибка при получении данных: {}.", fact.source_name),
    }
}
