//! Rendering Notion blocks into plain event descriptions.

use serde_json::Value;

/// Render one block to a line of text, or `None` for blocks without any
/// text (dividers, images, empty paragraphs).
pub fn render_block(block: &Value) -> Option<String> {
    let kind = block.get("type")?.as_str()?;
    let rich_text = block.get(kind)?.get("rich_text")?.as_array()?;

    if rich_text.is_empty() {
        return None;
    }

    let text: String = rich_text
        .iter()
        .filter_map(|t| t.get("plain_text").and_then(Value::as_str))
        .collect();

    let rendered = match kind {
        "bulleted_list_item" | "numbered_list_item" => format!("• {}", text),
        _ if kind.starts_with("heading_") => format!("\n{}\n", text.to_uppercase()),
        "to_do" => {
            let checked = block
                .get(kind)
                .and_then(|b| b.get("checked"))
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let marker = if checked { "✅" } else { "☐" };
            format!("{} {}", marker, text)
        }
        _ => text,
    };

    Some(rendered)
}
