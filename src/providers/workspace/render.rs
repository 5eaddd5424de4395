use serde_json::Value;

use super::api::{Block, plain_text};

/// Markdown-ish line for one block, without children.
pub(super) fn render_block(block: &Block, depth: usize) -> Option<String> {
    let data = block.body.get(&block.kind)?;
    let text = data.get("rich_text").map(plain_text).unwrap_or_default();
    let indent = "  ".repeat(depth);

    let line = match block.kind.as_str() {
        "paragraph" => text,
        "heading_1" => format!("# {text}"),
        "heading_2" => format!("## {text}"),
        "heading_3" => format!("### {text}"),
        "bulleted_list_item" | "toggle" => format!("- {text}"),
        "numbered_list_item" => format!("1. {text}"),
        "to_do" => {
            let checked = data.get("checked").and_then(Value::as_bool).unwrap_or(false);
            format!("- [{}] {text}", if checked { "x" } else { " " })
        }
        "quote" | "callout" => format!("> {text}"),
        "code" => {
            let language = data.get("language").and_then(Value::as_str).unwrap_or("");
            format!("```{language}\n{text}\n```")
        }
        "divider" => "---".to_string(),
        "child_page" | "child_database" => {
            let title = data.get("title").and_then(Value::as_str).unwrap_or("");
            format!("[{}: {title}]", block.kind)
        }
        _ if !text.is_empty() => text,
        _ => return None,
    };

    Some(format!("{indent}{line}"))
}
