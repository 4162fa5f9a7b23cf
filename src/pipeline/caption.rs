//! Captions and notices posted alongside items.

use crate::naming::escape_html;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━";

/// Builds an upload caption: topic, file and batch sections in that order,
/// framed by rules, followed by the credit line.
#[must_use]
pub fn build_caption(topic: &str, file_name: &str, batch_name: &str, credit: &str) -> String {
    format!(
        "{RULE}\n\
         <b>Topic:</b> {topic}\n\
         <b>File:</b> {file}\n\
         <pre>📘 ʙᴀᴛᴄʜ : {batch}</pre>\n\
         {RULE}\n\
         <b>👤 Uploaded By: {credit}</b>",
        topic = escape_html(topic),
        file = escape_html(file_name),
        batch = escape_html(batch_name),
        credit = escape_html(credit),
    )
}

/// Notice posted when an upload yields no addressable message.
#[must_use]
pub fn uploaded_notice(file_name: &str) -> String {
    format!("Uploaded: {}", escape_html(file_name))
}

/// Notice posted when an item fails.
#[must_use]
pub fn failure_notice(file_name: &str, reason: &str) -> String {
    format!("⚠️ Failed: {}\n{}", escape_html(file_name), escape_html(reason))
}

/// Notice posted to the initial chat when items went elsewhere.
#[must_use]
pub fn completion_notice(destination: impl std::fmt::Display) -> String {
    format!("✅ Done! Check target chat/channel: {destination}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caption_section_order() {
        let caption = build_caption("Optics", "Lens 1", "Physics", "Team");
        let topic = caption.find("<b>Topic:</b> Optics").unwrap_or(usize::MAX);
        let file = caption.find("<b>File:</b> Lens 1").unwrap_or(usize::MAX);
        let batch = caption.find("ʙᴀᴛᴄʜ : Physics").unwrap_or(usize::MAX);
        assert!(topic < file && file < batch && batch < usize::MAX, "{caption}");
        assert!(caption.ends_with("Uploaded By: Team</b>"));
    }

    #[test]
    fn test_caption_escapes_values() {
        let caption = build_caption("A<B", "x&y", "b", "c");
        assert!(caption.contains("A&lt;B"));
        assert!(caption.contains("x&amp;y"));
    }

    #[test]
    fn test_failure_notice_format() {
        assert_eq!(
            failure_notice("Lens 1", "HTTP 404"),
            "⚠️ Failed: Lens 1\nHTTP 404"
        );
    }
}
