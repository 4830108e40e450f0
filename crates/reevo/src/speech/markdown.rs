use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref HEADER: Regex = Regex::new(r"(?m)^#{1,6}\s+").unwrap();
    static ref BOLD_STARS: Regex = Regex::new(r"\*\*([^*]+)\*\*").unwrap();
    static ref ITALIC_STAR: Regex = Regex::new(r"\*([^*]+)\*").unwrap();
    static ref BOLD_UNDERSCORES: Regex = Regex::new(r"__([^_]+)__").unwrap();
    static ref ITALIC_UNDERSCORE: Regex = Regex::new(r"_([^_]+)_").unwrap();
    static ref CODE_BLOCK: Regex = Regex::new(r"```[^`]*```").unwrap();
    static ref INLINE_CODE: Regex = Regex::new(r"`([^`]+)`").unwrap();
    static ref BULLET: Regex = Regex::new(r"(?m)^[ \t]*[-*+][ \t]+").unwrap();
    static ref NUMBERED: Regex = Regex::new(r"(?m)^[ \t]*\d+\.[ \t]+").unwrap();
    static ref LINK: Regex = Regex::new(r"\[([^\]]+)\]\([^)]+\)").unwrap();
    static ref BLANK_LINES: Regex = Regex::new(r"\n{3,}").unwrap();
    static ref SPACES: Regex = Regex::new(r" {2,}").unwrap();
    static ref DIVIDER: Regex = Regex::new(r"(?m)^[-=*]{3,}$").unwrap();
}

/// Remove markdown formatting so speech synthesis does not read it aloud.
///
/// Code blocks are dropped entirely; emphasis, inline code and links keep their text.
pub fn strip_markdown(text: &str) -> String {
    // fenced code goes first, its contents would otherwise be picked up as emphasis
    let text = CODE_BLOCK.replace_all(text, "");
    let text = DIVIDER.replace_all(&text, "");
    let text = HEADER.replace_all(&text, "");
    let text = BOLD_STARS.replace_all(&text, "$1");
    let text = BULLET.replace_all(&text, "");
    let text = ITALIC_STAR.replace_all(&text, "$1");
    let text = BOLD_UNDERSCORES.replace_all(&text, "$1");
    let text = ITALIC_UNDERSCORE.replace_all(&text, "$1");
    let text = INLINE_CODE.replace_all(&text, "$1");
    let text = NUMBERED.replace_all(&text, "");
    let text = LINK.replace_all(&text, "$1");
    let text = BLANK_LINES.replace_all(&text, "\n\n");
    let text = SPACES.replace_all(&text, " ");
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meeting_summary_is_flattened() {
        let raw = "Based on our records:\n\n**Meeting Summary:**\n- Date: September 10, 2024\n- Time: 2:00 PM\n\n## Action Items\n1. Sarah to finalize requirements\n2. John to review";
        let spoken = strip_markdown(raw);
        assert_eq!(
            spoken,
            "Based on our records:\n\nMeeting Summary:\nDate: September 10, 2024\nTime: 2:00 PM\n\nAction Items\nSarah to finalize requirements\nJohn to review"
        );
    }

    #[test]
    fn test_inline_formatting() {
        assert_eq!(
            strip_markdown("Use *this* and __that__ with `code` from [the docs](https://docs.example.com)"),
            "Use this and that with code from the docs"
        );
    }

    #[test]
    fn test_code_blocks_and_dividers_are_removed() {
        let raw = "Before\n```rust\nfn main() {}\n```\n---\nAfter   the    divider\n\n\n\nEnd";
        assert_eq!(strip_markdown(raw), "Before\n\nAfter the divider\n\nEnd");
    }
}
