//! Message normalization: drop the bot's own @mention, convert HTML to markdown, trim.
//!
//! Webex hands back whatever the sender typed as HTML, but messages can only be
//! posted as markdown, so the body is converted once here and reused for both
//! command matching and the broadcast itself.

use crate::webex::MessageBody;
use regex::Regex;

/// HTML to markdown conversion.
pub trait MarkupConverter: Send + Sync {
    fn to_markdown(&self, html: &str) -> String;
}

/// Converter backed by the `html2md` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct Html2Markdown;

impl MarkupConverter for Html2Markdown {
    fn to_markdown(&self, html: &str) -> String {
        html2md::parse_html(html)
    }
}

/// Remove every mention element (`<spark-mention ...>name</spark-mention>` or self-closing)
/// whose attributes reference `bot_id`. Mentions of anyone else are left alone.
pub fn strip_self_mention(html: &str, bot_id: &str) -> String {
    if bot_id.is_empty() {
        return html.to_string();
    }
    let pattern = format!(
        r"(?s)<(?:spark-)?mention\b[^>]*?{}[^>]*?(?:/>|>.*?</(?:spark-)?mention\s*>)",
        regex::escape(bot_id)
    );
    match Regex::new(&pattern) {
        Ok(re) => re.replace_all(html, "").into_owned(),
        Err(e) => {
            log::warn!("mention pattern failed to compile: {}", e);
            html.to_string()
        }
    }
}

/// Full normalization pipeline; the result is plain markdown ready for matching and re-posting.
pub fn normalize(html: &str, bot_id: &str, converter: &dyn MarkupConverter) -> String {
    log::debug!("pre-normalized body: {:?}", html);
    let stripped = strip_self_mention(html, bot_id);
    let text = converter.to_markdown(&stripped).trim().to_string();
    log::debug!("normalized body: {:?}", text);
    text
}

/// Normalize a fetched body. Plain text carries no markup or mention elements, so it is
/// only trimmed; running it through the converter would eat literal `<` and `&`.
pub fn normalize_body(body: &MessageBody, bot_id: &str, converter: &dyn MarkupConverter) -> String {
    match body {
        MessageBody::Html(html) => normalize(html, bot_id, converter),
        MessageBody::Text(text) => text.trim().to_string(),
    }
}
