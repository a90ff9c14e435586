use std::time::Duration;

use anyhow::Context;
use axum::async_trait;
use base64::Engine;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use time::Date;

/// Fixed disjunction of subject keywords the scan searches for, in Korean
/// and English.
const SUBSCRIPTION_QUERY: &str = "(subject:\"구독\" OR subject:\"결제\" OR subject:\"subscription\" OR subject:\"billing\" OR subject:\"invoice\" OR subject:\"receipt\" OR subject:\"payment\" OR subject:\"영수증\" OR subject:\"결제 완료\" OR subject:\"갱신\" OR subject:\"renewal\")";

/// Page size for message list requests; the source caps pages at 100.
const PAGE_SIZE: usize = 100;

/// Extracted bodies are capped to keep downstream prompts bounded.
pub const BODY_LIMIT: usize = 3000;

#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    pub max_results: usize,
    pub after: Option<Date>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageRef {
    pub id: String,
}

/// One fetched mailbox message, normalized for extraction.
///
/// Immutable once fetched; lives for the duration of a single scan.
#[derive(Debug, Clone)]
pub struct EmailRecord {
    pub id: String,
    pub subject: String,
    pub from: String,
    pub to: String,
    pub date: String,
    pub body: String,
    pub snippet: String,
}

#[async_trait]
pub trait MailboxClient: Send + Sync {
    async fn search(
        &self,
        access_token: &str,
        options: SearchOptions,
    ) -> anyhow::Result<Vec<MessageRef>>;

    async fn fetch_detail(
        &self,
        access_token: &str,
        message_id: &str,
    ) -> anyhow::Result<EmailRecord>;
}

/// Gmail REST implementation of [`MailboxClient`].
pub struct GmailMailbox {
    http: Client,
    base_url: String,
}

impl GmailMailbox {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("build gmail http client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

// ---- wire types (Gmail `users.messages` resource) ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Message {
    id: String,
    #[serde(default)]
    snippet: String,
    payload: Option<MessagePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MessagePart {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    headers: Vec<MessageHeader>,
    body: Option<PartBody>,
    parts: Option<Vec<MessagePart>>,
}

#[derive(Debug, Deserialize)]
struct MessageHeader {
    name: String,
    value: String,
}

#[derive(Debug, Default, Deserialize)]
struct PartBody {
    data: Option<String>,
}

#[async_trait]
impl MailboxClient for GmailMailbox {
    async fn search(
        &self,
        access_token: &str,
        options: SearchOptions,
    ) -> anyhow::Result<Vec<MessageRef>> {
        if options.max_results == 0 {
            return Ok(Vec::new());
        }
        let query = build_query(options.after);
        let mut collected: Vec<MessageRef> = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page_size = PAGE_SIZE.min(options.max_results - collected.len());
            let mut request = self
                .http
                .get(format!("{}/users/me/messages", self.base_url))
                .bearer_auth(access_token)
                .query(&[("q", query.as_str())])
                .query(&[("maxResults", page_size)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let page: MessageList = request
                .send()
                .await
                .context("message list request")?
                .error_for_status()
                .context("message list status")?
                .json()
                .await
                .context("message list body")?;

            collected.extend(page.messages);
            page_token = page.next_page_token;
            if page_token.is_none() || collected.len() >= options.max_results {
                break;
            }
        }

        collected.truncate(options.max_results);
        Ok(collected)
    }

    async fn fetch_detail(
        &self,
        access_token: &str,
        message_id: &str,
    ) -> anyhow::Result<EmailRecord> {
        let message: Message = self
            .http
            .get(format!("{}/users/me/messages/{}", self.base_url, message_id))
            .bearer_auth(access_token)
            .query(&[("format", "full")])
            .send()
            .await
            .context("message get request")?
            .error_for_status()
            .context("message get status")?
            .json()
            .await
            .context("message get body")?;

        let payload = message.payload.unwrap_or_default();
        let body = truncate_chars(&extract_body(&payload), BODY_LIMIT);
        Ok(EmailRecord {
            id: message.id,
            subject: header_value(&payload.headers, "Subject"),
            from: header_value(&payload.headers, "From"),
            to: header_value(&payload.headers, "To"),
            date: header_value(&payload.headers, "Date"),
            body,
            snippet: message.snippet,
        })
    }
}

fn build_query(after: Option<Date>) -> String {
    match after {
        Some(date) => format!(
            "{} after:{:04}/{:02}/{:02}",
            SUBSCRIPTION_QUERY,
            date.year(),
            date.month() as u8,
            date.day()
        ),
        None => SUBSCRIPTION_QUERY.to_string(),
    }
}

/// Headers arrive with source-defined casing; match them case-insensitively.
fn header_value(headers: &[MessageHeader], name: &str) -> String {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.clone())
        .unwrap_or_default()
}

/// Pull a usable text body out of a MIME tree: top-level data first, then
/// immediate parts (plain text preferred over stripped HTML), then nested
/// multiparts one level at a time.
pub(crate) fn extract_body(payload: &MessagePart) -> String {
    if let Some(data) = payload.body.as_ref().and_then(|b| b.data.as_deref()) {
        if let Some(text) = decode_part(data) {
            return text;
        }
    }

    if let Some(parts) = &payload.parts {
        if let Some(part) = parts.iter().find(|p| p.mime_type == "text/plain") {
            if let Some(data) = part.body.as_ref().and_then(|b| b.data.as_deref()) {
                if let Some(text) = decode_part(data) {
                    return text;
                }
            }
        }

        if let Some(part) = parts.iter().find(|p| p.mime_type == "text/html") {
            if let Some(data) = part.body.as_ref().and_then(|b| b.data.as_deref()) {
                if let Some(html) = decode_part(data) {
                    return strip_html(&html);
                }
            }
        }

        for part in parts {
            if part.parts.is_some() {
                let nested = extract_body(part);
                if !nested.is_empty() {
                    return nested;
                }
            }
        }
    }

    String::new()
}

/// Gmail encodes part bodies as URL-safe base64, usually unpadded.
fn decode_part(data: &str) -> Option<String> {
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(data.trim_end_matches('='))
        .ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

lazy_static! {
    static ref STYLE_RE: Regex = Regex::new(r"(?is)<style[^>]*>.*?</style>").unwrap();
    static ref SCRIPT_RE: Regex = Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap();
    static ref TAG_RE: Regex = Regex::new(r"<[^>]+>").unwrap();
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
}

pub(crate) fn strip_html(html: &str) -> String {
    let text = STYLE_RE.replace_all(html, "");
    let text = SCRIPT_RE.replace_all(&text, "");
    let text = TAG_RE.replace_all(&text, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    WHITESPACE_RE.replace_all(&text, " ").trim().to_string()
}

/// Character-based truncation; message bodies are routinely multibyte.
pub(crate) fn truncate_chars(s: &str, limit: usize) -> String {
    s.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use serde_json::json;

    fn encode(text: &str) -> String {
        URL_SAFE_NO_PAD.encode(text.as_bytes())
    }

    fn part(value: serde_json::Value) -> MessagePart {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn build_query_appends_date_bound() {
        let date = time::macros::date!(2025 - 02 - 08);
        let query = build_query(Some(date));
        assert!(query.starts_with(SUBSCRIPTION_QUERY));
        assert!(query.ends_with("after:2025/02/08"));
        assert_eq!(build_query(None), SUBSCRIPTION_QUERY);
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let payload = part(json!({
            "headers": [
                { "name": "SUBJECT", "value": "Your receipt" },
                { "name": "from", "value": "no-reply@spotify.com" }
            ]
        }));
        assert_eq!(header_value(&payload.headers, "Subject"), "Your receipt");
        assert_eq!(header_value(&payload.headers, "From"), "no-reply@spotify.com");
        assert_eq!(header_value(&payload.headers, "Date"), "");
    }

    #[test]
    fn extract_body_prefers_top_level_data() {
        let payload = part(json!({
            "body": { "data": encode("top level") },
            "parts": [
                { "mimeType": "text/plain", "body": { "data": encode("part text") } }
            ]
        }));
        assert_eq!(extract_body(&payload), "top level");
    }

    #[test]
    fn extract_body_prefers_plain_text_part() {
        let payload = part(json!({
            "parts": [
                { "mimeType": "text/html", "body": { "data": encode("<p>html</p>") } },
                { "mimeType": "text/plain", "body": { "data": encode("plain wins") } }
            ]
        }));
        assert_eq!(extract_body(&payload), "plain wins");
    }

    #[test]
    fn extract_body_strips_html_only_parts() {
        let html = "<html><style>p { color: red; }</style><body><p>Netflix&nbsp;&amp;&nbsp;chill</p>\n\n<b>17,000원</b></body></html>";
        let payload = part(json!({
            "parts": [
                { "mimeType": "text/html", "body": { "data": encode(html) } }
            ]
        }));
        let body = extract_body(&payload);
        assert!(!body.contains('<'));
        assert!(!body.contains("color: red"));
        assert!(body.contains("Netflix & chill"));
        // repeated whitespace collapses to single spaces
        assert!(!body.contains("  "));
    }

    #[test]
    fn extract_body_recurses_into_nested_parts() {
        let payload = part(json!({
            "parts": [
                { "mimeType": "application/pdf" },
                {
                    "mimeType": "multipart/alternative",
                    "parts": [
                        { "mimeType": "text/plain", "body": { "data": encode("nested text") } }
                    ]
                }
            ]
        }));
        assert_eq!(extract_body(&payload), "nested text");
    }

    #[test]
    fn extract_body_empty_when_nothing_usable() {
        let payload = part(json!({ "parts": [ { "mimeType": "image/png" } ] }));
        assert_eq!(extract_body(&payload), "");
        assert_eq!(extract_body(&MessagePart::default()), "");
    }

    #[test]
    fn decode_part_accepts_padded_input() {
        let padded = base64::engine::general_purpose::URL_SAFE.encode("padded?!".as_bytes());
        assert_eq!(decode_part(&padded).unwrap(), "padded?!");
    }

    #[test]
    fn truncate_chars_is_multibyte_safe() {
        let s = "구독 안내 메일입니다";
        assert_eq!(truncate_chars(s, 2), "구독");
        assert_eq!(truncate_chars("short", 3000), "short");
    }

    #[test]
    fn strip_html_unescapes_entities() {
        assert_eq!(
            strip_html("a &lt;tag&gt; &quot;quoted&quot; &#39;x&#39;"),
            "a <tag> \"quoted\" 'x'"
        );
    }
}
