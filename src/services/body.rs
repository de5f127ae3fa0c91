// src/services/body.rs

//! Message page extraction.
//!
//! Two renderer generations exist in the archive. Current pages carry the
//! message id in an `X-Message-Id` comment and bracket the body with
//! `X-Body-of-Message` comments. Legacy pages list the id under an
//! emphasized `Message-ID` label and put the body in a `<pre>` block.
//! The layout is chosen by probing for those markers.

use std::sync::LazyLock;

use scraper::{Html, Node, Selector};
use thiserror::Error;

const MESSAGE_ID_TAG: &str = "X-Message-Id:";
const BODY_START: &str = "X-Body-of-Message";
const BODY_END: &str = "X-Body-of-Message-End";
const SEARCH_ICON: &str = "[🔎]";

static LI_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li").expect("static selector"));
static EM_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("em").expect("static selector"));
static PRE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("pre").expect("static selector"));

/// Id and literal body text recovered from a message page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedMessage {
    pub message_id: String,
    pub body: String,
}

/// Why a page yielded no message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractMiss {
    #[error("no known page layout")]
    UnknownLayout,

    #[error("no message id")]
    NoMessageId,

    #[error("no body for message {message_id}")]
    NoBody { message_id: String },
}

/// One archive renderer's page structure.
pub trait MessageLayout: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the page carries this layout's structural markers.
    fn matches(&self, document: &Html) -> bool;

    fn extract(&self, document: &Html) -> Result<ExtractedMessage, ExtractMiss>;
}

/// Comment-delimited layout written by current archive software.
pub struct CurrentTemplate;

impl MessageLayout for CurrentTemplate {
    fn name(&self) -> &'static str {
        "current"
    }

    fn matches(&self, document: &Html) -> bool {
        comments(document).any(|c| c == BODY_START)
    }

    fn extract(&self, document: &Html) -> Result<ExtractedMessage, ExtractMiss> {
        let mut message_id = None;
        let mut body: Option<String> = None;
        let mut in_body = false;

        for node in document.tree.root().descendants() {
            match node.value() {
                Node::Comment(comment) => {
                    let text = comment.trim();
                    if text == BODY_START {
                        in_body = true;
                        body.get_or_insert_with(String::new);
                    } else if text == BODY_END {
                        in_body = false;
                    } else if let Some(id) = text.strip_prefix(MESSAGE_ID_TAG) {
                        if message_id.is_none() {
                            message_id =
                                Some(html_escape::decode_html_entities(id.trim()).into_owned());
                        }
                    }
                }
                Node::Text(text) if in_body => {
                    if let Some(body) = body.as_mut() {
                        body.push_str(text);
                    }
                }
                _ => {}
            }
        }

        let message_id = message_id
            .filter(|id| !id.is_empty())
            .ok_or(ExtractMiss::NoMessageId)?;
        match body {
            Some(body) => {
                // Line breaks between the delimiters and the body block belong to the markup.
                let body = body.strip_prefix('\n').unwrap_or(&body);
                let body = body.strip_suffix('\n').unwrap_or(body);
                Ok(ExtractedMessage {
                    message_id,
                    body: body.to_string(),
                })
            }
            None => Err(ExtractMiss::NoBody { message_id }),
        }
    }
}

/// `<em>Message-ID</em>` plus `<pre>` layout of the older renderer.
pub struct LegacyTemplate;

impl LegacyTemplate {
    fn message_id_item(document: &Html) -> Option<String> {
        document.select(&LI_SELECTOR).find_map(|li| {
            let label: String = li.select(&EM_SELECTOR).next()?.text().collect();
            if !label.trim().eq_ignore_ascii_case("message-id") {
                return None;
            }
            let item: String = li.text().collect();
            let (_, rest) = item.split_once(label.as_str())?;
            Some(rest.to_string())
        })
    }
}

impl MessageLayout for LegacyTemplate {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn matches(&self, document: &Html) -> bool {
        Self::message_id_item(document).is_some()
    }

    fn extract(&self, document: &Html) -> Result<ExtractedMessage, ExtractMiss> {
        let message_id = Self::message_id_item(document)
            .map(|raw| clean_legacy_id(&raw))
            .filter(|id| !id.is_empty())
            .ok_or(ExtractMiss::NoMessageId)?;

        match document.select(&PRE_SELECTOR).next() {
            Some(pre) => Ok(ExtractedMessage {
                message_id,
                body: pre.text().collect(),
            }),
            None => Err(ExtractMiss::NoBody { message_id }),
        }
    }
}

/// `: <[🔎] id@host>` → `id@host`
fn clean_legacy_id(raw: &str) -> String {
    let id = raw.trim().trim_start_matches(':').replace(SEARCH_ICON, "");
    id.trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim()
        .to_string()
}

fn comments(document: &Html) -> impl Iterator<Item = &str> {
    document
        .tree
        .root()
        .descendants()
        .filter_map(|node| node.value().as_comment().map(|c| c.trim()))
}

/// Extracts (id, body) pairs from raw message pages.
pub struct BodyExtractor {
    layouts: Vec<Box<dyn MessageLayout>>,
}

impl BodyExtractor {
    pub fn new(layouts: Vec<Box<dyn MessageLayout>>) -> Self {
        Self { layouts }
    }

    pub fn extract(&self, html: &str) -> Result<ExtractedMessage, ExtractMiss> {
        let document = Html::parse_document(html);
        let layout = self
            .layouts
            .iter()
            .find(|layout| layout.matches(&document))
            .ok_or(ExtractMiss::UnknownLayout)?;
        log::trace!("Extracting with {} layout", layout.name());
        layout.extract(&document)
    }
}

impl Default for BodyExtractor {
    fn default() -> Self {
        Self::new(vec![Box::new(CurrentTemplate), Box::new(LegacyTemplate)])
    }
}
