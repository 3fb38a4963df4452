//! Shared types for the refinement pipeline.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::{RefineContext, Session};
use crate::error::DownloadError;
use crate::pipeline::variants::{ForwardMessagePending, LongMessagePending, Refinable};

/// Service channel shared by long and forwarded messages.
pub const MULTI_MSG_SERVICE_ID: i32 = 35;

// ── Wire input ──────────────────────────────────────────────────────

/// A service message as separated from the wire envelope by the decoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceMessage {
    pub service_id: i32,
    pub content: String,
}

impl ServiceMessage {
    pub fn new(service_id: i32, content: impl Into<String>) -> Self {
        Self {
            service_id,
            content: content.into(),
        }
    }
}

/// Opaque key for content stored outside the chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ── Provenance ──────────────────────────────────────────────────────

/// Which variant produced a resolved element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OriginKind {
    Long,
    Forward,
}

impl OriginKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Forward => "forward",
        }
    }
}

impl fmt::Display for OriginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Provenance kept in front of every resolved payload so the original wire
/// form can be sent again verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageOrigin {
    pub original: ServiceMessage,
    pub resource_id: ResourceId,
    pub kind: OriginKind,
}

impl MessageOrigin {
    /// The service message this origin was resolved from.
    pub fn to_service_message(&self) -> ServiceMessage {
        self.original.clone()
    }
}

// ── Resolved payloads ───────────────────────────────────────────────

/// One message inside a forwarded conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardNode {
    pub sender_id: i64,
    #[serde(default)]
    pub sender_name: String,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub message_chain: MessageChain,
}

/// A resolved multi-node forwarded conversation.
///
/// Every text field is `""` when the markup did not carry it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForwardMessage {
    /// Secondary titles, in document order.
    pub preview: Vec<String>,
    pub title: String,
    pub brief: String,
    pub source: String,
    pub summary: String,
    pub node_list: Vec<ForwardNode>,
}

// ── Chain ───────────────────────────────────────────────────────────

/// One position in a message chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MessageElement {
    /// Plain text.
    Text(String),
    /// A service message no variant recognized. Passed through untouched.
    Service(ServiceMessage),
    /// Long message awaiting its text.
    LongPending(LongMessagePending),
    /// Forwarded conversation awaiting its nodes.
    ForwardPending(ForwardMessagePending),
    /// Provenance of the payload that follows it.
    Origin(MessageOrigin),
    /// Resolved forwarded conversation.
    Forward(ForwardMessage),
}

impl MessageElement {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    /// The refinable representation of a pending element. Service messages
    /// need the registry and return `None` here.
    pub fn as_refinable(&self) -> Option<Refinable> {
        match self {
            Self::LongPending(pending) => Some(Refinable::Long(pending.clone())),
            Self::ForwardPending(pending) => Some(Refinable::Forward(pending.clone())),
            _ => None,
        }
    }

    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Service(_) => "service",
            Self::LongPending(_) => "long_pending",
            Self::ForwardPending(_) => "forward_pending",
            Self::Origin(_) => "origin",
            Self::Forward(_) => "forward",
        }
    }
}

/// Ordered sequence of message elements. Order is meaningful.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageChain {
    elements: Vec<MessageElement>,
}

impl MessageChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&MessageElement> {
        self.elements.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MessageElement> {
        self.elements.iter()
    }

    pub fn elements(&self) -> &[MessageElement] {
        &self.elements
    }

    /// Replace the element at `index` with `replacement`, which may be empty
    /// or hold several elements. Everything else keeps its relative order.
    ///
    /// Returns `false` and leaves the chain untouched if `index` is out of range.
    pub fn replace_at(&mut self, index: usize, replacement: Vec<MessageElement>) -> bool {
        if index >= self.elements.len() {
            return false;
        }
        self.elements.splice(index..=index, replacement);
        true
    }

    /// All provenance records, in chain order.
    pub fn origins(&self) -> impl Iterator<Item = &MessageOrigin> {
        self.elements.iter().filter_map(|element| match element {
            MessageElement::Origin(origin) => Some(origin),
            _ => None,
        })
    }

    /// Rebuild the wire form: each `Origin` and the payload right after it
    /// collapse back into the original service message, and pending elements
    /// turn back into theirs.
    pub fn to_wire(&self) -> MessageChain {
        let mut out = Vec::with_capacity(self.elements.len());
        let mut iter = self.elements.iter().peekable();

        while let Some(element) = iter.next() {
            match element {
                MessageElement::Origin(origin) => {
                    let payload_follows = matches!(
                        (origin.kind, iter.peek()),
                        (OriginKind::Long, Some(MessageElement::Text(_)))
                            | (OriginKind::Forward, Some(MessageElement::Forward(_)))
                    );
                    if payload_follows {
                        iter.next();
                    }
                    out.push(MessageElement::Service(origin.to_service_message()));
                }
                MessageElement::LongPending(pending) => {
                    out.push(MessageElement::Service(pending.original.clone()));
                }
                MessageElement::ForwardPending(pending) => {
                    out.push(MessageElement::Service(pending.original.clone()));
                }
                other => out.push(other.clone()),
            }
        }

        MessageChain::from(out)
    }
}

impl From<Vec<MessageElement>> for MessageChain {
    fn from(elements: Vec<MessageElement>) -> Self {
        Self { elements }
    }
}

impl FromIterator<MessageElement> for MessageChain {
    fn from_iter<I: IntoIterator<Item = MessageElement>>(iter: I) -> Self {
        Self {
            elements: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a MessageChain {
    type Item = &'a MessageElement;
    type IntoIter = std::slice::Iter<'a, MessageElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl IntoIterator for MessageChain {
    type Item = MessageElement;
    type IntoIter = std::vec::IntoIter<MessageElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}

// ── Downloader capability ───────────────────────────────────────────

/// Fetches externally stored content by resource id.
///
/// Implementations own transport, retries and connection limits. The engine
/// treats both calls as fallible and free of side effects.
#[async_trait]
pub trait ResourceDownloader: Send + Sync {
    /// Full text of a long message.
    async fn fetch_long_text(
        &self,
        session: &Session,
        context: &RefineContext,
        resource_id: &ResourceId,
    ) -> Result<String, DownloadError>;

    /// Nodes of a forwarded conversation, in order.
    async fn fetch_forward_nodes(
        &self,
        session: &Session,
        context: &RefineContext,
        resource_id: &ResourceId,
    ) -> Result<Vec<ForwardNode>, DownloadError>;
}
