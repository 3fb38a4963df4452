//! The two refinable variants carried on the multi-message service channel.
//!
//! - Long message: the markup is only a preview; the full text is fetched.
//! - Forward message: title/brief/summary/source come from the markup, the
//!   node list is fetched.
//!
//! Both return `[Origin, payload]` so the original envelope survives.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::{RefineContext, Session};
use crate::error::RefineError;
use crate::pipeline::markup::{
    extract_all_tag_bodies, extract_attribute, extract_first_tag_body, slice_after_marker,
    slice_before_marker,
};
use crate::pipeline::types::{
    ForwardMessage, ForwardNode, MessageChain, MessageElement, MessageOrigin, OriginKind,
    ResourceDownloader, ResourceId, ServiceMessage,
};

/// A long message whose full text still has to be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongMessagePending {
    pub original: ServiceMessage,
    pub resource_id: ResourceId,
}

/// A forwarded conversation whose nodes still have to be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardMessagePending {
    pub original: ServiceMessage,
    pub resource_id: ResourceId,
    /// `m_fileName` from the envelope, logged with the node fetch. May be empty.
    #[serde(default)]
    pub file_name: String,
}

/// Anything the engine can resolve. Closed set; dispatch is a `match`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refinable {
    Long(LongMessagePending),
    Forward(ForwardMessagePending),
}

impl Refinable {
    pub fn kind(&self) -> OriginKind {
        match self {
            Self::Long(_) => OriginKind::Long,
            Self::Forward(_) => OriginKind::Forward,
        }
    }

    pub fn resource_id(&self) -> &ResourceId {
        match self {
            Self::Long(pending) => &pending.resource_id,
            Self::Forward(pending) => &pending.resource_id,
        }
    }

    /// Resolve into the elements that replace this one in `chain`.
    pub async fn refine(
        &self,
        downloader: &dyn ResourceDownloader,
        session: &Session,
        chain: &MessageChain,
        context: &RefineContext,
    ) -> Result<Vec<MessageElement>, RefineError> {
        debug!(
            kind = %self.kind(),
            resource_id = %self.resource_id(),
            chain_len = chain.len(),
            "Refining element"
        );
        match self {
            Self::Long(pending) => pending.refine(downloader, session, context).await,
            Self::Forward(pending) => pending.refine(downloader, session, context).await,
        }
    }
}

impl LongMessagePending {
    pub async fn refine(
        &self,
        downloader: &dyn ResourceDownloader,
        session: &Session,
        context: &RefineContext,
    ) -> Result<Vec<MessageElement>, RefineError> {
        let text = downloader
            .fetch_long_text(session, context, &self.resource_id)
            .await
            .map_err(|source| RefineError::ResourceFetch {
                kind: OriginKind::Long,
                resource_id: self.resource_id.clone(),
                source,
            })?;

        Ok(vec![
            MessageElement::Origin(MessageOrigin {
                original: self.original.clone(),
                resource_id: self.resource_id.clone(),
                kind: OriginKind::Long,
            }),
            MessageElement::Text(text),
        ])
    }
}

impl ForwardMessagePending {
    pub async fn refine(
        &self,
        downloader: &dyn ResourceDownloader,
        session: &Session,
        context: &RefineContext,
    ) -> Result<Vec<MessageElement>, RefineError> {
        let fields = ForwardFields::parse(&self.original.content);
        debug!(
            resource_id = %self.resource_id,
            file_name = %self.file_name,
            title = %fields.title,
            "Fetching forwarded nodes"
        );

        let node_list = downloader
            .fetch_forward_nodes(session, context, &self.resource_id)
            .await
            .map_err(|source| RefineError::ResourceFetch {
                kind: OriginKind::Forward,
                resource_id: self.resource_id.clone(),
                source,
            })?;

        Ok(vec![
            MessageElement::Origin(MessageOrigin {
                original: self.original.clone(),
                resource_id: self.resource_id.clone(),
                kind: OriginKind::Forward,
            }),
            MessageElement::Forward(fields.into_message(node_list)),
        ])
    }
}

/// The markup-derived part of a forward message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardFields {
    pub preview: Vec<String>,
    pub title: String,
    pub brief: String,
    pub source: String,
    pub summary: String,
}

impl ForwardFields {
    /// Pull the display fields out of a forward message's markup.
    ///
    /// The markup is cut into the `<msg` header, the first `<item>` body and
    /// whatever follows the item. `brief` lives in the header, `summary` and
    /// the titles in the item, and the source label after it. Producers are
    /// inconsistent about attribute placement, so `brief` is also looked up
    /// on the `<item` tag and `source` may be a `<name>` body; both only
    /// apply when the primary location is empty.
    pub fn parse(content: &str) -> Self {
        let msg_body = slice_after_marker(content, "<msg");
        let head = if msg_body.contains("<item") {
            slice_before_marker(msg_body, "<item")
        } else {
            msg_body
        };
        let item_and_tail = slice_after_marker(msg_body, "<item");
        let body = slice_before_marker(item_and_tail, "</item");
        let tail = slice_after_marker(item_and_tail, "</item");

        let mut brief = extract_attribute(head, "brief");
        if brief.is_empty() {
            brief = extract_attribute(slice_before_marker(item_and_tail, ">"), "brief");
        }

        let summary = extract_first_tag_body(body, "summary").trim().to_string();

        let mut titles = extract_all_tag_bodies(body, "title").into_iter();
        let title = titles.next().unwrap_or_default();
        let preview = titles.collect();

        let mut source = extract_attribute(tail, "name").to_string();
        if source.is_empty() {
            source = extract_first_tag_body(tail, "name").trim().to_string();
        }

        Self {
            preview,
            title,
            brief: brief.to_string(),
            source,
            summary,
        }
    }

    fn into_message(self, node_list: Vec<ForwardNode>) -> ForwardMessage {
        ForwardMessage {
            preview: self.preview,
            title: self.title,
            brief: self.brief,
            source: self.source,
            summary: self.summary,
            node_list,
        }
    }
}
