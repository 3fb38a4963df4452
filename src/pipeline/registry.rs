//! Variant registry: recognizes refinable service messages by shape.
//!
//! Long and forwarded messages share service id 35 and the envelope has no
//! discriminant field, so entries sniff the content. Entries are checked in
//! order and the first match wins:
//! - `multiMsgFlag="1"` → long message
//! - `viewMultiMsg` action, `multiMsgFlag="0"`, or an `<msg>` with an
//!   `<item>` → forwarded message
//!
//! Anything else stays an inert service message. That is not an error.

use tracing::debug;

use crate::pipeline::markup::extract_attribute;
use crate::pipeline::types::{
    MULTI_MSG_SERVICE_ID, MessageChain, MessageElement, ResourceId, ServiceMessage,
};
use crate::pipeline::variants::{ForwardMessagePending, LongMessagePending, Refinable};

/// Structural test over an envelope.
pub type Predicate = fn(&ServiceMessage) -> bool;

/// Builds the pending variant once a predicate matched.
pub type Constructor = fn(&ServiceMessage, ResourceId) -> Refinable;

/// One `(predicate, constructor)` pair.
#[derive(Debug, Clone)]
pub struct VariantEntry {
    /// Name used in logs.
    pub name: &'static str,
    pub predicate: Predicate,
    pub construct: Constructor,
}

/// Ordered table of variant entries.
#[derive(Debug, Clone)]
pub struct VariantRegistry {
    entries: Vec<VariantEntry>,
}

impl VariantRegistry {
    /// Registry with the long and forward variants.
    pub fn builtin() -> Self {
        Self {
            entries: vec![
                VariantEntry {
                    name: "long",
                    predicate: is_long_message,
                    construct: |original, resource_id| {
                        Refinable::Long(LongMessagePending {
                            original: original.clone(),
                            resource_id,
                        })
                    },
                },
                VariantEntry {
                    name: "forward",
                    predicate: is_forward_message,
                    construct: |original, resource_id| {
                        Refinable::Forward(ForwardMessagePending {
                            original: original.clone(),
                            resource_id,
                            file_name: extract_attribute(&original.content, "m_fileName")
                                .to_string(),
                        })
                    },
                },
            ],
        }
    }

    /// Registry that recognizes nothing (for testing).
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append an entry. It is checked after every existing one.
    pub fn register(&mut self, entry: VariantEntry) {
        self.entries.push(entry);
    }

    /// Entry names in match order.
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|entry| entry.name).collect()
    }

    /// Match an envelope against the table.
    ///
    /// Returns `None` for other service ids, for envelopes without a
    /// `m_resid`, and for shapes no entry recognizes.
    pub fn recognize(&self, message: &ServiceMessage) -> Option<Refinable> {
        if message.service_id != MULTI_MSG_SERVICE_ID {
            return None;
        }

        let resource_id = extract_attribute(&message.content, "m_resid");
        if resource_id.is_empty() {
            debug!(
                service_id = message.service_id,
                "Service message has no resource id, leaving it unresolved"
            );
            return None;
        }

        for entry in &self.entries {
            if (entry.predicate)(message) {
                debug!(
                    variant = entry.name,
                    resource_id = %resource_id,
                    "Service message matched variant"
                );
                return Some((entry.construct)(message, ResourceId::from(resource_id)));
            }
        }

        debug!(
            resource_id = %resource_id,
            "No variant matched service message, leaving it unresolved"
        );
        None
    }

    /// First position in `chain` that still needs resolving, with the variant
    /// to resolve it through.
    ///
    /// Service messages go through `recognize`; pending elements are already
    /// typed. The chain is not modified, so a failed fetch leaves the
    /// original element behind.
    pub fn first_refinable(&self, chain: &MessageChain) -> Option<(usize, Refinable)> {
        chain.iter().enumerate().find_map(|(index, element)| {
            let target = match element {
                MessageElement::Service(message) => self.recognize(message),
                other => other.as_refinable(),
            };
            target.map(|target| (index, target))
        })
    }
}

impl Default for VariantRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn is_long_message(message: &ServiceMessage) -> bool {
    message.content.contains(r#"multiMsgFlag="1""#)
}

fn is_forward_message(message: &ServiceMessage) -> bool {
    let content = &message.content;
    content.contains("viewMultiMsg")
        || content.contains(r#"multiMsgFlag="0""#)
        || (content.contains("<msg") && content.contains("<item"))
}
