//! End-to-end tests: decoded chains refined against resources on disk.
//!
//! Each test writes resources into a temp directory, runs the engine with a
//! `DirectoryDownloader`, and checks the resolved chain and its wire form.

use std::path::Path;
use std::sync::Arc;

use msg_refine::config::RefineConfig;
use msg_refine::context::{RefineContext, Session};
use msg_refine::error::{DownloadError, RefineError};
use msg_refine::pipeline::{
    DirectoryDownloader, MessageChain, MessageElement, OriginKind, RefineEngine, ServiceMessage,
};

const FORWARD_ENVELOPE: &str = r##"<?xml version='1.0' encoding='UTF-8' standalone='yes' ?><msg serviceID="35" templateID="1" action="viewMultiMsg" brief="[Chat history]" m_resid="fwd-outer" m_fileName="6F1A" tSum="2" sourceMsgId="0" url="" flag="3" adverSign="0" multiMsgFlag="0"><item layout="1" advertiser_id="0" aid="0"><title size="34" maxLines="2" lineSpace="12">Group chat history</title><title size="26" color="#777777" maxLines="4" lineSpace="12">Alice: lunch?</title><title size="26" color="#777777" maxLines="4" lineSpace="12">Bob: see below</title><hr hidden="false" style="0" /><summary size="26" color="#777777">View 2 forwarded messages</summary></item><source name="Chat history" icon="" action="" appid="-1" /></msg>"##;

fn long_envelope(id: &str) -> String {
    format!(
        r#"<?xml version='1.0' encoding='UTF-8' standalone='yes' ?><msg serviceID="35" templateID="1" action="viewMultiMsg" brief="[Long message]" m_resid="{id}" m_fileName="A1B2" sourceMsgId="0" url="" flag="3" adverSign="0" multiMsgFlag="1"><item layout="1"><title>The first part of a very long...</title><hr hidden="false" style="0" /><summary>Tap to view the full message</summary></item><source name="Chat history" icon="" action="" appid="-1" /></msg>"#
    )
}

/// Write the outer forward's nodes; Bob's node carries a long message.
fn write_resources(dir: &Path) {
    let nodes = serde_json::json!([
        {
            "sender_id": 10001,
            "sender_name": "Alice",
            "time": "2024-05-01T12:00:00Z",
            "message_chain": [{"type": "text", "value": "lunch?"}]
        },
        {
            "sender_id": 10002,
            "sender_name": "Bob",
            "time": "2024-05-01T12:01:00Z",
            "message_chain": [
                {"type": "text", "value": "see below"},
                {"type": "service", "value": {"service_id": 35, "content": long_envelope("long-inner")}}
            ]
        }
    ]);
    std::fs::write(dir.join("fwd-outer.json"), nodes.to_string()).unwrap();
    std::fs::write(dir.join("long-inner.txt"), "A very long answer about lunch.").unwrap();
    std::fs::write(dir.join("long-top.txt"), "Top-level long text.").unwrap();
}

fn engine_for(dir: &Path) -> RefineEngine {
    RefineEngine::new(
        Arc::new(DirectoryDownloader::new(dir)),
        RefineConfig::default(),
    )
}

fn service(content: &str) -> MessageElement {
    MessageElement::Service(ServiceMessage::new(35, content))
}

#[tokio::test]
async fn forward_and_long_resolve_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    write_resources(dir.path());
    let engine = engine_for(dir.path());

    let chain = MessageChain::from(vec![
        MessageElement::text("check this"),
        service(FORWARD_ENVELOPE),
        service(&long_envelope("long-top")),
    ]);

    let resolved = engine
        .refine(&Session::new(42), chain.clone(), &RefineContext::new().with_group(7))
        .await
        .unwrap();

    assert_eq!(resolved.len(), chain.len() + 2);
    assert_eq!(resolved.get(0), Some(&MessageElement::text("check this")));

    let origins: Vec<_> = resolved
        .origins()
        .map(|o| (o.kind, o.resource_id.to_string()))
        .collect();
    assert_eq!(
        origins,
        vec![
            (OriginKind::Forward, "fwd-outer".to_string()),
            (OriginKind::Long, "long-top".to_string()),
        ]
    );

    let Some(MessageElement::Forward(forward)) = resolved.get(2) else {
        panic!("Expected Forward at 2, got {:?}", resolved.get(2));
    };
    assert_eq!(forward.title, "Group chat history");
    assert_eq!(forward.preview, vec!["Alice: lunch?", "Bob: see below"]);
    assert_eq!(forward.brief, "[Chat history]");
    assert_eq!(forward.summary, "View 2 forwarded messages");
    assert_eq!(forward.source, "Chat history");
    assert_eq!(forward.node_list.len(), 2);

    // Bob's node held a long message of its own; it is resolved too.
    let bob = &forward.node_list[1].message_chain;
    assert_eq!(bob.len(), 3);
    assert_eq!(
        bob.get(2),
        Some(&MessageElement::text("A very long answer about lunch."))
    );

    assert_eq!(
        resolved.get(4),
        Some(&MessageElement::text("Top-level long text."))
    );
}

#[tokio::test]
async fn resolved_chain_serializes_back_to_the_same_wire_form() {
    let dir = tempfile::tempdir().unwrap();
    write_resources(dir.path());
    let engine = engine_for(dir.path());
    let chain = MessageChain::from(vec![service(FORWARD_ENVELOPE), MessageElement::text("end")]);

    let resolved = engine
        .refine(&Session::default(), chain.clone(), &RefineContext::default())
        .await
        .unwrap();

    let json = serde_json::to_string(&resolved).unwrap();
    let reloaded: MessageChain = serde_json::from_str(&json).unwrap();
    assert_eq!(reloaded, resolved);
    assert_eq!(reloaded.to_wire(), chain);
}

#[tokio::test]
async fn missing_resource_aborts_with_its_id() {
    let dir = tempfile::tempdir().unwrap();
    write_resources(dir.path());
    let engine = engine_for(dir.path());

    let mut chain = MessageChain::from(vec![
        service(&long_envelope("long-top")),
        service(&long_envelope("r3")),
    ]);

    let err = engine
        .refine_in_place(&Session::default(), &mut chain, &RefineContext::default())
        .await
        .unwrap_err();

    match err {
        RefineError::ResourceFetch {
            kind,
            resource_id,
            source: DownloadError::NotFound { .. },
        } => {
            assert_eq!(kind, OriginKind::Long);
            assert_eq!(resource_id.as_str(), "r3");
        }
        other => panic!("Expected ResourceFetch, got {:?}", other),
    }

    // First element resolved, second still the untouched envelope.
    assert_eq!(chain.len(), 3);
    assert_eq!(chain.get(2), Some(&service(&long_envelope("r3"))));
}

#[tokio::test]
async fn concurrent_refinements_do_not_interfere() {
    let dir = tempfile::tempdir().unwrap();
    write_resources(dir.path());
    let engine = Arc::new(engine_for(dir.path()));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine
                .refine(
                    &Session::default(),
                    MessageChain::from(vec![service(FORWARD_ENVELOPE)]),
                    &RefineContext::default(),
                )
                .await
        }));
    }

    for handle in handles {
        let resolved = handle.await.unwrap().unwrap();
        assert_eq!(resolved.len(), 2);
        assert!(matches!(resolved.get(1), Some(MessageElement::Forward(_))));
    }
}
