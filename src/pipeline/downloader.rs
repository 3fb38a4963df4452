//! Directory-backed resource downloader.
//!
//! Serves resources from a local directory: `<id>.txt` holds a long
//! message's text, `<id>.json` a forwarded conversation's node list. Used by
//! the `msg-refine` binary to replay captured resources offline.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use crate::context::{RefineContext, Session};
use crate::error::DownloadError;
use crate::pipeline::types::{ForwardNode, ResourceDownloader, ResourceId};

/// Reads resources from files under `root`.
#[derive(Debug, Clone)]
pub struct DirectoryDownloader {
    root: PathBuf,
}

impl DirectoryDownloader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path for `resource_id` with `extension`. Ids that could escape `root`
    /// are rejected as not found.
    fn resource_path(
        &self,
        resource_id: &ResourceId,
        extension: &str,
    ) -> Result<PathBuf, DownloadError> {
        let id = resource_id.as_str();
        let safe = !id.is_empty()
            && !id.contains(['/', '\\'])
            && id != "."
            && id != "..";
        if !safe {
            warn!(resource_id = %id, "Rejected resource id");
            return Err(DownloadError::NotFound {
                resource_id: id.to_string(),
            });
        }
        Ok(self.root.join(format!("{id}.{extension}")))
    }

    async fn read(&self, resource_id: &ResourceId, extension: &str) -> Result<String, DownloadError> {
        let path = self.resource_path(resource_id, extension)?;
        debug!(path = %path.display(), "Reading resource");

        fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DownloadError::NotFound {
                    resource_id: resource_id.to_string(),
                }
            } else {
                DownloadError::Io(e)
            }
        })
    }
}

#[async_trait]
impl ResourceDownloader for DirectoryDownloader {
    async fn fetch_long_text(
        &self,
        _session: &Session,
        _context: &RefineContext,
        resource_id: &ResourceId,
    ) -> Result<String, DownloadError> {
        self.read(resource_id, "txt").await
    }

    async fn fetch_forward_nodes(
        &self,
        _session: &Session,
        _context: &RefineContext,
        resource_id: &ResourceId,
    ) -> Result<Vec<ForwardNode>, DownloadError> {
        let raw = self.read(resource_id, "json").await?;
        serde_json::from_str(&raw).map_err(|e| DownloadError::Decode {
            resource_id: resource_id.to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::MessageElement;

    async fn fetch_long(dl: &DirectoryDownloader, id: &str) -> Result<String, DownloadError> {
        dl.fetch_long_text(&Session::default(), &RefineContext::default(), &ResourceId::from(id))
            .await
    }

    async fn fetch_nodes(
        dl: &DirectoryDownloader,
        id: &str,
    ) -> Result<Vec<ForwardNode>, DownloadError> {
        dl.fetch_forward_nodes(&Session::default(), &RefineContext::default(), &ResourceId::from(id))
            .await
    }

    #[tokio::test]
    async fn reads_long_text() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("r2.txt"), "Hello").unwrap();
        let dl = DirectoryDownloader::new(dir.path());

        assert_eq!(fetch_long(&dl, "r2").await.unwrap(), "Hello");
    }

    #[tokio::test]
    async fn reads_forward_nodes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("f1.json"),
            r#"[{"sender_id": 10001, "sender_name": "Alice", "time": "2024-05-01T12:00:00Z",
                "message_chain": [{"type": "text", "value": "hi"}]},
               {"sender_id": 10002, "time": "2024-05-01T12:01:00Z"}]"#,
        )
        .unwrap();
        let dl = DirectoryDownloader::new(dir.path());

        let nodes = fetch_nodes(&dl, "f1").await.unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].sender_name, "Alice");
        assert_eq!(nodes[0].message_chain.get(0), Some(&MessageElement::text("hi")));
        assert!(nodes[1].sender_name.is_empty());
        assert!(nodes[1].message_chain.is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let dl = DirectoryDownloader::new(dir.path());

        assert!(matches!(
            fetch_long(&dl, "nope").await,
            Err(DownloadError::NotFound { .. })
        ));
        assert!(matches!(
            fetch_nodes(&dl, "nope").await,
            Err(DownloadError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn malformed_nodes_are_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{not json").unwrap();
        let dl = DirectoryDownloader::new(dir.path());

        assert!(matches!(
            fetch_nodes(&dl, "bad").await,
            Err(DownloadError::Decode { resource_id, .. }) if resource_id == "bad"
        ));
    }

    #[tokio::test]
    async fn path_escaping_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let dl = DirectoryDownloader::new(dir.path().join("inner"));
        std::fs::write(dir.path().join("secret.txt"), "nope").unwrap();

        for id in ["../secret", "..", "", "a/b", r"a\b"] {
            assert!(
                matches!(fetch_long(&dl, id).await, Err(DownloadError::NotFound { .. })),
                "id {id:?} should be rejected"
            );
        }
    }
}
