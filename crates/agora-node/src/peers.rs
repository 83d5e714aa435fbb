use agora_submission::{SubmissionClaim, SubmissionError, SubmissionProtocol};
use agora_types::{ParticipantId, TournamentId};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

/// Dev-mode submission protocol adapter: peers and their claims come from a
/// JSON file instead of the live peer network. The file is re-read on every
/// collect pass, so claims can change while the window is open, exactly as
/// live peers may re-announce.
///
/// Production deployments replace this with the chain-side adapter that
/// implements the same trait.
pub struct FilePeerProtocol {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ClaimFile {
    /// participant id -> claim
    #[serde(flatten)]
    peers: BTreeMap<String, FileClaim>,
}

#[derive(Debug, Deserialize)]
struct FileClaim {
    repository_url: String,
    commit_hash: String,
}

impl FilePeerProtocol {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read(&self) -> Result<ClaimFile, SubmissionError> {
        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| SubmissionError::CollectFailed(format!("peers file: {e}")))?;
        serde_json::from_str(&text)
            .map_err(|e| SubmissionError::CollectFailed(format!("peers file: {e}")))
    }
}

#[async_trait]
impl SubmissionProtocol for FilePeerProtocol {
    async fn peers(&self) -> Result<Vec<ParticipantId>, SubmissionError> {
        let file = self.read()?;
        Ok(file.peers.keys().map(ParticipantId::new).collect())
    }

    async fn collect(
        &self,
        _tournament_id: &TournamentId,
        _epoch_number: u64,
        peer: &ParticipantId,
    ) -> Result<Option<SubmissionClaim>, SubmissionError> {
        let file = self.read()?;
        let claim = file.peers.get(peer.as_str()).map(|c| SubmissionClaim {
            repository_url: c.repository_url.clone(),
            commit_hash: c.commit_hash.clone(),
        });
        debug!(peer = %peer, found = claim.is_some(), "file protocol collect");
        Ok(claim)
    }
}

/// Protocol slot for deployments that have not wired a peer adapter yet:
/// no peers, no claims.
pub struct NoPeersProtocol;

#[async_trait]
impl SubmissionProtocol for NoPeersProtocol {
    async fn peers(&self) -> Result<Vec<ParticipantId>, SubmissionError> {
        Ok(Vec::new())
    }

    async fn collect(
        &self,
        _tournament_id: &TournamentId,
        _epoch_number: u64,
        _peer: &ParticipantId,
    ) -> Result<Option<SubmissionClaim>, SubmissionError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_protocol_reads_claims() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("peers.json");
        std::fs::write(
            &path,
            format!(
                r#"{{
                    "alice": {{"repository_url": "https://git.example/alice/analyzer", "commit_hash": "{}"}},
                    "bob": {{"repository_url": "https://git.example/bob/analyzer", "commit_hash": "{}"}}
                }}"#,
                "a".repeat(40),
                "b".repeat(40),
            ),
        )
        .unwrap();

        let protocol = FilePeerProtocol::new(&path);
        let peers = protocol.peers().await.unwrap();
        assert_eq!(peers.len(), 2);

        let tournament = TournamentId::for_epoch(1);
        let claim = protocol
            .collect(&tournament, 1, &ParticipantId::new("alice"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(claim.commit_hash, "a".repeat(40));

        let missing = protocol
            .collect(&tournament, 1, &ParticipantId::new("zara"))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_missing_file_is_collect_failure() {
        let protocol = FilePeerProtocol::new("/nonexistent/peers.json");
        assert!(protocol.peers().await.is_err());
    }
}
