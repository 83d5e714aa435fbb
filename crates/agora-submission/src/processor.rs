use crate::builder::ImageBuilder;
use crate::error::Result;
use crate::protocol::{SubmissionClaim, SubmissionProtocol};
use agora_types::{ParticipantId, SubmissionId, TournamentId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Drives collection and builds. Stateless: the orchestrator owns
/// persistence and calls in with ids.
pub struct SubmissionProcessor {
    protocol: Arc<dyn SubmissionProtocol>,
    builder: Arc<dyn ImageBuilder>,
}

impl SubmissionProcessor {
    pub fn new(protocol: Arc<dyn SubmissionProtocol>, builder: Arc<dyn ImageBuilder>) -> Self {
        Self { protocol, builder }
    }

    /// Ask every known peer for its claim. Peer failures and malformed
    /// claims are logged and skipped — one bad peer never stalls the window.
    /// At most one claim per participant survives (the last answer wins,
    /// matching the upsert semantics of the store).
    pub async fn collect_claims(
        &self,
        tournament_id: &TournamentId,
        epoch_number: u64,
    ) -> Result<Vec<(ParticipantId, SubmissionClaim)>> {
        let peers = self.protocol.peers().await?;
        debug!(peers = peers.len(), epoch = epoch_number, "querying peers for submissions");

        let mut claims: HashMap<ParticipantId, SubmissionClaim> = HashMap::new();
        for peer in peers {
            match self
                .protocol
                .collect(tournament_id, epoch_number, &peer)
                .await
            {
                Ok(Some(claim)) => match claim.normalized() {
                    Ok(claim) => {
                        claims.insert(peer, claim);
                    }
                    Err(e) => {
                        warn!(peer = %peer, error = %e, "discarding malformed claim");
                    }
                },
                Ok(None) => {
                    debug!(peer = %peer, "peer has no submission");
                }
                Err(e) => {
                    warn!(peer = %peer, error = %e, "peer query failed");
                }
            }
        }

        info!(
            tournament_id = %tournament_id,
            claims = claims.len(),
            "📥 submission claims collected"
        );
        let mut out: Vec<(ParticipantId, SubmissionClaim)> = claims.into_iter().collect();
        out.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(out)
    }

    /// Fetch, scan, and build one submission into an addressable image.
    pub async fn build(
        &self,
        submission_id: &SubmissionId,
        participant: &ParticipantId,
        repository_url: &str,
        commit_hash: &str,
    ) -> Result<String> {
        self.builder
            .build(submission_id, participant, repository_url, commit_hash)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SubmissionError;
    use async_trait::async_trait;

    struct StaticProtocol {
        answers: Vec<(ParticipantId, Option<SubmissionClaim>)>,
    }

    #[async_trait]
    impl SubmissionProtocol for StaticProtocol {
        async fn peers(&self) -> Result<Vec<ParticipantId>> {
            Ok(self.answers.iter().map(|(p, _)| p.clone()).collect())
        }

        async fn collect(
            &self,
            _tournament_id: &TournamentId,
            _epoch_number: u64,
            peer: &ParticipantId,
        ) -> Result<Option<SubmissionClaim>> {
            match self.answers.iter().find(|(p, _)| p == peer) {
                Some((_, claim)) => Ok(claim.clone()),
                None => Err(SubmissionError::CollectFailed("unknown peer".into())),
            }
        }
    }

    struct NoopBuilder;

    #[async_trait]
    impl ImageBuilder for NoopBuilder {
        async fn build(
            &self,
            _submission_id: &SubmissionId,
            participant: &ParticipantId,
            _repository_url: &str,
            commit_hash: &str,
        ) -> Result<String> {
            Ok(crate::builder::image_tag(participant, commit_hash))
        }
    }

    fn claim(commit: &str) -> SubmissionClaim {
        SubmissionClaim {
            repository_url: "https://git.example/x/analyzer".into(),
            commit_hash: commit.into(),
        }
    }

    #[tokio::test]
    async fn test_collect_skips_declines_and_malformed() {
        let protocol = StaticProtocol {
            answers: vec![
                (ParticipantId::new("alice"), Some(claim(&"a".repeat(40)))),
                (ParticipantId::new("bob"), None),
                (ParticipantId::new("mallory"), Some(claim("nothex"))),
            ],
        };
        let processor = SubmissionProcessor::new(Arc::new(protocol), Arc::new(NoopBuilder));

        let tournament = TournamentId::for_epoch(1);
        let collected = processor.collect_claims(&tournament, 1).await.unwrap();

        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].0.as_str(), "alice");
    }

    #[tokio::test]
    async fn test_collect_is_sorted_by_participant() {
        let protocol = StaticProtocol {
            answers: vec![
                (ParticipantId::new("carol"), Some(claim(&"c".repeat(40)))),
                (ParticipantId::new("alice"), Some(claim(&"a".repeat(40)))),
            ],
        };
        let processor = SubmissionProcessor::new(Arc::new(protocol), Arc::new(NoopBuilder));

        let tournament = TournamentId::for_epoch(1);
        let collected = processor.collect_claims(&tournament, 1).await.unwrap();
        let names: Vec<&str> = collected.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(names, vec!["alice", "carol"]);
    }
}
