use crate::error::{Result, SubmissionError};
use agora_types::{ParticipantId, TournamentId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A participant's answer to a collection query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionClaim {
    pub repository_url: String,
    pub commit_hash: String,
}

impl SubmissionClaim {
    /// Normalize and validate the claim: non-empty url, 40-hex commit.
    /// Commit hashes are lowercased so identical commits compare equal.
    pub fn normalized(mut self) -> Result<Self> {
        self.repository_url = self.repository_url.trim().to_string();
        self.commit_hash = self.commit_hash.trim().to_lowercase();

        if self.repository_url.is_empty() {
            return Err(SubmissionError::CollectFailed("empty repository url".into()));
        }
        if self.commit_hash.len() != 40
            || !self.commit_hash.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(SubmissionError::BadCommitHash(self.commit_hash));
        }
        Ok(self)
    }
}

/// The peer-to-peer submission boundary. The engine asks each known peer for
/// its claim; transport, signatures, and peer discovery live outside the
/// core.
#[async_trait]
pub trait SubmissionProtocol: Send + Sync {
    /// All peers currently eligible to submit.
    async fn peers(&self) -> Result<Vec<ParticipantId>>;

    /// Query one peer. `None` means the peer declined or has nothing to
    /// submit; transport failures surface as `CollectFailed` and are logged
    /// and skipped by the collector.
    async fn collect(
        &self,
        tournament_id: &TournamentId,
        epoch_number: u64,
        peer: &ParticipantId,
    ) -> Result<Option<SubmissionClaim>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_normalization() {
        let claim = SubmissionClaim {
            repository_url: "  https://git.example/a/b  ".into(),
            commit_hash: format!(" {} ", "AB".repeat(20)),
        }
        .normalized()
        .unwrap();

        assert_eq!(claim.repository_url, "https://git.example/a/b");
        assert_eq!(claim.commit_hash, "ab".repeat(20));
    }

    #[test]
    fn test_claim_rejects_bad_commit() {
        let short = SubmissionClaim {
            repository_url: "https://git.example/a/b".into(),
            commit_hash: "abc123".into(),
        };
        assert!(matches!(
            short.normalized(),
            Err(SubmissionError::BadCommitHash(_))
        ));

        let nonhex = SubmissionClaim {
            repository_url: "https://git.example/a/b".into(),
            commit_hash: "z".repeat(40),
        };
        assert!(nonhex.normalized().is_err());
    }

    #[test]
    fn test_claim_rejects_empty_url() {
        let claim = SubmissionClaim {
            repository_url: "   ".into(),
            commit_hash: "a".repeat(40),
        };
        assert!(matches!(
            claim.normalized(),
            Err(SubmissionError::CollectFailed(_))
        ));
    }
}
