use blake3::Hasher;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! content_id {
    ($name:ident, $tag:literal) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name([u8; 32]);

        impl $name {
            /// Derive the id from its domain-tagged content. The same inputs
            /// always produce the same id, which is what makes queue task
            /// bodies idempotent.
            pub fn derive(parts: &[&[u8]]) -> Self {
                let mut hasher = Hasher::new();
                hasher.update($tag.as_bytes());
                for part in parts {
                    hasher.update(&(part.len() as u64).to_le_bytes());
                    hasher.update(part);
                }
                Self(hasher.finalize().into())
            }

            pub fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let bytes = hex::decode(s)?;
                if bytes.len() != 32 {
                    return Err(hex::FromHexError::InvalidStringLength);
                }
                let mut arr = [0u8; 32];
                arr.copy_from_slice(&bytes);
                Ok(Self(arr))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({}...)"), &self.to_hex()[..8])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }
    };
}

content_id!(TournamentId, "agora:tournament");
content_id!(SubmissionId, "agora:submission");
content_id!(RunId, "agora:run");

impl TournamentId {
    /// One tournament per epoch number.
    pub fn for_epoch(epoch_number: u64) -> Self {
        Self::derive(&[&epoch_number.to_le_bytes()])
    }
}

impl SubmissionId {
    /// One submission per participant per tournament.
    pub fn for_participant(tournament: &TournamentId, participant: &ParticipantId) -> Self {
        Self::derive(&[tournament.as_bytes(), participant.as_str().as_bytes()])
    }
}

impl RunId {
    /// One run per submission per epoch index.
    pub fn for_epoch(submission: &SubmissionId, epoch_index: u64) -> Self {
        Self::derive(&[submission.as_bytes(), &epoch_index.to_le_bytes()])
    }
}

/// Opaque key of a participant on the peer network.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParticipantId({})", self.0)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
