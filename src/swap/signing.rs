use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use bitcoin::hashes::{Hash, sha256};
use thiserror::Error as ThisError;
use tokio::{fs, sync::Mutex};
use tracing::{debug, info, warn};

use crate::rpc::{self, AssetDaemon};

const CHALLENGE_FILE: &str = "sighash.hex";
const OVERRIDE_FILE: &str = "signature.hex";

#[derive(ThisError, Debug)]
pub enum SigningError {
    #[error("Daemon did not deposit a sighash{}", .cause.as_ref().map(|c| format!(": {}", c)).unwrap_or_default())]
    ChallengeNotDeposited { cause: Option<String> },
    #[error("Sighash was never issued for this PSBT or has expired")]
    UnknownChallenge,
    #[error("Signature must be non-empty hex")]
    InvalidSignature,
    #[error("Daemon rejected the external signature: {0}")]
    Rejected(#[source] rpc::Error),
    #[error("Signature slot I/O error: {0}")]
    Io(#[from] io::Error),
}

/// The daemon's two single-slot files. The pair is shared by every caller and
/// is not keyed by swap: whoever writes last wins.
#[derive(Clone, Debug)]
pub struct SignatureSlots {
    dir: PathBuf,
}

impl SignatureSlots {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn challenge_path(&self) -> PathBuf {
        self.dir.join(CHALLENGE_FILE)
    }

    fn override_path(&self) -> PathBuf {
        self.dir.join(OVERRIDE_FILE)
    }

    pub async fn read_challenge(&self) -> Result<Option<String>, io::Error> {
        match fs::read_to_string(self.challenge_path()).await {
            Ok(contents) => {
                let challenge = contents.trim();
                Ok((!challenge.is_empty()).then(|| challenge.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn write_challenge(&self, challenge: &str) -> Result<(), io::Error> {
        fs::create_dir_all(&self.dir).await?;
        fs::write(self.challenge_path(), challenge).await
    }

    pub async fn write_override(&self, signature: &str) -> Result<(), io::Error> {
        fs::create_dir_all(&self.dir).await?;
        fs::write(self.override_path(), signature).await
    }

    /// Removes both slots. Failures are logged, never returned.
    pub async fn clear(&self) {
        for path in [self.challenge_path(), self.override_path()] {
            if let Err(e) = fs::remove_file(&path).await {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!("Failed to remove {}: {}", path.display(), e);
                }
            }
        }
    }
}

/// An issued sighash and the funded PSBT it was computed over.
#[derive(Debug)]
struct Session {
    psbt: sha256::Hash,
    issued: Instant,
}

fn digest(psbt: &str) -> sha256::Hash {
    sha256::Hash::hash(psbt.as_bytes())
}

/// Serializes use of the slot pair and remembers which sighashes were handed
/// out, so a signature is only ever matched with the challenge it answers.
#[derive(Debug)]
pub struct SigningChannel {
    slots: SignatureSlots,
    // held for the whole of every slot window
    sessions: Mutex<HashMap<String, Session>>,
    ttl: Duration,
}

impl SigningChannel {
    pub fn new(slots: SignatureSlots, ttl: Duration) -> Self {
        Self {
            slots,
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn slots(&self) -> &SignatureSlots {
        &self.slots
    }

    /// Asks the daemon to sign `funded_psbt` without an override so that it
    /// deposits the sighash it wants signed.
    pub async fn solicit<A: AssetDaemon>(
        &self,
        daemon: &A,
        funded_psbt: &str,
    ) -> Result<String, SigningError> {
        let mut sessions = self.sessions.lock().await;
        self.slots.clear().await;

        let signed = daemon.sign_virtual_psbt(funded_psbt).await;
        let challenge = self.slots.read_challenge().await;
        self.slots.clear().await;

        let Some(challenge) = challenge? else {
            return Err(SigningError::ChallengeNotDeposited {
                cause: signed.err().map(|e| e.to_string()),
            });
        };
        if let Err(e) = signed {
            debug!("Sign call ended as expected after depositing sighash: {}", e);
        }

        let now = Instant::now();
        sessions.retain(|_, session| now.duration_since(session.issued) < self.ttl);
        sessions.insert(
            challenge.clone(),
            Session {
                psbt: digest(funded_psbt),
                issued: now,
            },
        );
        info!("Issued sighash {}", challenge);
        Ok(challenge)
    }

    /// Signs `psbt` with the externally produced `signature` over `challenge`.
    /// The challenge must have been issued by [`Self::solicit`] for this same
    /// `psbt` and not yet redeemed or expired.
    pub async fn finalize<A: AssetDaemon>(
        &self,
        daemon: &A,
        psbt: &str,
        challenge: &str,
        signature: &str,
    ) -> Result<String, SigningError> {
        if signature.is_empty() || hex::decode(signature).is_err() {
            return Err(SigningError::InvalidSignature);
        }

        let mut sessions = self.sessions.lock().await;
        let psbt_digest = digest(psbt);
        let live = sessions.get(challenge).is_some_and(|session| {
            session.psbt == psbt_digest && session.issued.elapsed() < self.ttl
        });
        if !live {
            return Err(SigningError::UnknownChallenge);
        }

        let written = async {
            self.slots.write_challenge(challenge).await?;
            self.slots.write_override(signature).await
        }
        .await;
        let signed = match written {
            Ok(()) => daemon
                .sign_virtual_psbt(psbt)
                .await
                .map_err(SigningError::Rejected),
            Err(e) => Err(SigningError::Io(e)),
        };
        self.slots.clear().await;

        let signed = signed?;
        sessions.remove(challenge);
        info!("Redeemed sighash {}", challenge);
        Ok(signed.signed_psbt)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use tempfile::TempDir;

    use super::*;
    use crate::test_utils::{MockAssetDaemon, mock_sighash, mock_signature};

    fn channel(dir: &TempDir, ttl: Duration) -> SigningChannel {
        SigningChannel::new(SignatureSlots::new(dir.path()), ttl)
    }

    #[tokio::test]
    async fn test_raw_slots_lose_the_earlier_challenge() -> Result<()> {
        let dir = TempDir::new()?;
        let slots = SignatureSlots::new(dir.path());

        // two swaps soliciting at once without coordination
        slots.write_challenge(&mock_sighash("swap-a")).await?;
        slots.write_challenge(&mock_sighash("swap-b")).await?;

        let seen = slots.read_challenge().await?;
        assert_eq!(seen, Some(mock_sighash("swap-b")));
        assert_ne!(seen, Some(mock_sighash("swap-a")));

        slots.clear().await;
        assert_eq!(slots.read_challenge().await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_solicits_keep_their_challenges() -> Result<()> {
        let dir = TempDir::new()?;
        let daemon = MockAssetDaemon::new(dir.path());
        let channel = Arc::new(channel(&dir, Duration::from_secs(60)));

        let mut handles = Vec::new();
        for i in 0..8 {
            let channel = channel.clone();
            let daemon = daemon.clone();
            handles.push(tokio::spawn(async move {
                let psbt = format!("funded-{}", i);
                let challenge = channel.solicit(&daemon, &psbt).await?;
                Ok::<_, SigningError>((psbt, challenge))
            }));
        }
        for handle in handles {
            let (psbt, challenge) = handle.await??;
            assert_eq!(challenge, mock_sighash(&psbt));
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_finalize_signs_and_clears_slots() -> Result<()> {
        let dir = TempDir::new()?;
        let daemon = MockAssetDaemon::new(dir.path());
        let channel = channel(&dir, Duration::from_secs(60));

        let challenge = channel.solicit(&daemon, "funded").await?;
        assert_eq!(channel.slots().read_challenge().await?, None);

        let signature = mock_signature(&challenge);
        let signed = channel
            .finalize(&daemon, "funded", &challenge, &signature)
            .await?;
        assert_eq!(signed, format!("signed:funded:{}", signature));
        assert_eq!(channel.slots().read_challenge().await?, None);
        assert!(!dir.path().join(OVERRIDE_FILE).exists());

        // consumed on success
        let replay = channel
            .finalize(&daemon, "funded", &challenge, &signature)
            .await;
        assert!(matches!(replay, Err(SigningError::UnknownChallenge)));
        Ok(())
    }

    #[tokio::test]
    async fn test_finalize_rejects_unissued_and_expired_challenges() -> Result<()> {
        let dir = TempDir::new()?;
        let daemon = MockAssetDaemon::new(dir.path());

        let fresh = channel(&dir, Duration::from_secs(60));
        let result = fresh
            .finalize(&daemon, "funded", &mock_sighash("funded"), "abcd")
            .await;
        assert!(matches!(result, Err(SigningError::UnknownChallenge)));

        let expiring = channel(&dir, Duration::ZERO);
        let challenge = expiring.solicit(&daemon, "funded").await?;
        let result = expiring
            .finalize(&daemon, "funded", &challenge, &mock_signature(&challenge))
            .await;
        assert!(matches!(result, Err(SigningError::UnknownChallenge)));
        Ok(())
    }

    #[tokio::test]
    async fn test_finalize_rejects_challenge_for_another_psbt() -> Result<()> {
        let dir = TempDir::new()?;
        let daemon = MockAssetDaemon::new(dir.path());
        let channel = channel(&dir, Duration::from_secs(60));
        let first = channel.solicit(&daemon, "funded-a").await?;
        let second = channel.solicit(&daemon, "funded-b").await?;
        let sign_calls = |daemon: &MockAssetDaemon| {
            daemon
                .state()
                .calls
                .iter()
                .filter(|call| **call == "sign_virtual_psbt")
                .count()
        };
        let before = sign_calls(&daemon);

        let result = channel
            .finalize(&daemon, "funded-b", &first, &mock_signature(&first))
            .await;
        assert!(matches!(result, Err(SigningError::UnknownChallenge)));
        assert_eq!(sign_calls(&daemon), before);
        assert_eq!(channel.slots().read_challenge().await?, None);

        // both sessions survive the mismatch
        let signed = channel
            .finalize(&daemon, "funded-a", &first, &mock_signature(&first))
            .await?;
        assert!(signed.starts_with("signed:funded-a:"));
        let signed = channel
            .finalize(&daemon, "funded-b", &second, &mock_signature(&second))
            .await?;
        assert!(signed.starts_with("signed:funded-b:"));
        Ok(())
    }

    #[tokio::test]
    async fn test_finalize_validates_signature() -> Result<()> {
        let dir = TempDir::new()?;
        let daemon = MockAssetDaemon::new(dir.path());
        let channel = channel(&dir, Duration::from_secs(60));
        let challenge = channel.solicit(&daemon, "funded").await?;

        for bad in ["", "zz", "abc"] {
            let result = channel.finalize(&daemon, "funded", &challenge, bad).await;
            assert!(matches!(result, Err(SigningError::InvalidSignature)));
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_rejected_signature_keeps_session() -> Result<()> {
        let dir = TempDir::new()?;
        let daemon = MockAssetDaemon::new(dir.path());
        let channel = channel(&dir, Duration::from_secs(60));
        let challenge = channel.solicit(&daemon, "funded").await?;

        let result = channel.finalize(&daemon, "funded", &challenge, "00ff").await;
        assert!(matches!(result, Err(SigningError::Rejected(_))));
        assert!(!dir.path().join(OVERRIDE_FILE).exists());

        let signed = channel
            .finalize(&daemon, "funded", &challenge, &mock_signature(&challenge))
            .await?;
        assert!(signed.starts_with("signed:funded:"));
        Ok(())
    }

    #[tokio::test]
    async fn test_solicit_reports_missing_challenge() -> Result<()> {
        let dir = TempDir::new()?;
        let daemon = MockAssetDaemon::new(dir.path());
        daemon.set_deposit_sighash(false);
        let channel = channel(&dir, Duration::from_secs(60));

        match channel.solicit(&daemon, "funded").await {
            Err(SigningError::ChallengeNotDeposited { cause: Some(cause) }) => {
                assert!(cause.contains("no signature"), "{}", cause);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        Ok(())
    }
}
