//! DeviceProber - one probing round across candidate transports
//!
//! Every candidate gets its own read loop task. The loops share two signals:
//! the round token, raised by the prober when the first match is collected,
//! and the caller's token for external cancellation. A loop that loses, times
//! out or fails closes its own transport before it ends; only a matching loop
//! hands its transport back unclosed. When a second match races in after the
//! winner has been chosen, the prober closes that transport itself.
//!
//! State machine: `Idle -> Racing -> {Won, AllFailed, Cancelled}`.

use std::sync::Arc;
use std::time::Duration;

use contracts::{CancellationToken, Transport, TransportError, Verifier};
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, instrument, trace, warn};

/// Result of one [`DeviceProber::probe`] call
#[derive(Debug)]
pub enum ProbeOutcome<T> {
    /// First matching candidate; its transport is still open
    Won(ProbeWinner<T>),
    /// Every candidate timed out, failed or ended without a match
    AllFailed,
    /// External cancellation; every candidate has been closed
    Cancelled,
}

impl<T> ProbeOutcome<T> {
    pub fn is_won(&self) -> bool {
        matches!(self, Self::Won(_))
    }
}

/// The winning candidate
#[derive(Debug)]
pub struct ProbeWinner<T> {
    pub transport: T,
    /// Transport identifier
    pub port: String,
    /// Chunk that satisfied the verifier
    pub matched: Vec<u8>,
}

/// Why a candidate loop ended without winning
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LossReason {
    /// Another candidate won
    Displaced,
    /// External cancellation
    Cancelled,
    /// Deadline passed without a match
    TimedOut,
    /// Stream ended without a match
    EndOfStream,
    /// Read failed; only this candidate is abandoned
    ReadFailed(TransportError),
}

enum CandidateResult<T> {
    Matched { transport: T, matched: Vec<u8> },
    Lost { port: String, reason: LossReason },
}

/// Races candidate transports against a [`Verifier`]
#[derive(Debug, Clone, Copy)]
pub struct DeviceProber {
    probe_timeout: Duration,
    read_buffer_size: usize,
}

impl DeviceProber {
    /// Create a prober with a per-candidate deadline
    pub fn new(probe_timeout: Duration) -> Self {
        Self {
            probe_timeout,
            read_buffer_size: 1024,
        }
    }

    /// Set read size per probing read (minimum 1)
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    /// Run one round over `candidates`
    ///
    /// Returns only after every losing transport has been closed.
    #[instrument(
        name = "device_prober_probe",
        skip(self, candidates, verifier, cancel),
        fields(candidates = candidates.len(), timeout_ms = self.probe_timeout.as_millis() as u64)
    )]
    pub async fn probe<T>(
        &self,
        candidates: Vec<T>,
        verifier: Arc<dyn Verifier>,
        cancel: &CancellationToken,
    ) -> ProbeOutcome<T>
    where
        T: Transport + Sync + 'static,
    {
        if cancel.is_cancelled() {
            close_all(candidates).await;
            return ProbeOutcome::Cancelled;
        }
        if candidates.is_empty() {
            debug!("no candidates this round");
            return ProbeOutcome::AllFailed;
        }

        let round = CancellationToken::new();
        let deadline = Instant::now() + self.probe_timeout;
        let mut loops = JoinSet::new();
        for transport in candidates {
            loops.spawn(probe_candidate(
                transport,
                verifier.clone(),
                round.clone(),
                cancel.clone(),
                deadline,
                self.read_buffer_size,
            ));
        }

        let mut winner: Option<ProbeWinner<T>> = None;
        while let Some(joined) = loops.join_next().await {
            match joined {
                Ok(CandidateResult::Matched { transport, matched }) => {
                    let port = transport.id().to_string();
                    if winner.is_none() {
                        round.cancel();
                        info!(port = %port, "candidate matched, cancelling the rest");
                        winner = Some(ProbeWinner {
                            transport,
                            port,
                            matched,
                        });
                    } else {
                        debug!(port = %port, "late match displaced by earlier winner");
                        close_quietly(&transport).await;
                    }
                }
                Ok(CandidateResult::Lost { port, reason }) => {
                    debug!(port = %port, reason = ?reason, "candidate lost");
                }
                Err(e) => {
                    warn!(error = %e, "probe loop panicked");
                }
            }
        }

        match winner {
            Some(winner) => ProbeOutcome::Won(winner),
            None if cancel.is_cancelled() => ProbeOutcome::Cancelled,
            None => ProbeOutcome::AllFailed,
        }
    }
}

async fn probe_candidate<T: Transport + Sync>(
    transport: T,
    verifier: Arc<dyn Verifier>,
    round: CancellationToken,
    cancel: CancellationToken,
    deadline: Instant,
    read_buffer_size: usize,
) -> CandidateResult<T> {
    let port = transport.id().to_string();
    let mut buf = vec![0u8; read_buffer_size];

    let reason = loop {
        let read = tokio::select! {
            biased;
            _ = round.cancelled() => break LossReason::Displaced,
            _ = cancel.cancelled() => break LossReason::Cancelled,
            read = timeout_at(deadline, transport.read(&mut buf)) => read,
        };

        match read {
            Err(_) => break LossReason::TimedOut,
            Ok(Ok(0)) => continue,
            Ok(Ok(n)) => {
                if verifier.check(&buf[..n]) {
                    return CandidateResult::Matched {
                        transport,
                        matched: buf[..n].to_vec(),
                    };
                }
                trace!(port = %port, len = n, "chunk did not match");
            }
            Ok(Err(TransportError::EndOfStream)) => break LossReason::EndOfStream,
            Ok(Err(e)) => break LossReason::ReadFailed(e),
        }
    };

    close_quietly(&transport).await;
    CandidateResult::Lost { port, reason }
}

async fn close_quietly<T: Transport + Sync>(transport: &T) {
    if let Err(e) = transport.close().await {
        warn!(port = %transport.id(), error = %e, "close failed");
    }
}

async fn close_all<T: Transport + Sync>(candidates: Vec<T>) {
    for transport in &candidates {
        close_quietly(transport).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::MaskVerifier;
    use framing::MockTransport;

    fn dev_verifier() -> Arc<dyn Verifier> {
        Arc::new(MaskVerifier::new("", "^DEV-").unwrap())
    }

    #[tokio::test]
    async fn test_matching_candidate_wins_and_loser_is_closed() {
        let (noisy, noisy_handle) = MockTransport::new("/dev/ttyUSB0");
        let (device, device_handle) = MockTransport::new("/dev/ttyUSB1");
        noisy_handle.push("GARBAGE\n");
        device_handle.push("DEV-42 ready\n");

        let prober = DeviceProber::new(Duration::from_secs(5));
        let outcome = prober
            .probe(vec![noisy, device], dev_verifier(), &CancellationToken::new())
            .await;

        let ProbeOutcome::Won(winner) = outcome else {
            panic!("expected a winner");
        };
        assert_eq!(winner.port, "/dev/ttyUSB1");
        assert_eq!(winner.matched, b"DEV-42 ready\n");

        let loser = noisy_handle.stats();
        let reads_at_decision = loser.reads();
        assert_eq!(loser.closes(), 1);
        assert_eq!(device_handle.stats().closes(), 0);

        noisy_handle.push("DEV-late\n");
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(loser.reads(), reads_at_decision);
        assert_eq!(loser.closes(), 1);
    }

    #[tokio::test]
    async fn test_read_failure_only_abandons_that_candidate() {
        let (broken, broken_handle) = MockTransport::new("broken");
        let (device, device_handle) = MockTransport::new("device");
        broken_handle.fail("framing error");

        let feeder = device_handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            feeder.push("DEV-1");
        });

        let prober = DeviceProber::new(Duration::from_secs(5));
        let outcome = prober
            .probe(vec![broken, device], dev_verifier(), &CancellationToken::new())
            .await;

        assert!(outcome.is_won());
        assert_eq!(broken_handle.stats().closes(), 1);
    }

    #[tokio::test]
    async fn test_no_match_before_deadline_is_all_failed() {
        let (quiet, quiet_handle) = MockTransport::new("quiet");
        let (chatty, chatty_handle) = MockTransport::new("chatty");
        chatty_handle.push("hello");

        let prober = DeviceProber::new(Duration::from_millis(50));
        let started = Instant::now();
        let outcome = prober
            .probe(vec![quiet, chatty], dev_verifier(), &CancellationToken::new())
            .await;

        assert!(matches!(outcome, ProbeOutcome::AllFailed));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(quiet_handle.stats().closes(), 1);
        assert_eq!(chatty_handle.stats().closes(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_closes_every_candidate() {
        let (a, a_handle) = MockTransport::new("a");
        let (b, b_handle) = MockTransport::new("b");

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let prober = DeviceProber::new(Duration::from_secs(30));
        let outcome = tokio::time::timeout(
            Duration::from_secs(2),
            prober.probe(vec![a, b], dev_verifier(), &cancel),
        )
        .await
        .unwrap();

        assert!(matches!(outcome, ProbeOutcome::Cancelled));
        assert_eq!(a_handle.stats().closes(), 1);
        assert_eq!(b_handle.stats().closes(), 1);
    }

    #[tokio::test]
    async fn test_simultaneous_matches_yield_one_winner() {
        let (a, a_handle) = MockTransport::new("a");
        let (b, b_handle) = MockTransport::new("b");
        a_handle.push("DEV-A");
        b_handle.push("DEV-B");

        let prober = DeviceProber::new(Duration::from_secs(5));
        let ProbeOutcome::Won(winner) = prober
            .probe(vec![a, b], dev_verifier(), &CancellationToken::new())
            .await
        else {
            panic!("expected a winner");
        };

        let (winner_stats, loser_stats) = if winner.port == "a" {
            (a_handle.stats(), b_handle.stats())
        } else {
            (b_handle.stats(), a_handle.stats())
        };
        assert_eq!(winner_stats.closes(), 0);
        assert_eq!(loser_stats.closes(), 1);
    }

    #[tokio::test]
    async fn test_empty_candidate_set_fails_round() {
        let prober = DeviceProber::new(Duration::from_millis(10));
        let outcome = prober
            .probe(Vec::<MockTransport>::new(), dev_verifier(), &CancellationToken::new())
            .await;
        assert!(matches!(outcome, ProbeOutcome::AllFailed));
    }
}
