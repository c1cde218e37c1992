//! Revalidation and committee voting for a single conflict.

use futures::future::join_all;

use credo_common::{random::RandomSource, utils::simulate_latency, NodeId};

use crate::{
    config::ReconcileConfig,
    model::{NodeVote, ResolutionStatus, Revalidation, SourceRecord, Vote},
};

/// Most frequent digest among `sources`. Ties go to the digest seen first.
pub fn dominant_digest(sources: &[SourceRecord]) -> Option<(&str, usize)> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for source in sources {
        match counts.iter_mut().find(|(d, _)| *d == source.proof_digest) {
            Some((_, n)) => *n += 1,
            None => counts.push((source.proof_digest.as_str(), 1)),
        }
    }
    // `max_by_key` keeps the last maximum, so walk in reverse.
    counts.into_iter().rev().max_by_key(|(_, n)| *n)
}

pub async fn revalidate(
    credential_ref: &str,
    sources: &[SourceRecord],
    config: &ReconcileConfig,
    rng: &dyn RandomSource,
) -> Revalidation {
    let validators: Vec<NodeId> = (1..=config.validators).map(|i| NodeId::new(format!("validator-{}", i))).collect();
    join_all(validators.iter().map(|_| simulate_latency(rng, config.latency_ms))).await;

    let (recomputed, frequency) = dominant_digest(sources).unwrap_or((credential_ref, 0));
    Revalidation {
        original_digest: credential_ref.to_string(),
        recomputed_digest: recomputed.to_string(),
        majority_confirmed: !sources.is_empty() && frequency * 2 >= sources.len(),
        valid: rng.chance(config.proof_validity_rate),
        validators,
    }
}

/// Polls the committee. Members that sit out cast no vote at all.
pub async fn collect_votes(revalidation: &Revalidation, config: &ReconcileConfig, rng: &dyn RandomSource) -> Vec<NodeVote> {
    let confirmed = revalidation.majority_confirmed && revalidation.valid;

    let ballots = (1..=config.voter_count).map(|i| async move {
        simulate_latency(rng, config.latency_ms).await;
        if !rng.chance(config.participation_rate) {
            return None;
        }
        let vote = if confirmed && rng.chance(config.accept_bias) {
            Vote::Accept
        } else if rng.chance(0.5) {
            Vote::Reject
        } else {
            Vote::Abstain
        };
        Some(NodeVote {
            node_id: NodeId::new(format!("voter-{}", i)),
            vote,
            confidence: 0.6 + rng.next_f64() * 0.4,
        })
    });

    join_all(ballots).await.into_iter().flatten().collect()
}

/// Outcome for the cast votes: a majority of accepts over a valid proof
/// resolves, a majority of rejects or an invalid proof fails, anything else
/// (including nobody voting) goes to arbitration.
pub fn decide(votes: &[NodeVote], revalidation: &Revalidation) -> ResolutionStatus {
    if votes.is_empty() {
        return ResolutionStatus::Arbitration;
    }
    let threshold = votes.len().div_ceil(2);
    let accepts = votes.iter().filter(|v| v.vote == Vote::Accept).count();
    let rejects = votes.iter().filter(|v| v.vote == Vote::Reject).count();

    if accepts >= threshold && revalidation.valid {
        ResolutionStatus::Resolved
    } else if rejects >= threshold || !revalidation.valid {
        ResolutionStatus::Failed
    } else {
        ResolutionStatus::Arbitration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceStore;
    use credo_common::random::{FixedRandom, SequenceRandom};

    fn source(id: &str, digest: &str) -> SourceRecord {
        SourceRecord {
            record_id: id.to_string(),
            store: SourceStore::SyncLog,
            credential_ref: "ref".to_string(),
            proof_digest: digest.to_string(),
            status: "completed".to_string(),
            cid: None,
            verified: true,
            timestamp: 0,
        }
    }

    fn vote(v: Vote) -> NodeVote {
        NodeVote { node_id: NodeId::new("n"), vote: v, confidence: 1.0 }
    }

    fn revalidation(valid: bool) -> Revalidation {
        Revalidation {
            original_digest: "a".into(),
            recomputed_digest: "a".into(),
            majority_confirmed: true,
            valid,
            validators: vec![],
        }
    }

    #[test]
    fn test_dominant_digest_prefers_frequency_then_order() {
        let sources = [source("1", "b"), source("2", "a"), source("3", "a")];
        assert_eq!(dominant_digest(&sources), Some(("a", 2)));

        let tied = [source("1", "x"), source("2", "y")];
        assert_eq!(dominant_digest(&tied), Some(("x", 1)));
        assert_eq!(dominant_digest(&[]), None);
    }

    #[tokio::test]
    async fn test_revalidation_majority() {
        let config = ReconcileConfig::deterministic();
        let tied = [source("1", "x"), source("2", "y")];
        let r = revalidate("x", &tied, &config, &FixedRandom(0.0)).await;
        assert!(r.majority_confirmed, "half the sources is enough");
        assert!(r.valid);
        assert_eq!(r.validators.len(), 3);

        let split = [source("1", "x"), source("2", "y"), source("3", "z")];
        let r = revalidate("x", &split, &config, &FixedRandom(0.99)).await;
        assert!(!r.majority_confirmed);
        assert!(!r.valid);
    }

    #[tokio::test]
    async fn test_votes_follow_the_rolls() {
        let config = ReconcileConfig::deterministic();
        let votes = collect_votes(&revalidation(true), &config, &FixedRandom(0.0)).await;
        assert_eq!(votes.len(), 5);
        assert!(votes.iter().all(|v| v.vote == Vote::Accept));

        let votes = collect_votes(&revalidation(true), &config, &FixedRandom(0.95)).await;
        assert!(votes.is_empty(), "nobody participates");

        // participate, miss the accept bias, land on reject, confidence roll
        let rng = SequenceRandom::new(vec![0.1, 0.9, 0.2, 0.5]);
        let votes = collect_votes(&revalidation(true), &ReconcileConfig { voter_count: 1, ..config }, &rng).await;
        assert_eq!(votes[0].vote, Vote::Reject);
        assert!((votes[0].confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_decide() {
        let valid = revalidation(true);
        assert_eq!(decide(&[], &valid), ResolutionStatus::Arbitration);
        assert_eq!(
            decide(&[vote(Vote::Accept), vote(Vote::Accept), vote(Vote::Reject)], &valid),
            ResolutionStatus::Resolved
        );
        assert_eq!(
            decide(&[vote(Vote::Reject), vote(Vote::Reject), vote(Vote::Abstain)], &valid),
            ResolutionStatus::Failed
        );
        assert_eq!(
            decide(&[vote(Vote::Accept), vote(Vote::Abstain), vote(Vote::Abstain)], &valid),
            ResolutionStatus::Arbitration
        );
        assert_eq!(decide(&[vote(Vote::Accept)], &revalidation(false)), ResolutionStatus::Failed);
    }
}
