use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use credo_common::{
    crypto::compute_proof_hash,
    error::{CredoError, Result, ValidationError},
    random::RandomSource,
    storage::{keys, load_collection, persist, KvStore},
    types::validate_subject_id,
    utils::{current_time_millis, simulate_latency},
    CredentialClass,
};

use crate::{
    config::MintConfig,
    metrics::MintMetrics,
    model::{Credential, FallbackRecord, MintRecord, MintResult},
};

/// Issues, records and revokes credentials.
///
/// History, fallback store and metrics are each guarded by their own lock so
/// concurrent mints serialize per structure without blocking each other's
/// simulated latency.
pub struct MintAuthority {
    config: MintConfig,
    store: Arc<dyn KvStore>,
    rng: Arc<dyn RandomSource>,
    history: RwLock<VecDeque<MintRecord>>,
    fallback: RwLock<Vec<FallbackRecord>>,
    metrics: RwLock<MintMetrics>,
}

impl MintAuthority {
    /// Creates an authority and restores any persisted state from `store`.
    pub fn new(config: MintConfig, store: Arc<dyn KvStore>, rng: Arc<dyn RandomSource>) -> Self {
        let history: VecDeque<MintRecord> = load_collection(store.as_ref(), keys::MINT_HISTORY);
        let fallback: Vec<FallbackRecord> = load_collection(store.as_ref(), keys::MINT_FALLBACK);
        let metrics: MintMetrics = load_collection(store.as_ref(), keys::MINT_METRICS);

        if !history.is_empty() {
            info!("📂 Restored {} mint records", history.len());
        }

        Self {
            config,
            store,
            rng,
            history: RwLock::new(history),
            fallback: RwLock::new(fallback),
            metrics: RwLock::new(metrics),
        }
    }

    /// Mints a credential for `subject_id`.
    ///
    /// # Errors
    /// Returns a [`ValidationError`] for a malformed identifier, an unknown
    /// class or non-object metadata. Simulated faults are reported through
    /// [`MintResult`] instead.
    pub async fn mint(
        &self,
        subject_id: &str,
        class: &str,
        metadata: Value,
        issuer_id: Option<&str>,
    ) -> Result<MintResult> {
        let started = Instant::now();
        simulate_latency(self.rng.as_ref(), self.config.latency_ms).await;

        let record_id = Uuid::new_v4().to_string();

        let (class_parsed, metadata) = match validate_request(subject_id, class, metadata) {
            Ok(valid) => valid,
            Err(e) => {
                warn!("❌ Rejected mint for '{}': {}", subject_id, e);
                let record = MintRecord {
                    id: record_id,
                    subject_id: subject_id.to_string(),
                    requested_class: class.to_string(),
                    success: false,
                    credential: None,
                    error: Some(e.kind().to_string()),
                    duration_ms: elapsed_ms(started),
                    timestamp: current_time_millis(),
                };
                self.push_history(record).await;
                self.record_metrics(false, elapsed_ms(started)).await;
                return Err(e.into());
            }
        };

        let issued_at = current_time_millis();
        let credential = Credential {
            subject_id: subject_id.to_string(),
            class: class_parsed,
            proof_digest: compute_proof_hash(subject_id, class_parsed, &Value::Object(metadata.clone()), issued_at),
            metadata,
            issued_at,
            issuer_id: issuer_id.unwrap_or(self.config.default_issuer.as_str()).to_string(),
            revoked: false,
            revoked_at: None,
            revocation_reason: None,
        };

        let degraded = self.is_degraded().await;
        let injected_failure = !self.rng.chance(1.0 - self.config.injected_failure_rate);

        if injected_failure {
            if degraded {
                return Ok(self.issue_via_fallback(record_id, credential, started).await);
            }

            warn!("⚠️ Simulated issuance fault for '{}'", subject_id);
            let duration_ms = elapsed_ms(started);
            self.push_history(MintRecord {
                id: record_id.clone(),
                subject_id: subject_id.to_string(),
                requested_class: class.to_string(),
                success: false,
                credential: None,
                error: Some("InjectedFailure".to_string()),
                duration_ms,
                timestamp: current_time_millis(),
            })
            .await;
            self.record_metrics(false, duration_ms).await;

            return Ok(MintResult {
                success: false,
                record_id,
                credential: None,
                error: Some("InjectedFailure".to_string()),
                path_b_triggered: false,
                duration_ms,
            });
        }

        let duration_ms = elapsed_ms(started);
        self.push_history(MintRecord {
            id: record_id.clone(),
            subject_id: subject_id.to_string(),
            requested_class: class.to_string(),
            success: true,
            credential: Some(credential.clone()),
            error: None,
            duration_ms,
            timestamp: current_time_millis(),
        })
        .await;
        self.record_metrics(true, duration_ms).await;

        info!("✅ Minted {} credential for '{}' ({})", credential.class, subject_id, short(&credential.proof_digest));
        tracing::info!(target: "ledger", "EVENT:MINT subject={} class={} digest={}", subject_id, credential.class, credential.proof_digest);

        Ok(MintResult {
            success: true,
            record_id,
            credential: Some(credential),
            error: None,
            path_b_triggered: false,
            duration_ms,
        })
    }

    async fn issue_via_fallback(&self, record_id: String, credential: Credential, started: Instant) -> MintResult {
        let failure_rate = self.metrics.read().await.failure_rate;
        let record = FallbackRecord {
            id: record_id.clone(),
            subject_id: credential.subject_id.clone(),
            credential: Some(credential.clone()),
            reason: "InjectedFailure".to_string(),
            failure_rate,
            timestamp: current_time_millis(),
            path_b_triggered: true,
        };

        {
            let mut fallback = self.fallback.write().await;
            fallback.push(record);
            persist(self.store.as_ref(), keys::MINT_FALLBACK, &*fallback);
        }

        let duration_ms = elapsed_ms(started);
        {
            let mut metrics = self.metrics.write().await;
            metrics.fallback_mints += 1;
        }
        self.record_metrics(false, duration_ms).await;

        warn!("🛟 Mint for '{}' satisfied via fallback store", credential.subject_id);
        tracing::info!(target: "ledger", "EVENT:MINT_FALLBACK subject={} digest={}", credential.subject_id, credential.proof_digest);

        MintResult {
            success: true,
            record_id,
            credential: Some(credential),
            error: None,
            path_b_triggered: true,
            duration_ms,
        }
    }

    /// Revokes the active credential with the given digest.
    ///
    /// # Errors
    /// [`CredoError::NotFound`] if no non-revoked credential matches, which
    /// includes credentials that were already revoked.
    pub async fn revoke(&self, proof_digest: &str, reason: Option<&str>) -> Result<Credential> {
        let now = current_time_millis();

        {
            let mut history = self.history.write().await;
            let hit = history
                .iter_mut()
                .filter_map(|r| r.credential.as_mut())
                .find(|c| c.proof_digest == proof_digest && c.is_active());
            if let Some(credential) = hit {
                credential.revoke(now, reason.map(str::to_string));
                let revoked = credential.clone();
                persist(self.store.as_ref(), keys::MINT_HISTORY, &*history);
                info!("🚫 Revoked credential {}", short(proof_digest));
                return Ok(revoked);
            }
        }

        let mut fallback = self.fallback.write().await;
        let hit = fallback
            .iter_mut()
            .filter_map(|r| r.credential.as_mut())
            .find(|c| c.proof_digest == proof_digest && c.is_active());
        match hit {
            Some(credential) => {
                credential.revoke(now, reason.map(str::to_string));
                let revoked = credential.clone();
                persist(self.store.as_ref(), keys::MINT_FALLBACK, &*fallback);
                info!("🚫 Revoked fallback credential {}", short(proof_digest));
                Ok(revoked)
            }
            None => Err(CredoError::NotFound(proof_digest.to_string())),
        }
    }

    /// Looks a credential up by digest in the primary history, then the fallback store.
    pub async fn find_credential(&self, proof_digest: &str) -> Option<Credential> {
        let found = self
            .history
            .read()
            .await
            .iter()
            .filter_map(|r| r.credential.as_ref())
            .find(|c| c.proof_digest == proof_digest)
            .cloned();
        if found.is_some() {
            return found;
        }

        self.fallback
            .read()
            .await
            .iter()
            .filter_map(|r| r.credential.as_ref())
            .find(|c| c.proof_digest == proof_digest)
            .cloned()
    }

    /// Every issued credential still held, primary path first.
    pub async fn credentials(&self) -> Vec<Credential> {
        let mut all: Vec<Credential> = self
            .history
            .read()
            .await
            .iter()
            .filter_map(|r| r.credential.clone())
            .collect();
        all.extend(self.fallback.read().await.iter().filter_map(|r| r.credential.clone()));
        all
    }

    pub async fn history(&self) -> Vec<MintRecord> {
        self.history.read().await.iter().cloned().collect()
    }

    pub async fn fallback_records(&self) -> Vec<FallbackRecord> {
        self.fallback.read().await.clone()
    }

    pub async fn metrics(&self) -> MintMetrics {
        self.metrics.read().await.clone()
    }

    pub async fn is_degraded(&self) -> bool {
        self.metrics.read().await.degraded
    }

    /// Resets history, fallback store and metrics to their initial values.
    pub async fn clear(&self) {
        let mut history = self.history.write().await;
        let mut fallback = self.fallback.write().await;
        let mut metrics = self.metrics.write().await;
        history.clear();
        fallback.clear();
        *metrics = MintMetrics::default();
        persist(self.store.as_ref(), keys::MINT_HISTORY, &*history);
        persist(self.store.as_ref(), keys::MINT_FALLBACK, &*fallback);
        persist(self.store.as_ref(), keys::MINT_METRICS, &*metrics);
        info!("🧹 Mint authority cleared");
    }

    async fn push_history(&self, record: MintRecord) {
        let mut history = self.history.write().await;
        history.push_back(record);
        while history.len() > self.config.history_capacity {
            if let Some(evicted) = history.pop_front() {
                debug!("Evicted mint record {}", evicted.id);
            }
        }
        persist(self.store.as_ref(), keys::MINT_HISTORY, &*history);
    }

    async fn record_metrics(&self, success: bool, duration_ms: u64) {
        let mut metrics = self.metrics.write().await;
        metrics.record(success, duration_ms, current_time_millis());
        if metrics.check_degraded(self.config.failure_threshold) {
            warn!(
                "🚨 Mint failure rate {:.1}% above {:.1}%: degraded mode enabled",
                metrics.failure_rate * 100.0,
                self.config.failure_threshold * 100.0
            );
        }
        persist(self.store.as_ref(), keys::MINT_METRICS, &*metrics);
    }
}

fn validate_request(
    subject_id: &str,
    class: &str,
    metadata: Value,
) -> std::result::Result<(CredentialClass, Map<String, Value>), ValidationError> {
    validate_subject_id(subject_id)?;
    let class = class.parse::<CredentialClass>()?;
    match metadata {
        Value::Object(map) => Ok((class, map)),
        Value::Null => Err(ValidationError::InvalidMetadata("metadata is null".to_string())),
        other => Err(ValidationError::InvalidMetadata(format!("expected an object, got {}", json_kind(&other)))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn short(digest: &str) -> &str {
    &digest[..digest.len().min(12)]
}
