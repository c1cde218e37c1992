use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Notify, RwLock};
use tokio::time::{self, Duration};
use tracing::{debug, info, warn};
use uuid::Uuid;

use credo_common::{
    random::RandomSource,
    storage::{keys, load_collection, persist, KvStore},
    utils::current_time_millis,
};
use credo_consensus::{ConsensusSyncCoordinator, SyncLogRecord};
use credo_export::ExportGateway;

use crate::{
    config::ReconcileConfig,
    detect::{build_index, classify},
    metrics::ReconcileMetrics,
    model::{ConflictEntry, ResolutionStatus},
    voting::{collect_votes, decide, revalidate},
};

/// Detects and resolves divergence between the sync log and the export history.
pub struct ConflictReconciler {
    config: ReconcileConfig,
    sync: Arc<ConsensusSyncCoordinator>,
    export: Arc<ExportGateway>,
    store: Arc<dyn KvStore>,
    rng: Arc<dyn RandomSource>,
    conflicts: RwLock<VecDeque<ConflictEntry>>,
    fallback: RwLock<Vec<ConflictEntry>>,
    metrics: RwLock<ReconcileMetrics>,
    stop: AtomicBool,
    wake: Notify,
}

impl ConflictReconciler {
    pub fn new(
        config: ReconcileConfig,
        sync: Arc<ConsensusSyncCoordinator>,
        export: Arc<ExportGateway>,
        store: Arc<dyn KvStore>,
        rng: Arc<dyn RandomSource>,
    ) -> Self {
        let conflicts: VecDeque<ConflictEntry> = load_collection(store.as_ref(), keys::RECONCILE_CONFLICTS);
        let fallback: Vec<ConflictEntry> = load_collection(store.as_ref(), keys::RECONCILE_FALLBACK);
        let metrics: ReconcileMetrics = load_collection(store.as_ref(), keys::RECONCILE_METRICS);

        if !conflicts.is_empty() {
            info!("📂 Restored {} conflict entries", conflicts.len());
        }

        Self {
            config,
            sync,
            export,
            store,
            rng,
            conflicts: RwLock::new(conflicts),
            fallback: RwLock::new(fallback),
            metrics: RwLock::new(metrics),
            stop: AtomicBool::new(false),
            wake: Notify::new(),
        }
    }

    /// Indexes both stores and returns a pending entry for every credential
    /// whose sources diverge. Nothing is recorded.
    ///
    /// Source sets already under resolution, or already left failed or in
    /// arbitration, are not reported again.
    pub async fn detect(&self) -> Vec<ConflictEntry> {
        let conflicts = self.conflicts.read().await;
        self.scan(&conflicts).await
    }

    /// Detects and records new conflicts as `Pending` under one write lock,
    /// so overlapping passes never claim the same source set twice.
    ///
    /// The lock is taken before the stores are read: a resolution appends its
    /// record to the sync log before it leaves the unresolved set, so a scan
    /// under the lock sees either the claim or the superseding record.
    async fn claim(&self) -> Vec<ConflictEntry> {
        let mut conflicts = self.conflicts.write().await;
        let detected = self.scan(&conflicts).await;
        if detected.is_empty() {
            return detected;
        }
        for entry in &detected {
            push_bounded(&mut conflicts, entry.clone(), self.config.conflict_capacity);
        }
        persist(self.store.as_ref(), keys::RECONCILE_CONFLICTS, &*conflicts);
        detected
    }

    /// Drops claims that were never started so a later pass can pick them up.
    async fn release(&self, unstarted: &[ConflictEntry]) {
        let ids: HashSet<&str> = unstarted.iter().map(|c| c.id.as_str()).collect();
        let mut conflicts = self.conflicts.write().await;
        conflicts.retain(|c| !(c.status == ResolutionStatus::Pending && ids.contains(c.id.as_str())));
        persist(self.store.as_ref(), keys::RECONCILE_CONFLICTS, &*conflicts);
    }

    async fn scan(&self, conflicts: &VecDeque<ConflictEntry>) -> Vec<ConflictEntry> {
        let log = self.sync.log().await;
        let history = self.export.history().await;
        let index = build_index(&log, &history);

        let known: HashSet<Vec<String>> = conflicts
            .iter()
            .filter(|c| c.status != ResolutionStatus::Resolved)
            .map(ConflictEntry::source_ids)
            .collect();

        let now = current_time_millis();
        let mut detected = Vec::new();
        for (credential_ref, sources) in index {
            let Some(kind) = classify(&sources) else {
                continue;
            };
            let entry = ConflictEntry::new(Uuid::new_v4().to_string(), &credential_ref, kind, sources, now);
            if known.contains(&entry.source_ids()) {
                continue;
            }
            debug!("🔎 {} conflict on {} across {} sources", kind, short(&credential_ref), entry.detected_sources.len());
            detected.push(entry);
        }
        detected
    }

    /// Revalidates, votes and settles one conflict. The entry is recorded in
    /// the conflict log as soon as resolution starts, if it was not already
    /// claimed by a pass.
    pub async fn resolve(&self, mut entry: ConflictEntry) -> ConflictEntry {
        let started = Instant::now();
        if !entry.advance(ResolutionStatus::Resolving) {
            warn!("⚠️ Conflict {} is already {}, not resolving again", entry.id, entry.status);
            return entry;
        }
        self.upsert(&entry).await;
        let was_degraded = self.is_degraded().await;

        let revalidation = revalidate(&entry.credential_ref, &entry.detected_sources, &self.config, self.rng.as_ref()).await;
        let votes = collect_votes(&revalidation, &self.config, self.rng.as_ref()).await;
        let outcome = decide(&votes, &revalidation);

        entry.votes = votes;
        entry.advance(outcome);

        if outcome == ResolutionStatus::Resolved {
            let (winners, rejected): (Vec<_>, Vec<_>) = entry
                .detected_sources
                .iter()
                .cloned()
                .partition(|s| s.proof_digest == revalidation.recomputed_digest);
            // Several sources may carry the winning digest; the first one wins.
            let mut winners = winners.into_iter();
            entry.winning_entry = winners.next();
            entry.rejected = rejected.into_iter().chain(winners).collect();
        } else {
            entry.rejected = entry.detected_sources.clone();
        }
        entry.revalidation = Some(revalidation);

        let now = current_time_millis();
        let duration_ms = started.elapsed().as_millis() as u64;
        entry.resolved_at = Some(now);
        entry.resolution_ms = Some(duration_ms);

        if let Some(winner) = &entry.winning_entry {
            let record = SyncLogRecord::resolution(
                Uuid::new_v4().to_string(),
                &entry.credential_ref,
                &winner.proof_digest,
                &winner.status,
                winner.cid.clone(),
                entry.detected_sources.iter().map(|s| s.record_id.clone()).collect(),
                now,
            );
            self.sync.append_resolution(record).await;
        }

        if was_degraded && entry.status.is_unresolved() {
            entry.pushed_to_fallback = true;
            entry.path_b_triggered = true;
            self.push_fallback(vec![entry.clone()]).await;
        }
        self.upsert(&entry).await;
        if self.record_metrics(entry.status, duration_ms).await && entry.status.is_unresolved() {
            entry.pushed_to_fallback = true;
            entry.path_b_triggered = true;
        }

        if duration_ms > self.config.resolution_budget_ms {
            warn!(
                "🐢 Resolution of {} took {} ms (budget {} ms)",
                entry.id, duration_ms, self.config.resolution_budget_ms
            );
        }

        match entry.status {
            ResolutionStatus::Resolved => info!("✅ Conflict {} ({}) resolved", entry.id, entry.kind),
            ResolutionStatus::Failed => warn!("❌ Conflict {} ({}) failed", entry.id, entry.kind),
            _ => warn!("⚖️ Conflict {} ({}) escalated to arbitration", entry.id, entry.kind),
        }
        tracing::info!(
            target: "ledger",
            "EVENT:RESOLVE conflict={} credential={} kind={} status={} votes={} winner={}",
            entry.id,
            entry.credential_ref,
            entry.kind,
            entry.status,
            entry.votes.len(),
            entry.winning_entry.as_ref().map(|w| w.record_id.as_str()).unwrap_or("-")
        );

        entry
    }

    /// One full pass. Stops early, between conflicts, if a stop was requested.
    pub async fn detect_and_resolve(&self) -> Vec<ConflictEntry> {
        let started = Instant::now();
        let claimed = self.claim().await;
        let mut settled = Vec::with_capacity(claimed.len());

        let mut queue = claimed.into_iter();
        while let Some(entry) = queue.next() {
            if self.stop_requested() {
                info!("⏹️ Reconciliation pass interrupted after {} conflicts", settled.len());
                let unstarted: Vec<ConflictEntry> = std::iter::once(entry).chain(queue.by_ref()).collect();
                self.release(&unstarted).await;
                break;
            }
            settled.push(self.resolve(entry).await);
        }

        {
            let mut metrics = self.metrics.write().await;
            metrics.passes += 1;
            persist(self.store.as_ref(), keys::RECONCILE_METRICS, &*metrics);
        }

        let elapsed = started.elapsed().as_millis() as u64;
        if elapsed > self.config.pass_budget_ms {
            warn!("🐢 Reconciliation pass took {} ms (budget {} ms)", elapsed, self.config.pass_budget_ms);
        }
        if !settled.is_empty() {
            info!("🔁 Reconciliation pass settled {} conflicts in {} ms", settled.len(), elapsed);
        }
        settled
    }

    /// Runs passes every `every` until [`request_stop`](Self::request_stop).
    pub async fn run_periodic(self: Arc<Self>, every: Duration) {
        self.stop.store(false, Ordering::SeqCst);
        let mut ticker = time::interval(every);
        info!("🔄 Periodic reconciliation every {:?}", every);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.stop_requested() {
                        break;
                    }
                    self.detect_and_resolve().await;
                }
                _ = self.wake.notified() => {}
            }
            if self.stop_requested() {
                break;
            }
        }
        info!("⏹️ Periodic reconciliation stopped");
    }

    /// Best effort: the running pass finishes its current conflict first.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub async fn conflict_log(&self) -> Vec<ConflictEntry> {
        self.conflicts.read().await.iter().cloned().collect()
    }

    pub async fn fallback_entries(&self) -> Vec<ConflictEntry> {
        self.fallback.read().await.clone()
    }

    pub async fn metrics(&self) -> ReconcileMetrics {
        self.metrics.read().await.clone()
    }

    pub async fn is_degraded(&self) -> bool {
        self.metrics.read().await.degraded
    }

    pub async fn clear(&self) {
        let mut conflicts = self.conflicts.write().await;
        let mut fallback = self.fallback.write().await;
        let mut metrics = self.metrics.write().await;
        conflicts.clear();
        fallback.clear();
        *metrics = ReconcileMetrics::default();
        self.stop.store(false, Ordering::SeqCst);
        persist(self.store.as_ref(), keys::RECONCILE_CONFLICTS, &*conflicts);
        persist(self.store.as_ref(), keys::RECONCILE_FALLBACK, &*fallback);
        persist(self.store.as_ref(), keys::RECONCILE_METRICS, &*metrics);
        info!("🧹 Conflict reconciler cleared");
    }

    async fn upsert(&self, entry: &ConflictEntry) {
        let mut conflicts = self.conflicts.write().await;
        match conflicts.iter_mut().find(|c| c.id == entry.id) {
            Some(existing) => *existing = entry.clone(),
            None => push_bounded(&mut conflicts, entry.clone(), self.config.conflict_capacity),
        }
        persist(self.store.as_ref(), keys::RECONCILE_CONFLICTS, &*conflicts);
    }

    async fn push_fallback(&self, entries: Vec<ConflictEntry>) {
        if entries.is_empty() {
            return;
        }
        let mut fallback = self.fallback.write().await;
        fallback.extend(entries);
        persist(self.store.as_ref(), keys::RECONCILE_FALLBACK, &*fallback);
    }

    /// Updates metrics. On entering degraded mode every failed or arbitrated
    /// entry in the conflict log is tagged and copied to the fallback store.
    /// Returns `true` on that transition.
    async fn record_metrics(&self, status: ResolutionStatus, duration_ms: u64) -> bool {
        let entered = {
            let mut metrics = self.metrics.write().await;
            metrics.record(status, duration_ms, current_time_millis());
            let entered = metrics.check_degraded(self.config.unresolved_threshold);
            if entered {
                warn!(
                    "🚨 Unresolved conflict rate {:.1}% above {:.1}%: degraded mode enabled",
                    metrics.unresolved_rate * 100.0,
                    self.config.unresolved_threshold * 100.0
                );
            }
            persist(self.store.as_ref(), keys::RECONCILE_METRICS, &*metrics);
            entered
        };
        if !entered {
            return false;
        }

        let pushed = {
            let mut conflicts = self.conflicts.write().await;
            let mut pushed = Vec::new();
            for entry in conflicts.iter_mut().filter(|c| c.status.is_unresolved() && !c.pushed_to_fallback) {
                entry.pushed_to_fallback = true;
                entry.path_b_triggered = true;
                pushed.push(entry.clone());
            }
            persist(self.store.as_ref(), keys::RECONCILE_CONFLICTS, &*conflicts);
            pushed
        };
        self.push_fallback(pushed).await;
        true
    }
}

fn push_bounded(conflicts: &mut VecDeque<ConflictEntry>, entry: ConflictEntry, capacity: usize) {
    conflicts.push_back(entry);
    while conflicts.len() > capacity {
        conflicts.pop_front();
    }
}

fn short(digest: &str) -> &str {
    &digest[..digest.len().min(12)]
}
