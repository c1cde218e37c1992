use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use credo_common::{
    auth::BundleSigner,
    error::Result,
    random::{RandomSource, SeededRandom, ThreadRandom},
    storage::{KvStore, RedbStore},
};
use credo_consensus::{ConsensusSyncCoordinator, SyncMetrics};
use credo_export::{ExportGateway, ExportMetrics};
use credo_mint::{MintAuthority, MintMetrics};
use credo_reconcile::{ConflictReconciler, ReconcileMetrics};

use crate::config::Config;

/// The four components wired over one store.
pub struct Engine {
    pub store: Arc<dyn KvStore>,
    pub mint: Arc<MintAuthority>,
    pub sync: Arc<ConsensusSyncCoordinator>,
    pub export: Arc<ExportGateway>,
    pub reconciler: Arc<ConflictReconciler>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub mint: MintMetrics,
    pub sync: SyncMetrics,
    pub export: ExportMetrics,
    pub reconcile: ReconcileMetrics,
    pub credentials: usize,
    pub ledger_entries: usize,
    pub log_records: usize,
    pub export_history: usize,
    pub conflicts: usize,
    pub bundle_public_key: String,
}

/// Opens the redb store under `config.data_dir` and builds the engine on it.
pub fn build_engine(config: &Config) -> Result<Engine> {
    let store: Arc<dyn KvStore> = Arc::new(RedbStore::open(&config.data_dir)?);
    info!("📂 Store opened at {}", config.data_dir);

    let (rng, signer): (Arc<dyn RandomSource>, BundleSigner) = match config.seed {
        Some(seed) => {
            info!("🎲 Deterministic run with seed {}", seed);
            (Arc::new(SeededRandom::new(seed)), BundleSigner::from_seed(seed))
        }
        None => (Arc::new(ThreadRandom), BundleSigner::generate()),
    };

    Ok(Engine::with_parts(config, store, rng, signer))
}

impl Engine {
    pub fn with_parts(
        config: &Config,
        store: Arc<dyn KvStore>,
        rng: Arc<dyn RandomSource>,
        signer: BundleSigner,
    ) -> Self {
        let mint = Arc::new(MintAuthority::new(config.mint.clone(), Arc::clone(&store), Arc::clone(&rng)));
        let sync = Arc::new(ConsensusSyncCoordinator::new(
            config.sync.clone(),
            Arc::clone(&mint),
            Arc::clone(&store),
            Arc::clone(&rng),
        ));
        let export = Arc::new(ExportGateway::new(
            config.export.clone(),
            Arc::clone(&mint),
            Arc::clone(&sync),
            signer,
            Arc::clone(&store),
            Arc::clone(&rng),
        ));
        let reconciler = Arc::new(ConflictReconciler::new(
            config.reconcile.clone(),
            Arc::clone(&sync),
            Arc::clone(&export),
            Arc::clone(&store),
            rng,
        ));

        Self { store, mint, sync, export, reconciler }
    }

    pub async fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            mint: self.mint.metrics().await,
            sync: self.sync.metrics().await,
            export: self.export.metrics().await,
            reconcile: self.reconciler.metrics().await,
            credentials: self.mint.credentials().await.len(),
            ledger_entries: self.sync.ledger().await.len(),
            log_records: self.sync.log().await.len(),
            export_history: self.export.history().await.len(),
            conflicts: self.reconciler.conflict_log().await.len(),
            bundle_public_key: self.export.public_key_hex(),
        }
    }

    /// Resets every component, downstream first.
    pub async fn clear(&self) {
        self.reconciler.clear().await;
        self.export.clear().await;
        self.sync.clear().await;
        self.mint.clear().await;
    }
}
