//! Wiring: opens every state document, builds the clients and spawns one
//! reconciliation worker per tracker.

use crate::arr::{SeasonTotals, SonarrClient};
use crate::config::Config;
use crate::identity::IdentityResolver;
use crate::ledger::NotifiedLedger;
use crate::library::{JellyfinClient, LibraryClient};
use crate::notifications::{Dispatcher, NotificationManager};
use crate::reconcile::{PendingQueue, ReconcileSettings, ReconcileWorker};
use crate::season::SeasonProgressGate;
use crate::signals::{AnnounceWindows, SignalHandler};
use crate::state::StateStore;
use crate::suppression::SuppressionMarks;
use reelwatch_common::TrackerKind;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Every persisted document the engine works on, one handle each.
#[derive(Clone)]
pub struct EngineStores {
    pub movies: Arc<PendingQueue>,
    pub series: Arc<PendingQueue>,
    pub seasons: Arc<SeasonProgressGate>,
    pub suppression: Arc<SuppressionMarks>,
    pub ledger: Arc<NotifiedLedger>,
}

impl EngineStores {
    pub fn open(store: Arc<StateStore>, config: &Config) -> Self {
        Self {
            movies: Arc::new(PendingQueue::new(store.clone(), TrackerKind::Movies)),
            series: Arc::new(PendingQueue::new(store.clone(), TrackerKind::Series)),
            seasons: Arc::new(SeasonProgressGate::new(store.clone(), config.seasons.min_gap())),
            suppression: Arc::new(SuppressionMarks::new(store.clone())),
            ledger: Arc::new(NotifiedLedger::new(store, config.state.notified_max_entries)),
        }
    }

    pub fn queue(&self, tracker: TrackerKind) -> &Arc<PendingQueue> {
        match tracker {
            TrackerKind::Movies => &self.movies,
            TrackerKind::Series => &self.series,
        }
    }
}

pub struct Engine {
    pub stores: EngineStores,
    pub signals: Arc<SignalHandler>,
    workers: Vec<Arc<ReconcileWorker>>,
}

impl Engine {
    /// Build the engine against the real library and notification channels.
    pub fn from_config(config: &Config) -> Self {
        let store = Arc::new(StateStore::new(config.state.dir.clone()));
        let library: Arc<dyn LibraryClient> = Arc::new(JellyfinClient::new(&config.library));
        let dispatcher: Arc<dyn Dispatcher> =
            Arc::new(NotificationManager::new(config, library.clone()));
        let season_totals = config
            .tracker(TrackerKind::Series)
            .map(|t| Arc::new(SonarrClient::new(t)) as Arc<dyn SeasonTotals>);

        Self::new(config, store, library, dispatcher, season_totals)
    }

    pub fn new(
        config: &Config,
        store: Arc<StateStore>,
        library: Arc<dyn LibraryClient>,
        dispatcher: Arc<dyn Dispatcher>,
        season_totals: Option<Arc<dyn SeasonTotals>>,
    ) -> Self {
        let stores = EngineStores::open(store, config);
        let resolver = Arc::new(IdentityResolver::new(library.clone()));
        let settings = ReconcileSettings::from_config(config);

        let workers = [TrackerKind::Movies, TrackerKind::Series]
            .into_iter()
            .map(|tracker| {
                Arc::new(ReconcileWorker::new(
                    stores.queue(tracker).clone(),
                    resolver.clone(),
                    library.clone(),
                    stores.seasons.clone(),
                    stores.suppression.clone(),
                    dispatcher.clone(),
                    settings.clone(),
                ))
            })
            .collect();

        let signals = Arc::new(SignalHandler::new(
            stores.clone(),
            library,
            dispatcher,
            season_totals,
            AnnounceWindows::from_config(config),
        ));

        Self {
            stores,
            signals,
            workers,
        }
    }

    pub fn worker(&self, tracker: TrackerKind) -> Option<&Arc<ReconcileWorker>> {
        self.workers.iter().find(|w| w.tracker() == tracker)
    }

    /// Spawn every worker on the current runtime.
    pub fn spawn_workers(&self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        self.workers
            .iter()
            .map(|worker| tokio::spawn(worker.clone().run(shutdown.clone())))
            .collect()
    }
}
