//! Per-user search state with a supersession guard and periodic refresh.
//!
//! Every call to [`SearchSession::search`] takes a new generation number.
//! A result is committed only if its generation is still the latest one
//! issued; anything older is reported as [`SearchOutcome::Superseded`] and
//! dropped. Committed state is published on a `watch` channel so callers can
//! follow refreshes without polling.
//!
//! Each commit starts one refresh task that re-samples traffic for the
//! committed routes on a fixed interval. The task holds only the generation it
//! was started for and stops writing as soon as that generation is stale. It
//! is aborted on the next commit, on [`SearchSession::stop_refresh`], and when
//! the session is dropped.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::error::NavError;
use crate::geo::Coordinate;
use crate::routing::{RouteId, RoutePath};
use crate::search::{Aggregator, SearchOptions, SearchResult};

#[derive(Debug)]
pub enum SearchOutcome {
    Committed(SearchResult),
    /// A newer search was issued before this one finished.
    Superseded { generation: u64 },
}

impl SearchOutcome {
    pub fn committed(self) -> Option<SearchResult> {
        match self {
            SearchOutcome::Committed(result) => Some(result),
            SearchOutcome::Superseded { .. } => None,
        }
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, SearchOutcome::Superseded { .. })
    }
}

/// Committed view of a session.
#[derive(Clone, Debug, Default)]
pub struct SessionState {
    /// Latest generation issued, committed or not.
    pub generation: u64,
    /// Endpoints of the latest search issued.
    pub requested: Option<(Coordinate, Coordinate)>,
    pub committed_generation: Option<u64>,
    pub result: Option<SearchResult>,
    pub selected_route: Option<RouteId>,
    /// Refresh passes applied to the current result.
    pub refreshes: u64,
}

impl SessionState {
    pub fn selected(&self) -> Option<&RoutePath> {
        let result = self.result.as_ref()?;
        result.route(self.selected_route?)
    }
}

struct RefreshTask {
    generation: u64,
    handle: JoinHandle<()>,
}

impl Drop for RefreshTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub struct SearchSession {
    aggregator: Arc<Aggregator>,
    refresh_interval: Option<Duration>,
    state: Arc<watch::Sender<SessionState>>,
    refresh: Mutex<Option<RefreshTask>>,
}

impl SearchSession {
    /// `refresh_interval` of `None` disables periodic refresh.
    pub fn new(aggregator: Arc<Aggregator>, refresh_interval: Option<Duration>) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            aggregator,
            refresh_interval,
            state: Arc::new(state),
            refresh: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn current(&self) -> Option<SearchResult> {
        self.state.borrow().result.clone()
    }

    pub fn generation(&self) -> u64 {
        self.state.borrow().generation
    }

    /// Run a search and commit it unless a newer search was issued meanwhile.
    ///
    /// Errors are returned only for the latest search; a failed search that
    /// was already superseded reports `Superseded` like a successful one.
    pub async fn search(
        &self,
        start: Coordinate,
        end: Coordinate,
        options: &SearchOptions,
    ) -> Result<SearchOutcome, NavError> {
        let mut generation = 0;
        self.state.send_modify(|state| {
            state.generation += 1;
            state.requested = Some((start, end));
            generation = state.generation;
        });
        debug!(generation, %start, %end, "search issued");

        let outcome = self.aggregator.search(start, end, options).await;

        let mut committed = None;
        self.state.send_if_modified(|state| {
            if state.generation != generation {
                return false;
            }
            let Ok(result) = &outcome else {
                committed = Some(false);
                return false;
            };
            state.committed_generation = Some(generation);
            state.result = Some(result.clone());
            state.selected_route = Some(RouteId::Main);
            state.refreshes = 0;
            committed = Some(true);
            true
        });

        match committed {
            None => {
                debug!(generation, "discarding superseded search result");
                Ok(SearchOutcome::Superseded { generation })
            }
            Some(false) => {
                // The committed result still describes the previous request,
                // which is no longer worth refreshing.
                self.stop_refresh();
                outcome.map(SearchOutcome::Committed)
            }
            Some(true) => {
                info!(generation, "search committed");
                self.restart_refresh(generation, options.sample_count);
                outcome.map(SearchOutcome::Committed)
            }
        }
    }

    /// Change the selected route of the committed result. Never fetches.
    pub fn select_route(&self, id: RouteId) -> Result<(), NavError> {
        let mut found = false;
        self.state.send_if_modified(|state| {
            found = state
                .result
                .as_ref()
                .is_some_and(|result| result.route(id).is_some());
            if found && state.selected_route != Some(id) {
                state.selected_route = Some(id);
                return true;
            }
            false
        });
        if found {
            Ok(())
        } else {
            Err(NavError::UnknownRoute(id))
        }
    }

    pub fn selected_route(&self) -> Option<RoutePath> {
        self.state.borrow().selected().cloned()
    }

    pub fn stop_refresh(&self) {
        if let Some(task) = self.refresh_slot().take() {
            debug!(generation = task.generation, "refresh stopped");
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresh_slot()
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    fn refresh_slot(&self) -> MutexGuard<'_, Option<RefreshTask>> {
        // The slot only holds a task handle; a panic elsewhere cannot leave it
        // half-written.
        self.refresh
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn restart_refresh(&self, generation: u64, sample_count: usize) {
        let Some(period) = self.refresh_interval else {
            return;
        };
        // Holding the slot orders installs: a newer commit that already put
        // its task here is never replaced by an older one.
        let mut slot = self.refresh_slot();
        if self.state.borrow().generation != generation {
            debug!(generation, "superseded before its refresh task started");
            return;
        }
        let aggregator = Arc::clone(&self.aggregator);
        let state = Arc::clone(&self.state);
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let routes = {
                    let current = state.borrow();
                    if current.committed_generation != Some(generation)
                        || current.generation != generation
                    {
                        break;
                    }
                    match &current.result {
                        Some(result) => result.routes.clone(),
                        None => break,
                    }
                };

                let snapshot = aggregator.refresh_traffic(&routes, sample_count).await;

                let applied = state.send_if_modified(|current| {
                    if current.generation != generation {
                        return false;
                    }
                    match current.result.as_mut() {
                        Some(result) => {
                            result.apply_traffic(snapshot);
                            current.refreshes += 1;
                            true
                        }
                        None => false,
                    }
                });
                if !applied {
                    break;
                }
                debug!(generation, "traffic refreshed");
            }
        });
        // Replacing the slot drops, and so aborts, the previous task.
        *slot = Some(RefreshTask { generation, handle });
    }
}

#[cfg(all(test, feature = "test-helpers"))]
mod tests {
    use super::*;
    use crate::test_helpers::{stub_aggregator, StubFlowProvider, StubRouteProvider};

    fn refreshing_session() -> SearchSession {
        let aggregator = stub_aggregator(
            Arc::new(StubRouteProvider::with_routes(Vec::new())),
            Arc::new(StubFlowProvider::constant(30.0, 50.0)),
            None,
        );
        SearchSession::new(Arc::new(aggregator), Some(Duration::from_secs(60)))
    }

    fn installed_generation(session: &SearchSession) -> Option<u64> {
        session.refresh_slot().as_ref().map(|task| task.generation)
    }

    #[tokio::test(start_paused = true)]
    async fn older_commit_never_replaces_newer_refresh_task() {
        let session = refreshing_session();
        session.state.send_modify(|state| state.generation = 2);
        session.restart_refresh(2, 5);
        assert_eq!(installed_generation(&session), Some(2));

        // Generation 1 finishing its commit late must leave the task alone.
        session.restart_refresh(1, 5);
        assert_eq!(installed_generation(&session), Some(2));
        assert!(session.is_refreshing());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_generation_installs_nothing() {
        let session = refreshing_session();
        session.state.send_modify(|state| state.generation = 3);
        session.restart_refresh(2, 5);
        assert_eq!(installed_generation(&session), None);
        assert!(!session.is_refreshing());
    }
}
