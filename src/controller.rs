use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::filter::RiskSelector;
use crate::payloads::Projectable;
use crate::provider::DataProvider;
use crate::quality::DataQualityWarning;
use crate::record_set::RecordSet;
use crate::refresh::RefreshCoordinator;
use crate::sort::SortDirection;
use crate::view_state::{project, Projection, ViewMutation, ViewState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Ready,
    /// Carries the message shown to the operator. Cleared by retry or refresh.
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchTrigger {
    Initial,
    Retry,
    Refresh,
}

/// Identifies one fetch attempt. Only the most recently issued ticket may
/// land its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket(u64);

struct Inner<P: Projectable> {
    load_state: LoadState,
    view_state: ViewState,
    pending: VecDeque<ViewMutation>,
    records: Option<RecordSet<P>>,
    projection: Projection<P::Row>,
    latest_ticket: u64,
    refresh_seen: u64,
}

impl<P: Projectable> Inner<P> {
    fn recompute(&mut self, page_size: usize) {
        self.projection = match &self.records {
            Some(records) => project(records.payload().rows(), &self.view_state, page_size),
            None => Projection::default(),
        };
    }
}

/// Owns one page's selection and record set and keeps the visible
/// projection in step with both.
pub struct ViewController<P: Projectable> {
    id: Uuid,
    provider: Arc<dyn DataProvider>,
    page_size: usize,
    inner: Mutex<Inner<P>>,
}

impl<P: Projectable> ViewController<P> {
    pub fn new(provider: Arc<dyn DataProvider>, page_size: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider,
            page_size,
            inner: Mutex::new(Inner {
                load_state: LoadState::Idle,
                view_state: ViewState::new(P::DEFAULT_SORT),
                pending: VecDeque::new(),
                records: None,
                projection: Projection::default(),
                latest_ticket: 0,
                refresh_seen: 0,
            }),
        }
    }

    pub fn load_state(&self) -> LoadState {
        self.inner.lock().load_state.clone()
    }

    pub fn view_state(&self) -> ViewState {
        self.inner.lock().view_state.clone()
    }

    pub fn projection(&self) -> Projection<P::Row> {
        self.inner.lock().projection.clone()
    }

    pub fn pending_mutations(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn warnings(&self) -> Vec<DataQualityWarning> {
        self.inner
            .lock()
            .records
            .as_ref()
            .map(|records| records.warnings().to_vec())
            .unwrap_or_default()
    }

    pub fn with_records<R>(&self, f: impl FnOnce(Option<&RecordSet<P>>) -> R) -> R {
        let inner = self.inner.lock();
        f(inner.records.as_ref())
    }

    /// Applies a selection change now, or queues it until the in-flight fetch
    /// lands so it is never computed against records about to be replaced.
    pub fn mutate(&self, mutation: ViewMutation) {
        let mut inner = self.inner.lock();
        if inner.load_state == LoadState::Loading {
            debug!(view = %P::VIEW, id = %self.id, ?mutation, "queueing view change behind fetch");
            inner.pending.push_back(mutation);
            return;
        }
        inner.view_state.apply(mutation);
        inner.recompute(self.page_size);
    }

    pub fn set_risk(&self, risk: RiskSelector) {
        self.mutate(ViewMutation::Risk(risk));
    }

    pub fn set_search(&self, search: impl Into<String>) {
        self.mutate(ViewMutation::Search(search.into()));
    }

    pub fn set_sort_field(&self, field: impl Into<String>) {
        self.mutate(ViewMutation::SortField(field.into()));
    }

    pub fn set_direction(&self, direction: SortDirection) {
        self.mutate(ViewMutation::Direction(direction));
    }

    pub fn toggle_sort(&self, field: impl Into<String>) {
        self.mutate(ViewMutation::ToggleSort(field.into()));
    }

    /// Initial loads and retries are refused while a fetch is in flight.
    /// A refresh always starts a new fetch and supersedes any in flight.
    pub fn begin_fetch(&self, trigger: FetchTrigger) -> Option<FetchTicket> {
        let mut inner = self.inner.lock();
        self.start(&mut inner, trigger)
    }

    fn start(&self, inner: &mut Inner<P>, trigger: FetchTrigger) -> Option<FetchTicket> {
        let allowed = match (trigger, &inner.load_state) {
            (FetchTrigger::Refresh, _) => true,
            (_, LoadState::Loading) => false,
            (FetchTrigger::Initial, LoadState::Idle) => true,
            (FetchTrigger::Retry, LoadState::Idle | LoadState::Error(_)) => true,
            _ => false,
        };
        if !allowed {
            debug!(
                view = %P::VIEW,
                id = %self.id,
                ?trigger,
                state = ?inner.load_state,
                "fetch not started"
            );
            return None;
        }

        if trigger == FetchTrigger::Refresh {
            inner.records = None;
            inner.recompute(self.page_size);
        }
        inner.latest_ticket += 1;
        inner.load_state = LoadState::Loading;
        debug!(
            view = %P::VIEW,
            id = %self.id,
            ?trigger,
            ticket = inner.latest_ticket,
            "fetch started"
        );
        Some(FetchTicket(inner.latest_ticket))
    }

    /// Lands a fetch result. Returns `false` when the ticket was superseded
    /// and the response was dropped.
    pub fn complete_fetch(&self, ticket: FetchTicket, result: Result<Value>) -> bool {
        let mut inner = self.inner.lock();
        if ticket.0 != inner.latest_ticket {
            debug!(
                view = %P::VIEW,
                id = %self.id,
                ticket = ticket.0,
                latest = inner.latest_ticket,
                "dropping superseded response"
            );
            return false;
        }

        match result.and_then(RecordSet::<P>::from_value) {
            Ok(records) => {
                inner.records = Some(records);
                inner.load_state = LoadState::Ready;
            }
            Err(err) => {
                warn!(view = %P::VIEW, id = %self.id, error = %err, "fetch failed");
                inner.records = None;
                inner.load_state = LoadState::Error(err.to_string());
            }
        }

        while let Some(mutation) = inner.pending.pop_front() {
            inner.view_state.apply(mutation);
        }
        inner.recompute(self.page_size);
        true
    }

    async fn run(&self, trigger: FetchTrigger) -> bool {
        let Some(ticket) = self.begin_fetch(trigger) else {
            return false;
        };
        self.finish(ticket).await
    }

    async fn finish(&self, ticket: FetchTicket) -> bool {
        let result = self.provider.fetch(P::VIEW.endpoint()).await;
        self.complete_fetch(ticket, result)
    }

    pub async fn load(&self) -> bool {
        self.run(FetchTrigger::Initial).await
    }

    pub async fn retry(&self) -> bool {
        self.run(FetchTrigger::Retry).await
    }

    pub async fn refresh(&self) -> bool {
        self.run(FetchTrigger::Refresh).await
    }

    /// Newest refresh key this view has acted on.
    pub fn refresh_seen(&self) -> u64 {
        self.inner.lock().refresh_seen
    }

    /// Records a refresh key and, when it is newer than any seen before,
    /// invalidates the records and starts the refetch in the same step.
    pub fn observe_refresh(&self, refresh_key: u64) -> Option<FetchTicket> {
        let mut inner = self.inner.lock();
        if refresh_key <= inner.refresh_seen {
            return None;
        }
        inner.refresh_seen = refresh_key;
        self.start(&mut inner, FetchTrigger::Refresh)
    }

    /// Refetches on every coordinator increment until the coordinator is
    /// dropped. Each fetch runs as its own task so a newer one can supersede
    /// a slow one.
    pub fn follow(self: &Arc<Self>, coordinator: &RefreshCoordinator) -> JoinHandle<()> {
        let mut refreshes = coordinator.subscribe();
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            while refreshes.changed().await.is_ok() {
                let key = *refreshes.borrow_and_update();
                if let Some(ticket) = controller.observe_refresh(key) {
                    let controller = Arc::clone(&controller);
                    tokio::spawn(async move {
                        controller.finish(ticket).await;
                    });
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DashboardError;
    use crate::models::{MemberRecord, RiskLevel};
    use crate::payloads::AtRiskPayload;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::{mpsc, oneshot};

    struct Step {
        gate: Option<oneshot::Receiver<()>>,
        response: Result<Value>,
    }

    fn step(response: Result<Value>) -> Step {
        Step {
            gate: None,
            response,
        }
    }

    fn gated(gate: oneshot::Receiver<()>, response: Result<Value>) -> Step {
        Step {
            gate: Some(gate),
            response,
        }
    }

    struct ScriptedProvider {
        script: Mutex<VecDeque<Step>>,
        calls: mpsc::UnboundedSender<String>,
    }

    impl ScriptedProvider {
        fn new(steps: Vec<Step>) -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
            let (calls, rx) = mpsc::unbounded_channel();
            let provider = Arc::new(Self {
                script: Mutex::new(steps.into()),
                calls,
            });
            (provider, rx)
        }
    }

    #[async_trait]
    impl DataProvider for ScriptedProvider {
        async fn fetch(&self, endpoint: &str) -> Result<Value> {
            let next = self.script.lock().pop_front();
            let _ = self.calls.send(endpoint.to_string());
            let Some(step) = next else {
                return Err(DashboardError::NetworkFailure("script exhausted".into()));
            };
            if let Some(gate) = step.gate {
                let _ = gate.await;
            }
            step.response
        }
    }

    fn member(id: &str, fee: f64, days: u32) -> Value {
        json!({
            "member_id": id,
            "location": "Location A",
            "membership_type": "Basic",
            "monthly_fee": fee,
            "days_since_checkin": days
        })
    }

    fn at_risk(members: Vec<Value>) -> Value {
        json!({ "risk_summary": [], "at_risk_members": members })
    }

    fn ids(rows: &[MemberRecord]) -> Vec<String> {
        rows.iter().map(|m| m.member_id.clone()).collect()
    }

    fn controller(provider: Arc<ScriptedProvider>) -> ViewController<AtRiskPayload> {
        ViewController::new(provider, 100)
    }

    #[tokio::test]
    async fn initial_load_projects_with_page_defaults() {
        let payload = at_risk(vec![member("a", 30.0, 12), member("b", 50.0, 40)]);
        let (provider, mut calls) = ScriptedProvider::new(vec![step(Ok(payload))]);
        let controller = controller(provider);
        assert_eq!(controller.load_state(), LoadState::Idle);

        assert!(controller.load().await);
        assert_eq!(calls.recv().await.unwrap(), "/at-risk-members");
        assert_eq!(controller.load_state(), LoadState::Ready);
        assert_eq!(controller.view_state().sort_field, "days_since_checkin");
        assert_eq!(ids(&controller.projection().rows), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn mutations_recompute_without_refetching() {
        let payload = at_risk(vec![
            member("a", 30.0, 12),
            member("b", 50.0, 40),
            member("c", 20.0, 35),
        ]);
        let (provider, mut calls) = ScriptedProvider::new(vec![step(Ok(payload))]);
        let controller = controller(provider);
        controller.load().await;
        calls.recv().await.unwrap();

        controller.set_risk(RiskSelector::Level(RiskLevel::High));
        assert_eq!(ids(&controller.projection().rows), vec!["b", "c"]);

        controller.toggle_sort("days_since_checkin");
        assert_eq!(ids(&controller.projection().rows), vec!["c", "b"]);
        assert_eq!(controller.load_state(), LoadState::Ready);
        assert!(calls.try_recv().is_err());
    }

    #[tokio::test]
    async fn sort_change_during_fetch_applies_to_fresh_records() {
        let payload = at_risk(vec![
            member("long-gone", 20.0, 60),
            member("premium", 80.0, 15),
            member("mid", 45.0, 30),
        ]);
        let (open, gate) = oneshot::channel();
        let (provider, mut calls) = ScriptedProvider::new(vec![gated(gate, Ok(payload))]);
        let controller = controller(provider);

        let (loaded, _) = tokio::join!(controller.load(), async {
            calls.recv().await.unwrap();
            assert_eq!(controller.load_state(), LoadState::Loading);
            controller.set_sort_field("monthly_fee");
            assert_eq!(controller.pending_mutations(), 1);
            assert_eq!(controller.view_state().sort_field, "days_since_checkin");
            open.send(()).unwrap();
        });

        assert!(loaded);
        assert_eq!(controller.pending_mutations(), 0);
        assert_eq!(controller.view_state().sort_field, "monthly_fee");
        assert_eq!(
            ids(&controller.projection().rows),
            vec!["premium", "mid", "long-gone"]
        );
    }

    #[tokio::test]
    async fn no_second_fetch_while_loading() {
        let (open, gate) = oneshot::channel();
        let (provider, mut calls) =
            ScriptedProvider::new(vec![gated(gate, Ok(at_risk(vec![member("a", 10.0, 9)])))]);
        let controller = controller(provider);

        let (first, second) = tokio::join!(controller.load(), async {
            calls.recv().await.unwrap();
            let second = controller.load().await;
            let retried = controller.retry().await;
            open.send(()).unwrap();
            second || retried
        });

        assert!(first);
        assert!(!second);
        assert!(calls.try_recv().is_err());
    }

    #[tokio::test]
    async fn newest_refresh_wins_over_slow_response() {
        let (open, gate) = oneshot::channel();
        let stale = at_risk(vec![member("stale", 10.0, 20)]);
        let fresh = at_risk(vec![member("fresh", 10.0, 20)]);
        let (provider, mut calls) =
            ScriptedProvider::new(vec![gated(gate, Ok(stale)), step(Ok(fresh))]);
        let controller = controller(provider);

        let (slow, fast) = tokio::join!(controller.refresh(), async {
            calls.recv().await.unwrap();
            let fast = controller.refresh().await;
            open.send(()).unwrap();
            fast
        });

        assert!(fast);
        assert!(!slow);
        assert_eq!(controller.load_state(), LoadState::Ready);
        assert_eq!(ids(&controller.projection().rows), vec!["fresh"]);
    }

    #[tokio::test]
    async fn failures_surface_as_error_until_retry() {
        let (provider, _calls) = ScriptedProvider::new(vec![
            step(Err(DashboardError::NetworkFailure("connection refused".into()))),
            step(Ok(at_risk(vec![member("a", 10.0, 9)]))),
        ]);
        let controller = controller(provider);

        controller.load().await;
        assert_eq!(
            controller.load_state(),
            LoadState::Error("network failure: connection refused".to_string())
        );
        assert!(controller.projection().rows.is_empty());

        controller.set_search("location");
        assert_eq!(controller.view_state().search, "location");

        assert!(!controller.load().await);
        assert!(controller.retry().await);
        assert_eq!(controller.load_state(), LoadState::Ready);
        assert_eq!(ids(&controller.projection().rows), vec!["a"]);
    }

    #[tokio::test]
    async fn malformed_payload_is_an_error_state() {
        let bad = json!({ "at_risk_members": [{ "member_id": "x" }] });
        let (provider, _calls) = ScriptedProvider::new(vec![step(Ok(bad))]);
        let controller = controller(provider);

        controller.load().await;
        match controller.load_state() {
            LoadState::Error(message) => assert!(message.starts_with("malformed at-risk payload")),
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[tokio::test]
    async fn refresh_replaces_records_and_keeps_selection() {
        let (provider, _calls) = ScriptedProvider::new(vec![
            step(Ok(at_risk(vec![member("old", 10.0, 9)]))),
            step(Ok(at_risk(vec![member("new-a", 10.0, 9), member("new-b", 10.0, 50)]))),
        ]);
        let controller = controller(provider);
        controller.load().await;
        controller.set_search("new-b");
        assert!(controller.projection().rows.is_empty());

        assert!(controller.refresh().await);
        assert_eq!(ids(&controller.projection().rows), vec!["new-b"]);
        assert_eq!(controller.view_state().search, "new-b");
    }

    #[tokio::test]
    async fn coordinator_increment_triggers_refetch() {
        let (provider, mut calls) = ScriptedProvider::new(vec![
            step(Ok(at_risk(vec![member("before", 10.0, 9)]))),
            step(Ok(at_risk(vec![member("after", 10.0, 9)]))),
        ]);
        let controller = Arc::new(controller(provider));
        controller.load().await;
        calls.recv().await.unwrap();

        let coordinator = RefreshCoordinator::new();
        let listener = controller.follow(&coordinator);
        coordinator.request_refresh();
        calls.recv().await.unwrap();

        tokio::time::timeout(Duration::from_secs(1), async {
            while controller.load_state() != LoadState::Ready {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(ids(&controller.projection().rows), vec!["after"]);

        assert_eq!(controller.refresh_seen(), 1);
        assert!(controller.observe_refresh(1).is_none());
        listener.abort();
    }
}
