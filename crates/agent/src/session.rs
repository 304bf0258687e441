//! Async driver that runs the orchestrator against a live endpoint.
//!
//! Intents are processed one at a time on a single task, so guards and
//! effects never interleave. Each accepted generation runs on its own
//! spawned task and reports back tagged with its [`GenerationId`]; the
//! orchestrator decides whether that report still matters.

use std::sync::Arc;

use biosight_core::{Error, Message, Result};
use biosight_providers::{InsightReply, InsightsEndpoint};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::orchestrator::{GenerationId, IgnoreReason, Intent, IntentOutcome, Orchestrator, Settlement};

/// Events emitted by a running session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A generation request was issued
    Started(GenerationId),
    /// A generation settled; `Discarded` means nothing was appended
    Settled { id: GenerationId, settlement: Settlement },
    Stopped(GenerationId),
    Cleared,
    Ignored(IgnoreReason),
}

/// Point-in-time view of the session for rendering
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub messages: Vec<Message>,
    pub generating: bool,
    pub active: Option<GenerationId>,
}

impl SessionSnapshot {
    fn capture(orchestrator: &Orchestrator) -> Self {
        Self {
            messages: orchestrator.transcript().messages().to_vec(),
            generating: orchestrator.is_generating(),
            active: orchestrator.active_generation(),
        }
    }

    /// The hero header is shown until the first user message
    pub fn show_hero(&self) -> bool {
        !self.messages.iter().any(Message::is_user)
    }

    pub fn can_regenerate(&self) -> bool {
        !self.generating && self.messages.iter().any(Message::is_user)
    }

    pub fn can_clear(&self) -> bool {
        !self.messages.is_empty()
    }

    pub fn can_stop(&self) -> bool {
        self.generating
    }
}

/// Cloneable handle for feeding intents to a session
///
/// The session shuts down once every handle is dropped, cancelling any
/// generation still in flight.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    intents: mpsc::UnboundedSender<Intent>,
    snapshot: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    pub fn send(&self, intent: Intent) -> Result<()> {
        self.intents
            .send(intent)
            .map_err(|_| Error::Other("insights session has shut down".to_string()))
    }

    pub fn submit(&self, text: impl Into<String>) -> Result<()> {
        self.send(Intent::Submit(text.into()))
    }

    pub fn select_suggestion(&self, text: impl Into<String>) -> Result<()> {
        self.send(Intent::SuggestionSelected(text.into()))
    }

    pub fn regenerate(&self) -> Result<()> {
        self.send(Intent::Regenerate)
    }

    pub fn stop(&self) -> Result<()> {
        self.send(Intent::Stop)
    }

    pub fn clear(&self) -> Result<()> {
        self.send(Intent::Clear)
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver that is notified whenever the snapshot changes
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    /// Wait until no generation is in flight
    pub async fn wait_idle(&self) -> Result<SessionSnapshot> {
        let mut rx = self.snapshot.clone();
        let snapshot = rx
            .wait_for(|s| !s.generating)
            .await
            .map_err(|_| Error::Other("insights session has shut down".to_string()))?;
        Ok(snapshot.clone())
    }
}

/// A running session: the handle, its event stream and the driver task
pub struct InsightsSession {
    pub handle: SessionHandle,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
    pub task: JoinHandle<()>,
}

impl InsightsSession {
    /// Spawn the driver on the current tokio runtime
    pub fn spawn(endpoint: Arc<dyn InsightsEndpoint>, orchestrator: Orchestrator) -> Self {
        let (intents_tx, intents_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::capture(&orchestrator));

        let driver = Driver { endpoint, orchestrator, events: events_tx, snapshot: snapshot_tx };
        let task = tokio::spawn(driver.run(intents_rx));

        Self { handle: SessionHandle { intents: intents_tx, snapshot: snapshot_rx }, events: events_rx, task }
    }
}

struct Driver {
    endpoint: Arc<dyn InsightsEndpoint>,
    orchestrator: Orchestrator,
    events: mpsc::UnboundedSender<SessionEvent>,
    snapshot: watch::Sender<SessionSnapshot>,
}

impl Driver {
    async fn run(mut self, mut intents: mpsc::UnboundedReceiver<Intent>) {
        let (settled_tx, mut settled_rx) = mpsc::unbounded_channel::<(GenerationId, Result<InsightReply>)>();

        loop {
            tokio::select! {
                intent = intents.recv() => {
                    let Some(intent) = intent else { break };
                    self.handle_intent(intent, &settled_tx);
                }
                Some((id, outcome)) = settled_rx.recv() => {
                    let settlement = self.orchestrator.settle(id, outcome);
                    self.emit(SessionEvent::Settled { id, settlement });
                }
            }
            self.publish();
        }

        if let IntentOutcome::Stopped(id) = self.orchestrator.stop() {
            tracing::debug!(generation = %id, "session closed with generation in flight");
        }
        self.publish();
        tracing::debug!("insights session stopped");
    }

    fn handle_intent(&mut self, intent: Intent, settled_tx: &mpsc::UnboundedSender<(GenerationId, Result<InsightReply>)>) {
        match self.orchestrator.apply(intent) {
            IntentOutcome::Started(request) => {
                let id = request.id;
                let endpoint = Arc::clone(&self.endpoint);
                let settled_tx = settled_tx.clone();

                tokio::spawn(async move {
                    let outcome = endpoint.generate(request.payload, request.cancel_token).await;
                    let _ = settled_tx.send((id, outcome));
                });

                self.emit(SessionEvent::Started(id));
            }
            IntentOutcome::Stopped(id) => self.emit(SessionEvent::Stopped(id)),
            IntentOutcome::Cleared { .. } => self.emit(SessionEvent::Cleared),
            IntentOutcome::Ignored(reason) => self.emit(SessionEvent::Ignored(reason)),
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn publish(&self) {
        self.snapshot.send_replace(SessionSnapshot::capture(&self.orchestrator));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::APOLOGY_REPLY;
    use biosight_core::Role;
    use biosight_providers::{CancelToken, InsightRequest, ScriptedEndpoint, ScriptedResponse};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    const WAIT: Duration = Duration::from_secs(5);

    async fn next_event(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
        tokio::time::timeout(WAIT, events.recv())
            .await
            .expect("timed out waiting for session event")
            .expect("session event stream closed")
    }

    async fn next_settlement(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> (GenerationId, Settlement) {
        loop {
            if let SessionEvent::Settled { id, settlement } = next_event(events).await {
                return (id, settlement);
            }
        }
    }

    fn contents(snapshot: &SessionSnapshot) -> Vec<(Role, String)> {
        snapshot.messages.iter().map(|m| (m.role(), m.content().to_string())).collect()
    }

    /// Endpoint that holds each request until the test releases it, ignoring cancellation
    #[derive(Default)]
    struct GatedEndpoint {
        gates: Mutex<HashMap<String, Arc<Notify>>>,
    }

    impl GatedEndpoint {
        fn gate(&self, question: &str) -> Arc<Notify> {
            Arc::clone(self.gates.lock().unwrap().entry(question.to_string()).or_default())
        }

        fn release(&self, question: &str) {
            self.gate(question).notify_one();
        }
    }

    #[async_trait::async_trait]
    impl InsightsEndpoint for GatedEndpoint {
        async fn generate(&self, request: InsightRequest, _cancel_token: CancelToken) -> Result<InsightReply> {
            let question = request.last_user_content().unwrap_or_default().to_string();
            self.gate(&question).notified().await;
            Ok(InsightReply::from_body(&serde_json::json!({ "reply": format!("re: {}", question) })))
        }
    }

    #[tokio::test]
    async fn test_submit_round_trip() {
        let endpoint = Arc::new(ScriptedEndpoint::new(vec![ScriptedResponse::reply("hi")]));
        let mut session = InsightsSession::spawn(endpoint.clone(), Orchestrator::new());

        tokio_test::assert_ok!(session.handle.submit("hello"));
        assert!(matches!(next_event(&mut session.events).await, SessionEvent::Started(_)));

        let (_, settlement) = next_settlement(&mut session.events).await;
        assert!(matches!(settlement, Settlement::Replied(_)));

        let snapshot = session.handle.wait_idle().await.unwrap();
        assert_eq!(
            contents(&snapshot),
            vec![(Role::User, "hello".to_string()), (Role::Assistant, "hi".to_string())]
        );
        assert!(!snapshot.show_hero());
        assert_eq!(endpoint.requests()[0].last_user_content(), Some("hello"));
    }

    #[tokio::test]
    async fn test_rapid_submits_issue_one_request() {
        let endpoint = Arc::new(ScriptedEndpoint::new(vec![
            ScriptedResponse::reply("first").delayed(Duration::from_millis(50)),
            ScriptedResponse::reply("second"),
        ]));
        let mut session = InsightsSession::spawn(endpoint.clone(), Orchestrator::new());

        session.handle.submit("a").unwrap();
        session.handle.submit("b").unwrap();
        session.handle.select_suggestion("c").unwrap();

        assert!(matches!(next_event(&mut session.events).await, SessionEvent::Started(_)));
        assert_eq!(
            next_event(&mut session.events).await,
            SessionEvent::Ignored(IgnoreReason::GenerationInFlight)
        );
        assert_eq!(
            next_event(&mut session.events).await,
            SessionEvent::Ignored(IgnoreReason::GenerationInFlight)
        );

        next_settlement(&mut session.events).await;
        let snapshot = session.handle.wait_idle().await.unwrap();
        assert_eq!(
            contents(&snapshot),
            vec![(Role::User, "a".to_string()), (Role::Assistant, "first".to_string())]
        );
        assert_eq!(endpoint.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_stop_discards_late_reply() {
        let endpoint = Arc::new(GatedEndpoint::default());
        let mut session = InsightsSession::spawn(endpoint.clone(), Orchestrator::new());

        session.handle.submit("x").unwrap();
        let SessionEvent::Started(id) = next_event(&mut session.events).await else {
            panic!("expected generation to start");
        };

        session.handle.stop().unwrap();
        assert_eq!(next_event(&mut session.events).await, SessionEvent::Stopped(id));
        assert!(!session.handle.snapshot().generating);

        endpoint.release("x");
        let (settled_id, settlement) = next_settlement(&mut session.events).await;
        assert_eq!(settled_id, id);
        assert_eq!(settlement, Settlement::Discarded);
        assert_eq!(contents(&session.handle.snapshot()), vec![(Role::User, "x".to_string())]);
    }

    #[tokio::test]
    async fn test_stale_reply_does_not_land_after_new_submit() {
        let endpoint = Arc::new(GatedEndpoint::default());
        let mut session = InsightsSession::spawn(endpoint.clone(), Orchestrator::new());

        session.handle.submit("x").unwrap();
        let SessionEvent::Started(old) = next_event(&mut session.events).await else {
            panic!("expected generation to start");
        };
        session.handle.stop().unwrap();
        next_event(&mut session.events).await;

        session.handle.submit("y").unwrap();
        let SessionEvent::Started(new) = next_event(&mut session.events).await else {
            panic!("expected generation to start");
        };
        assert_ne!(old, new);

        endpoint.release("x");
        let (id, settlement) = next_settlement(&mut session.events).await;
        assert_eq!(id, old);
        assert_eq!(settlement, Settlement::Discarded);
        assert!(session.handle.snapshot().generating);

        endpoint.release("y");
        let (id, _) = next_settlement(&mut session.events).await;
        assert_eq!(id, new);

        let snapshot = session.handle.wait_idle().await.unwrap();
        assert_eq!(
            contents(&snapshot),
            vec![
                (Role::User, "x".to_string()),
                (Role::User, "y".to_string()),
                (Role::Assistant, "re: y".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_appends_apology() {
        let endpoint = Arc::new(ScriptedEndpoint::new(vec![ScriptedResponse::status(500)]));
        let mut session = InsightsSession::spawn(endpoint, Orchestrator::new());

        session.handle.submit("x").unwrap();
        let (_, settlement) = next_settlement(&mut session.events).await;
        assert!(matches!(settlement, Settlement::Apologized(_)));

        let snapshot = session.handle.wait_idle().await.unwrap();
        assert_eq!(snapshot.messages.last().map(Message::content), Some(APOLOGY_REPLY));
        assert!(snapshot.can_regenerate());
    }

    #[tokio::test]
    async fn test_regenerate_appends_after_previous_reply() {
        let endpoint = Arc::new(ScriptedEndpoint::new(vec![ScriptedResponse::reply("q"), ScriptedResponse::reply("r")]));
        let mut session = InsightsSession::spawn(endpoint.clone(), Orchestrator::new());

        session.handle.submit("p").unwrap();
        next_settlement(&mut session.events).await;
        session.handle.regenerate().unwrap();
        next_settlement(&mut session.events).await;

        let snapshot = session.handle.wait_idle().await.unwrap();
        assert_eq!(
            contents(&snapshot),
            vec![
                (Role::User, "p".to_string()),
                (Role::Assistant, "q".to_string()),
                (Role::Assistant, "r".to_string()),
            ]
        );
        assert_eq!(endpoint.requests()[1].last_user_content(), Some("p"));
    }

    #[tokio::test]
    async fn test_clear_cancels_in_flight_request() {
        let endpoint = Arc::new(ScriptedEndpoint::new(vec![
            ScriptedResponse::reply("never").delayed(Duration::from_secs(30)),
        ]));
        let mut session = InsightsSession::spawn(endpoint, Orchestrator::new());

        session.handle.submit("x").unwrap();
        let SessionEvent::Started(id) = next_event(&mut session.events).await else {
            panic!("expected generation to start");
        };

        session.handle.clear().unwrap();
        assert_eq!(next_event(&mut session.events).await, SessionEvent::Cleared);

        let (settled_id, settlement) = next_settlement(&mut session.events).await;
        assert_eq!(settled_id, id);
        assert_eq!(settlement, Settlement::Discarded);

        let snapshot = session.handle.snapshot();
        assert!(snapshot.messages.is_empty());
        assert!(snapshot.show_hero());
        assert!(!snapshot.generating);
    }

    #[tokio::test]
    async fn test_invalid_intents_are_ignored() {
        let endpoint = Arc::new(ScriptedEndpoint::new(vec![]));
        let mut session = InsightsSession::spawn(endpoint.clone(), Orchestrator::new());

        session.handle.submit("   ").unwrap();
        session.handle.regenerate().unwrap();
        session.handle.stop().unwrap();

        assert_eq!(next_event(&mut session.events).await, SessionEvent::Ignored(IgnoreReason::BlankText));
        assert_eq!(next_event(&mut session.events).await, SessionEvent::Ignored(IgnoreReason::NoUserMessage));
        assert_eq!(next_event(&mut session.events).await, SessionEvent::Ignored(IgnoreReason::NothingToStop));
        assert!(endpoint.requests().is_empty());
    }

    #[tokio::test]
    async fn test_dropping_handle_shuts_down_and_cancels() {
        let endpoint = Arc::new(ScriptedEndpoint::new(vec![
            ScriptedResponse::reply("never").delayed(Duration::from_secs(30)),
        ]));
        let InsightsSession { handle, mut events, task } = InsightsSession::spawn(endpoint, Orchestrator::new());
        let mut watcher = handle.watch();

        handle.submit("x").unwrap();
        assert!(matches!(next_event(&mut events).await, SessionEvent::Started(_)));
        drop(handle);

        tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
        assert!(!watcher.borrow_and_update().generating);
    }

    #[tokio::test]
    async fn test_send_after_shutdown_fails() {
        let endpoint = Arc::new(ScriptedEndpoint::new(vec![]));
        let session = InsightsSession::spawn(endpoint, Orchestrator::new());
        session.task.abort();
        let _ = session.task.await;

        let err = session.handle.submit("x").unwrap_err();
        assert!(matches!(err, Error::Other(_)));
    }
}
