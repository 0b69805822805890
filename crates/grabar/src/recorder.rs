//! Recording engine: capture session state machine and live step stream.
//!
//! One engine owns one session buffer; there are no concurrent writers. Step
//! publication is non-blocking: subscribers ride a bounded broadcast channel
//! and a laggard sees an explicit [`RecorderEvent::Overflow`] instead of ever
//! gating capture.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dom::{DomSnapshot, NodeId};
use crate::events::RecorderEvent;
use crate::extract::LocatorExtractor;
use crate::page::SignatureRegistry;
use crate::result::{GrabarError, GrabarResult};
use crate::step::{Action, AssertionKind, RecordedStep, StepWarning};

/// Capacity of the live step channel; beyond this the oldest unread event is
/// dropped for the lagging subscriber
pub const STEP_CHANNEL_CAPACITY: usize = 256;

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session allocated
    #[default]
    Idle,
    /// Capturing interaction events
    Recording,
    /// Buffer frozen; canonical output available
    Stopped,
}

/// Kind of interaction observed at the capture boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureKind {
    /// Mouse click
    Click,
    /// Text entry
    Fill {
        /// Entered value
        value: String,
    },
    /// Option selection
    Select {
        /// Selected value
        value: String,
    },
    /// Explicit navigation (address bar, deep link)
    Navigate,
    /// Assertion request from the capture UI
    Assert {
        /// Assertion to record
        assertion: AssertionKind,
    },
}

/// One interaction event shipped by the capture boundary, with the document
/// state observed immediately before and after it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureEvent {
    /// Interaction kind
    pub kind: CaptureKind,
    /// Target element within `before`
    pub target: NodeId,
    /// Document state before the interaction
    pub before: DomSnapshot,
    /// Document state after the interaction settled
    pub after: DomSnapshot,
}

/// Subscriber handle for the live step stream
#[derive(Debug)]
pub struct StepSubscriber {
    receiver: broadcast::Receiver<RecorderEvent>,
}

impl StepSubscriber {
    /// Receive the next event. Returns `None` once the session is gone.
    /// Falling behind yields [`RecorderEvent::Overflow`], a reported
    /// condition rather than an error.
    pub async fn next(&mut self) -> Option<RecorderEvent> {
        match self.receiver.recv().await {
            Ok(event) => Some(event),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                Some(RecorderEvent::Overflow { missed })
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }

    /// Non-blocking receive for polling consumers
    pub fn try_next(&mut self) -> Option<RecorderEvent> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                Some(RecorderEvent::Overflow { missed })
            }
            Err(_) => None,
        }
    }
}

/// Capture session owner: `Idle -> Recording -> Stopped`
#[derive(Debug)]
pub struct RecordingEngine {
    state: SessionState,
    session_id: Option<Uuid>,
    steps: Vec<RecordedStep>,
    extractor: LocatorExtractor,
    registry: SignatureRegistry,
    sender: broadcast::Sender<RecorderEvent>,
    /// Module of the last preserved context-setting step
    last_context: Option<String>,
}

impl RecordingEngine {
    /// Create an engine with the given extractor and page registry
    #[must_use]
    pub fn new(extractor: LocatorExtractor, registry: SignatureRegistry) -> Self {
        let (sender, _) = broadcast::channel(STEP_CHANNEL_CAPACITY);
        Self {
            state: SessionState::Idle,
            session_id: None,
            steps: Vec::new(),
            extractor,
            registry,
            sender,
            last_context: None,
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Session id, once allocated
    #[must_use]
    pub const fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    /// Number of buffered steps
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the buffer is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Subscribe to the live step stream
    #[must_use]
    pub fn subscribe(&self) -> StepSubscriber {
        StepSubscriber {
            receiver: self.sender.subscribe(),
        }
    }

    /// `Idle -> Recording`: allocate a session id and an empty buffer
    pub fn start(&mut self) -> GrabarResult<Uuid> {
        if self.state != SessionState::Idle {
            return Err(GrabarError::InvalidState {
                message: format!("cannot start recording from {:?}", self.state),
            });
        }
        let id = Uuid::new_v4();
        self.session_id = Some(id);
        self.steps.clear();
        self.last_context = None;
        self.state = SessionState::Recording;
        tracing::info!(session_id = %id, "recording started");
        Ok(id)
    }

    /// Record one capture event, returning the appended step
    pub fn observe(&mut self, event: &CaptureEvent) -> GrabarResult<&RecordedStep> {
        if self.state != SessionState::Recording {
            return Err(GrabarError::InvalidState {
                message: format!("cannot observe events in {:?}", self.state),
            });
        }

        let before_page = self.registry.classify(&event.before);
        let after_page = self.registry.classify(&event.after);
        let locator = self.extractor.extract(&event.before, event.target);

        let (action, page, value, assertion) = match &event.kind {
            CaptureKind::Click => {
                let context_changed = before_page.module != after_page.module
                    || before_page.page_type != after_page.page_type;
                if context_changed && !event.before.is_form_field(event.target) {
                    // Context-setting suppression: the click is preserved as a
                    // navigation step carrying the context it establishes.
                    (
                        Action::Navigate,
                        after_page.clone(),
                        Some(after_page.module.clone()),
                        None,
                    )
                } else {
                    (Action::Click, before_page, None, None)
                }
            }
            CaptureKind::Fill { value } => {
                (Action::Fill, before_page, Some(value.clone()), None)
            }
            CaptureKind::Select { value } => {
                (Action::Select, before_page, Some(value.clone()), None)
            }
            CaptureKind::Navigate => (
                Action::Navigate,
                after_page.clone(),
                Some(after_page.module.clone()),
                None,
            ),
            CaptureKind::Assert { assertion } => {
                (Action::Assert, before_page, None, Some(assertion.clone()))
            }
        };

        let mut step = RecordedStep::new(self.steps.len() + 1, action, locator, page);
        if let Some(value) = value {
            step = step.with_value(value);
        }
        if let Some(assertion) = assertion {
            step = step.with_assertion(assertion);
        }
        if step.locator.is_low_confidence() {
            step.warn(StepWarning::LowConfidenceLocator);
        }

        if step.is_context_setting() {
            self.last_context = Some(step.page.module.clone());
        } else if step.action == Action::Click
            && !step.page.module.is_empty()
            && self.last_context.as_deref() != Some(step.page.module.as_str())
        {
            // A toolbar action landed without a preserved context-setting step
            // for its module: annotate, never drop.
            step.warn(StepWarning::MissingContext);
            let _ = self.sender.send(RecorderEvent::Warning {
                order: step.order,
                warning: StepWarning::MissingContext,
            });
            tracing::warn!(order = step.order, module = %step.page.module, "missing context step");
        }

        let published = step.clone();
        self.steps.push(step);
        let _ = self.sender.send(RecorderEvent::Step(published));
        let index = self.steps.len() - 1;
        Ok(&self.steps[index])
    }

    /// `Recording -> Stopped`: freeze and return the canonical sequence
    pub fn stop(&mut self) -> GrabarResult<Vec<RecordedStep>> {
        if self.state != SessionState::Recording {
            return Err(GrabarError::InvalidState {
                message: format!("cannot stop recording from {:?}", self.state),
            });
        }
        self.state = SessionState::Stopped;
        let steps = std::mem::take(&mut self.steps);
        let session_id = self.session_id.unwrap_or_else(Uuid::nil);
        let _ = self.sender.send(RecorderEvent::Stopped {
            session_id,
            steps: steps.len(),
        });
        tracing::info!(session_id = %session_id, steps = steps.len(), "recording stopped");
        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::DomNode;
    use crate::page::{PageSignature, PageType};

    fn registry() -> SignatureRegistry {
        let mut registry = SignatureRegistry::new();
        registry.register(PageSignature {
            module: "AccountsReceivable".to_string(),
            page_type: PageType::List,
            marker_attribute: "data-dyn-form-name".to_string(),
            marker_value: Some("CustTableListPage".to_string()),
            url_fragment: None,
            caption_attribute: None,
        });
        registry.register(PageSignature {
            module: "Home".to_string(),
            page_type: PageType::Workspace,
            marker_attribute: "data-workspace".to_string(),
            marker_value: None,
            url_fragment: None,
            caption_attribute: None,
        });
        registry
    }

    fn workspace_snapshot() -> (DomSnapshot, NodeId) {
        let mut snapshot = DomSnapshot::new("https://erp.example/", "Home");
        let root = snapshot.root();
        snapshot.add_node(root, DomNode::new("div").with_attribute("data-workspace", "home"));
        let tile = snapshot.add_node(
            root,
            DomNode::new("a").with_attribute("data-menu-text", "All customers"),
        );
        (snapshot, tile)
    }

    fn list_snapshot() -> (DomSnapshot, NodeId) {
        let mut snapshot = DomSnapshot::new("https://erp.example/?mi=CustTableListPage", "Customers");
        let root = snapshot.root();
        snapshot.add_node(
            root,
            DomNode::new("div").with_attribute("data-dyn-form-name", "CustTableListPage"),
        );
        let button = snapshot.add_node(
            root,
            DomNode::new("button").with_attribute("data-dyn-controlname", "NewRecord"),
        );
        (snapshot, button)
    }

    fn engine() -> RecordingEngine {
        RecordingEngine::new(LocatorExtractor::new(), registry())
    }

    fn click(target: NodeId, before: DomSnapshot, after: DomSnapshot) -> CaptureEvent {
        CaptureEvent {
            kind: CaptureKind::Click,
            target,
            before,
            after,
        }
    }

    mod state_machine_tests {
        use super::*;

        #[test]
        fn test_initial_state() {
            let engine = engine();
            assert_eq!(engine.state(), SessionState::Idle);
            assert!(engine.session_id().is_none());
        }

        #[test]
        fn test_start_allocates_session() {
            let mut engine = engine();
            let id = engine.start().unwrap();
            assert_eq!(engine.state(), SessionState::Recording);
            assert_eq!(engine.session_id(), Some(id));
            assert!(engine.is_empty());
        }

        #[test]
        fn test_double_start_rejected() {
            let mut engine = engine();
            engine.start().unwrap();
            assert!(matches!(
                engine.start(),
                Err(GrabarError::InvalidState { .. })
            ));
        }

        #[test]
        fn test_observe_requires_recording() {
            let mut engine = engine();
            let (before, target) = list_snapshot();
            let event = click(target, before.clone(), before);
            assert!(matches!(
                engine.observe(&event),
                Err(GrabarError::InvalidState { .. })
            ));
        }

        #[test]
        fn test_stop_freezes_buffer() {
            let mut engine = engine();
            engine.start().unwrap();
            let (before, target) = list_snapshot();
            engine.observe(&click(target, before.clone(), before)).unwrap();
            let steps = engine.stop().unwrap();
            assert_eq!(steps.len(), 1);
            assert_eq!(engine.state(), SessionState::Stopped);
            assert!(matches!(
                engine.stop(),
                Err(GrabarError::InvalidState { .. })
            ));
        }
    }

    mod capture_tests {
        use super::*;

        #[test]
        fn test_orders_are_contiguous() {
            let mut engine = engine();
            engine.start().unwrap();
            let (before, target) = list_snapshot();
            for _ in 0..3 {
                engine
                    .observe(&click(target, before.clone(), before.clone()))
                    .unwrap();
            }
            let steps = engine.stop().unwrap();
            let orders: Vec<usize> = steps.iter().map(|s| s.order).collect();
            assert_eq!(orders, vec![1, 2, 3]);
        }

        #[test]
        fn test_fill_carries_value() {
            let mut engine = engine();
            engine.start().unwrap();
            let (before, target) = list_snapshot();
            let event = CaptureEvent {
                kind: CaptureKind::Fill {
                    value: "100001".to_string(),
                },
                target,
                before: before.clone(),
                after: before,
            };
            let step = engine.observe(&event).unwrap();
            assert_eq!(step.action, Action::Fill);
            assert_eq!(step.value.as_deref(), Some("100001"));
        }

        #[test]
        fn test_context_changing_click_becomes_navigate() {
            let mut engine = engine();
            engine.start().unwrap();
            let (workspace, tile) = workspace_snapshot();
            let (list, _) = list_snapshot();
            let step = engine.observe(&click(tile, workspace, list)).unwrap();
            assert_eq!(step.action, Action::Navigate);
            assert_eq!(step.page.module, "AccountsReceivable");
            assert_eq!(step.value.as_deref(), Some("AccountsReceivable"));
        }

        #[test]
        fn test_click_without_context_gets_warning() {
            let mut engine = engine();
            engine.start().unwrap();
            let (list, button) = list_snapshot();
            let step = engine.observe(&click(button, list.clone(), list)).unwrap();
            assert_eq!(step.action, Action::Click);
            assert!(step.warnings.contains(&StepWarning::MissingContext));
        }

        #[test]
        fn test_click_after_context_step_is_clean() {
            let mut engine = engine();
            engine.start().unwrap();
            let (workspace, tile) = workspace_snapshot();
            let (list, button) = list_snapshot();
            engine
                .observe(&click(tile, workspace, list.clone()))
                .unwrap();
            let step = engine.observe(&click(button, list.clone(), list)).unwrap();
            assert_eq!(step.action, Action::Click);
            assert!(!step.warnings.contains(&StepWarning::MissingContext));
        }

        #[test]
        fn test_low_confidence_warning() {
            let mut engine = engine();
            engine.start().unwrap();
            let mut snapshot = DomSnapshot::new("u", "t");
            let root = snapshot.root();
            let div = snapshot.add_node(root, DomNode::new("div"));
            let step = engine
                .observe(&click(div, snapshot.clone(), snapshot))
                .unwrap();
            assert!(step.warnings.contains(&StepWarning::LowConfidenceLocator));
        }
    }

    mod streaming_tests {
        use super::*;

        #[tokio::test]
        async fn test_subscriber_sees_steps() {
            let mut engine = engine();
            let mut subscriber = engine.subscribe();
            engine.start().unwrap();
            let (before, target) = list_snapshot();
            engine.observe(&click(target, before.clone(), before)).unwrap();
            engine.stop().unwrap();

            let mut saw_step = false;
            let mut saw_stopped = false;
            while let Some(event) = subscriber.try_next() {
                match event {
                    RecorderEvent::Step(step) => {
                        saw_step = true;
                        assert_eq!(step.order, 1);
                    }
                    RecorderEvent::Stopped { steps, .. } => {
                        saw_stopped = true;
                        assert_eq!(steps, 1);
                    }
                    _ => {}
                }
            }
            assert!(saw_step);
            assert!(saw_stopped);
        }

        #[tokio::test]
        async fn test_slow_subscriber_sees_overflow_not_stall() {
            let mut engine = engine();
            let mut subscriber = engine.subscribe();
            engine.start().unwrap();
            let (before, target) = list_snapshot();
            // Push well past the channel capacity without draining.
            for _ in 0..(STEP_CHANNEL_CAPACITY + 50) {
                engine
                    .observe(&click(target, before.clone(), before.clone()))
                    .unwrap();
            }
            // Capture was never blocked.
            assert_eq!(engine.len(), STEP_CHANNEL_CAPACITY + 50);

            let first = subscriber.next().await.unwrap();
            assert!(matches!(first, RecorderEvent::Overflow { missed } if missed > 0));
        }
    }
}
