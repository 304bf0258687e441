//! Generation orchestrator: the state machine behind the insights panel.
//!
//! | State      | Intent                        | Guard              | Next       | Transcript             |
//! |------------|-------------------------------|--------------------|------------|------------------------|
//! | Idle       | Submit / Suggestion           | non-blank text     | Generating | append user message    |
//! | Idle       | Regenerate                    | a user message     | Generating | none                   |
//! | Idle       | Stop                          |                    | Idle       | none                   |
//! | Generating | Submit / Suggestion / Regen.  |                    | Generating | none                   |
//! | Generating | Stop                          |                    | Idle       | none                   |
//! | Generating | settles ok / error            | id is active       | Idle       | append assistant reply |
//! | any        | settles                       | id is not active   | unchanged  | none                   |
//! | any        | Clear                         |                    | Idle       | reset                  |
//!
//! All methods are synchronous. The only suspension point is the request
//! itself, which the caller drives and reports back through
//! [`Orchestrator::settle`].

use std::fmt;

use biosight_core::logging::{PrivacyConfig, redact_content};
use biosight_core::{Message, Result, Transcript};
use biosight_providers::{CancelToken, InsightReply, InsightRequest, WireMessage};

/// Assistant message recorded when a request fails
pub const APOLOGY_REPLY: &str =
    "Sorry, I ran into an issue while generating that. Please try again or refine your prompt.";

/// Identity of one generation request, never reused within an orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GenerationId(u64);

impl GenerationId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

/// User intents accepted by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Submit(String),
    SuggestionSelected(String),
    Regenerate,
    Stop,
    Clear,
}

impl Intent {
    pub fn kind(&self) -> &'static str {
        match self {
            Intent::Submit(_) => "submit",
            Intent::SuggestionSelected(_) => "suggestion",
            Intent::Regenerate => "regenerate",
            Intent::Stop => "stop",
            Intent::Clear => "clear",
        }
    }
}

/// Why an intent was a no-op
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    BlankText,
    GenerationInFlight,
    NoUserMessage,
    NothingToStop,
}

impl IgnoreReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            IgnoreReason::BlankText => "blank text",
            IgnoreReason::GenerationInFlight => "generation in flight",
            IgnoreReason::NoUserMessage => "no user message to regenerate",
            IgnoreReason::NothingToStop => "nothing to stop",
        }
    }
}

/// Orchestrator state. The cancel token lives inside `Generating`.
#[derive(Debug, Clone, Default)]
pub enum OrchestratorState {
    #[default]
    Idle,
    Generating { id: GenerationId, cancel_token: CancelToken },
}

impl OrchestratorState {
    pub fn is_generating(&self) -> bool {
        matches!(self, OrchestratorState::Generating { .. })
    }

    pub fn active_id(&self) -> Option<GenerationId> {
        match self {
            OrchestratorState::Idle => None,
            OrchestratorState::Generating { id, .. } => Some(*id),
        }
    }
}

/// An accepted generation, to be executed by the caller
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub id: GenerationId,
    pub payload: InsightRequest,
    pub cancel_token: CancelToken,
}

/// Result of applying one intent
#[derive(Debug, Clone)]
pub enum IntentOutcome {
    Started(GenerationRequest),
    Stopped(GenerationId),
    Cleared { cancelled: Option<GenerationId> },
    Ignored(IgnoreReason),
}

impl IntentOutcome {
    pub fn is_ignored(&self) -> bool {
        matches!(self, IntentOutcome::Ignored(_))
    }

    /// The started request, if this outcome started one
    pub fn into_request(self) -> Option<GenerationRequest> {
        match self {
            IntentOutcome::Started(request) => Some(request),
            _ => None,
        }
    }
}

/// What a settling request did to the transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// The reply (or the fallback string) was appended
    Replied(Message),
    /// The request failed and the apology was appended
    Apologized(Message),
    /// The request was cancelled or superseded; nothing was appended
    Discarded,
}

impl Settlement {
    pub fn message(&self) -> Option<&Message> {
        match self {
            Settlement::Replied(message) | Settlement::Apologized(message) => Some(message),
            Settlement::Discarded => None,
        }
    }
}

/// Owns the transcript and the single generation slot
#[derive(Debug, Default)]
pub struct Orchestrator {
    transcript: Transcript,
    state: OrchestratorState,
    next_id: u64,
    privacy: PrivacyConfig,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Control how message content appears in log events
    pub fn with_privacy(mut self, privacy: PrivacyConfig) -> Self {
        self.privacy = privacy;
        self
    }

    /// Apply an intent, checking its guard and performing its effect atomically
    pub fn apply(&mut self, intent: Intent) -> IntentOutcome {
        let kind = intent.kind();
        let outcome = match intent {
            Intent::Submit(text) | Intent::SuggestionSelected(text) => self.start_with_user_text(&text),
            Intent::Regenerate => self.start_regeneration(),
            Intent::Stop => match self.cancel_active() {
                Some(id) => IntentOutcome::Stopped(id),
                None => IntentOutcome::Ignored(IgnoreReason::NothingToStop),
            },
            Intent::Clear => {
                let cancelled = self.cancel_active();
                self.transcript.reset();
                IntentOutcome::Cleared { cancelled }
            }
        };

        match &outcome {
            IntentOutcome::Started(request) => tracing::info!(
                intent = kind,
                generation = %request.id,
                messages = request.payload.len(),
                "generation started"
            ),
            IntentOutcome::Stopped(id) => tracing::info!(generation = %id, "generation stopped"),
            IntentOutcome::Cleared { cancelled } => {
                tracing::info!(cancelled = ?cancelled.map(|id| id.to_string()), "transcript cleared")
            }
            IntentOutcome::Ignored(reason) => tracing::debug!(intent = kind, reason = reason.as_str(), "intent ignored"),
        }

        outcome
    }

    pub fn submit(&mut self, text: impl Into<String>) -> IntentOutcome {
        self.apply(Intent::Submit(text.into()))
    }

    pub fn suggestion_selected(&mut self, text: impl Into<String>) -> IntentOutcome {
        self.apply(Intent::SuggestionSelected(text.into()))
    }

    pub fn regenerate(&mut self) -> IntentOutcome {
        self.apply(Intent::Regenerate)
    }

    pub fn stop(&mut self) -> IntentOutcome {
        self.apply(Intent::Stop)
    }

    pub fn clear(&mut self) -> IntentOutcome {
        self.apply(Intent::Clear)
    }

    /// Record the outcome of a request.
    ///
    /// Outcomes for any generation other than the active one are discarded,
    /// as is a cancellation of the active one.
    pub fn settle(&mut self, id: GenerationId, outcome: Result<InsightReply>) -> Settlement {
        if self.state.active_id() != Some(id) {
            tracing::debug!(generation = %id, "discarding settlement of inactive generation");
            return Settlement::Discarded;
        }

        self.state = OrchestratorState::Idle;

        let reply = match outcome {
            Ok(reply) => reply,
            Err(e) if e.is_cancelled() => {
                tracing::debug!(generation = %id, "generation cancelled");
                return Settlement::Discarded;
            }
            Err(e) => {
                tracing::warn!(generation = %id, error = %e, "generation failed");
                return self.append_assistant(APOLOGY_REPLY, Settlement::Apologized);
            }
        };

        tracing::info!(
            generation = %id,
            source = reply.source.as_str(),
            content = %redact_content(&reply.content, &self.privacy),
            "generation settled"
        );
        self.append_assistant(&reply.content, Settlement::Replied)
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn state(&self) -> &OrchestratorState {
        &self.state
    }

    pub fn is_generating(&self) -> bool {
        self.state.is_generating()
    }

    pub fn active_generation(&self) -> Option<GenerationId> {
        self.state.active_id()
    }

    pub fn can_send(&self, draft: &str) -> bool {
        !draft.trim().is_empty() && !self.is_generating()
    }

    pub fn can_regenerate(&self) -> bool {
        self.transcript.has_user_message() && !self.is_generating()
    }

    pub fn can_clear(&self) -> bool {
        !self.transcript.is_empty()
    }

    pub fn can_stop(&self) -> bool {
        self.is_generating()
    }

    fn start_with_user_text(&mut self, text: &str) -> IntentOutcome {
        if self.is_generating() {
            return IntentOutcome::Ignored(IgnoreReason::GenerationInFlight);
        }

        let message = match Message::user(text.trim()) {
            Ok(message) => message,
            Err(_) => return IntentOutcome::Ignored(IgnoreReason::BlankText),
        };

        tracing::debug!(content = %redact_content(message.content(), &self.privacy), "user message appended");
        self.transcript.append(message);

        let payload = InsightRequest::from_snapshot(self.transcript.snapshot_for_request());
        IntentOutcome::Started(self.begin(payload))
    }

    /// Re-ask the last user question without adding another user entry.
    ///
    /// The payload is the current transcript followed by the last user
    /// message again, so earlier assistant replies stay in place and the
    /// new reply lands after them.
    fn start_regeneration(&mut self) -> IntentOutcome {
        if self.is_generating() {
            return IntentOutcome::Ignored(IgnoreReason::GenerationInFlight);
        }

        let Some(last_user) = self.transcript.last_user_message() else {
            return IntentOutcome::Ignored(IgnoreReason::NoUserMessage);
        };

        let mut payload = InsightRequest::from_snapshot(self.transcript.snapshot_for_request());
        if self.transcript.last().map(Message::id) != Some(last_user.id()) {
            payload.messages.push(WireMessage::user(last_user.content()));
        }

        IntentOutcome::Started(self.begin(payload))
    }

    fn begin(&mut self, payload: InsightRequest) -> GenerationRequest {
        self.next_id += 1;
        let id = GenerationId(self.next_id);
        let cancel_token = CancelToken::new();
        self.state = OrchestratorState::Generating { id, cancel_token: cancel_token.clone() };

        GenerationRequest { id, payload, cancel_token }
    }

    /// Cancel the in-flight generation, if any, and return to Idle at once
    fn cancel_active(&mut self) -> Option<GenerationId> {
        match std::mem::take(&mut self.state) {
            OrchestratorState::Idle => None,
            OrchestratorState::Generating { id, cancel_token } => {
                cancel_token.cancel();
                Some(id)
            }
        }
    }

    fn append_assistant(&mut self, content: &str, settled: fn(Message) -> Settlement) -> Settlement {
        match Message::assistant(content) {
            Ok(message) => {
                self.transcript.append(message.clone());
                settled(message)
            }
            Err(e) => {
                tracing::warn!(error = %e, "dropping unusable assistant reply");
                Settlement::Discarded
            }
        }
    }
}
