//! Conversation relay.
//!
//! Forwards a visitor conversation to the hosted model and streams the reply
//! back fragment by fragment. When the model asks for a tool, the relay runs
//! it, appends the call and its result to the transcript and asks the model
//! again, up to `max_steps` model calls per request.
//!
//! The first model call is opened before [`Relay::start`] returns, so
//! configuration and upstream failures surface as an `Err` instead of a
//! half-written response. Later failures end the stream with an `Err` item.

use std::sync::Arc;

use futures::StreamExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Instrument, debug, error, info_span, warn};

use crate::llm::{ChatModel, ChatTurn, CompletionRequest, EventStream, LlmError, ModelEvent, ToolCall};
use crate::message::{Message, Role, prepare_history};
use crate::tools::ToolRegistry;

pub const DEFAULT_MAX_STEPS: usize = 5;

/// Fragments buffered between the upstream reader and the HTTP body.
const FRAGMENT_BUFFER: usize = 32;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("conversation contains no user message")]
    EmptyConversation,

    #[error(transparent)]
    Model(#[from] LlmError),
}

/// Text fragments of the assistant reply, in order.
pub type ReplyStream = ReceiverStream<Result<String, RelayError>>;

#[derive(Clone)]
pub struct Relay {
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    max_steps: usize,
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("model", &self.model.name())
            .field("tools", &self.tools)
            .field("max_steps", &self.max_steps)
            .finish()
    }
}

impl Relay {
    pub fn new(model: Arc<dyn ChatModel>, tools: ToolRegistry) -> Self {
        Self { model, tools, max_steps: DEFAULT_MAX_STEPS }
    }

    /// Cap on model calls per request (at least one).
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Begin relaying `messages` under the `system` instruction.
    pub async fn start(&self, system: String, messages: Vec<Message>) -> Result<ReplyStream, RelayError> {
        let history = prepare_history(messages);
        if history.is_empty() {
            return Err(RelayError::EmptyConversation);
        }

        let mut turns = Vec::with_capacity(history.len() + 1);
        turns.push(ChatTurn::System(system));
        turns.extend(history.into_iter().map(|m| match m.role {
            Role::User => ChatTurn::User(m.content),
            Role::Assistant => ChatTurn::Assistant { content: Some(m.content), tool_calls: Vec::new() },
        }));

        let first = self.model.stream(self.request(&turns)).await?;

        let (tx, rx) = mpsc::channel(FRAGMENT_BUFFER);
        let relay = self.clone();
        let span = info_span!("relay", model = %self.model.name(), max_steps = self.max_steps);
        tokio::spawn(async move { relay.drive(turns, first, tx).await }.instrument(span));

        Ok(ReceiverStream::new(rx))
    }

    fn request(&self, turns: &[ChatTurn]) -> CompletionRequest {
        CompletionRequest { turns: turns.to_vec(), tools: self.tools.definitions() }
    }

    async fn drive(
        self,
        mut turns: Vec<ChatTurn>,
        first: EventStream,
        tx: mpsc::Sender<Result<String, RelayError>>,
    ) {
        let mut events = first;
        let mut step = 1;

        loop {
            let outcome = match forward_step(events, &tx).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(step, error = %e, "model stream failed");
                    let _ = tx.send(Err(e.into())).await;
                    return;
                }
            };

            if !outcome.delivered {
                debug!(step, "reply consumer went away; stopping");
                return;
            }
            if outcome.tool_calls.is_empty() {
                debug!(steps = step, "relay finished");
                return;
            }
            if step >= self.max_steps {
                warn!(steps = step, pending = outcome.tool_calls.len(), "step budget exhausted");
                return;
            }

            turns.push(ChatTurn::Assistant {
                content: (!outcome.text.is_empty()).then_some(outcome.text),
                tool_calls: outcome.tool_calls.clone(),
            });
            for call in outcome.tool_calls {
                let result = self.tools.invoke(&call.name, &call.arguments).await;
                turns.push(ChatTurn::ToolResult { call_id: call.id, content: result.to_string() });
            }

            if tx.is_closed() {
                debug!(step, "reply consumer went away; skipping follow-up call");
                return;
            }

            step += 1;
            events = match self.model.stream(self.request(&turns)).await {
                Ok(events) => events,
                Err(e) => {
                    error!(step, error = %e, "follow-up model call failed");
                    let _ = tx.send(Err(e.into())).await;
                    return;
                }
            };
        }
    }
}

struct StepOutcome {
    text: String,
    tool_calls: Vec<ToolCall>,
    /// `false` when the receiver was dropped mid-step.
    delivered: bool,
}

async fn forward_step(
    mut events: EventStream,
    tx: &mpsc::Sender<Result<String, RelayError>>,
) -> Result<StepOutcome, LlmError> {
    let mut text = String::new();
    let mut pending = PendingCalls::default();

    while let Some(event) = events.next().await {
        match event? {
            ModelEvent::Text(fragment) => {
                text.push_str(&fragment);
                if tx.send(Ok(fragment)).await.is_err() {
                    return Ok(StepOutcome { text, tool_calls: Vec::new(), delivered: false });
                }
            }
            ModelEvent::ToolCallDelta { index, id, name, arguments } => {
                pending.push(index, id, name, arguments);
            }
            ModelEvent::Finished { reason } => {
                debug!(?reason, "model call finished");
                break;
            }
        }
    }

    Ok(StepOutcome { text, tool_calls: pending.finish(), delivered: true })
}

/// Tool calls being assembled from streamed fragments.
#[derive(Default)]
struct PendingCalls {
    calls: Vec<PendingCall>,
}

struct PendingCall {
    index: usize,
    id: Option<String>,
    name: String,
    arguments: String,
}

impl PendingCalls {
    fn push(&mut self, index: usize, id: Option<String>, name: Option<String>, arguments: Option<String>) {
        // A fragment continues the latest call at its index unless it carries
        // a different id, which some providers use instead of indices.
        let continues = self.calls.iter().rposition(|c| {
            c.index == index
                && match (&c.id, &id) {
                    (Some(a), Some(b)) => a == b,
                    _ => true,
                }
        });

        let call = match continues {
            Some(pos) => &mut self.calls[pos],
            None => {
                self.calls.push(PendingCall { index, id: None, name: String::new(), arguments: String::new() });
                let last = self.calls.len() - 1;
                &mut self.calls[last]
            }
        };

        if call.id.is_none() {
            call.id = id;
        }
        if let Some(name) = name {
            call.name.push_str(&name);
        }
        if let Some(arguments) = arguments {
            call.arguments.push_str(&arguments);
        }
    }

    fn finish(self) -> Vec<ToolCall> {
        self.calls
            .into_iter()
            .enumerate()
            .filter_map(|(n, c)| {
                if c.name.is_empty() {
                    warn!(index = c.index, "dropping tool call without a name");
                    return None;
                }
                Some(ToolCall {
                    id: c.id.unwrap_or_else(|| format!("call_{n}")),
                    name: c.name,
                    arguments: if c.arguments.trim().is_empty() { "{}".to_owned() } else { c.arguments },
                })
            })
            .collect()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
