use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::time::{Duration, Instant, sleep_until};
use tracing::{debug, warn};

use crate::config::BoardSettings;

use super::{BoardPositions, EdgeHandleOverride, NodePosition, PositionStore};

const DEFAULT_POSITION_DEBOUNCE: Duration = Duration::from_millis(500);
const DEFAULT_HANDLE_DEBOUNCE: Duration = Duration::from_millis(500);

/// A board change that should eventually be persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveRequest {
    /// Full position snapshot. While `dragging` is set the pending save is held back.
    Positions {
        positions: Vec<NodePosition>,
        dragging: bool,
    },
    Handles {
        edge_handles: Vec<EdgeHandleOverride>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTrigger {
    Positions,
    Handles,
    PositionsAndHandles,
    Shutdown,
}

impl SaveTrigger {
    pub fn label(self) -> &'static str {
        match self {
            Self::Positions => "positions",
            Self::Handles => "handles",
            Self::PositionsAndHandles => "positions+handles",
            Self::Shutdown => "shutdown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub trigger: SaveTrigger,
    pub revision: u64,
    pub error: Option<String>,
}

impl SaveOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// What the worker knows about the stored document when it starts.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveBaseline {
    /// The stored document was loaded. Requests carry full snapshots.
    Loaded(BoardPositions),
    /// The load failed. Requests carry only local edits, which are written over a fresh
    /// load of the stored document so entries this session never saw survive.
    Unknown { environment: String },
}

#[derive(Debug, Clone)]
enum StoredBase {
    Replaced,
    Unknown,
    Fetched(BoardPositions),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveDebounceConfig {
    pub position_interval: Duration,
    pub handle_interval: Duration,
}

impl SaveDebounceConfig {
    pub fn from_settings(settings: &BoardSettings) -> Self {
        Self {
            position_interval: Duration::from_millis(settings.position_save_debounce_ms),
            handle_interval: Duration::from_millis(settings.handle_save_debounce_ms),
        }
    }
}

impl Default for SaveDebounceConfig {
    fn default() -> Self {
        Self {
            position_interval: DEFAULT_POSITION_DEBOUNCE,
            handle_interval: DEFAULT_HANDLE_DEBOUNCE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BoardSaveHandle {
    command_tx: UnboundedSender<SaveCommand>,
}

impl BoardSaveHandle {
    pub fn submit(&self, request: SaveRequest) {
        let _ = self.command_tx.send(SaveCommand::Submit(request));
    }

    /// Stops the worker after it flushes any pending save.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(SaveCommand::Shutdown);
    }
}

#[derive(Debug)]
enum SaveCommand {
    Submit(SaveRequest),
    Shutdown,
}

/// Spawns the trailing-edge save worker for one environment.
///
/// Positions and handles each own a cancel-and-restart timer. Every save writes the latest
/// positions together with the latest handles, starting from `baseline`. The outcome channel
/// closes once the worker exits.
pub fn spawn_board_save_worker<S: PositionStore>(
    handle: &Handle,
    store: Arc<S>,
    baseline: SaveBaseline,
    config: SaveDebounceConfig,
) -> (BoardSaveHandle, UnboundedReceiver<SaveOutcome>) {
    let (command_tx, command_rx) = unbounded_channel();
    let (outcome_tx, outcome_rx) = unbounded_channel();
    let save_handle = BoardSaveHandle { command_tx };

    let _task = handle.spawn(run_board_save_loop(
        store, baseline, config, command_rx, outcome_tx,
    ));

    (save_handle, outcome_rx)
}

async fn run_board_save_loop<S: PositionStore>(
    store: Arc<S>,
    baseline: SaveBaseline,
    config: SaveDebounceConfig,
    mut command_rx: UnboundedReceiver<SaveCommand>,
    outcome_tx: UnboundedSender<SaveOutcome>,
) {
    let (mut latest, mut base) = match baseline {
        SaveBaseline::Loaded(positions) => (positions, StoredBase::Replaced),
        SaveBaseline::Unknown { environment } => {
            (BoardPositions::empty(environment), StoredBase::Unknown)
        }
    };
    let mut revision: u64 = 0;
    let mut positions_dirty = false;
    let mut handles_dirty = false;
    let mut positions_deadline: Option<Instant> = None;
    let mut handles_deadline: Option<Instant> = None;

    loop {
        let next_deadline = match (positions_deadline, handles_deadline) {
            (Some(left), Some(right)) => Some(left.min(right)),
            (left, right) => left.or(right),
        };

        tokio::select! {
            maybe_command = command_rx.recv() => {
                match maybe_command {
                    Some(SaveCommand::Submit(SaveRequest::Positions { positions, dragging })) => {
                        latest.positions = positions;
                        positions_dirty = true;
                        positions_deadline =
                            (!dragging).then(|| Instant::now() + config.position_interval);
                    }
                    Some(SaveCommand::Submit(SaveRequest::Handles { edge_handles })) => {
                        latest.edge_handles = edge_handles;
                        handles_dirty = true;
                        handles_deadline = Some(Instant::now() + config.handle_interval);
                    }
                    Some(SaveCommand::Shutdown) | None => break,
                }
            }
            _ = sleep_until(next_deadline.unwrap_or_else(Instant::now)),
                if next_deadline.is_some() => {}
        }

        let now = Instant::now();
        let mut trigger = None;
        if positions_deadline.is_some_and(|deadline| now >= deadline) {
            trigger = Some(merge_trigger(trigger, SaveTrigger::Positions));
            positions_deadline = None;
            positions_dirty = false;
        }
        if handles_deadline.is_some_and(|deadline| now >= deadline) {
            trigger = Some(merge_trigger(trigger, SaveTrigger::Handles));
            handles_deadline = None;
            handles_dirty = false;
        }

        if let Some(trigger) = trigger {
            revision = revision.saturating_add(1);
            persist(
                store.as_ref(),
                &mut base,
                &latest,
                trigger,
                revision,
                &outcome_tx,
            )
            .await;
        }
    }

    // Edits that never reached the store because it could not be reloaded get one more try.
    let unwritten = matches!(base, StoredBase::Unknown)
        && !(latest.positions.is_empty() && latest.edge_handles.is_empty());
    if positions_dirty || handles_dirty || unwritten {
        revision = revision.saturating_add(1);
        persist(
            store.as_ref(),
            &mut base,
            &latest,
            SaveTrigger::Shutdown,
            revision,
            &outcome_tx,
        )
        .await;
    }
    debug!(environment = %latest.environment, revision, "board save worker stopped");
}

async fn persist<S: PositionStore>(
    store: &S,
    base: &mut StoredBase,
    latest: &BoardPositions,
    trigger: SaveTrigger,
    revision: u64,
    outcome_tx: &UnboundedSender<SaveOutcome>,
) {
    let written = match resolve_document(store, base, latest).await {
        Ok(document) => store.save(&document).await,
        Err(error) => Err(error),
    };
    let error = match written {
        Ok(()) => {
            debug!(
                environment = %latest.environment,
                trigger = trigger.label(),
                revision,
                "board positions persisted"
            );
            None
        }
        Err(error) => {
            let message = format!("{error:#}");
            warn!(
                environment = %latest.environment,
                trigger = trigger.label(),
                revision,
                error = %message,
                "failed to persist board positions"
            );
            Some(message)
        }
    };

    let _ = outcome_tx.send(SaveOutcome {
        trigger,
        revision,
        error,
    });
}

/// The document to write: the latest snapshot, or the local edits laid over the stored
/// document when the initial load failed.
async fn resolve_document<S: PositionStore>(
    store: &S,
    base: &mut StoredBase,
    latest: &BoardPositions,
) -> anyhow::Result<BoardPositions> {
    if matches!(base, StoredBase::Unknown) {
        let stored = store
            .load(&latest.environment)
            .await
            .context("stored positions are unavailable; local edits were not written")?;
        *base = StoredBase::Fetched(stored);
    }

    Ok(match base {
        StoredBase::Fetched(stored) => overlay_edits(stored, latest),
        StoredBase::Replaced | StoredBase::Unknown => latest.clone(),
    })
}

fn overlay_edits(stored: &BoardPositions, edits: &BoardPositions) -> BoardPositions {
    let mut positions: BTreeMap<&str, NodePosition> = stored
        .positions
        .iter()
        .map(|entry| (entry.node_id.as_str(), entry.clone()))
        .collect();
    for entry in &edits.positions {
        positions.insert(entry.node_id.as_str(), entry.clone());
    }

    let mut edge_handles: BTreeMap<&str, EdgeHandleOverride> = stored
        .edge_handles
        .iter()
        .map(|entry| (entry.edge_id.as_str(), entry.clone()))
        .collect();
    for edit in &edits.edge_handles {
        edge_handles
            .entry(edit.edge_id.as_str())
            .and_modify(|entry| {
                if edit.source_handle.is_some() {
                    entry.source_handle = edit.source_handle;
                }
                if edit.target_handle.is_some() {
                    entry.target_handle = edit.target_handle;
                }
            })
            .or_insert_with(|| edit.clone());
    }

    BoardPositions {
        environment: edits.environment.clone(),
        positions: positions.into_values().collect(),
        edge_handles: edge_handles.into_values().collect(),
    }
}

fn merge_trigger(existing: Option<SaveTrigger>, incoming: SaveTrigger) -> SaveTrigger {
    match (existing, incoming) {
        (None, next) => next,
        (Some(SaveTrigger::Shutdown), _) | (_, SaveTrigger::Shutdown) => SaveTrigger::Shutdown,
        (Some(current), next) if current == next => current,
        (Some(_), _) => SaveTrigger::PositionsAndHandles,
    }
}
