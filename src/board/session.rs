use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

use crate::document::ConfigDocument;
use crate::persistence::debounce::{
    BoardSaveHandle, SaveBaseline, SaveDebounceConfig, SaveOutcome, spawn_board_save_worker,
};
use crate::persistence::PositionStore;

use super::{BoardOp, BoardOptions, BoardState, BoardView};

/// A [`BoardState`] wired to a position store: loads saved positions once, then forwards
/// every save request to a debounced background writer.
#[derive(Debug)]
pub struct BoardSession {
    state: BoardState,
    saver: BoardSaveHandle,
    outcome_rx: UnboundedReceiver<SaveOutcome>,
}

impl BoardSession {
    pub async fn open<S: PositionStore>(
        store: Arc<S>,
        environment: &str,
        document: ConfigDocument,
        options: BoardOptions,
        debounce: SaveDebounceConfig,
    ) -> Self {
        let mut state = BoardState::new(environment, options);
        state.apply(BoardOp::SetConfig { document });

        let baseline = match store.load(environment).await {
            Ok(mut positions) => {
                if positions.environment.is_empty() {
                    positions.environment = environment.to_owned();
                }
                state.apply(BoardOp::PositionsLoaded {
                    positions: positions.clone(),
                });
                SaveBaseline::Loaded(positions)
            }
            Err(error) => {
                state.apply(BoardOp::PositionsLoadFailed {
                    error: format!("{error:#}"),
                });
                SaveBaseline::Unknown {
                    environment: environment.to_owned(),
                }
            }
        };

        info!(
            environment,
            pass = state.last_layout_pass().map_or("pending", |pass| pass.label()),
            saved_positions = match &baseline {
                SaveBaseline::Loaded(positions) => positions.positions.len(),
                SaveBaseline::Unknown { .. } => 0,
            },
            "board session opened"
        );

        let (saver, outcome_rx) =
            spawn_board_save_worker(&Handle::current(), store, baseline, debounce);
        Self {
            state,
            saver,
            outcome_rx,
        }
    }

    pub fn state(&self) -> &BoardState {
        &self.state
    }

    pub fn view(&self) -> Option<&BoardView> {
        self.state.view()
    }

    pub fn apply(&mut self, op: BoardOp) {
        if let Some(request) = self.state.apply(op) {
            self.saver.submit(request);
        }
    }

    /// Save outcomes reported so far, without waiting.
    pub fn drain_outcomes(&mut self) -> Vec<SaveOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(outcome) = self.outcome_rx.try_recv() {
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Flushes pending saves and waits for the writer to stop.
    pub async fn close(mut self) -> Vec<SaveOutcome> {
        self.saver.shutdown();
        let mut outcomes = Vec::new();
        while let Some(outcome) = self.outcome_rx.recv().await {
            outcomes.push(outcome);
        }
        outcomes
    }
}
