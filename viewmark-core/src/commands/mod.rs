//! # Commands
//!
//! The operations a UI or scripting surface can ask of a [`crate::navigation::NavigationController`], as
//! plain data. Commands are serializable so that a surface in another process can send them as JSON:
//!
//! ```json
//! { "command": "rename_view", "id": 3, "name": "Top" }
//! ```

use crate::engine::{Diff, MissingReference};
use crate::id::ViewId;
use crate::snapshot::{PerspectiveError, RememberMask};
use crate::store::{Direction, PermutationError, StoreError};
use crate::thumbnail::{RefreshReport, ThumbnailError};

#[derive(strum::AsRefStr, Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Save the live viewpoint. Without a mask, the configured default is used.
    CaptureNewView {
        #[serde(default)]
        mask: Option<RememberMask>,
        #[serde(default)]
        name: Option<String>,
    },
    UpdateView {
        id: ViewId,
        mask: RememberMask,
    },
    RenameView {
        id: ViewId,
        name: String,
    },
    DeleteView {
        id: ViewId,
    },
    ReorderViews {
        permutation: Vec<ViewId>,
    },
    NavigateTo {
        id: ViewId,
    },
    HistoryBack,
    HistoryForward,
    RefreshThumbnail {
        id: ViewId,
    },
    RefreshAllThumbnails,
    GhostStatus {
        id: ViewId,
    },
    NextView,
    PreviousView,
    MoveView {
        id: ViewId,
        direction: Direction,
    },
    SetRememberMask {
        id: ViewId,
        mask: RememberMask,
    },
}

/// What a successful command did.
#[derive(Debug)]
pub enum Outcome {
    Created(ViewId),
    /// Mutated as asked.
    Done,
    /// A saved view was restored, writing these categories.
    Restored(ViewId, RememberMask),
    /// Moved through history. Only the perspective is written.
    HistoryMoved,
    /// Nothing to do, such as history navigation at either end, or cycling with no views.
    Unchanged,
    /// A thumbnail was rendered under this generation.
    Rendered(u64),
    Refreshed(RefreshReport),
    Ghost(Diff),
}

#[derive(thiserror::Error, Debug)]
pub enum CommandError {
    #[error("{0} not found")]
    NotFound(ViewId),
    #[error(transparent)]
    ReferenceMissing(#[from] MissingReference),
    #[error("invalid permutation: {0}")]
    InvalidPermutation(#[from] PermutationError),
    #[error(transparent)]
    RenderFailure(#[from] ThumbnailError),
    #[error("view name is empty")]
    EmptyName,
    #[error("live perspective can't be saved: {0}")]
    InvalidPerspective(#[from] PerspectiveError),
}
impl From<StoreError> for CommandError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::InvalidPermutation(err) => Self::InvalidPermutation(err),
            StoreError::ReferenceMissing(err) => Self::ReferenceMissing(err),
            StoreError::EmptyName => Self::EmptyName,
            StoreError::InvalidPerspective(err) => Self::InvalidPerspective(err),
        }
    }
}

pub trait CommandConsumer {
    /// Execute a single command. If this generates an error,
    /// the state of `self` should *not* be observably changed.
    fn execute(&mut self, command: Command) -> Result<Outcome, CommandError>;
}
