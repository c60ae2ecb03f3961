//! # Saved views
//!
//! The ordered collection of named bookmarks. Order indices are always exactly `0..len`, and the collection
//! is kept sorted by them, so a view's order is also its position.
//!
//! Every mutation queues a [`StoreEvent`], which the owner drains to keep dependents (like the thumbnail
//! cache) in step.

use chrono::{DateTime, Utc};
use smallvec::SmallVec;

use crate::engine::{self, MissingReference, SceneRegistry, Viewport};
use crate::id::{IdAllocator, ViewId};
use crate::io::{DocumentError, StoreDocument};
use crate::snapshot::{Category, PartialSnapshot, PerspectiveError, RememberMask, Snapshot};

/// A named bookmark.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SavedView {
    id: ViewId,
    name: String,
    order: usize,
    mask: RememberMask,
    snapshot: PartialSnapshot,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
}
impl SavedView {
    /// Also the key of this view's thumbnail.
    #[must_use]
    pub fn id(&self) -> ViewId {
        self.id
    }
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
    #[must_use]
    pub fn order(&self) -> usize {
        self.order
    }
    /// Which categories this view restores.
    #[must_use]
    pub fn mask(&self) -> RememberMask {
        self.mask
    }
    #[must_use]
    pub fn snapshot(&self) -> &PartialSnapshot {
        &self.snapshot
    }
    #[must_use]
    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }
    #[must_use]
    pub fn modified(&self) -> DateTime<Utc> {
        self.modified
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Direction {
    /// Towards order zero.
    Up,
    Down,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StoreEvent {
    Created(ViewId),
    /// Recaptured. `categories` were taken from the live viewport.
    Updated {
        id: ViewId,
        categories: RememberMask,
    },
    Renamed(ViewId),
    MaskChanged(ViewId),
    Deleted(ViewId),
    Reordered,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PermutationError {
    #[error("expected {expected} ids, got {got}")]
    LengthMismatch { expected: usize, got: usize },
    #[error("{0} appears more than once")]
    Duplicate(ViewId),
    #[error("{0} is not a saved view")]
    Unknown(ViewId),
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(ViewId),
    #[error("invalid permutation: {0}")]
    InvalidPermutation(#[from] PermutationError),
    #[error(transparent)]
    ReferenceMissing(#[from] MissingReference),
    #[error("view name is empty")]
    EmptyName,
    #[error("live perspective can't be saved: {0}")]
    InvalidPerspective(#[from] PerspectiveError),
}

pub struct SavedViewStore {
    /// Sorted by `order`, which is also the index.
    views: Vec<SavedView>,
    ids: IdAllocator,
    /// For auto-naming, "View N". Never goes down.
    next_view_number: u64,
    events: SmallVec<[StoreEvent; 2]>,
}
impl Default for SavedViewStore {
    fn default() -> Self {
        Self {
            views: Vec::new(),
            ids: IdAllocator::default(),
            next_view_number: 1,
            events: SmallVec::new(),
        }
    }
}

impl SavedViewStore {
    fn position(&self, id: ViewId) -> Result<usize, StoreError> {
        self.views
            .iter()
            .position(|view| view.id == id)
            .ok_or(StoreError::NotFound(id))
    }
    fn reindex(&mut self) {
        for (order, view) in self.views.iter_mut().enumerate() {
            view.order = order;
        }
    }
    fn check_live(live: &Snapshot, mask: RememberMask) -> Result<(), StoreError> {
        if mask.has(Category::Perspective) {
            live.perspective.validate()?;
        }
        Ok(())
    }
    /// Save the live viewpoint as a new view at the end of the order. A missing or blank name is replaced
    /// with the next "View N".
    pub fn create_from(
        &mut self,
        live: &Snapshot,
        mask: RememberMask,
        name: Option<&str>,
    ) -> Result<ViewId, StoreError> {
        Self::check_live(live, mask)?;
        let id = self.ids.allocate();
        let name = match name.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => name.to_owned(),
            None => match self.next_view_number.checked_add(1) {
                Some(next) => {
                    let number = self.next_view_number;
                    self.next_view_number = next;
                    format!("View {number}")
                }
                // Counter is spent, name by the id instead.
                None => id.to_string(),
            },
        };
        let now = Utc::now();
        self.views.push(SavedView {
            id,
            name,
            order: self.views.len(),
            mask,
            snapshot: engine::capture(live, mask, None),
            created: now,
            modified: now,
        });
        log::debug!("created {id} with {mask:?}");
        self.events.push(StoreEvent::Created(id));
        Ok(id)
    }
    /// Recapture the masked categories from the live viewpoint. Others keep what they had. `mask` becomes
    /// the view's new mask.
    pub fn update(
        &mut self,
        id: ViewId,
        mask: RememberMask,
        live: &Snapshot,
    ) -> Result<(), StoreError> {
        let idx = self.position(id)?;
        Self::check_live(live, mask)?;
        let view = &mut self.views[idx];
        view.snapshot = engine::capture(live, mask, Some(&view.snapshot));
        view.mask = mask;
        view.modified = Utc::now();
        self.events.push(StoreEvent::Updated {
            id,
            categories: mask,
        });
        Ok(())
    }
    /// Names are trimmed, and can't be empty. Renaming to the same name does nothing.
    pub fn rename(&mut self, id: ViewId, name: &str) -> Result<(), StoreError> {
        let idx = self.position(id)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::EmptyName);
        }
        let view = &mut self.views[idx];
        if view.name != name {
            view.name = name.to_owned();
            view.modified = Utc::now();
            self.events.push(StoreEvent::Renamed(id));
        }
        Ok(())
    }
    /// Change which categories a view restores, without recapturing anything.
    pub fn set_remember_mask(&mut self, id: ViewId, mask: RememberMask) -> Result<(), StoreError> {
        let idx = self.position(id)?;
        let view = &mut self.views[idx];
        if view.mask != mask {
            view.mask = mask;
            view.modified = Utc::now();
            self.events.push(StoreEvent::MaskChanged(id));
        }
        Ok(())
    }
    /// Remove a view, shifting everything after it down one place.
    pub fn delete(&mut self, id: ViewId) -> Result<SavedView, StoreError> {
        let idx = self.position(id)?;
        let view = self.views.remove(idx);
        self.reindex();
        log::debug!("deleted {id} ({:?})", view.name);
        self.events.push(StoreEvent::Deleted(id));
        Ok(view)
    }
    /// Set the order to exactly `permutation`, which must name every view once. On error nothing changes.
    pub fn reorder(&mut self, permutation: &[ViewId]) -> Result<(), StoreError> {
        if permutation.len() != self.views.len() {
            return Err(PermutationError::LengthMismatch {
                expected: self.views.len(),
                got: permutation.len(),
            }
            .into());
        }
        let mut rank = hashbrown::HashMap::with_capacity(permutation.len());
        for (position, &id) in permutation.iter().enumerate() {
            if !self.contains(id) {
                return Err(PermutationError::Unknown(id).into());
            }
            if rank.insert(id, position).is_some() {
                return Err(PermutationError::Duplicate(id).into());
            }
        }
        self.views
            .sort_by_key(|view| rank.get(&view.id).copied().unwrap_or(usize::MAX));
        self.reindex();
        self.events.push(StoreEvent::Reordered);
        Ok(())
    }
    /// Swap a view with its neighbor. Returns false, changing nothing, if already at that end.
    pub fn move_view(&mut self, id: ViewId, direction: Direction) -> Result<bool, StoreError> {
        let idx = self.position(id)?;
        let other = match direction {
            Direction::Up => idx.checked_sub(1),
            Direction::Down => Some(idx + 1).filter(|&other| other < self.views.len()),
        };
        let Some(other) = other else {
            return Ok(false);
        };
        self.views.swap(idx, other);
        self.reindex();
        self.events.push(StoreEvent::Reordered);
        Ok(true)
    }
    /// The adjacent view in order, wrapping around at the ends. A lone view is its own neighbor.
    pub fn neighbor(&self, id: ViewId, direction: Direction) -> Result<ViewId, StoreError> {
        let idx = self.position(id)?;
        let len = self.views.len();
        let other = match direction {
            Direction::Up => (idx + len - 1) % len,
            Direction::Down => (idx + 1) % len,
        };
        Ok(self.views[other].id)
    }
    /// Restore a view onto the viewport, writing only its masked categories. Returns what was written.
    pub fn navigate_to(
        &self,
        id: ViewId,
        viewport: &mut impl Viewport,
        registry: &impl SceneRegistry,
    ) -> Result<RememberMask, StoreError> {
        let view = self.get(id).ok_or(StoreError::NotFound(id))?;
        log::debug!("navigating to {id} ({:?})", view.name);
        Ok(engine::apply(&view.snapshot, view.mask, viewport, registry)?)
    }
    /// Views whose stored composition refers to something no longer in the registry.
    pub fn dangling<'a>(
        &'a self,
        registry: &'a impl SceneRegistry,
    ) -> impl Iterator<Item = (ViewId, MissingReference)> + 'a {
        self.views.iter().filter_map(move |view| {
            let composition = view.snapshot.composition.as_ref()?;
            composition.check(registry).err().map(|missing| (view.id, missing))
        })
    }
    #[must_use]
    pub fn get(&self, id: ViewId) -> Option<&SavedView> {
        self.views.iter().find(|view| view.id == id)
    }
    #[must_use]
    pub fn contains(&self, id: ViewId) -> bool {
        self.get(id).is_some()
    }
    /// In order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &SavedView> + '_ {
        self.views.iter()
    }
    /// In order.
    pub fn ids(&self) -> impl ExactSizeIterator<Item = ViewId> + '_ {
        self.views.iter().map(SavedView::id)
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.views.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
    /// Take every event queued since the last drain, oldest first.
    pub fn drain_events(&mut self) -> impl Iterator<Item = StoreEvent> + '_ {
        self.events.drain(..)
    }
    #[must_use]
    pub fn to_document(&self) -> StoreDocument {
        StoreDocument {
            version: StoreDocument::CURRENT_VERSION,
            next_id: self.ids.high_water_mark(),
            next_view_number: self.next_view_number,
            views: self.views.clone(),
        }
    }
    /// Rebuild from a loaded document, repairing what can be repaired.
    pub fn from_document(document: StoreDocument) -> Result<Self, DocumentError> {
        if document.version != StoreDocument::CURRENT_VERSION {
            return Err(DocumentError::UnsupportedVersion(document.version));
        }
        let mut ids = IdAllocator::resume(document.next_id);
        if !ids.can_allocate() {
            return Err(DocumentError::IdSpaceExhausted(document.next_id));
        }
        let mut seen = hashbrown::HashSet::with_capacity(document.views.len());
        for view in &document.views {
            if !seen.insert(view.id) {
                return Err(DocumentError::DuplicateId(view.id));
            }
            if !ids.try_reserve(view.id) {
                return Err(DocumentError::IdSpaceExhausted(view.id.get()));
            }
        }

        let mut views = document.views;
        views.sort_by_key(|view| (view.order, view.id));
        let dense = views.iter().enumerate().all(|(idx, view)| view.order == idx);
        if !dense {
            log::warn!("saved view order had gaps or ties, renumbering");
        }

        // Names like "View 12" written by hand or by an older counter must not be issued again.
        let highest_auto = views
            .iter()
            .filter_map(|view| view.name.strip_prefix("View ")?.parse::<u64>().ok())
            // A counter this high could never advance past it, so such names are left to collide.
            .filter(|&number| number < u64::MAX - 1)
            .max()
            .unwrap_or(0);
        let next_view_number = document
            .next_view_number
            .max(highest_auto.saturating_add(1))
            .max(1);

        let mut store = Self {
            views,
            ids,
            next_view_number,
            events: SmallVec::new(),
        };
        store.reindex();
        Ok(store)
    }
}
