//! # Navigation
//!
//! The session façade. Owns the saved views, history and thumbnails, plus the host capabilities they act
//! on, and services every command against them on one logical timeline.
//!
//! The host drives it with two calls: [`NavigationController::on_viewport_changed`] for every viewport
//! change, and [`NavigationController::tick`] whenever [`NavigationController::next_wakeup`] comes due.

use std::sync::Arc;
use std::time::Instant;

use crate::commands::{Command, CommandConsumer, CommandError, Outcome};
use crate::config::Config;
use crate::engine::{self, Diff, SceneRegistry, Viewport};
use crate::history::timer::{Clock, SystemClock};
use crate::history::{HistoryEntry, HistoryRecorder};
use crate::id::ViewId;
use crate::io::StoreDocument;
use crate::snapshot::{RememberMask, Snapshot, Tolerance};
use crate::store::{Direction, SavedViewStore, StoreEvent};
use crate::thumbnail::{RefreshReport, Renderer, Thumbnail, ThumbnailCache};

pub struct NavigationController<V, S, R> {
    config: Config,
    store: SavedViewStore,
    history: HistoryRecorder,
    thumbnails: ThumbnailCache,
    viewport: V,
    registry: S,
    renderer: R,
    clock: Box<dyn Clock>,
    /// As of the last change notification or our own write. Ghost status compares against this.
    live: Snapshot,
    /// The view most recently created or navigated to.
    active: Option<ViewId>,
    tolerance: Tolerance,
}

impl<V: Viewport, S: SceneRegistry, R: Renderer> NavigationController<V, S, R> {
    /// Start a session with no saved views.
    pub fn new(config: Config, viewport: V, registry: S, renderer: R) -> Self {
        let config = config.sanitized();
        let live = viewport.snapshot();
        Self {
            history: HistoryRecorder::new(&config),
            thumbnails: ThumbnailCache::new(&config),
            store: SavedViewStore::default(),
            config,
            viewport,
            registry,
            renderer,
            clock: Box::new(SystemClock),
            live,
            active: None,
            tolerance: Tolerance::default(),
        }
    }
    #[must_use]
    pub fn with_clock(self, clock: impl Clock + 'static) -> Self {
        Self {
            clock: Box::new(clock),
            ..self
        }
    }
    /// Replace the saved views, such as after loading a document. History and thumbnails belong to the old
    /// views, so they're reset.
    #[must_use]
    pub fn with_store(mut self, store: SavedViewStore) -> Self {
        self.history.clear();
        self.thumbnails = ThumbnailCache::new(&self.config);
        self.store = store;
        self.active = None;
        self
    }
    /// Apply new preferences mid-session.
    pub fn set_config(&mut self, config: Config) {
        let config = config.sanitized();
        self.history.set_capacity(config.max_history_size);
        self.history.set_settle_delay(config.settle_delay());
        self.history.set_navigation_grace(config.navigation_grace());
        self.thumbnails.set_max_size(config.max_thumbnail_size);
        self.config = config;
    }
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }
    #[must_use]
    pub fn store(&self) -> &SavedViewStore {
        &self.store
    }
    #[must_use]
    pub fn history(&self) -> &HistoryRecorder {
        &self.history
    }
    #[must_use]
    pub fn thumbnails(&self) -> &ThumbnailCache {
        &self.thumbnails
    }
    #[must_use]
    pub fn viewport(&self) -> &V {
        &self.viewport
    }
    pub fn viewport_mut(&mut self) -> &mut V {
        &mut self.viewport
    }
    #[must_use]
    pub fn registry(&self) -> &S {
        &self.registry
    }
    pub fn registry_mut(&mut self) -> &mut S {
        &mut self.registry
    }
    #[must_use]
    pub fn live(&self) -> &Snapshot {
        &self.live
    }
    #[must_use]
    pub fn active_view(&self) -> Option<ViewId> {
        self.active
    }
    fn now(&self) -> Instant {
        self.clock.now()
    }
    fn refresh_live(&mut self) {
        self.live = self.viewport.snapshot();
    }
    /// Forward store changes to the dependents.
    fn sync(&mut self) {
        for event in self.store.drain_events() {
            self.thumbnails.observe(&event);
            if let StoreEvent::Deleted(id) = event {
                if self.active == Some(id) {
                    self.active = None;
                }
            }
        }
    }

    /// The viewport changed.
    pub fn on_viewport_changed(&mut self, live: Snapshot) {
        let now = self.now();
        self.history.observe(&live, now);
        self.live = live;
    }
    /// Commit history if it has settled. Returns the new entry, if any.
    pub fn tick(&mut self) -> Option<Arc<HistoryEntry>> {
        let now = self.now();
        self.history.poll(now)
    }
    /// When [`Self::tick`] next has work to do.
    #[must_use]
    pub fn next_wakeup(&self) -> Option<Instant> {
        self.history.next_deadline()
    }

    pub fn capture_new_view(
        &mut self,
        mask: Option<RememberMask>,
        name: Option<&str>,
    ) -> Result<ViewId, CommandError> {
        self.refresh_live();
        let mask = mask.unwrap_or(self.config.default_remember_mask);
        let id = self.store.create_from(&self.live, mask, name)?;
        self.active = Some(id);
        self.sync();
        Ok(id)
    }
    /// Recapture the masked categories of a view from the live viewport.
    pub fn update_view(&mut self, id: ViewId, mask: RememberMask) -> Result<(), CommandError> {
        self.refresh_live();
        self.store.update(id, mask, &self.live)?;
        self.sync();
        Ok(())
    }
    pub fn rename_view(&mut self, id: ViewId, name: &str) -> Result<(), CommandError> {
        self.store.rename(id, name)?;
        self.sync();
        Ok(())
    }
    pub fn delete_view(&mut self, id: ViewId) -> Result<(), CommandError> {
        self.store.delete(id)?;
        self.sync();
        Ok(())
    }
    pub fn reorder_views(&mut self, permutation: &[ViewId]) -> Result<(), CommandError> {
        self.store.reorder(permutation)?;
        self.sync();
        Ok(())
    }
    pub fn move_view(&mut self, id: ViewId, direction: Direction) -> Result<bool, CommandError> {
        let moved = self.store.move_view(id, direction)?;
        self.sync();
        Ok(moved)
    }
    pub fn set_remember_mask(&mut self, id: ViewId, mask: RememberMask) -> Result<(), CommandError> {
        self.store.set_remember_mask(id, mask)?;
        self.sync();
        Ok(())
    }
    /// Restore a saved view. The restoration itself is not recorded in history, but motion made just
    /// before it is committed first.
    pub fn navigate_to(&mut self, id: ViewId) -> Result<RememberMask, CommandError> {
        let now = self.now();
        let written = self
            .store
            .navigate_to(id, &mut self.viewport, &self.registry)?;
        self.history.flush(now);
        self.history.suppress(now);
        self.active = Some(id);
        self.refresh_live();
        Ok(written)
    }
    fn step(&mut self, direction: Direction) -> Result<Option<(ViewId, RememberMask)>, CommandError> {
        let target = match self.active.filter(|&id| self.store.contains(id)) {
            Some(active) => Some(self.store.neighbor(active, direction)?),
            None => match direction {
                Direction::Down => self.store.ids().next(),
                Direction::Up => self.store.ids().last(),
            },
        };
        let Some(target) = target else {
            return Ok(None);
        };
        self.navigate_to(target).map(|written| Some((target, written)))
    }
    /// Navigate to the view after the active one, wrapping around. `None` if there are no views.
    pub fn next_view(&mut self) -> Result<Option<(ViewId, RememberMask)>, CommandError> {
        self.step(Direction::Down)
    }
    pub fn previous_view(&mut self) -> Result<Option<(ViewId, RememberMask)>, CommandError> {
        self.step(Direction::Up)
    }
    fn restore_history(&mut self, entry: Option<Arc<HistoryEntry>>) -> Option<Arc<HistoryEntry>> {
        let entry = entry?;
        // History is about where you were looking, nothing else.
        self.viewport.write_perspective(&entry.snapshot.perspective);
        self.refresh_live();
        Some(entry)
    }
    /// Step back through history, writing the entry's perspective. `None` at the oldest entry.
    pub fn history_back(&mut self) -> Option<Arc<HistoryEntry>> {
        let now = self.now();
        let entry = self.history.back(now);
        self.restore_history(entry)
    }
    pub fn history_forward(&mut self) -> Option<Arc<HistoryEntry>> {
        let now = self.now();
        let entry = self.history.forward(now);
        self.restore_history(entry)
    }
    /// Render a view's thumbnail now. Returns the new generation.
    pub fn refresh_thumbnail(&mut self, id: ViewId) -> Result<u64, CommandError> {
        let view = self.store.get(id).ok_or(CommandError::NotFound(id))?;
        let generation = self.thumbnails.regenerate(
            id,
            view.snapshot().perspective.as_ref(),
            &mut self.renderer,
        )?;
        Ok(generation)
    }
    /// Re-render every thumbnail, one at a time, in view order.
    pub fn refresh_all_thumbnails(&mut self) -> RefreshReport {
        self.thumbnails.refresh_all(
            self.store
                .iter()
                .map(|view| (view.id(), view.snapshot().perspective.as_ref())),
            &mut self.renderer,
        )
    }
    #[must_use]
    pub fn thumbnail(&self, id: ViewId) -> Thumbnail<'_> {
        self.thumbnails.get(id)
    }
    /// Which of a view's remembered categories differ from the live viewport.
    pub fn ghost_status(&self, id: ViewId) -> Result<Diff, CommandError> {
        let view = self.store.get(id).ok_or(CommandError::NotFound(id))?;
        Ok(engine::diff(
            &self.live,
            view.snapshot(),
            view.mask(),
            &self.tolerance,
        ))
    }
    #[must_use]
    pub fn to_document(&self) -> StoreDocument {
        self.store.to_document()
    }
    /// End the session. A pending history change and any in-flight renders are dropped without being
    /// committed.
    pub fn teardown(&mut self) {
        self.history.cancel();
        let cancelled = self.thumbnails.cancel_pending();
        log::debug!("teardown, {cancelled} renders cancelled");
    }
}

impl<V: Viewport, S: SceneRegistry, R: Renderer> CommandConsumer for NavigationController<V, S, R> {
    fn execute(&mut self, command: Command) -> Result<Outcome, CommandError> {
        log::debug!("executing {}", command.as_ref());
        let outcome = match command {
            Command::CaptureNewView { mask, name } => {
                Outcome::Created(self.capture_new_view(mask, name.as_deref())?)
            }
            Command::UpdateView { id, mask } => {
                self.update_view(id, mask)?;
                Outcome::Done
            }
            Command::RenameView { id, name } => {
                self.rename_view(id, &name)?;
                Outcome::Done
            }
            Command::DeleteView { id } => {
                self.delete_view(id)?;
                Outcome::Done
            }
            Command::ReorderViews { permutation } => {
                self.reorder_views(&permutation)?;
                Outcome::Done
            }
            Command::NavigateTo { id } => Outcome::Restored(id, self.navigate_to(id)?),
            Command::HistoryBack => self
                .history_back()
                .map_or(Outcome::Unchanged, |_| Outcome::HistoryMoved),
            Command::HistoryForward => self
                .history_forward()
                .map_or(Outcome::Unchanged, |_| Outcome::HistoryMoved),
            Command::RefreshThumbnail { id } => Outcome::Rendered(self.refresh_thumbnail(id)?),
            Command::RefreshAllThumbnails => Outcome::Refreshed(self.refresh_all_thumbnails()),
            Command::GhostStatus { id } => Outcome::Ghost(self.ghost_status(id)?),
            Command::NextView => self
                .next_view()?
                .map_or(Outcome::Unchanged, |(id, written)| {
                    Outcome::Restored(id, written)
                }),
            Command::PreviousView => self
                .previous_view()?
                .map_or(Outcome::Unchanged, |(id, written)| {
                    Outcome::Restored(id, written)
                }),
            Command::MoveView { id, direction } => {
                if self.move_view(id, direction)? {
                    Outcome::Done
                } else {
                    Outcome::Unchanged
                }
            }
            Command::SetRememberMask { id, mask } => {
                self.set_remember_mask(id, mask)?;
                Outcome::Done
            }
        };
        Ok(outcome)
    }
}
