//! # Thumbnails
//!
//! Rendered previews of saved views, one per [`ViewId`]. Rendering itself is someone else's job, reached
//! through [`Renderer`]. The cache only decides what's current.
//!
//! Lookup is lazy: a read never renders, it only tells the caller whether rendering is needed. A stale
//! entry keeps showing its last good bitmap until a replacement arrives.
//!
//! Rendering may happen off-thread. For that, [`ThumbnailCache::begin`] hands out a [`RenderTicket`] to send
//! to a worker, and the result comes back through [`ThumbnailCache::complete`] on the owning thread. A ticket
//! that was cancelled or superseded in the meantime is discarded, so two renders can never race to write
//! the same entry.

use crate::id::ViewId;
use crate::snapshot::{Category, PerspectiveData};
use crate::store::StoreEvent;

/// Tightly packed RGBA8 pixels, row-major.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Box<[u8]>,
}
impl Bitmap {
    pub const BYTES_PER_PIXEL: usize = 4;
    /// None if `pixels` isn't exactly `width * height` RGBA8 pixels.
    #[must_use]
    pub fn new(width: u32, height: u32, pixels: impl Into<Box<[u8]>>) -> Option<Self> {
        let pixels = pixels.into();
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(Self::BYTES_PER_PIXEL)?;
        (pixels.len() == expected).then_some(Self {
            width,
            height,
            pixels,
        })
    }
    /// A bitmap of one solid color.
    #[must_use]
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels: Box<[u8]> = std::iter::repeat(rgba)
            .take(width as usize * height as usize)
            .flatten()
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}
impl std::fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Bitmap({}x{})", self.width, self.height)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("renderer failed: {0}")]
    Failed(String),
    #[error("rendered {width}x{height}, larger than the {max_size}px limit")]
    Oversized {
        width: u32,
        height: u32,
        max_size: u32,
    },
}

/// Paints a preview from a viewpoint. Possibly slow, possibly failing.
pub trait Renderer {
    /// Render with neither edge longer than `max_size` pixels.
    fn render(&mut self, perspective: &PerspectiveData, max_size: u32)
        -> Result<Bitmap, RenderError>;
}

#[derive(thiserror::Error, Debug)]
pub enum ThumbnailError {
    #[error("{0} has no perspective to render")]
    NoPerspective(ViewId),
    #[error("rendering {view} failed after retrying")]
    RenderFailure {
        view: ViewId,
        #[source]
        source: RenderError,
    },
    #[error("render of {0} was cancelled")]
    Cancelled(ViewId),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum EntryState {
    Fresh,
    Stale,
    /// Both the render and its retry failed. Sticky until the next explicit regenerate.
    Failed,
}

struct CacheEntry {
    bitmap: Option<Bitmap>,
    /// Generation of the render that produced `bitmap`.
    generation: u64,
    state: EntryState,
}

/// Result of a cache lookup. Borrowed; the cache keeps ownership of every bitmap.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Thumbnail<'a> {
    Ready(&'a Bitmap),
    /// Needs regenerating. Has the last good bitmap, if any, to show meanwhile.
    Stale(Option<&'a Bitmap>),
    /// The last regeneration failed. Has the last good bitmap, if any.
    Failed(Option<&'a Bitmap>),
    /// Never rendered, or evicted.
    Absent,
}
impl<'a> Thumbnail<'a> {
    /// Whatever is best to display right now.
    #[must_use]
    pub fn bitmap(&self) -> Option<&'a Bitmap> {
        match *self {
            Self::Ready(bitmap) => Some(bitmap),
            Self::Stale(bitmap) | Self::Failed(bitmap) => bitmap,
            Self::Absent => None,
        }
    }
    #[must_use]
    pub fn needs_render(&self) -> bool {
        !matches!(self, Self::Ready(_))
    }
}

/// A claim on rendering one view, to be returned through [`ThumbnailCache::complete`].
#[derive(Clone, Debug, PartialEq)]
pub struct RenderTicket {
    view: ViewId,
    generation: u64,
    attempt: u8,
    perspective: PerspectiveData,
    max_size: u32,
}
impl RenderTicket {
    #[must_use]
    pub fn view(&self) -> ViewId {
        self.view
    }
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
    #[must_use]
    pub fn perspective(&self) -> &PerspectiveData {
        &self.perspective
    }
    #[must_use]
    pub fn max_size(&self) -> u32 {
        self.max_size
    }
    /// Run the ticket on a renderer. Safe to call from any thread.
    pub fn render(&self, renderer: &mut impl Renderer) -> Result<Bitmap, RenderError> {
        renderer.render(&self.perspective, self.max_size)
    }
}

#[derive(Debug)]
#[must_use = "a retry ticket must be rendered again or the entry stays in flight"]
pub enum Completion {
    /// Stored under this generation.
    Applied(u64),
    /// First failure. Render this ticket once more.
    Retry(RenderTicket),
    /// Failed twice, the entry is now in the error state.
    Failed(RenderError),
    /// The ticket was cancelled or superseded. Nothing changed.
    Discarded,
}

#[derive(Debug, Default)]
pub struct RefreshReport {
    pub refreshed: Vec<ViewId>,
    pub failed: Vec<ThumbnailError>,
}
impl RefreshReport {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct ThumbnailCache {
    entries: hashbrown::HashMap<ViewId, CacheEntry>,
    /// The one generation per view whose result will be accepted.
    in_flight: hashbrown::HashMap<ViewId, u64>,
    next_generation: u64,
    max_size: u32,
}

impl ThumbnailCache {
    #[must_use]
    pub fn new(config: &crate::config::Config) -> Self {
        Self {
            entries: hashbrown::HashMap::new(),
            in_flight: hashbrown::HashMap::new(),
            next_generation: 1,
            max_size: config.max_thumbnail_size,
        }
    }
    /// Applies to renders begun from now on.
    pub fn set_max_size(&mut self, max_size: u32) {
        self.max_size = max_size;
    }
    #[must_use]
    pub fn max_size(&self) -> u32 {
        self.max_size
    }
    /// Look up a view's preview. Never renders.
    #[must_use]
    pub fn get(&self, view: ViewId) -> Thumbnail<'_> {
        match self.entries.get(&view) {
            None => Thumbnail::Absent,
            Some(entry) => match entry.state {
                EntryState::Fresh => match entry.bitmap.as_ref() {
                    Some(bitmap) => Thumbnail::Ready(bitmap),
                    None => Thumbnail::Stale(None),
                },
                EntryState::Stale => Thumbnail::Stale(entry.bitmap.as_ref()),
                EntryState::Failed => Thumbnail::Failed(entry.bitmap.as_ref()),
            },
        }
    }
    /// Generation of the bitmap currently held for the view.
    #[must_use]
    pub fn generation(&self, view: ViewId) -> Option<u64> {
        self.entries
            .get(&view)
            .filter(|entry| entry.bitmap.is_some())
            .map(|entry| entry.generation)
    }
    #[must_use]
    pub fn is_in_flight(&self, view: ViewId) -> bool {
        self.in_flight.contains_key(&view)
    }
    /// Start a render of `view`. Any earlier ticket for the same view is superseded.
    pub fn begin(&mut self, view: ViewId, perspective: &PerspectiveData) -> RenderTicket {
        let generation = self.next_generation;
        self.next_generation += 1;
        if self.in_flight.insert(view, generation).is_some() {
            log::trace!("thumbnail: superseding in-flight render of {view}");
        }
        RenderTicket {
            view,
            generation,
            attempt: 0,
            perspective: *perspective,
            max_size: self.max_size,
        }
    }
    /// Bring a render result back into the cache.
    pub fn complete(
        &mut self,
        ticket: RenderTicket,
        result: Result<Bitmap, RenderError>,
    ) -> Completion {
        if self.in_flight.get(&ticket.view) != Some(&ticket.generation) {
            log::trace!(
                "thumbnail: discarding result of {} gen {}",
                ticket.view,
                ticket.generation
            );
            return Completion::Discarded;
        }
        let result = result.and_then(|bitmap| {
            if bitmap.width > ticket.max_size || bitmap.height > ticket.max_size {
                Err(RenderError::Oversized {
                    width: bitmap.width,
                    height: bitmap.height,
                    max_size: ticket.max_size,
                })
            } else {
                Ok(bitmap)
            }
        });
        match result {
            Ok(bitmap) => {
                self.in_flight.remove(&ticket.view);
                let entry = self.entries.entry(ticket.view).or_insert(CacheEntry {
                    bitmap: None,
                    generation: 0,
                    state: EntryState::Stale,
                });
                // Drops the previous bitmap.
                entry.bitmap = Some(bitmap);
                entry.generation = ticket.generation;
                entry.state = EntryState::Fresh;
                Completion::Applied(ticket.generation)
            }
            Err(err) if ticket.attempt == 0 => {
                log::warn!("thumbnail: rendering {} failed, retrying: {err}", ticket.view);
                Completion::Retry(RenderTicket {
                    attempt: ticket.attempt + 1,
                    ..ticket
                })
            }
            Err(err) => {
                log::warn!("thumbnail: rendering {} failed again: {err}", ticket.view);
                self.in_flight.remove(&ticket.view);
                self.entries
                    .entry(ticket.view)
                    .or_insert(CacheEntry {
                        bitmap: None,
                        generation: 0,
                        state: EntryState::Failed,
                    })
                    .state = EntryState::Failed;
                Completion::Failed(err)
            }
        }
    }
    /// Render `view` right now on this thread, retrying once on failure. Returns the new generation.
    pub fn regenerate(
        &mut self,
        view: ViewId,
        perspective: Option<&PerspectiveData>,
        renderer: &mut impl Renderer,
    ) -> Result<u64, ThumbnailError> {
        let perspective = perspective.ok_or(ThumbnailError::NoPerspective(view))?;
        let mut ticket = self.begin(view, perspective);
        loop {
            let result = ticket.render(renderer);
            match self.complete(ticket, result) {
                Completion::Applied(generation) => return Ok(generation),
                Completion::Retry(retry) => ticket = retry,
                Completion::Failed(source) => {
                    return Err(ThumbnailError::RenderFailure { view, source })
                }
                Completion::Discarded => return Err(ThumbnailError::Cancelled(view)),
            }
        }
    }
    /// Mark the preview out of date, keeping the bitmap for display meanwhile. Failed entries stay failed.
    pub fn mark_stale(&mut self, view: ViewId) -> bool {
        match self.entries.get_mut(&view) {
            Some(entry) if entry.state == EntryState::Fresh => {
                entry.state = EntryState::Stale;
                true
            }
            _ => false,
        }
    }
    /// Mark everything stale, then regenerate each view in turn. Each render is complete before the next
    /// begins.
    pub fn refresh_all<'a>(
        &mut self,
        views: impl IntoIterator<Item = (ViewId, Option<&'a PerspectiveData>)>,
        renderer: &mut impl Renderer,
    ) -> RefreshReport {
        for entry in self.entries.values_mut() {
            if entry.state == EntryState::Fresh {
                entry.state = EntryState::Stale;
            }
        }
        let mut report = RefreshReport::default();
        for (view, perspective) in views {
            match self.regenerate(view, perspective, renderer) {
                Ok(_) => report.refreshed.push(view),
                Err(err) => report.failed.push(err),
            }
        }
        log::debug!(
            "thumbnail: refreshed {}, {} failed, cache holds {}",
            report.refreshed.len(),
            report.failed.len(),
            human_bytes::human_bytes(self.resident_bytes() as f64)
        );
        report
    }
    /// Drop the view's entry and bitmap, and forget any render in flight for it.
    pub fn evict(&mut self, view: ViewId) -> bool {
        self.in_flight.remove(&view);
        self.entries.remove(&view).is_some()
    }
    /// Forget every in-flight render. Their results will be discarded. Returns how many were cancelled.
    pub fn cancel_pending(&mut self) -> usize {
        let count = self.in_flight.len();
        self.in_flight.clear();
        count
    }
    /// Keep up with changes to the saved views.
    pub fn observe(&mut self, event: &StoreEvent) {
        match *event {
            StoreEvent::Updated { id, categories } if categories.has(Category::Perspective) => {
                self.mark_stale(id);
            }
            StoreEvent::Deleted(id) => {
                self.evict(id);
            }
            _ => (),
        }
    }
    /// Total size of every held bitmap.
    #[must_use]
    pub fn resident_bytes(&self) -> usize {
        self.entries
            .values()
            .filter_map(|entry| entry.bitmap.as_ref())
            .map(Bitmap::byte_len)
            .sum()
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
