//! # IDs
//! Saved views need an identity that survives renames, reorders and round trips through a document on disk.
//! This is implemented in this module via the [`ViewId`] type, handed out by an [`IdAllocator`].
//!
//! Unlike a process-unique counter, the allocator's high-water mark is persisted alongside the views, so an
//! ID is assigned once and never reused, even after the view holding it is deleted and the document reloaded.

/// Stable identifier of a saved view. Never zero.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ViewId(std::num::NonZeroU64);

impl ViewId {
    /// Get the raw numeric value of this ID.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0.get()
    }
    /// Wrap a raw value read from elsewhere. None if zero.
    #[must_use]
    pub fn from_raw(raw: u64) -> Option<Self> {
        std::num::NonZeroU64::new(raw).map(Self)
    }
}
impl std::fmt::Display for ViewId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "View#{}", self.0)
    }
}
impl std::fmt::Debug for ViewId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <ViewId as std::fmt::Display>::fmt(self, f)
    }
}

/// Hands out [`ViewId`]s in increasing order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdAllocator {
    /// The next ID to hand out. Everything below this has been issued at some point.
    next: std::num::NonZeroU64,
}
impl Default for IdAllocator {
    fn default() -> Self {
        Self {
            next: std::num::NonZeroU64::MIN,
        }
    }
}
impl IdAllocator {
    /// Resume allocation from a persisted high-water mark. Zero is treated as a fresh allocator.
    #[must_use]
    pub fn resume(next: u64) -> Self {
        std::num::NonZeroU64::new(next).map_or_else(Self::default, |next| Self { next })
    }
    /// The raw value of the next ID to be issued, for persisting.
    #[must_use]
    pub fn high_water_mark(&self) -> u64 {
        self.next.get()
    }
    /// Make sure `id` (and everything below it) will never be issued again.
    pub fn reserve(&mut self, id: ViewId) {
        if id.0 >= self.next {
            match id.0.checked_add(1) {
                Some(next) => self.next = next,
                None => Self::exhausted(),
            }
        }
    }
    /// Like [`Self::reserve`], but refuses an `id` that would leave nothing free to allocate afterwards.
    /// Returns whether it was reserved.
    #[must_use]
    pub fn try_reserve(&mut self, id: ViewId) -> bool {
        if id.get() >= u64::MAX - 1 {
            return false;
        }
        self.reserve(id);
        true
    }
    /// Whether at least one more ID can be issued without overflowing.
    #[must_use]
    pub fn can_allocate(&self) -> bool {
        self.next.get() < u64::MAX
    }
    /// Issue a fresh ID.
    pub fn allocate(&mut self) -> ViewId {
        let id = ViewId(self.next);
        match self.next.checked_add(1) {
            Some(next) => self.next = next,
            None => Self::exhausted(),
        }
        id
    }
    /// Every possible ID has been handed out. Issuing a duplicate would silently alias two views,
    /// so refuse to go on.
    fn exhausted() -> ! {
        // In builds, terminate. In testing, panic, so that tests for overflow may be implemented.
        #[cfg(not(test))]
        {
            log::error!("ViewId overflow! Aborting!");
            log::logger().flush();
            std::process::abort();
        }
        #[cfg(test)]
        {
            panic!("ViewId overflow! Aborting!")
        }
    }
}

#[cfg(test)]
mod test {
    use super::{IdAllocator, ViewId};

    #[test]
    fn sequential_and_unique() {
        let mut alloc = IdAllocator::default();
        let a = alloc.allocate();
        let b = alloc.allocate();
        assert_eq!(a.get(), 1);
        assert_eq!(b.get(), 2);
        assert_ne!(a, b);
        assert_eq!(alloc.high_water_mark(), 3);
    }
    #[test]
    fn resume_never_reissues() {
        let mut alloc = IdAllocator::resume(7);
        assert_eq!(alloc.allocate().get(), 7);
        // Zero is not a valid mark, behaves as fresh.
        assert_eq!(IdAllocator::resume(0).allocate().get(), 1);
    }
    #[test]
    fn reserve_advances_past_foreign_ids() {
        let mut alloc = IdAllocator::default();
        alloc.reserve(ViewId::from_raw(10).unwrap());
        assert_eq!(alloc.allocate().get(), 11);
        // Reserving something already behind the mark is a no-op.
        alloc.reserve(ViewId::from_raw(3).unwrap());
        assert_eq!(alloc.allocate().get(), 12);
    }
    #[test]
    fn try_reserve_refuses_top_of_range() {
        let mut alloc = IdAllocator::default();
        assert!(!alloc.try_reserve(ViewId::from_raw(u64::MAX).unwrap()));
        assert!(!alloc.try_reserve(ViewId::from_raw(u64::MAX - 1).unwrap()));
        // Refusals leave the allocator untouched.
        assert_eq!(alloc.high_water_mark(), 1);

        assert!(alloc.try_reserve(ViewId::from_raw(u64::MAX - 2).unwrap()));
        assert!(alloc.can_allocate());
        assert_eq!(alloc.allocate().get(), u64::MAX - 1);
        assert!(!IdAllocator::resume(u64::MAX).can_allocate());
    }
    #[test]
    fn display() {
        assert_eq!(ViewId::from_raw(4).unwrap().to_string(), "View#4");
        assert!(ViewId::from_raw(0).is_none());
    }
    #[test]
    #[should_panic(expected = "ViewId overflow")]
    fn overflow() {
        // The last representable value can't be followed by anything, so issuing it must refuse.
        let mut alloc = IdAllocator::resume(u64::MAX);
        let _ = alloc.allocate();
    }
}
