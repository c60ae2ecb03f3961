//! # Capture, diff, apply
//!
//! The three operations relating a live [`Snapshot`] and a stored [`PartialSnapshot`] under a
//! [`RememberMask`]. None of them hold state; the host is reached only through the [`Viewport`] and
//! [`SceneRegistry`] capabilities.

use crate::snapshot::{
    Category, CompositionRef, OverlayData, PartialSnapshot, PerspectiveData, RememberMask, SceneId,
    ShadingData, Snapshot, Tolerance, ViewLayerId,
};

/// Read-current-state and write-selected-categories access to a live viewport.
pub trait Viewport {
    /// Read every category as it is right now.
    fn snapshot(&self) -> Snapshot;
    fn write_perspective(&mut self, perspective: &PerspectiveData);
    fn write_shading(&mut self, shading: &ShadingData);
    fn write_overlays(&mut self, overlays: &OverlayData);
    fn write_composition(&mut self, composition: &CompositionRef);
}

/// The host's scene and view layer registry.
pub trait SceneRegistry {
    fn scene_exists(&self, scene: &SceneId) -> bool;
    fn view_layer_exists(&self, scene: &SceneId, view_layer: &ViewLayerId) -> bool;
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MissingReference {
    #[error("scene {0:?} no longer exists")]
    Scene(SceneId),
    #[error("view layer {view_layer:?} no longer exists in scene {scene:?}")]
    ViewLayer {
        scene: SceneId,
        view_layer: ViewLayerId,
    },
}

/// Take the masked categories from `live`. Unmasked categories are carried over from `previous` when
/// updating, or left absent when creating.
#[must_use]
pub fn capture(
    live: &Snapshot,
    mask: RememberMask,
    previous: Option<&PartialSnapshot>,
) -> PartialSnapshot {
    let carried = previous.cloned().unwrap_or_default();
    PartialSnapshot {
        perspective: if mask.has(Category::Perspective) {
            Some(live.perspective)
        } else {
            carried.perspective
        },
        shading: if mask.has(Category::Shading) {
            Some(live.shading.clone())
        } else {
            carried.shading
        },
        overlays: if mask.has(Category::Overlays) {
            Some(live.overlays.clone())
        } else {
            carried.overlays
        },
        composition: if mask.has(Category::Composition) {
            Some(live.composition.clone())
        } else {
            carried.composition
        },
    }
}

/// Per-category result of [`diff`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Diff {
    /// Which categories were compared.
    mask: RememberMask,
    /// Which of those differ. Always a subset of `mask`.
    differs: RememberMask,
}
impl Diff {
    /// Whether the category differs, or `None` if it was not compared.
    #[must_use]
    pub fn get(&self, category: Category) -> Option<bool> {
        self.mask
            .has(category)
            .then(|| self.differs.has(category))
    }
    /// Does anything at all differ? This is the ghost indicator.
    #[must_use]
    pub fn any(&self) -> bool {
        !self.differs.is_empty()
    }
    #[must_use]
    pub fn differing(&self) -> RememberMask {
        self.differs
    }
    /// Every compared category, with whether it differs.
    pub fn iter(&self) -> impl Iterator<Item = (Category, bool)> + '_ {
        self.mask
            .categories()
            .map(|category| (category, self.differs.has(category)))
    }
}

/// Compare the masked categories of `saved` against `live`. Categories never captured into `saved` have
/// nothing to compare against and never differ.
///
/// No [`SceneRegistry`] is needed here. The live composition always refers to something that exists, so a
/// saved composition whose scene or layer is gone can never equal it and always reports as differing.
#[must_use]
pub fn diff(
    live: &Snapshot,
    saved: &PartialSnapshot,
    mask: RememberMask,
    tolerance: &Tolerance,
) -> Diff {
    let mut differs = RememberMask::empty();
    for category in mask.categories() {
        let differ = match category {
            Category::Perspective => saved
                .perspective
                .as_ref()
                .is_some_and(|p| !p.approx_eq(&live.perspective, tolerance)),
            Category::Shading => saved.shading.as_ref().is_some_and(|s| *s != live.shading),
            Category::Overlays => saved
                .overlays
                .as_ref()
                .is_some_and(|o| *o != live.overlays),
            Category::Composition => saved
                .composition
                .as_ref()
                .is_some_and(|c| *c != live.composition),
        };
        differs.set(RememberMask::of(category), differ);
    }
    Diff { mask, differs }
}

/// Write the masked categories of `saved` onto the viewport, returning which were written.
///
/// All or nothing: if the saved composition refers to a scene or layer that no longer exists, nothing at
/// all is written. Narrow the mask to retry without it.
pub fn apply(
    saved: &PartialSnapshot,
    mask: RememberMask,
    viewport: &mut impl Viewport,
    registry: &impl SceneRegistry,
) -> Result<RememberMask, MissingReference> {
    let composition = saved
        .composition
        .as_ref()
        .filter(|_| mask.has(Category::Composition));
    if let Some(composition) = composition {
        composition.check(registry)?;
    }

    let mut written = RememberMask::empty();
    if let Some(perspective) = saved
        .perspective
        .as_ref()
        .filter(|_| mask.has(Category::Perspective))
    {
        viewport.write_perspective(perspective);
        written |= RememberMask::PERSPECTIVE;
    }
    if let Some(shading) = saved.shading.as_ref().filter(|_| mask.has(Category::Shading)) {
        viewport.write_shading(shading);
        written |= RememberMask::SHADING;
    }
    if let Some(overlays) = saved
        .overlays
        .as_ref()
        .filter(|_| mask.has(Category::Overlays))
    {
        viewport.write_overlays(overlays);
        written |= RememberMask::OVERLAYS;
    }
    if let Some(composition) = composition {
        viewport.write_composition(composition);
        written |= RememberMask::COMPOSITION;
    }
    log::trace!("applied {written:?} of {mask:?}");
    Ok(written)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::snapshot::{Projection, ShadingMode};
    use crate::test_support::{sample_snapshot, FakeRegistry, FakeViewport};

    #[test]
    fn capture_create_leaves_unmasked_absent() {
        let live = sample_snapshot();
        let partial = capture(&live, RememberMask::PERSPECTIVE, None);
        assert_eq!(partial.perspective, Some(live.perspective));
        assert_eq!(partial.present(), RememberMask::PERSPECTIVE);
    }
    #[test]
    fn capture_update_keeps_previous() {
        let first = sample_snapshot();
        let previous = capture(&first, RememberMask::all(), None);

        let mut second = first.clone();
        second.perspective.position = [5.0, 5.0, 5.0];
        second.shading.mode = ShadingMode::Wireframe;

        let updated = capture(&second, RememberMask::SHADING, Some(&previous));
        // Perspective is excluded, so the old value survives despite the live change.
        assert_eq!(updated.perspective, Some(first.perspective));
        assert_eq!(updated.shading, Some(second.shading));
        assert_eq!(updated.composition, previous.composition);
    }
    #[test]
    fn unchanged_live_state_does_not_differ() {
        let live = sample_snapshot();
        let mask = RememberMask::all();
        let saved = capture(&live, mask, None);
        let d = diff(&live, &saved, mask, &Tolerance::default());
        assert!(!d.any());
        assert!(d.iter().all(|(_, differs)| !differs));
        assert_eq!(d.iter().count(), 4);
    }
    #[test]
    fn diff_reports_only_masked() {
        let live = sample_snapshot();
        let saved = capture(&live, RememberMask::all(), None);
        let mut moved = live.clone();
        moved.perspective.projection = Projection::Orthographic;
        moved.overlays.set("grid", false);

        let d = diff(
            &moved,
            &saved,
            RememberMask::PERSPECTIVE | RememberMask::SHADING,
            &Tolerance::default(),
        );
        assert_eq!(d.get(Category::Perspective), Some(true));
        assert_eq!(d.get(Category::Shading), Some(false));
        assert_eq!(d.get(Category::Overlays), None);
        assert!(d.any());
    }
    #[test]
    fn diff_absent_is_not_different() {
        let live = sample_snapshot();
        let saved = capture(&live, RememberMask::PERSPECTIVE, None);
        let mut changed = live.clone();
        changed.shading.mode = ShadingMode::Rendered;
        let d = diff(&changed, &saved, RememberMask::all(), &Tolerance::default());
        assert_eq!(d.get(Category::Shading), Some(false));
        assert!(!d.any());
    }
    #[test]
    fn diff_absorbs_jitter() {
        let live = sample_snapshot();
        let saved = capture(&live, RememberMask::PERSPECTIVE, None);
        let mut jittered = live.clone();
        jittered.perspective.position[2] += 1e-4;
        let d = diff(&jittered, &saved, RememberMask::PERSPECTIVE, &Tolerance::default());
        assert_eq!(d.get(Category::Perspective), Some(false));
    }
    #[test]
    fn dangling_composition_differs() {
        let original = sample_snapshot();
        let saved = capture(&original, RememberMask::all(), None);

        // The saved scene was deleted, and the viewport fell back to another.
        let mut live = original.clone();
        live.composition = CompositionRef::new("Fallback", "ViewLayer");
        let registry = FakeRegistry::with(&live.composition);
        assert!(saved.composition.as_ref().unwrap().check(&registry).is_err());

        let d = diff(&live, &saved, RememberMask::all(), &Tolerance::default());
        assert_eq!(d.get(Category::Composition), Some(true));
        assert_eq!(d.differing(), RememberMask::COMPOSITION);
    }
    #[test]
    fn apply_writes_only_masked() {
        let original = sample_snapshot();
        let saved = capture(&original, RememberMask::all(), None);

        let mut other = original.clone();
        other.perspective.position = [9.0, 9.0, 9.0];
        other.shading.mode = ShadingMode::Wireframe;
        let mut viewport = FakeViewport::new(other.clone());
        let registry = FakeRegistry::with(&original.composition);

        let written = apply(&saved, RememberMask::SHADING, &mut viewport, &registry).unwrap();
        assert_eq!(written, RememberMask::SHADING);
        assert_eq!(viewport.live.shading, original.shading);
        assert_eq!(viewport.live.perspective, other.perspective);
    }
    #[test]
    fn apply_skips_never_captured() {
        let live = sample_snapshot();
        let saved = capture(&live, RememberMask::OVERLAYS, None);
        let mut viewport = FakeViewport::new(live.clone());
        let registry = FakeRegistry::default();
        // Composition is masked but absent, so the registry is never consulted.
        let written = apply(&saved, RememberMask::all(), &mut viewport, &registry).unwrap();
        assert_eq!(written, RememberMask::OVERLAYS);
        assert_eq!(viewport.writes, 1);
    }
    #[test]
    fn apply_missing_scene_writes_nothing() {
        let original = sample_snapshot();
        let saved = capture(&original, RememberMask::all(), None);
        let mut moved = original.clone();
        moved.perspective.position = [3.0, 2.0, 1.0];
        let mut viewport = FakeViewport::new(moved.clone());
        // Scene was deleted.
        let registry = FakeRegistry::default();

        let err = apply(&saved, RememberMask::all(), &mut viewport, &registry).unwrap_err();
        assert_eq!(
            err,
            MissingReference::Scene(original.composition.scene.clone())
        );
        assert_eq!(viewport.writes, 0);
        assert_eq!(viewport.live, moved);

        // Narrowing the mask lets the rest through.
        let written = apply(
            &saved,
            RememberMask::all() - RememberMask::COMPOSITION,
            &mut viewport,
            &registry,
        )
        .unwrap();
        assert_eq!(written, RememberMask::all() - RememberMask::COMPOSITION);
        assert_eq!(viewport.live.perspective, original.perspective);
    }
    #[test]
    fn apply_missing_view_layer() {
        let original = sample_snapshot();
        let saved = capture(&original, RememberMask::COMPOSITION, None);
        let mut viewport = FakeViewport::new(original.clone());
        let registry = FakeRegistry::default().scene(&original.composition.scene.0);
        let err = apply(&saved, RememberMask::COMPOSITION, &mut viewport, &registry).unwrap_err();
        assert!(matches!(err, MissingReference::ViewLayer { .. }));
    }
}
