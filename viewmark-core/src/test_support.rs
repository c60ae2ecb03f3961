//! Fakes of the host for tests.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::engine::{SceneRegistry, Viewport};
use crate::history::timer::Clock;
use crate::snapshot::{
    CompositionRef, OverlayData, PerspectiveData, SceneId, SettingsBlob, ShadingData, ShadingMode,
    Snapshot, ViewLayerId,
};
use crate::thumbnail::{Bitmap, RenderError, Renderer};

pub fn sample_snapshot() -> Snapshot {
    Snapshot {
        perspective: PerspectiveData {
            position: [1.0, 2.0, 3.0],
            ..Default::default()
        },
        shading: ShadingData {
            mode: ShadingMode::Solid,
            settings: SettingsBlob::new(vec![1, 2, 3, 4]),
        },
        overlays: [("grid", true), ("axes", true), ("stats", false)]
            .into_iter()
            .collect::<OverlayData>(),
        composition: CompositionRef::new("Scene", "ViewLayer"),
    }
}

/// The sample, moved along X.
pub fn snapshot_at(x: f32) -> Snapshot {
    let mut snapshot = sample_snapshot();
    snapshot.perspective.position = [x, 0.0, 0.0];
    snapshot
}

pub struct FakeViewport {
    pub live: Snapshot,
    /// Number of category writes received.
    pub writes: usize,
}
impl FakeViewport {
    pub fn new(live: Snapshot) -> Self {
        Self { live, writes: 0 }
    }
}
impl Viewport for FakeViewport {
    fn snapshot(&self) -> Snapshot {
        self.live.clone()
    }
    fn write_perspective(&mut self, perspective: &PerspectiveData) {
        self.live.perspective = *perspective;
        self.writes += 1;
    }
    fn write_shading(&mut self, shading: &ShadingData) {
        self.live.shading = shading.clone();
        self.writes += 1;
    }
    fn write_overlays(&mut self, overlays: &OverlayData) {
        self.live.overlays = overlays.clone();
        self.writes += 1;
    }
    fn write_composition(&mut self, composition: &CompositionRef) {
        self.live.composition = composition.clone();
        self.writes += 1;
    }
}

/// Scenes, each with their view layers. Empty by default.
#[derive(Default, Clone)]
pub struct FakeRegistry {
    scenes: hashbrown::HashMap<String, hashbrown::HashSet<String>>,
}
impl FakeRegistry {
    /// A registry containing just the referenced scene and layer.
    pub fn with(composition: &CompositionRef) -> Self {
        Self::default().layer(&composition.scene.0, &composition.view_layer.0)
    }
    pub fn scene(mut self, scene: &str) -> Self {
        self.scenes.entry(scene.to_owned()).or_default();
        self
    }
    pub fn layer(mut self, scene: &str, layer: &str) -> Self {
        self.scenes
            .entry(scene.to_owned())
            .or_default()
            .insert(layer.to_owned());
        self
    }
    pub fn remove_scene(&mut self, scene: &str) {
        self.scenes.remove(scene);
    }
}
impl SceneRegistry for FakeRegistry {
    fn scene_exists(&self, scene: &SceneId) -> bool {
        self.scenes.contains_key(&scene.0)
    }
    fn view_layer_exists(&self, scene: &SceneId, view_layer: &ViewLayerId) -> bool {
        self.scenes
            .get(&scene.0)
            .is_some_and(|layers| layers.contains(&view_layer.0))
    }
}

/// Renders a solid square, after failing a set number of times.
#[derive(Default)]
pub struct ScriptedRenderer {
    pub calls: usize,
    fail_next: usize,
    oversized: bool,
}
impl ScriptedRenderer {
    pub fn failing(times: usize) -> Self {
        Self {
            fail_next: times,
            ..Default::default()
        }
    }
    /// Ignore the size limit.
    pub fn oversized(self) -> Self {
        Self {
            oversized: true,
            ..self
        }
    }
    pub fn fail_next(&mut self, times: usize) {
        self.fail_next = times;
    }
}
impl Renderer for ScriptedRenderer {
    fn render(
        &mut self,
        _perspective: &PerspectiveData,
        max_size: u32,
    ) -> Result<Bitmap, RenderError> {
        self.calls += 1;
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(RenderError::Failed("scripted failure".to_owned()));
        }
        let size = if self.oversized {
            max_size + 1
        } else {
            max_size.min(16)
        };
        Ok(Bitmap::filled(size, size, [self.calls as u8, 0, 0, 255]))
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Clone)]
pub struct ManualClock(Rc<Cell<Instant>>);
impl ManualClock {
    pub fn new() -> Self {
        Self(Rc::new(Cell::new(Instant::now())))
    }
    pub fn advance(&self, by: Duration) {
        self.0.set(self.0.get() + by);
    }
    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }
}
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.0.get()
    }
}
