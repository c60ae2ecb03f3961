//! # Snapshots
//!
//! A [`Snapshot`] is a value capturing every attribute category of a viewpoint at one instant. A saved view
//! keeps a [`PartialSnapshot`], holding only the categories its [`RememberMask`] selected at capture time.
//!
//! Shading settings and overlay toggles are host-specific and deliberately opaque here: they're stored and
//! compared as values, never interpreted.

use crate::lens::{self, LensError, LensUnit};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub enum Projection {
    #[default]
    Perspective,
    Orthographic,
}

/// Where the viewpoint sits, where it looks, and through what lens.
#[derive(Copy, Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PerspectiveData {
    /// Pivot point of the view, in world units.
    pub position: [f32; 3],
    /// View rotation as a quaternion, `[w, x, y, z]`.
    pub orientation: [f32; 4],
    /// Distance from the pivot to the eye. Always positive.
    pub distance: f32,
    pub projection: Projection,
    /// Which of `focal_length` and `field_of_view` is authoritative; the other is derived from it.
    pub lens_unit: LensUnit,
    /// Millimeters.
    pub focal_length: f32,
    /// Radians, horizontal.
    pub field_of_view: f32,
    pub clip_start: f32,
    pub clip_end: f32,
}
impl Default for PerspectiveData {
    fn default() -> Self {
        const FOCAL_LENGTH: f32 = 50.0;
        Self {
            position: [0.0; 3],
            orientation: [1.0, 0.0, 0.0, 0.0],
            distance: 10.0,
            projection: Projection::Perspective,
            lens_unit: LensUnit::default(),
            focal_length: FOCAL_LENGTH,
            field_of_view: 2.0 * (lens::SENSOR_WIDTH_MM / (2.0 * FOCAL_LENGTH)).atan(),
            clip_start: 0.1,
            clip_end: 1000.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum PerspectiveError {
    #[error("perspective contains a non-finite value")]
    NotFinite,
    #[error("clip start {start} must be less than clip end {end}")]
    ClipRange { start: f32, end: f32 },
    #[error("view distance {0} must be positive")]
    Distance(f32),
    #[error("orientation quaternion has zero length")]
    Orientation,
    #[error(transparent)]
    Lens(#[from] LensError),
}

impl PerspectiveData {
    /// Make focal length the authoritative lens value, deriving the field of view from it.
    pub fn with_focal_length(mut self, focal_length: f32) -> Result<Self, LensError> {
        self.field_of_view = lens::focal_length_to_fov(focal_length)?;
        self.focal_length = focal_length;
        self.lens_unit = LensUnit::FocalLength;
        Ok(self)
    }
    /// Make field of view the authoritative lens value, deriving the focal length from it.
    pub fn with_field_of_view(mut self, field_of_view: f32) -> Result<Self, LensError> {
        self.focal_length = lens::fov_to_focal_length(field_of_view)?;
        self.field_of_view = field_of_view;
        self.lens_unit = LensUnit::FieldOfView;
        Ok(self)
    }
    /// Check the invariants every stored perspective upholds.
    pub fn validate(&self) -> Result<(), PerspectiveError> {
        let all_finite = self
            .position
            .iter()
            .chain(self.orientation.iter())
            .chain([
                &self.distance,
                &self.focal_length,
                &self.field_of_view,
                &self.clip_start,
                &self.clip_end,
            ])
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(PerspectiveError::NotFinite);
        }
        if self.clip_start >= self.clip_end {
            return Err(PerspectiveError::ClipRange {
                start: self.clip_start,
                end: self.clip_end,
            });
        }
        if self.distance <= 0.0 {
            return Err(PerspectiveError::Distance(self.distance));
        }
        if quat_norm(self.orientation) <= f32::EPSILON {
            return Err(PerspectiveError::Orientation);
        }
        // Both lens values must be usable, whichever one is authoritative.
        lens::focal_length_to_fov(self.focal_length)?;
        lens::fov_to_focal_length(self.field_of_view)?;
        Ok(())
    }
    /// Compare with another perspective, absorbing floating point jitter.
    #[must_use]
    pub fn approx_eq(&self, other: &Self, tolerance: &Tolerance) -> bool {
        let position_sq: f32 = self
            .position
            .iter()
            .zip(other.position.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        if position_sq > tolerance.position_sq {
            return false;
        }
        // q and -q are the same rotation, hence abs.
        let norms = quat_norm(self.orientation) * quat_norm(other.orientation);
        if norms <= f32::EPSILON {
            if self.orientation != other.orientation {
                return false;
            }
        } else {
            let dot: f32 = self
                .orientation
                .iter()
                .zip(other.orientation.iter())
                .map(|(a, b)| a * b)
                .sum();
            if (dot / norms).abs() < tolerance.orientation_dot {
                return false;
            }
        }
        self.projection == other.projection
            && (self.distance - other.distance).abs() <= tolerance.distance
            && (self.focal_length - other.focal_length).abs() <= tolerance.lens_mm
            && (self.clip_start - other.clip_start).abs() <= tolerance.clip
            && (self.clip_end - other.clip_end).abs() <= tolerance.clip
    }
}

fn quat_norm(q: [f32; 4]) -> f32 {
    q.iter().map(|c| c * c).sum::<f32>().sqrt()
}

/// How far apart two perspectives may be and still count as the same view.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Tolerance {
    /// Maximum squared distance between positions.
    pub position_sq: f32,
    /// Minimum absolute cosine-similarity between orientations.
    pub orientation_dot: f32,
    pub distance: f32,
    /// Focal length, millimeters. Sub-tenth differences are invisible.
    pub lens_mm: f32,
    pub clip: f32,
}
impl Default for Tolerance {
    fn default() -> Self {
        Self {
            position_sq: 1e-4,
            orientation_dot: 0.9999,
            distance: 1e-4,
            lens_mm: 0.1,
            clip: 1e-4,
        }
    }
}

#[derive(
    strum::AsRefStr,
    strum::EnumIter,
    PartialEq,
    Eq,
    Copy,
    Clone,
    Hash,
    Debug,
    Default,
    serde::Serialize,
    serde::Deserialize,
)]
pub enum ShadingMode {
    #[default]
    Solid,
    Material,
    Rendered,
    Wireframe,
}

/// Host specific settings, stored byte-for-byte.
/// Serialized as standard base64.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct SettingsBlob(Box<[u8]>);
impl SettingsBlob {
    #[must_use]
    pub fn new(bytes: impl Into<Box<[u8]>>) -> Self {
        Self(bytes.into())
    }
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}
impl std::fmt::Debug for SettingsBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettingsBlob({} bytes)", self.0.len())
    }
}
impl serde::Serialize for SettingsBlob {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use base64::Engine;
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(&self.0))
    }
}
impl<'de> serde::Deserialize<'de> for SettingsBlob {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use base64::Engine;
        let encoded = <String as serde::Deserialize>::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map(Self::new)
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ShadingData {
    pub mode: ShadingMode,
    pub settings: SettingsBlob,
}

/// Overlay toggles, by host-defined name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct OverlayData(std::collections::BTreeMap<String, bool>);
impl OverlayData {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<bool> {
        self.0.get(name).copied()
    }
    pub fn set(&mut self, name: impl Into<String>, enabled: bool) {
        self.0.insert(name.into(), enabled);
    }
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> + '_ {
        self.0.iter().map(|(name, &enabled)| (name.as_str(), enabled))
    }
}
impl<S: Into<String>> FromIterator<(S, bool)> for OverlayData {
    fn from_iter<T: IntoIterator<Item = (S, bool)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Opaque, stable identity of a scene in the host.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct SceneId(pub String);
/// Opaque, stable identity of a view layer within a scene.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ViewLayerId(pub String);
impl std::fmt::Display for SceneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
impl std::fmt::Display for ViewLayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which scene and view layer were active.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CompositionRef {
    pub scene: SceneId,
    pub view_layer: ViewLayerId,
}
impl CompositionRef {
    #[must_use]
    pub fn new(scene: impl Into<String>, view_layer: impl Into<String>) -> Self {
        Self {
            scene: SceneId(scene.into()),
            view_layer: ViewLayerId(view_layer.into()),
        }
    }
    /// Find out whether the referenced scene and view layer still exist. Dangling references are only
    /// reported, never repaired.
    pub fn check(
        &self,
        registry: &impl crate::engine::SceneRegistry,
    ) -> Result<(), crate::engine::MissingReference> {
        use crate::engine::MissingReference;
        if !registry.scene_exists(&self.scene) {
            return Err(MissingReference::Scene(self.scene.clone()));
        }
        if !registry.view_layer_exists(&self.scene, &self.view_layer) {
            return Err(MissingReference::ViewLayer {
                scene: self.scene.clone(),
                view_layer: self.view_layer.clone(),
            });
        }
        Ok(())
    }
}

/// One of the four attribute families of a viewpoint.
#[derive(
    strum::AsRefStr,
    strum::EnumIter,
    PartialEq,
    Eq,
    Copy,
    Clone,
    Hash,
    Debug,
    serde::Serialize,
    serde::Deserialize,
)]
pub enum Category {
    Perspective,
    Shading,
    Overlays,
    Composition,
}

bitflags::bitflags! {
    /// Which categories a saved view captures, compares and restores.
    ///
    /// May be empty. Such a view remembers nothing, which is allowed if useless.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, serde::Serialize, serde::Deserialize)]
    #[serde(transparent)]
    #[rustfmt::skip]
    pub struct RememberMask : u8 {
        const PERSPECTIVE = 0b0000_0001;
        const SHADING =     0b0000_0010;
        const OVERLAYS =    0b0000_0100;
        const COMPOSITION = 0b0000_1000;
    }
}
impl RememberMask {
    #[must_use]
    pub const fn of(category: Category) -> Self {
        match category {
            Category::Perspective => Self::PERSPECTIVE,
            Category::Shading => Self::SHADING,
            Category::Overlays => Self::OVERLAYS,
            Category::Composition => Self::COMPOSITION,
        }
    }
    #[must_use]
    pub const fn has(self, category: Category) -> bool {
        self.contains(Self::of(category))
    }
    /// The selected categories, in declaration order.
    pub fn categories(self) -> impl Iterator<Item = Category> {
        <Category as strum::IntoEnumIterator>::iter().filter(move |&c| self.has(c))
    }
}
impl Default for RememberMask {
    fn default() -> Self {
        Self::all()
    }
}
impl From<Category> for RememberMask {
    fn from(value: Category) -> Self {
        Self::of(value)
    }
}
impl FromIterator<Category> for RememberMask {
    fn from_iter<T: IntoIterator<Item = Category>>(iter: T) -> Self {
        iter.into_iter()
            .fold(Self::empty(), |mask, category| mask | Self::of(category))
    }
}

/// Every category of a viewpoint, as read from a live viewport.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Snapshot {
    pub perspective: PerspectiveData,
    pub shading: ShadingData,
    pub overlays: OverlayData,
    pub composition: CompositionRef,
}

/// Some categories of a viewpoint. Absent categories were never captured.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PartialSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perspective: Option<PerspectiveData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shading: Option<ShadingData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlays: Option<OverlayData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composition: Option<CompositionRef>,
}
impl PartialSnapshot {
    /// Which categories hold a value.
    #[must_use]
    pub fn present(&self) -> RememberMask {
        let mut mask = RememberMask::empty();
        mask.set(RememberMask::PERSPECTIVE, self.perspective.is_some());
        mask.set(RememberMask::SHADING, self.shading.is_some());
        mask.set(RememberMask::OVERLAYS, self.overlays.is_some());
        mask.set(RememberMask::COMPOSITION, self.composition.is_some());
        mask
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.present().is_empty()
    }
}
impl From<Snapshot> for PartialSnapshot {
    fn from(value: Snapshot) -> Self {
        Self {
            perspective: Some(value.perspective),
            shading: Some(value.shading),
            overlays: Some(value.overlays),
            composition: Some(value.composition),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_perspective_is_valid() {
        PerspectiveData::default().validate().unwrap();
    }
    #[test]
    fn validate_rejects_inverted_clip() {
        let p = PerspectiveData {
            clip_start: 10.0,
            clip_end: 1.0,
            ..Default::default()
        };
        assert!(matches!(
            p.validate(),
            Err(PerspectiveError::ClipRange { .. })
        ));
    }
    #[test]
    fn validate_rejects_non_positive_distance() {
        let p = PerspectiveData {
            distance: 0.0,
            ..Default::default()
        };
        assert_eq!(p.validate(), Err(PerspectiveError::Distance(0.0)));
    }
    #[test]
    fn validate_rejects_nan() {
        let p = PerspectiveData {
            position: [0.0, f32::NAN, 0.0],
            ..Default::default()
        };
        assert_eq!(p.validate(), Err(PerspectiveError::NotFinite));
    }
    #[test]
    fn lens_unit_derivation() {
        let p = PerspectiveData::default().with_focal_length(35.0).unwrap();
        assert_eq!(p.lens_unit, LensUnit::FocalLength);
        assert!((p.field_of_view - crate::lens::focal_length_to_fov(35.0).unwrap()).abs() < 1e-6);
        let q = p.with_field_of_view(1.0).unwrap();
        assert_eq!(q.lens_unit, LensUnit::FieldOfView);
        assert!((q.focal_length - crate::lens::fov_to_focal_length(1.0).unwrap()).abs() < 1e-4);
    }
    #[test]
    fn jitter_is_absorbed() {
        let a = PerspectiveData::default();
        let mut b = a;
        b.position[0] += 0.001;
        b.distance += 0.000_01;
        b.focal_length += 0.05;
        assert!(a.approx_eq(&b, &Tolerance::default()));
    }
    #[test]
    fn negated_quaternion_is_same_rotation() {
        let a = PerspectiveData::default();
        let b = PerspectiveData {
            orientation: [-1.0, 0.0, 0.0, 0.0],
            ..a
        };
        assert!(a.approx_eq(&b, &Tolerance::default()));
    }
    #[test]
    fn real_changes_are_detected() {
        let a = PerspectiveData::default();
        let tol = Tolerance::default();
        let moved = PerspectiveData {
            position: [1.0, 0.0, 0.0],
            ..a
        };
        let turned = PerspectiveData {
            // ~90 degrees about Z
            orientation: [0.707_106_8, 0.0, 0.0, 0.707_106_8],
            ..a
        };
        let ortho = PerspectiveData {
            projection: Projection::Orthographic,
            ..a
        };
        let zoomed = PerspectiveData {
            focal_length: 85.0,
            ..a
        };
        for other in [moved, turned, ortho, zoomed] {
            assert!(!a.approx_eq(&other, &tol), "{other:?}");
        }
    }
    #[test]
    fn mask_categories() {
        let mask = RememberMask::PERSPECTIVE | RememberMask::OVERLAYS;
        let cats: Vec<_> = mask.categories().collect();
        assert_eq!(cats, [Category::Perspective, Category::Overlays]);
        assert_eq!(cats.into_iter().collect::<RememberMask>(), mask);
        assert!(RememberMask::empty().categories().next().is_none());
        assert_eq!(RememberMask::default(), RememberMask::all());
    }
    #[test]
    fn partial_present() {
        let full: PartialSnapshot = Snapshot::default().into();
        assert_eq!(full.present(), RememberMask::all());
        assert!(PartialSnapshot::default().is_empty());
    }
    #[test]
    fn blob_serializes_as_base64() {
        let shading = ShadingData {
            mode: ShadingMode::Material,
            settings: SettingsBlob::new(vec![0u8, 1, 2, 3]),
        };
        let json = serde_json::to_string(&shading).unwrap();
        assert_eq!(json, r#"{"mode":"Material","settings":"AAECAw=="}"#);
        let back: ShadingData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, shading);
    }
    #[test]
    fn mask_serializes_by_name() {
        let mask = RememberMask::PERSPECTIVE | RememberMask::SHADING;
        let json = serde_json::to_string(&mask).unwrap();
        assert_eq!(json, r#""PERSPECTIVE | SHADING""#);
        let back: RememberMask = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mask);
    }
}
