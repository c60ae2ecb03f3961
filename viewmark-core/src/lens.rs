//! Lens units and conversions between them.
//!
//! A viewport lens can be described either by its focal length or by its field of view. Which one the user
//! edits is a preference; the other is derived on a fixed sensor.

/// Horizontal sensor size the viewport lens is modeled on, in millimeters.
pub const SENSOR_WIDTH_MM: f32 = 36.0;
/// Field of view below this (radians) is treated as degenerate when converting.
const MIN_FIELD_OF_VIEW: f32 = 0.001;

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
pub enum LensUnit {
    /// Field of view, in radians, is the primary value.
    #[default]
    FieldOfView,
    /// Focal length, in millimeters, is the primary value.
    FocalLength,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LensError {
    #[error("focal length must be positive and finite")]
    FocalLength,
    #[error("field of view must be within (0, pi)")]
    FieldOfView,
}

/// Field of view, in radians, of a lens with the given focal length.
pub fn focal_length_to_fov(focal_length_mm: f32) -> Result<f32, LensError> {
    if !focal_length_mm.is_finite() || focal_length_mm <= 0.0 {
        return Err(LensError::FocalLength);
    }
    Ok(2.0 * (SENSOR_WIDTH_MM / (2.0 * focal_length_mm)).atan())
}

/// Focal length, in millimeters, of a lens with the given field of view.
pub fn fov_to_focal_length(fov: f32) -> Result<f32, LensError> {
    if !fov.is_finite() || fov < MIN_FIELD_OF_VIEW || fov >= std::f32::consts::PI {
        return Err(LensError::FieldOfView);
    }
    Ok(SENSOR_WIDTH_MM / (2.0 * (fov / 2.0).tan()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fifty_mm() {
        let fov = focal_length_to_fov(50.0).unwrap();
        // 2 * atan(0.36) ~ 39.6 degrees
        assert!((fov.to_degrees() - 39.597_75).abs() < 1e-3);
        let back = fov_to_focal_length(fov).unwrap();
        assert!((back - 50.0).abs() < 1e-3);
    }
    #[test]
    fn rejects_degenerate() {
        assert_eq!(focal_length_to_fov(0.0), Err(LensError::FocalLength));
        assert_eq!(focal_length_to_fov(f32::NAN), Err(LensError::FocalLength));
        assert_eq!(fov_to_focal_length(0.0), Err(LensError::FieldOfView));
        assert_eq!(
            fov_to_focal_length(std::f32::consts::PI),
            Err(LensError::FieldOfView)
        );
    }
}
