//! Transform helpers shared by the frame pipeline and pose queries.

use glam::{Mat4, Quat, Vec3};

/// Half of the emulated inter-pupillary distance, in meters. Each eye view is
/// offset this far along the head's local X axis.
pub const EYE_OFFSET_X: f32 = 0.02;

/// Rigid pose matrix from a position and orientation.
pub fn pose_matrix(position: Vec3, orientation: Quat) -> Mat4 {
    Mat4::from_rotation_translation(orientation, position)
}

/// Full model matrix including scale.
pub fn model_matrix(position: Vec3, orientation: Quat, scale: Vec3) -> Mat4 {
    Mat4::from_scale_rotation_translation(scale, orientation, position)
}

/// View matrix for an eye offset along the model's local X axis.
/// An offset of zero yields the mono view (exact inverse of the model).
pub fn eye_view_matrix(model: Mat4, offset_x: f32) -> Mat4 {
    (model * Mat4::from_translation(Vec3::new(offset_x, 0.0, 0.0))).inverse()
}

/// Rotate a direction vector by the rotational component of a transform,
/// discarding its translation. Used to carry ray directions between spaces.
pub fn rotate_direction(direction: Vec3, transform: &Mat4) -> Vec3 {
    Quat::from_mat4(transform) * direction
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pose() -> (Vec3, Quat) {
        (
            Vec3::new(0.3, 1.6, -0.5),
            Quat::from_rotation_y(0.7) * Quat::from_rotation_x(-0.2),
        )
    }

    fn assert_mat4_eq(a: Mat4, b: Mat4) {
        for (x, y) in a.to_cols_array().iter().zip(b.to_cols_array().iter()) {
            assert!((x - y).abs() < 1e-5, "{a:?} != {b:?}");
        }
    }

    #[test]
    fn mono_view_is_exact_inverse_of_model() {
        let (position, orientation) = sample_pose();
        let model = model_matrix(position, orientation, Vec3::ONE);
        let view = eye_view_matrix(model, 0.0);
        assert_mat4_eq(view.inverse(), model);
        assert_mat4_eq(view * model, Mat4::IDENTITY);
    }

    #[test]
    fn eye_views_straddle_the_mono_view() {
        let (position, orientation) = sample_pose();
        let model = model_matrix(position, orientation, Vec3::ONE);
        let left = eye_view_matrix(model, -EYE_OFFSET_X);
        let right = eye_view_matrix(model, EYE_OFFSET_X);
        // Inverting the views recovers eye positions 2 * EYE_OFFSET_X apart.
        let left_eye = left.inverse().transform_point3(Vec3::ZERO);
        let right_eye = right.inverse().transform_point3(Vec3::ZERO);
        assert!((left_eye.distance(right_eye) - 2.0 * EYE_OFFSET_X).abs() < 1e-5);
    }

    #[test]
    fn rotate_direction_ignores_translation() {
        let transform = Mat4::from_rotation_translation(
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
            Vec3::new(10.0, 20.0, 30.0),
        );
        let rotated = rotate_direction(Vec3::new(0.0, 0.0, -1.0), &transform);
        assert!((rotated - Vec3::new(-1.0, 0.0, 0.0)).length() < 1e-5);
    }
}
