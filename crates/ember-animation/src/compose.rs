//! Interchangeable matrix composition strategies for the blend pass

use ember_shape::{Element, ElementPose};
use glam::{DMat4, DVec3, Mat4};

/// Builds an element's animated model matrix from its blended pose and the
/// parent's carried-down model matrix. Selected per entity; the blend
/// recursion itself is strategy-agnostic.
pub trait ComposeStrategy {
    fn compose(&self, element: &Element, pose: &ElementPose, parent: &Mat4) -> Mat4;
}

/// Single-precision composition via the element's own transform build.
#[derive(Debug, Default, Clone, Copy)]
pub struct FastCompose;

impl ComposeStrategy for FastCompose {
    fn compose(&self, element: &Element, pose: &ElementPose, parent: &Mat4) -> Mat4 {
        *parent * element.local_transform(pose)
    }
}

/// Double-precision composition: the local build and the parent multiply
/// run in f64, converted to f32 once at the end. For deep hierarchies where
/// leaf joints must stay rounding-stable.
#[derive(Debug, Default, Clone, Copy)]
pub struct PreciseCompose;

impl ComposeStrategy for PreciseCompose {
    fn compose(&self, element: &Element, pose: &ElementPose, parent: &Mat4) -> Mat4 {
        let origin = DVec3::new(
            element.rotation_origin[0] as f64,
            element.rotation_origin[1] as f64,
            element.rotation_origin[2] as f64,
        );
        let offset = DVec3::new(
            (element.offset[0] + pose.translation[0]) as f64,
            (element.offset[1] + pose.translation[1]) as f64,
            (element.offset[2] + pose.translation[2]) as f64,
        );
        let scale = DVec3::new(
            element.scale[0] as f64 * (1.0 + pose.scale_delta[0] as f64),
            element.scale[1] as f64 * (1.0 + pose.scale_delta[1] as f64),
            element.scale[2] as f64 * (1.0 + pose.scale_delta[2] as f64),
        );

        let local = DMat4::from_translation(offset + origin)
            * DMat4::from_rotation_x(((element.rotation[0] + pose.rotation[0]) as f64).to_radians())
            * DMat4::from_rotation_y(((element.rotation[1] + pose.rotation[1]) as f64).to_radians())
            * DMat4::from_rotation_z(((element.rotation[2] + pose.rotation[2]) as f64).to_radians())
            * DMat4::from_scale(scale)
            * DMat4::from_translation(-origin);

        (parent.as_dmat4() * local).as_mat4()
    }
}
