/// Orbit Camera
///
/// Pure data structures with free functions, the camera orbits a target
/// point at a distance. `CameraUniform` is what the kernels and the
/// ray-march shaders read.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::config::CameraConfig;

/// Camera data as a plain old data structure
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CameraData {
    pub target: Vec3,
    pub distance: f32,
    pub yaw_radians: f32,
    pub pitch_radians: f32,
    pub aspect_ratio: f32,
    pub fovy_radians: f32,
    pub znear: f32,
    pub zfar: f32,
}

/// Camera uniform buffer for GPU
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct CameraUniform {
    pub view_projection: [[f32; 4]; 4],
    pub inverse_view_projection: [[f32; 4]; 4],
    /// xyz eye position, w unused
    pub position: [f32; 4],
    /// Render target width and height, then cursor position in pixels
    pub viewport: [f32; 4],
}

/// Pitch stays short of the poles so the view matrix stays defined
const MAX_PITCH: f32 = std::f32::consts::FRAC_PI_2 - 0.01;
const MIN_DISTANCE: f32 = 0.1;

/// Initialize camera data looking at the origin
pub fn init_camera(config: &CameraConfig, width: u32, height: u32) -> CameraData {
    CameraData {
        target: Vec3::ZERO,
        distance: 3.0,
        yaw_radians: std::f32::consts::FRAC_PI_4,
        pitch_radians: 0.4,
        aspect_ratio: aspect(width, height),
        fovy_radians: config.fov_degrees.to_radians(),
        znear: 0.01,
        zfar: 100.0,
    }
}

fn aspect(width: u32, height: u32) -> f32 {
    width.max(1) as f32 / height.max(1) as f32
}

/// Update camera aspect ratio for a resize
pub fn update_aspect_ratio(camera: &CameraData, width: u32, height: u32) -> CameraData {
    CameraData {
        aspect_ratio: aspect(width, height),
        ..*camera
    }
}

pub fn eye_position(camera: &CameraData) -> Vec3 {
    let (sin_yaw, cos_yaw) = camera.yaw_radians.sin_cos();
    let (sin_pitch, cos_pitch) = camera.pitch_radians.sin_cos();
    camera.target
        + Vec3::new(cos_pitch * cos_yaw, sin_pitch, cos_pitch * sin_yaw) * camera.distance
}

pub fn build_view_matrix(camera: &CameraData) -> Mat4 {
    Mat4::look_at_rh(eye_position(camera), camera.target, Vec3::Y)
}

pub fn build_projection_matrix(camera: &CameraData) -> Mat4 {
    Mat4::perspective_rh(
        camera.fovy_radians,
        camera.aspect_ratio,
        camera.znear,
        camera.zfar,
    )
}

/// Build camera uniform buffer for GPU
pub fn build_camera_uniform(camera: &CameraData, viewport: [u32; 2], cursor: Vec2) -> CameraUniform {
    let view_projection = build_projection_matrix(camera) * build_view_matrix(camera);
    let eye = eye_position(camera);

    CameraUniform {
        view_projection: view_projection.to_cols_array_2d(),
        inverse_view_projection: view_projection.inverse().to_cols_array_2d(),
        position: Vec4::from((eye, 1.0)).to_array(),
        viewport: [viewport[0] as f32, viewport[1] as f32, cursor.x, cursor.y],
    }
}

/// World space ray through a pixel, as (origin, direction)
pub fn screen_ray(camera: &CameraData, viewport: [u32; 2], pixel: Vec2) -> (Vec3, Vec3) {
    let inverse = (build_projection_matrix(camera) * build_view_matrix(camera)).inverse();
    let ndc = Vec2::new(
        pixel.x / viewport[0].max(1) as f32 * 2.0 - 1.0,
        1.0 - pixel.y / viewport[1].max(1) as f32 * 2.0,
    );

    let near = inverse.project_point3(Vec3::new(ndc.x, ndc.y, 0.0));
    let far = inverse.project_point3(Vec3::new(ndc.x, ndc.y, 1.0));
    let origin = eye_position(camera);
    (origin, (far - near).normalize())
}

/// Camera movement transformations (returns new camera data)
pub mod transform {
    use super::*;

    /// Rotate around the target by a mouse delta in pixels
    pub fn orbit(camera: &CameraData, delta: Vec2, sensitivity: f32) -> CameraData {
        CameraData {
            yaw_radians: camera.yaw_radians + delta.x * sensitivity,
            pitch_radians: (camera.pitch_radians + delta.y * sensitivity)
                .clamp(-MAX_PITCH, MAX_PITCH),
            ..*camera
        }
    }

    /// Move towards (positive steps) or away from the target
    pub fn zoom(camera: &CameraData, steps: f32, speed: f32) -> CameraData {
        CameraData {
            distance: (camera.distance * (1.0 - steps * speed)).max(MIN_DISTANCE),
            ..*camera
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> CameraData {
        init_camera(&CameraConfig::default(), 800, 600)
    }

    #[test]
    fn test_uniform_layout() {
        assert_eq!(std::mem::size_of::<CameraUniform>(), 160);
    }

    #[test]
    fn test_centre_ray_hits_target() {
        let camera = camera();
        let (origin, direction) = screen_ray(&camera, [800, 600], Vec2::new(400.0, 300.0));
        let to_target = (camera.target - origin).normalize();
        assert!(direction.dot(to_target) > 0.999);
    }

    #[test]
    fn test_orbit_clamps_pitch_and_keeps_distance() {
        let camera = camera();
        let moved = transform::orbit(&camera, Vec2::new(0.0, 10_000.0), 0.01);
        assert!(moved.pitch_radians <= MAX_PITCH);
        let eye = eye_position(&moved);
        assert!((eye.distance(moved.target) - camera.distance).abs() < 1e-4);
    }

    #[test]
    fn test_zoom_never_reaches_target() {
        let camera = camera();
        let zoomed = transform::zoom(&camera, 100.0, 0.1);
        assert_eq!(zoomed.distance, MIN_DISTANCE);
    }
}
