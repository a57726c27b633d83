use crate::transform::Transform;

/// Perspective camera used as the compile target during warm-up
#[derive(Debug, PartialEq, Clone)]
pub struct Camera {
    /// Vertical field of view in radians
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub transform: Transform,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            fov_y: 60f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
            transform: Transform::IDENTITY,
        }
    }
}

impl Camera {
    pub fn projection(&self) -> glam::Mat4 {
        glam::Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn view(&self) -> glam::Mat4 {
        self.transform.matrix().inverse()
    }
}

/// Scene-wide state that shader programs are specialised against
#[derive(Debug, PartialEq, Clone)]
pub struct Scene {
    pub name: String,
    pub background: glam::Vec3,
    pub fog: bool,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            name: String::from("scene"),
            background: glam::Vec3::ZERO,
            fog: false,
        }
    }
}
