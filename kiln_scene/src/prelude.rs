pub use super::camera::*;
pub use super::error::SceneError;
pub use super::geometry::*;
pub use super::managed::*;
pub use super::material::*;
pub use super::node::*;
pub use super::resource::*;
pub use super::texture::*;
pub use super::traits::*;
pub use super::transform::Transform;
