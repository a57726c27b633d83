pub mod camera;
pub mod error;
pub mod geometry;
pub mod managed;
pub mod material;
pub mod node;
pub mod prelude;
pub mod resource;
pub mod texture;
pub mod traits;
pub mod transform;

pub use camera::{Camera, Scene};
pub use error::SceneError;
pub use geometry::{Geometry, GeometryData};
pub use managed::{DisposalPolicy, DisposalReport, ManagedResource};
pub use material::{Material, TextureSlot};
pub use node::{Mesh, Object3D, ObjectKind, SceneNode};
pub use resource::{ReleaseEvent, ResourceHandle, ResourceHub, ResourceId, ResourceKind};
pub use texture::{Filter, ImageBitmap, Sampler, Texture, Wrapping};
pub use traits::Disposable;
pub use transform::Transform;
