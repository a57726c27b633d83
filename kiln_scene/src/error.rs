use thiserror::Error;

#[derive(Debug, Error, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SceneError {
    #[error("Managed resource was already disposed")]
    AlreadyDisposed,
}
