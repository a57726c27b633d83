use crate::error::CacheError;
use derivative::Derivative;
use futures::future::{BoxFuture, Shared};
use kiln_scene::ManagedResource;

/// Pending load of one key, polled by every request waiting on it. Resolves once the canonical
/// entry has been installed (or the load failed).
pub(crate) type InFlightLoad = Shared<BoxFuture<'static, Result<(), CacheError>>>;

/// Per-key cache state. A key missing from the map is [`AssetState::Empty`].
#[derive(Derivative)]
#[derivative(Debug)]
pub(crate) enum CacheSlot {
    Loading(#[derivative(Debug = "ignore")] InFlightLoad),
    Loaded(ManagedResource),
}

impl CacheSlot {
    pub(crate) fn state(&self) -> AssetState {
        match self {
            CacheSlot::Loading(_) => AssetState::Loading,
            CacheSlot::Loaded(_) => AssetState::Loaded,
        }
    }
}

#[repr(u8)]
#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash)]
pub enum AssetState {
    Empty = 0,
    Loading = 1,
    Loaded = 2,
}
