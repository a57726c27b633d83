use derivative::Derivative;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of a GPU-side resource. Never reused within a [`ResourceHub`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(u64);

impl ResourceId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Display for ResourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    Geometry = 0,
    Material = 1,
    Texture = 2,
    ImageBitmap = 3,
}

/// Sent through the hub once a resource has been released
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ReleaseEvent {
    pub kind: ResourceKind,
    pub id: ResourceId,
}

#[derive(Debug)]
struct ResourceHubInner {
    next_id: AtomicU64,
    release_send: crossbeam_channel::Sender<ReleaseEvent>,
    release_recv: crossbeam_channel::Receiver<ReleaseEvent>,
}

/// Allocates resource identities and collects their releases.
///
/// Every [`ResourceHandle`] keeps the hub alive, so a release can always be delivered. Rendering
/// backends drain [`ResourceHub::drain_released`] once per frame to free the matching GPU memory.
#[derive(Debug, Clone)]
pub struct ResourceHub {
    inner: Arc<ResourceHubInner>,
}

impl Default for ResourceHub {
    fn default() -> Self {
        let (release_send, release_recv) = crossbeam_channel::unbounded();
        Self {
            inner: Arc::new(ResourceHubInner {
                next_id: AtomicU64::new(0),
                release_send,
                release_recv,
            }),
        }
    }
}

impl ResourceHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new resource identity of `kind`
    pub fn allocate(&self, kind: ResourceKind) -> ResourceHandle {
        ResourceHandle {
            id: ResourceId(self.inner.next_id.fetch_add(1, Ordering::Relaxed)),
            kind,
            hub: self.inner.clone(),
        }
    }

    /// Total number of identities handed out so far
    pub fn allocated(&self) -> u64 {
        self.inner.next_id.load(Ordering::Relaxed)
    }

    /// Take every release received since the last drain, in release order
    pub fn drain_released(&self) -> Vec<ReleaseEvent> {
        let mut released = Vec::new();
        while let Ok(event) = self.inner.release_recv.try_recv() {
            released.push(event);
        }
        released
    }
}

/// The GPU identity owned by a single leaf resource.
///
/// Not [`Clone`]: a handle is released by value, so each identity can be released at most once.
/// Dropping a handle without releasing it leaks the GPU side.
#[derive(Derivative)]
#[derivative(Debug, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    id: ResourceId,
    kind: ResourceKind,
    #[derivative(Debug = "ignore", PartialEq = "ignore", Hash = "ignore")]
    hub: Arc<ResourceHubInner>,
}

impl ResourceHandle {
    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Allocate a fresh identity of the same kind from the same hub
    pub fn duplicate(&self) -> ResourceHandle {
        ResourceHandle {
            id: ResourceId(self.hub.next_id.fetch_add(1, Ordering::Relaxed)),
            kind: self.kind,
            hub: self.hub.clone(),
        }
    }

    /// Release the GPU side of this resource
    pub fn release(self) {
        let event = ReleaseEvent {
            kind: self.kind,
            id: self.id,
        };
        if let Err(e) = self.hub.release_send.send(event) {
            tracing::error!("Failed to send release of {:?} {}: {:?}", self.kind, self.id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_unique_ids() {
        let hub = ResourceHub::new();
        let a = hub.allocate(ResourceKind::Geometry);
        let b = hub.allocate(ResourceKind::Texture);
        let c = a.duplicate();
        assert_ne!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
        assert_eq!(c.kind(), ResourceKind::Geometry);
        assert_eq!(hub.allocated(), 3);
    }

    #[test]
    fn test_release_order() {
        let hub = ResourceHub::new();
        let a = hub.allocate(ResourceKind::ImageBitmap);
        let b = hub.allocate(ResourceKind::Texture);
        let (a_id, b_id) = (a.id(), b.id());
        a.release();
        b.release();

        let released = hub.drain_released();
        assert_eq!(
            released,
            vec![
                ReleaseEvent {
                    kind: ResourceKind::ImageBitmap,
                    id: a_id
                },
                ReleaseEvent {
                    kind: ResourceKind::Texture,
                    id: b_id
                },
            ]
        );
        assert!(hub.drain_released().is_empty());
    }

    #[test]
    fn test_dropped_handle_is_not_released() {
        let hub = ResourceHub::new();
        drop(hub.allocate(ResourceKind::Material));
        assert!(hub.drain_released().is_empty());
    }
}
