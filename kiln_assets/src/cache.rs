use crate::backend::WarmupBackend;
use crate::error::CacheError;
use crate::key::AssetKey;
use crate::loader::AssetLoader;
use crate::options::CacheOptions;
use crate::slot::{AssetState, CacheSlot, InFlightLoad};
use anyhow::Context;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use kiln_scene::{ManagedResource, Object3D};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

#[derive(Debug, Default)]
struct AssetCacheInner {
    slots: DashMap<AssetKey, CacheSlot>,
    disposed: AtomicBool,
    loads_started: AtomicUsize,
}

/// Single-flight asset cache.
///
/// Keeps one canonical, warmed copy per [`AssetKey`] and hands every caller an independent
/// [`kiln_scene::DisposalPolicy::Cloned`] copy of it. Concurrent requests for a key that is not
/// loaded yet share a single load.
///
/// The cache is cheap to clone; all clones share the same state.
pub struct AssetCache<L: AssetLoader, B: WarmupBackend> {
    inner: Arc<AssetCacheInner>,
    loader: Arc<L>,
    options: Arc<CacheOptions<B>>,
}

impl<L: AssetLoader, B: WarmupBackend> Clone for AssetCache<L, B> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            loader: self.loader.clone(),
            options: self.options.clone(),
        }
    }
}

impl<L: AssetLoader, B: WarmupBackend> AssetCache<L, B> {
    pub fn new(loader: L, options: CacheOptions<B>) -> Self {
        Self {
            inner: Arc::new(AssetCacheInner::default()),
            loader: Arc::new(loader),
            options: Arc::new(options),
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn options(&self) -> &CacheOptions<B> {
        &self.options
    }

    fn ensure_live(&self) -> Result<(), CacheError> {
        if self.inner.disposed.load(Ordering::Acquire) {
            Err(CacheError::Disposed)
        } else {
            Ok(())
        }
    }

    /// Get an independent copy of the asset behind `key`, loading and warming it first if no
    /// request has done so yet.
    ///
    /// Every waiter of a failed load receives the same [`CacheError::Load`]; nothing is cached
    /// and the next request retries.
    pub async fn request_load(
        &self,
        key: impl Into<AssetKey>,
    ) -> Result<ManagedResource, CacheError> {
        let key = key.into();
        loop {
            self.ensure_live()?;
            let pending = match self.inner.slots.entry(key.clone()) {
                Entry::Occupied(entry) => match entry.get() {
                    CacheSlot::Loaded(canonical) => {
                        tracing::trace!("Cache hit for {}", key);
                        return Ok(canonical.deep_clone());
                    }
                    CacheSlot::Loading(pending) => pending.clone(),
                },
                Entry::Vacant(entry) => {
                    let pending = self.begin_load(key.clone());
                    entry.insert(CacheSlot::Loading(pending.clone()));
                    pending
                }
            };
            // once resolved the slot is either loaded or gone, read it again
            pending.await?;
        }
    }

    fn begin_load(&self, key: AssetKey) -> InFlightLoad {
        tracing::debug!("Loading asset {}", key);
        self.inner.loads_started.fetch_add(1, Ordering::AcqRel);
        let loader = self.loader.clone();
        let options = self.options.clone();
        let state = Arc::downgrade(&self.inner);
        async move {
            let loaded = load_and_warm(loader.as_ref(), options.as_ref(), &key).await;
            install(state, key, loaded)
        }
        .boxed()
        .shared()
    }

    /// Install `object` as the canonical entry of `key` without loading or warming it.
    ///
    /// Replaces (and releases) a previous canonical entry. Fails with
    /// [`CacheError::InFlight`] while a load of `key` is pending.
    pub fn register_preloaded(
        &self,
        key: impl Into<AssetKey>,
        object: Object3D,
    ) -> Result<(), CacheError> {
        self.ensure_live()?;
        let key = key.into();
        match self.inner.slots.entry(key.clone()) {
            Entry::Occupied(entry) if matches!(entry.get(), CacheSlot::Loading(_)) => {
                // the rejected object is owned by nobody else
                let mut rejected = ManagedResource::cloned();
                rejected.add(object);
                rejected.dispose()?;
                Err(CacheError::InFlight(key))
            }
            Entry::Occupied(mut entry) => {
                let mut canonical = ManagedResource::canonical();
                canonical.add(object);
                if let CacheSlot::Loaded(mut previous) = entry.insert(CacheSlot::Loaded(canonical))
                {
                    previous.release_all()?;
                }
                tracing::debug!("Replaced {} with a preloaded asset", key);
                Ok(())
            }
            Entry::Vacant(entry) => {
                let mut canonical = ManagedResource::canonical();
                canonical.add(object);
                entry.insert(CacheSlot::Loaded(canonical));
                tracing::debug!("Registered preloaded asset {}", key);
                Ok(())
            }
        }
    }

    /// Load and warm `key` ahead of time, without keeping a copy
    pub async fn warm(&self, key: impl Into<AssetKey>) -> Result<(), CacheError> {
        let mut copy = self.request_load(key).await?;
        copy.dispose()?;
        Ok(())
    }

    /// Copy an already loaded asset. Never starts a load.
    pub fn get_loaded_only(&self, key: impl Into<AssetKey>) -> Result<ManagedResource, CacheError> {
        self.ensure_live()?;
        let key = key.into();
        match self.inner.slots.get(&key).as_deref() {
            Some(CacheSlot::Loaded(canonical)) => Ok(canonical.deep_clone()),
            Some(CacheSlot::Loading(_)) | None => Err(CacheError::NotLoaded(key)),
        }
    }

    /// Release and forget the canonical entry of `key`. Copies already handed out own their own
    /// resources and stay valid.
    ///
    /// Returns `false` if `key` is not loaded, including while it is loading.
    pub fn evict(&self, key: impl Into<AssetKey>) -> Result<bool, CacheError> {
        self.ensure_live()?;
        let key = key.into();
        match self
            .inner
            .slots
            .remove_if(&key, |_, slot| matches!(slot, CacheSlot::Loaded(_)))
        {
            Some((_, CacheSlot::Loaded(mut canonical))) => {
                canonical.release_all()?;
                tracing::debug!("Evicted {}", key);
                Ok(true)
            }
            Some((_, CacheSlot::Loading(_))) | None => Ok(false),
        }
    }

    /// Release every canonical entry and forget every pending load. Every later call on this
    /// cache fails with [`CacheError::Disposed`], except `dispose_all` itself which does nothing.
    ///
    /// Loads still running finish on behalf of their waiters and release their result instead of
    /// installing it.
    pub fn dispose_all(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut evicted = 0usize;
        self.inner.slots.retain(|key, slot| {
            if let CacheSlot::Loaded(canonical) = slot {
                if let Err(e) = canonical.release_all() {
                    tracing::error!("Failed to dispose canonical entry {}: {}", key, e);
                }
                evicted += 1;
            }
            false
        });
        tracing::debug!("Asset cache disposed, {} canonical entries released", evicted);
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    pub fn state(&self, key: impl Into<AssetKey>) -> AssetState {
        self.inner
            .slots
            .get(&key.into())
            .map_or(AssetState::Empty, |slot| slot.state())
    }

    pub fn is_loaded(&self, key: impl Into<AssetKey>) -> bool {
        self.state(key) == AssetState::Loaded
    }

    pub fn is_loading(&self, key: impl Into<AssetKey>) -> bool {
        self.state(key) == AssetState::Loading
    }

    /// Number of loaded canonical entries
    pub fn len(&self) -> usize {
        self.inner
            .slots
            .iter()
            .filter(|slot| matches!(slot.value(), CacheSlot::Loaded(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of loads started over the cache's lifetime, failed ones included
    pub fn loads_started(&self) -> usize {
        self.inner.loads_started.load(Ordering::Acquire)
    }
}

/// Load `key`, apply the mesh flags and warm the result up on the backend
async fn load_and_warm<L: AssetLoader, B: WarmupBackend>(
    loader: &L,
    options: &CacheOptions<B>,
    key: &AssetKey,
) -> anyhow::Result<Object3D> {
    let mut object = loader.load(key).await?;
    let config = options.config;
    object.visit_meshes_mut(&mut |mesh| {
        mesh.cast_shadow = config.cast_shadows;
        mesh.receive_shadow = config.receive_shadows;
    });

    options
        .backend
        .compile(&object, &options.camera, &options.scene)
        .await
        .context("Shader compilation failed")?;
    let mut textures = Vec::new();
    object.visit_meshes(&mut |mesh| textures.extend(mesh.material.textures()));
    for texture in textures {
        options
            .backend
            .init_texture(texture)
            .with_context(|| format!("Failed to initialise texture {}", texture.name))?;
    }
    Ok(object)
}

/// Finish a load: swap the pending slot for the canonical entry, or clear it on failure
fn install(
    state: Weak<AssetCacheInner>,
    key: AssetKey,
    loaded: anyhow::Result<Object3D>,
) -> Result<(), CacheError> {
    let state = state.upgrade();
    let object = match loaded {
        Ok(object) => object,
        Err(reason) => {
            tracing::error!("Failed to load {}: {:#}", key, reason);
            if let Some(state) = state {
                state
                    .slots
                    .remove_if(&key, |_, slot| matches!(slot, CacheSlot::Loading(_)));
            }
            return Err(CacheError::Load {
                key,
                reason: Arc::new(reason),
            });
        }
    };

    let mut canonical = ManagedResource::canonical();
    canonical.add(object);
    let Some(state) = state else {
        canonical.release_all()?;
        return Err(CacheError::Disposed);
    };
    // the flag is checked under the entry lock, so `dispose_all` either sees this entry or we
    // see its flag
    let entry = state.slots.entry(key.clone());
    if state.disposed.load(Ordering::Acquire) {
        drop(entry);
        canonical.release_all()?;
        return Err(CacheError::Disposed);
    }
    entry.insert(CacheSlot::Loaded(canonical));
    tracing::debug!("Loaded asset {}", key);
    Ok(())
}
