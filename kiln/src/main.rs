use clap::Parser;
use kiln_assets::{
    AssetCache, AssetKey, CacheConfig, CacheOptions, GltfLoader, HeadlessBackend,
};
use kiln_scene::{DisposalReport, ResourceHub, ResourceKind};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod procedural;

/// Key the generated tree is registered under
const TREE_KEY: &str = "proc:tree";

/// Streams assets through a single-flight cache against a headless backend
#[derive(Debug, Parser)]
#[command(name = "kiln", version)]
struct Args {
    /// glTF / GLB files or http(s) URLs to warm before requesting them
    assets: Vec<String>,

    /// Directory relative file paths are resolved against
    #[arg(long)]
    root: Option<PathBuf>,

    /// Concurrent requests issued per asset
    #[arg(short, long, default_value_t = 8)]
    requests: usize,

    /// Leaf blocks on the generated tree
    #[arg(long, default_value_t = 6)]
    branches: usize,

    /// Load meshes without shadow casting or receiving
    #[arg(long)]
    no_shadows: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "kiln=info,kiln_assets=info")]
    log: String,
}

type Cache = AssetCache<GltfLoader, HeadlessBackend>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&args.log))?;
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let hub = ResourceHub::new();
    let backend = Arc::new(HeadlessBackend::new());
    let mut loader = GltfLoader::new(hub.clone());
    if let Some(root) = &args.root {
        loader = loader.with_root(root);
    }
    let config = CacheConfig {
        cast_shadows: !args.no_shadows,
        receive_shadows: !args.no_shadows,
    };
    let cache: Cache = AssetCache::new(loader, CacheOptions::new(backend.clone()).with_config(config));

    cache.register_preloaded(TREE_KEY, procedural::tree(&hub, args.branches))?;

    let start = Instant::now();
    let mut keys = vec![AssetKey::from(TREE_KEY)];
    let warmed = futures::future::join_all(args.assets.iter().map(|asset| {
        let cache = cache.clone();
        async move { (AssetKey::from(asset.as_str()), cache.warm(asset.as_str()).await) }
    }))
    .await;
    for (key, result) in warmed {
        match result {
            Ok(()) => keys.push(key),
            Err(e) => tracing::error!("Skipping {}: {}", key, e),
        }
    }
    tracing::info!("Warmed {} assets in {:?}", keys.len() - 1, start.elapsed());

    let report = fan_out(&cache, &keys, args.requests).await?;
    tracing::info!(
        "Served {} copies of {} assets with {} loads and {} compiles",
        args.requests * keys.len(),
        keys.len(),
        cache.loads_started(),
        backend.compiles()
    );
    tracing::info!(
        "Copies released {} geometries, {} materials, {} textures, {} bitmaps",
        report.geometries,
        report.materials,
        report.textures,
        report.bitmaps
    );

    let mut released = hub.drain_released();
    backend.collect_garbage(&released);
    cache.dispose_all();
    let retired = hub.drain_released();
    backend.collect_garbage(&retired);
    tracing::info!("Disposing the cache released {} canonical resource ids", retired.len());
    released.extend(retired);

    let mut by_kind: BTreeMap<ResourceKind, usize> = BTreeMap::new();
    for event in &released {
        *by_kind.entry(event.kind).or_default() += 1;
    }
    for (kind, count) in by_kind {
        tracing::info!("{:?}: {} released", kind, count);
    }
    tracing::info!(
        "{} of {} resource ids released, {} programs and {} textures still resident",
        released.len(),
        hub.allocated(),
        backend.resident_programs(),
        backend.resident_textures()
    );
    Ok(())
}

/// Request every key `requests` times from parallel tasks, then dispose all copies
async fn fan_out(cache: &Cache, keys: &[AssetKey], requests: usize) -> anyhow::Result<DisposalReport> {
    let tasks: Vec<_> = keys
        .iter()
        .flat_map(|key| std::iter::repeat_n(key.clone(), requests))
        .map(|key| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.request_load(key).await })
        })
        .collect();

    let mut report = DisposalReport::default();
    for task in tasks {
        let mut copy = task.await??;
        report += copy.dispose()?;
    }
    Ok(report)
}
