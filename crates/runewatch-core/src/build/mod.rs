pub mod fetcher;
pub mod model;
pub mod self_heal;

pub use fetcher::{
    BuildCache, BuildFetcher, BuildProvider, CachedBuildFetcher, HttpBuildClient,
    HttpBuildProvider, MemoryBuildCache,
};
pub use model::{ArenaBuild, BuildCacheKey, BuildRequest, BuildResult, GameMode, RiftBuild};
pub use self_heal::{SelfHealPolicy, SelfHealSettings};
