// Self-heal policy for cached builds.
//
// A cache hit is re-fetched when it looks structurally incomplete, but only
// once its fetch timestamp is older than the cooldown. Inside the cooldown a
// broken-looking build is served as-is.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::model::{ArenaBuild, BuildResult, RiftBuild};
use crate::champions::ItemCatalog;

/// Thresholds from the `[self_heal]` config section.
#[derive(Debug, Clone)]
pub struct SelfHealSettings {
    pub cooldown: Duration,
    /// Ids at or above this are variant ids of a base item.
    pub extended_item_id_min: i64,
    /// `id % modulus` gives the base item of a variant id.
    pub extended_item_base_modulus: i64,
    pub min_summoner_spells: usize,
}

impl Default for SelfHealSettings {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(6 * 60 * 60),
            extended_item_id_min: 100_000,
            extended_item_base_modulus: 10_000,
            min_summoner_spells: 2,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SelfHealPolicy {
    settings: SelfHealSettings,
}

impl SelfHealPolicy {
    pub fn new(settings: SelfHealSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SelfHealSettings {
        &self.settings
    }

    /// Whether a cache hit should be re-fetched at `now`.
    pub fn should_refresh(
        &self,
        build: &BuildResult,
        catalog: Option<&ItemCatalog>,
        now: DateTime<Utc>,
    ) -> bool {
        self.looks_broken(build, catalog) && self.cooldown_elapsed(build.dt(), now)
    }

    /// Per-mode structural check. Item ids are only checked when a catalog
    /// is available.
    pub fn looks_broken(&self, build: &BuildResult, catalog: Option<&ItemCatalog>) -> bool {
        match build {
            BuildResult::Ranked(b) | BuildResult::Aram(b) => self.rift_looks_broken(b, catalog),
            BuildResult::Arena(b) => self.arena_looks_broken(b, catalog),
        }
    }

    fn rift_looks_broken(&self, build: &RiftBuild, catalog: Option<&ItemCatalog>) -> bool {
        if build.runes.is_empty() || build.runes.iter().any(|page| page.perks.is_empty()) {
            return true;
        }
        if build.summoner_spells.is_empty()
            || build
                .summoner_spells
                .iter()
                .any(|set| set.spells.len() < self.settings.min_summoner_spells)
        {
            return true;
        }
        if build.item_ids().next().is_none() {
            return true;
        }
        catalog.is_some_and(|catalog| build.item_ids().any(|id| !self.item_known(id, catalog)))
    }

    fn arena_looks_broken(&self, build: &ArenaBuild, catalog: Option<&ItemCatalog>) -> bool {
        if build.augments.is_empty() || build.item_ids().next().is_none() {
            return true;
        }
        catalog.is_some_and(|catalog| build.item_ids().any(|id| !self.item_known(id, catalog)))
    }

    /// An id resolves if it is in the catalog, or if it is an extended id
    /// whose base item is.
    pub fn item_known(&self, id: i64, catalog: &ItemCatalog) -> bool {
        if catalog.contains(id) {
            return true;
        }
        let modulus = self.settings.extended_item_base_modulus;
        id >= self.settings.extended_item_id_min && modulus > 0 && catalog.contains(id % modulus)
    }

    /// A build with a future `dt` counts as just fetched.
    fn cooldown_elapsed(&self, dt_ms: i64, now: DateTime<Utc>) -> bool {
        let age_ms = now.timestamp_millis().saturating_sub(dt_ms);
        let cooldown_ms = i64::try_from(self.settings.cooldown.as_millis()).unwrap_or(i64::MAX);
        age_ms >= cooldown_ms
    }
}
