// Champion name resolution and static game data from Data Dragon.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::CatalogError;

/// One entry of the champion list: numeric id, display name, and the
/// internal key ("MonkeyKing" for Wukong).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChampionSummary {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

#[async_trait]
pub trait ChampionListProvider: Send + Sync {
    async fn get_champions(&self, locale: &str) -> Result<Vec<ChampionSummary>, CatalogError>;
}

/// Known item ids, used to spot cached builds that reference items that no
/// longer exist.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemCatalog {
    ids: HashSet<i64>,
}

impl ItemCatalog {
    pub fn new(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[async_trait]
pub trait ItemCatalogSource: Send + Sync {
    async fn item_catalog(&self, locale: &str) -> Result<ItemCatalog, CatalogError>;
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ChampionMaps {
    by_name: HashMap<String, i64>,
    key_by_id: HashMap<i64, String>,
}

/// Champion name/key to id lookup.
///
/// The maps are swapped wholesale by [`ChampionResolver::replace`] and never
/// mutated in place, so readers always see one consistent list. An empty
/// resolver resolves nothing.
#[derive(Debug, Default)]
pub struct ChampionResolver {
    maps: RwLock<Arc<ChampionMaps>>,
}

impl ChampionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_champions(champions: &[ChampionSummary]) -> Self {
        let resolver = Self::new();
        resolver.replace(champions);
        resolver
    }

    pub fn replace(&self, champions: &[ChampionSummary]) {
        let mut maps = ChampionMaps::default();
        for champion in champions {
            maps.by_name.insert(normalize_name(&champion.name), champion.id);
            maps.by_name.insert(normalize_name(&champion.slug), champion.id);
            maps.key_by_id.insert(champion.id, champion.slug.clone());
        }
        let mut slot = self.maps.write().unwrap_or_else(|e| e.into_inner());
        *slot = Arc::new(maps);
    }

    /// Resolve a display name or internal key, ignoring case, spaces, and
    /// punctuation ("Kai'Sa", "kaisa", "KaiSa" all match).
    pub fn resolve(&self, name: &str) -> Option<i64> {
        let key = normalize_name(name);
        if key.is_empty() {
            return None;
        }
        self.snapshot().by_name.get(&key).copied()
    }

    /// Internal key for a champion id, used when requesting builds.
    pub fn key_for(&self, id: i64) -> Option<String> {
        self.snapshot().key_by_id.get(&id).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().key_by_id.is_empty()
    }

    fn snapshot(&self) -> Arc<ChampionMaps> {
        let guard = self.maps.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }
}

pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

// ---------------------------------------------------------------------------
// Data Dragon
// ---------------------------------------------------------------------------

/// Static data client for the public Data Dragon CDN. The patch version is
/// looked up once and reused.
pub struct DataDragon {
    client: reqwest::Client,
    base_url: String,
    version: OnceCell<String>,
}

impl DataDragon {
    pub fn new(base_url: impl Into<String>) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            version: OnceCell::new(),
        })
    }

    async fn get_json(&self, url: &str) -> Result<Value, CatalogError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn version(&self) -> Result<&str, CatalogError> {
        let version = self
            .version
            .get_or_try_init(|| async {
                let url = format!("{}/api/versions.json", self.base_url);
                let versions = self.get_json(&url).await?;
                let latest = parse_latest_version(&versions)
                    .ok_or_else(|| CatalogError::Missing("patch version".to_string()))?;
                debug!("using Data Dragon patch {latest}");
                Ok::<_, CatalogError>(latest)
            })
            .await?;
        Ok(version.as_str())
    }

    async fn data_file(&self, locale: &str, file: &str) -> Result<Value, CatalogError> {
        let version = self.version().await?;
        let url = format!("{}/cdn/{version}/data/{locale}/{file}", self.base_url);
        self.get_json(&url).await
    }
}

#[async_trait]
impl ChampionListProvider for DataDragon {
    async fn get_champions(&self, locale: &str) -> Result<Vec<ChampionSummary>, CatalogError> {
        let doc = self.data_file(locale, "champion.json").await?;
        let champions = parse_champion_list(&doc);
        if champions.is_empty() {
            return Err(CatalogError::Missing("champion list".to_string()));
        }
        Ok(champions)
    }
}

#[async_trait]
impl ItemCatalogSource for DataDragon {
    async fn item_catalog(&self, locale: &str) -> Result<ItemCatalog, CatalogError> {
        let doc = self.data_file(locale, "item.json").await?;
        let catalog = parse_item_catalog(&doc);
        if catalog.is_empty() {
            return Err(CatalogError::Missing("item catalog".to_string()));
        }
        Ok(catalog)
    }
}

pub(crate) fn parse_latest_version(doc: &Value) -> Option<String> {
    doc.as_array()?
        .first()?
        .as_str()
        .map(str::to_string)
}

/// `champion.json`: `data` maps internal keys to `{id, key, name}` where
/// `key` is the numeric id as a string.
pub(crate) fn parse_champion_list(doc: &Value) -> Vec<ChampionSummary> {
    let Some(data) = doc.get("data").and_then(Value::as_object) else {
        return Vec::new();
    };
    let mut champions: Vec<ChampionSummary> = data
        .iter()
        .filter_map(|(slug, entry)| {
            let id = entry.get("key")?.as_str()?.parse().ok()?;
            let name = entry.get("name")?.as_str()?.to_string();
            let slug = entry
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or(slug)
                .to_string();
            Some(ChampionSummary { id, name, slug })
        })
        .collect();
    champions.sort_by_key(|c| c.id);
    champions
}

/// `item.json`: `data` is keyed by item id.
pub(crate) fn parse_item_catalog(doc: &Value) -> ItemCatalog {
    let ids = doc
        .get("data")
        .and_then(Value::as_object)
        .map(|data| {
            data.keys()
                .filter_map(|k| k.parse::<i64>().ok())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    ItemCatalog::new(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Vec<ChampionSummary> {
        vec![
            ChampionSummary {
                id: 62,
                name: "Wukong".into(),
                slug: "MonkeyKing".into(),
            },
            ChampionSummary {
                id: 145,
                name: "Kai'Sa".into(),
                slug: "Kaisa".into(),
            },
            ChampionSummary {
                id: 4,
                name: "Twisted Fate".into(),
                slug: "TwistedFate".into(),
            },
        ]
    }

    #[test]
    fn resolves_names_and_keys() {
        let resolver = ChampionResolver::from_champions(&sample());
        assert_eq!(resolver.resolve("Wukong"), Some(62));
        assert_eq!(resolver.resolve("MonkeyKing"), Some(62));
        assert_eq!(resolver.resolve("kai'sa"), Some(145));
        assert_eq!(resolver.resolve("KAISA"), Some(145));
        assert_eq!(resolver.resolve("twisted fate"), Some(4));
        assert_eq!(resolver.resolve("Nobody"), None);
        assert_eq!(resolver.resolve("  "), None);
        assert_eq!(resolver.key_for(62).as_deref(), Some("MonkeyKing"));
        assert_eq!(resolver.key_for(1), None);
    }

    #[test]
    fn empty_resolver_resolves_nothing() {
        let resolver = ChampionResolver::new();
        assert!(resolver.is_empty());
        assert_eq!(resolver.resolve("Wukong"), None);
    }

    #[test]
    fn replace_swaps_the_whole_list() {
        let resolver = ChampionResolver::from_champions(&sample());
        resolver.replace(&[ChampionSummary {
            id: 1,
            name: "Annie".into(),
            slug: "Annie".into(),
        }]);
        assert_eq!(resolver.resolve("Annie"), Some(1));
        assert_eq!(resolver.resolve("Wukong"), None);
    }

    #[test]
    fn parses_champion_json() {
        let doc = json!({
            "type": "champion",
            "data": {
                "MonkeyKing": { "id": "MonkeyKing", "key": "62", "name": "Wukong" },
                "Annie": { "id": "Annie", "key": "1", "name": "Annie" },
                "Broken": { "id": "Broken", "key": "x", "name": "Broken" }
            }
        });
        let champions = parse_champion_list(&doc);
        assert_eq!(champions.len(), 2);
        assert_eq!(champions[0].id, 1);
        assert_eq!(champions[1].slug, "MonkeyKing");
        assert!(parse_champion_list(&json!({})).is_empty());
    }

    #[test]
    fn parses_item_json_and_versions() {
        let doc = json!({ "data": { "1001": {}, "3031": {}, "notanid": {} } });
        let catalog = parse_item_catalog(&doc);
        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains(3031));
        assert!(!catalog.contains(9999));

        assert_eq!(
            parse_latest_version(&json!(["14.20.1", "14.19.1"])).as_deref(),
            Some("14.20.1")
        );
        assert_eq!(parse_latest_version(&json!([])), None);
    }
}
