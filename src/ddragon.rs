use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const DDRAGON_BASE_URL: &str = "https://ddragon.leagueoflegends.com";

/// Downloads and pins Data Dragon static data (champion, item, rune
/// metadata) under a cache directory. Files are fetched once per pinned
/// version and reused indefinitely afterwards.
pub struct DataDragonClient {
    client: Client,
    cache_dir: PathBuf,
}

impl DataDragonClient {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            client: Client::new(),
            cache_dir: cache_dir.to_path_buf(),
        }
    }

    /// Ensures version.txt, champion.json, item.json and runesReforged.json
    /// exist in the cache, downloading whatever is missing.
    pub fn refresh(&self) -> Result<()> {
        fs::create_dir_all(&self.cache_dir)?;

        let version = self.latest_version()?;
        eprintln!("Data Dragon version: {}", version);

        for file in ["champion.json", "item.json", "runesReforged.json"] {
            let path = self.cache_dir.join(file);
            if path.exists() {
                eprintln!("  {} already cached", file);
                continue;
            }

            let url = format!(
                "{}/cdn/{}/data/en_US/{}",
                DDRAGON_BASE_URL, version, file
            );
            eprintln!("  downloading {}...", file);
            let body: Value = self.fetch_json(&url)?;
            fs::write(&path, serde_json::to_vec_pretty(&body)?)?;
        }

        Ok(())
    }

    fn latest_version(&self) -> Result<String> {
        let version_file = self.cache_dir.join("version.txt");
        if let Ok(cached) = fs::read_to_string(&version_file) {
            let cached = cached.trim().to_string();
            if !cached.is_empty() {
                return Ok(cached);
            }
        }

        let url = format!("{}/api/versions.json", DDRAGON_BASE_URL);
        let versions: Vec<String> = self
            .fetch_json(&url)
            .and_then(|v| serde_json::from_value(v).map_err(Into::into))?;
        let latest = versions
            .first()
            .cloned()
            .ok_or_else(|| anyhow!("versions.json came back empty"))?;

        fs::write(&version_file, &latest)?;
        Ok(latest)
    }

    fn fetch_json(&self, url: &str) -> Result<Value> {
        let response = self.client.get(url).send()?;
        if !response.status().is_success() {
            return Err(anyhow!("{} returned status {}", url, response.status()));
        }
        Ok(response.json()?)
    }
}

struct ChampionMeta {
    name: String,
    string_id: String,
}

/// Read-only lookup over the cached Data Dragon files. Missing or partial
/// cache is fine: lookups degrade to synthetic placeholder names, so
/// enrichment never blocks the transform.
#[derive(Default)]
pub struct DdragonIndex {
    version: Option<String>,
    champions: HashMap<i64, ChampionMeta>,
    items: HashMap<i64, String>,
    runes: HashMap<i64, String>,
}

impl DdragonIndex {
    pub fn load(cache_dir: &Path) -> Self {
        let mut index = Self::default();

        if let Ok(version) = fs::read_to_string(cache_dir.join("version.txt")) {
            let version = version.trim().to_string();
            if !version.is_empty() {
                index.version = Some(version);
            }
        }

        if let Some(data) = read_json_object(cache_dir, "champion.json") {
            for champ in data.values() {
                let Some(key) = champ
                    .get("key")
                    .and_then(|k| k.as_str())
                    .and_then(|k| k.parse::<i64>().ok())
                else {
                    continue;
                };
                let name = champ
                    .get("name")
                    .and_then(|n| n.as_str())
                    .unwrap_or_default()
                    .to_string();
                let string_id = champ
                    .get("id")
                    .and_then(|i| i.as_str())
                    .unwrap_or_default()
                    .to_string();
                index.champions.insert(key, ChampionMeta { name, string_id });
            }
        }

        if let Some(data) = read_json_object(cache_dir, "item.json") {
            for (id, item) in &data {
                let Ok(id) = id.parse::<i64>() else { continue };
                if let Some(name) = item.get("name").and_then(|n| n.as_str()) {
                    index.items.insert(id, name.to_string());
                }
            }
        }

        // runesReforged.json is an array of trees; both the tree ids and the
        // individual rune ids land in the same name map.
        if let Ok(contents) = fs::read_to_string(cache_dir.join("runesReforged.json")) {
            if let Ok(trees) = serde_json::from_str::<Vec<Value>>(&contents) {
                for tree in &trees {
                    insert_rune_name(&mut index.runes, tree);
                    if let Some(slots) = tree.get("slots").and_then(|s| s.as_array()) {
                        for slot in slots {
                            if let Some(runes) = slot.get("runes").and_then(|r| r.as_array()) {
                                for rune in runes {
                                    insert_rune_name(&mut index.runes, rune);
                                }
                            }
                        }
                    }
                }
            }
        }

        if index.champions.is_empty() && index.items.is_empty() && index.runes.is_empty() {
            eprintln!(
                "Warning: no Data Dragon cache under {} (run the ddragon command); names will be placeholders",
                cache_dir.display()
            );
        }

        index
    }

    pub fn is_empty(&self) -> bool {
        self.champions.is_empty() && self.items.is_empty() && self.runes.is_empty()
    }

    pub fn champion_icon_url(&self, champion_id: i64) -> String {
        match (&self.version, self.champions.get(&champion_id)) {
            (Some(version), Some(meta)) => format!(
                "{}/cdn/{}/img/champion/{}.png",
                DDRAGON_BASE_URL, version, meta.string_id
            ),
            _ => String::new(),
        }
    }

    pub fn item_name(&self, item_id: i64) -> String {
        self.items
            .get(&item_id)
            .cloned()
            .unwrap_or_else(|| format!("Item_{}", item_id))
    }

    pub fn item_icon_url(&self, item_id: i64) -> String {
        match &self.version {
            Some(version) if item_id > 0 => format!(
                "{}/cdn/{}/img/item/{}.png",
                DDRAGON_BASE_URL, version, item_id
            ),
            _ => String::new(),
        }
    }

    /// Name for a rune or rune-tree id; id 0 means an empty slot.
    pub fn rune_name(&self, rune_id: i64) -> String {
        if rune_id == 0 {
            return "None".to_string();
        }
        self.runes
            .get(&rune_id)
            .cloned()
            .unwrap_or_else(|| format!("Rune_{}", rune_id))
    }

    pub fn style_name(&self, style_id: i64) -> String {
        if style_id == 0 {
            return "None".to_string();
        }
        self.runes
            .get(&style_id)
            .cloned()
            .unwrap_or_else(|| format!("Style_{}", style_id))
    }
}

fn insert_rune_name(map: &mut HashMap<i64, String>, node: &Value) {
    if let (Some(id), Some(name)) = (
        node.get("id").and_then(|i| i.as_i64()),
        node.get("name").and_then(|n| n.as_str()),
    ) {
        map.insert(id, name.to_string());
    }
}

fn read_json_object(cache_dir: &Path, file: &str) -> Option<HashMap<String, Value>> {
    let contents = fs::read_to_string(cache_dir.join(file)).ok()?;
    let parsed: Value = serde_json::from_str(&contents).ok()?;
    let data = parsed.get("data")?.clone();
    serde_json::from_value(data)
        .with_context(|| format!("unexpected shape in {}", file))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_cache_dir(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock before epoch")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("ddragon_test_{}_{}", tag, nanos));
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn empty_cache_degrades_to_placeholders() {
        let dir = temp_cache_dir("empty");
        let index = DdragonIndex::load(&dir);

        assert!(index.is_empty());
        assert_eq!(index.item_name(3071), "Item_3071");
        assert_eq!(index.rune_name(8010), "Rune_8010");
        assert_eq!(index.style_name(8000), "Style_8000");
        assert_eq!(index.rune_name(0), "None");
        assert_eq!(index.champion_icon_url(266), "");

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn loads_names_and_icon_urls_from_cache() {
        let dir = temp_cache_dir("full");
        fs::write(dir.join("version.txt"), "14.1.1").expect("write version");
        fs::write(
            dir.join("champion.json"),
            json!({ "data": { "Aatrox": { "key": "266", "id": "Aatrox", "name": "Aatrox" } } })
                .to_string(),
        )
        .expect("write champions");
        fs::write(
            dir.join("item.json"),
            json!({ "data": { "1001": { "name": "Boots" } } }).to_string(),
        )
        .expect("write items");
        fs::write(
            dir.join("runesReforged.json"),
            json!([{
                "id": 8000,
                "name": "Precision",
                "slots": [{ "runes": [{ "id": 8005, "name": "Press the Attack" }] }]
            }])
            .to_string(),
        )
        .expect("write runes");

        let index = DdragonIndex::load(&dir);
        assert_eq!(index.item_name(1001), "Boots");
        assert_eq!(index.style_name(8000), "Precision");
        assert_eq!(index.rune_name(8005), "Press the Attack");
        assert_eq!(
            index.champion_icon_url(266),
            "https://ddragon.leagueoflegends.com/cdn/14.1.1/img/champion/Aatrox.png"
        );
        assert_eq!(
            index.item_icon_url(1001),
            "https://ddragon.leagueoflegends.com/cdn/14.1.1/img/item/1001.png"
        );

        fs::remove_dir_all(&dir).ok();
    }
}
