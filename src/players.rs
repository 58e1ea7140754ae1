use crate::riot_api::RiotClient;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One tracked player. `id` is the stable internal key used in data paths;
/// `region` is the API routing region (americas/europe/asia).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub display_name: String,
    pub riot_id: String,
    pub puuid: String,
    pub region: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PlayerRegistry {
    pub players: Vec<Player>,
}

impl PlayerRegistry {
    /// A missing registry file is an empty registry, not an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("{} is not a valid player registry", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_vec_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("cannot write {}", path.display()))?;
        Ok(())
    }

    pub fn find(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn add(&mut self, player: Player) -> Result<()> {
        if self.players.iter().any(|p| p.id == player.id) {
            bail!("player id '{}' already registered", player.id);
        }
        if self.players.iter().any(|p| p.puuid == player.puuid) {
            bail!("puuid for '{}' already registered", player.riot_id);
        }
        self.players.push(player);
        Ok(())
    }
}

/// Resolves a human-entered `Name#TAG` to a registry entry via account-v1
/// and appends it to the registry file.
pub fn add_player(registry_path: &Path, id: &str, riot_id: &str, region: &str) -> Result<()> {
    let Some((game_name, tag_line)) = riot_id.split_once('#') else {
        bail!("riot id must be in the form GameName#TAG");
    };

    let client = RiotClient::new(region)?;
    let Some(account) = client.get_account_by_riot_id(game_name, tag_line)? else {
        bail!("account {} not found in region {}", riot_id, region);
    };

    let mut registry = PlayerRegistry::load(registry_path)?;
    registry.add(Player {
        id: id.to_string(),
        display_name: game_name.to_string(),
        riot_id: format!("{}#{}", account.game_name, account.tag_line),
        puuid: account.puuid,
        region: region.to_string(),
    })?;
    registry.save(registry_path)?;

    eprintln!("Added player '{}' ({})", id, riot_id);
    Ok(())
}

pub fn list_players(registry_path: &Path) -> Result<()> {
    let registry = PlayerRegistry::load(registry_path)?;

    if registry.players.is_empty() {
        println!("No players configured.");
        return Ok(());
    }

    for player in &registry.players {
        println!(
            "{}  {} ({})  region={}  puuid={}...",
            player.id,
            player.display_name,
            player.riot_id,
            player.region,
            &player.puuid[..player.puuid.len().min(16)]
        );
    }
    Ok(())
}
