use serde::Deserialize;

/// Typed view of a Riot match-v5 record. Deserializing through these structs
/// is the validation boundary: a record missing required structure fails
/// here, in one place, and gets skipped by the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchRecord {
    pub metadata: MatchMetadata,
    pub info: MatchInfo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchMetadata {
    pub match_id: String,
    pub participants: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchInfo {
    pub queue_id: i64,
    /// Epoch milliseconds.
    pub game_creation: i64,
    /// Seconds.
    pub game_duration: i64,
    pub game_mode: String,
    pub game_version: String,
    pub participants: Vec<ParticipantStats>,
}

impl MatchInfo {
    pub fn game_duration_minutes(&self) -> f64 {
        self.game_duration as f64 / 60.0
    }

    pub fn team_kills(&self, team_id: i64) -> i64 {
        self.participants
            .iter()
            .filter(|p| p.team_id == team_id)
            .map(|p| p.kills)
            .sum()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantStats {
    pub puuid: String,
    pub champion_id: i64,
    pub champion_name: String,
    pub team_id: i64,
    #[serde(default)]
    pub team_position: String,
    pub win: bool,
    pub kills: i64,
    pub deaths: i64,
    pub assists: i64,
    pub gold_earned: i64,
    pub total_damage_dealt_to_champions: i64,
    pub total_damage_taken: i64,
    pub total_minions_killed: i64,
    #[serde(default)]
    pub neutral_minions_killed: i64,
    pub vision_score: i64,
    #[serde(default)]
    pub wards_placed: i64,
    #[serde(default)]
    pub wards_killed: i64,
    #[serde(default)]
    pub vision_wards_bought_in_game: i64,
    #[serde(default)]
    pub double_kills: i64,
    #[serde(default)]
    pub triple_kills: i64,
    #[serde(default)]
    pub quadra_kills: i64,
    #[serde(default)]
    pub penta_kills: i64,
    pub champ_level: i64,
    #[serde(default)]
    pub summoner_name: String,
    #[serde(default)]
    pub riot_id_game_name: String,
    #[serde(default)]
    pub riot_id_tag_line: String,
    #[serde(default)]
    pub item0: i64,
    #[serde(default)]
    pub item1: i64,
    #[serde(default)]
    pub item2: i64,
    #[serde(default)]
    pub item3: i64,
    #[serde(default)]
    pub item4: i64,
    #[serde(default)]
    pub item5: i64,
    #[serde(default)]
    pub item6: i64,
    #[serde(default)]
    pub perks: Perks,
}

impl ParticipantStats {
    /// Item slots 0-5 plus the trinket in slot 6, in slot order.
    pub fn items(&self) -> [i64; 7] {
        [
            self.item0, self.item1, self.item2, self.item3, self.item4, self.item5, self.item6,
        ]
    }

    pub fn cs_total(&self) -> i64 {
        self.total_minions_killed + self.neutral_minions_killed
    }
}

impl MatchRecord {
    /// Finds the tracked player among the ten participants.
    pub fn participant_by_puuid(&self, puuid: &str) -> Option<&ParticipantStats> {
        self.info.participants.iter().find(|p| p.puuid == puuid)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Perks {
    #[serde(default)]
    pub styles: Vec<PerkStyle>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PerkStyle {
    pub style: i64,
    #[serde(default)]
    pub selections: Vec<PerkSelection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PerkSelection {
    pub perk: i64,
}
