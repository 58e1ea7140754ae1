use crate::ddragon::DdragonIndex;
use crate::match_data::{MatchInfo, MatchRecord, ParticipantStats, Perks};
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Datelike, Local, Timelike, Utc, Weekday};
use csv::Writer;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// (kills + assists) / deaths, with deaths floored at 1 so a deathless game
/// scores as if deaths were 1.
pub fn kda(kills: i64, deaths: i64, assists: i64) -> f64 {
    (kills + assists) as f64 / deaths.max(1) as f64
}

/// Fraction of the team's kills the player secured or assisted. 0.0 when the
/// team has no kills.
pub fn kill_participation(kills: i64, assists: i64, team_kills: i64) -> f64 {
    if team_kills <= 0 {
        0.0
    } else {
        (kills + assists) as f64 / team_kills as f64
    }
}

fn per_minute(value: i64, minutes: f64) -> f64 {
    if minutes <= 0.0 {
        0.0
    } else {
        value as f64 / minutes
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn queue_name(queue_id: i64) -> String {
    match queue_id {
        400 => "Draft Normal".to_string(),
        420 => "Ranked Solo/Duo".to_string(),
        other => format!("Queue {}", other),
    }
}

/// Identity of a rune loadout: both tree ids plus the ordered perk picks of
/// each tree. Order is preserved (the keystone slot matters), not sorted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RuneSignature {
    primary_style: i64,
    sub_style: i64,
    primary_perks: Vec<i64>,
    secondary_perks: Vec<i64>,
}

impl RuneSignature {
    fn from_perks(perks: &Perks) -> Self {
        let perk_ids = |index: usize| -> Vec<i64> {
            perks
                .styles
                .get(index)
                .map(|style| style.selections.iter().map(|s| s.perk).collect())
                .unwrap_or_default()
        };

        Self {
            primary_style: perks.styles.first().map(|s| s.style).unwrap_or(0),
            sub_style: perks.styles.get(1).map(|s| s.style).unwrap_or(0),
            primary_perks: perk_ids(0),
            secondary_perks: perk_ids(1),
        }
    }
}

#[derive(Serialize)]
struct DimChampionRow {
    champion_key: u32,
    champion_id: i64,
    champion_name: String,
    role: String,
    icon_url: String,
}

#[derive(Serialize)]
struct DimDateRow {
    date_key: i64,
    full_date: String,
    year: i32,
    month: u32,
    day: u32,
    day_of_week: String,
    week_of_year: u32,
    is_weekend: u8,
    hour_of_day: u32,
}

#[derive(Serialize)]
struct DimQueueRow {
    queue_key: i64,
    queue_id: i64,
    queue_name: String,
    is_ranked: u8,
    game_mode: String,
}

#[derive(Serialize)]
struct DimRuneRow {
    rune_key: u32,
    primary_style_id: i64,
    primary_style_name: String,
    sub_style_id: i64,
    sub_style_name: String,
    keystone_id: i64,
    keystone_name: String,
    primary_rune2_id: i64,
    primary_rune2_name: String,
    primary_rune3_id: i64,
    primary_rune3_name: String,
    primary_rune4_id: i64,
    primary_rune4_name: String,
    secondary_rune1_id: i64,
    secondary_rune1_name: String,
    secondary_rune2_id: i64,
    secondary_rune2_name: String,
}

#[derive(Serialize)]
struct DimItemRow {
    item_key: i64,
    item_id: i64,
    item_name: String,
    icon_url: String,
}

#[derive(Serialize)]
struct DimMatchMetadataRow {
    match_key: u32,
    match_id: String,
    game_duration_seconds: i64,
    game_version: String,
    timestamp: i64,
}

#[derive(Serialize)]
struct FactMatchRow {
    match_key: u32,
    champion_key: u32,
    date_key: i64,
    queue_key: i64,
    rune_key: u32,
    win: u8,
    kills: i64,
    deaths: i64,
    assists: i64,
    kda: f64,
    cs_total: i64,
    cs_per_minute: f64,
    gold_earned: i64,
    gold_per_minute: f64,
    damage_dealt: i64,
    damage_per_minute: f64,
    damage_taken: i64,
    vision_score: i64,
    wards_placed: i64,
    wards_killed: i64,
    control_wards_purchased: i64,
    kill_participation: f64,
    double_kills: i64,
    triple_kills: i64,
    quadra_kills: i64,
    penta_kills: i64,
    game_duration_minutes: f64,
}

#[derive(Serialize)]
struct BridgeMatchItemRow {
    match_key: u32,
    item_key: i64,
    item_position: usize,
}

#[derive(Serialize)]
struct BridgeParticipantRow {
    match_key: u32,
    participant_num: usize,
    puuid: String,
    summoner_name: String,
    riot_id_game_name: String,
    riot_id_tag_line: String,
    champion_id: i64,
    champion_name: String,
    team_id: i64,
    team_position: String,
    is_player: u8,
    win: u8,
    kills: i64,
    deaths: i64,
    assists: i64,
    kda: f64,
    cs_total: i64,
    cs_per_minute: f64,
    gold_earned: i64,
    gold_per_minute: f64,
    damage_dealt: i64,
    damage_per_minute: f64,
    vision_score: i64,
    control_wards_purchased: i64,
    kill_participation: f64,
    champ_level: i64,
    items: String,
}

/// Builds the dimensional model for one tracked player across a batch of
/// match records. Dimension surrogate keys are assigned on first encounter
/// and never reassigned; a match id is processed at most once.
pub struct StarSchemaBuilder {
    puuid: String,
    ddragon: DdragonIndex,

    dim_champions: Vec<DimChampionRow>,
    dim_dates: Vec<DimDateRow>,
    dim_queues: Vec<DimQueueRow>,
    dim_runes: Vec<DimRuneRow>,
    dim_items: Vec<DimItemRow>,
    dim_match_metadata: Vec<DimMatchMetadataRow>,
    fact_matches: Vec<FactMatchRow>,
    bridge_match_items: Vec<BridgeMatchItemRow>,
    bridge_match_participants: Vec<BridgeParticipantRow>,

    champion_key_by_id: HashMap<i64, u32>,
    rune_key_by_signature: HashMap<RuneSignature, u32>,
    match_key_by_id: HashMap<String, u32>,
    date_keys: HashSet<i64>,
    queue_keys: HashSet<i64>,
    item_keys: HashSet<i64>,

    next_champion_key: u32,
    next_rune_key: u32,
    next_match_key: u32,

    processed: usize,
    skipped: usize,
}

impl StarSchemaBuilder {
    pub fn new(puuid: &str, ddragon: DdragonIndex) -> Self {
        Self {
            puuid: puuid.to_string(),
            ddragon,
            dim_champions: Vec::new(),
            dim_dates: Vec::new(),
            dim_queues: Vec::new(),
            dim_runes: Vec::new(),
            dim_items: Vec::new(),
            dim_match_metadata: Vec::new(),
            fact_matches: Vec::new(),
            bridge_match_items: Vec::new(),
            bridge_match_participants: Vec::new(),
            champion_key_by_id: HashMap::new(),
            rune_key_by_signature: HashMap::new(),
            match_key_by_id: HashMap::new(),
            date_keys: HashSet::new(),
            queue_keys: HashSet::new(),
            item_keys: HashSet::new(),
            next_champion_key: 1,
            next_rune_key: 1,
            next_match_key: 1,
            processed: 0,
            skipped: 0,
        }
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Reads every `raw_matches_*.json` batch under `dir` (the fetch side's
    /// hand-off artifacts) and processes each record. A record that fails
    /// typed deserialization is skipped with a warning; an unreadable
    /// directory or file is fatal.
    pub fn load_and_process_dir(&mut self, dir: &Path) -> Result<()> {
        let mut raw_files: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("cannot read {}", dir.display()))?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .map(|name| name.starts_with("raw_matches_") && name.ends_with(".json"))
                    .unwrap_or(false)
            })
            .collect();
        raw_files.sort();

        if raw_files.is_empty() {
            bail!("no raw_matches_*.json files under {}", dir.display());
        }

        for path in &raw_files {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            let batch: Vec<Value> = serde_json::from_str(&contents)
                .with_context(|| format!("{} is not a JSON array", path.display()))?;

            eprintln!("Processing {} ({} matches)...", path.display(), batch.len());

            for value in batch {
                match serde_json::from_value::<MatchRecord>(value) {
                    Ok(record) => self.process_match(&record),
                    Err(err) => {
                        eprintln!("Warning: malformed match record skipped: {}", err);
                        self.skipped += 1;
                    }
                }
            }
        }

        Ok(())
    }

    /// Idempotent per match id: a second call with the same id is a no-op.
    /// A match without the tracked player is skipped with a warning.
    pub fn process_match(&mut self, record: &MatchRecord) {
        let match_id = &record.metadata.match_id;
        if self.match_key_by_id.contains_key(match_id) {
            return;
        }

        let Some(player) = record.participant_by_puuid(&self.puuid) else {
            eprintln!(
                "Warning: tracked player not found in match {}; skipping",
                match_id
            );
            self.skipped += 1;
            return;
        };

        let info = &record.info;
        let Some(creation) = DateTime::<Utc>::from_timestamp_millis(info.game_creation) else {
            eprintln!(
                "Warning: match {} has an out-of-range gameCreation; skipping",
                match_id
            );
            self.skipped += 1;
            return;
        };
        let creation = creation.with_timezone(&Local);

        let match_key = self.next_match_key;
        self.next_match_key += 1;
        self.match_key_by_id.insert(match_id.clone(), match_key);

        let champion_key = self.champion_key(player);
        let date_key = self.date_key(&creation);
        let queue_key = self.queue_key(info);
        let rune_key = self.rune_key(&player.perks);

        let items = player.items();
        self.add_items(&items);
        for (position, &item_id) in items.iter().enumerate() {
            if item_id > 0 {
                self.bridge_match_items.push(BridgeMatchItemRow {
                    match_key,
                    item_key: item_id,
                    item_position: position,
                });
            }
        }

        let minutes = info.game_duration_minutes();
        let team_kills = info.team_kills(player.team_id);
        let cs_total = player.cs_total();

        self.fact_matches.push(FactMatchRow {
            match_key,
            champion_key,
            date_key,
            queue_key,
            rune_key,
            win: u8::from(player.win),
            kills: player.kills,
            deaths: player.deaths,
            assists: player.assists,
            kda: round2(kda(player.kills, player.deaths, player.assists)),
            cs_total,
            cs_per_minute: round2(per_minute(cs_total, minutes)),
            gold_earned: player.gold_earned,
            gold_per_minute: round2(per_minute(player.gold_earned, minutes)),
            damage_dealt: player.total_damage_dealt_to_champions,
            damage_per_minute: round2(per_minute(
                player.total_damage_dealt_to_champions,
                minutes,
            )),
            damage_taken: player.total_damage_taken,
            vision_score: player.vision_score,
            wards_placed: player.wards_placed,
            wards_killed: player.wards_killed,
            control_wards_purchased: player.vision_wards_bought_in_game,
            kill_participation: round3(kill_participation(
                player.kills,
                player.assists,
                team_kills,
            )),
            double_kills: player.double_kills,
            triple_kills: player.triple_kills,
            quadra_kills: player.quadra_kills,
            penta_kills: player.penta_kills,
            game_duration_minutes: round2(minutes),
        });

        self.dim_match_metadata.push(DimMatchMetadataRow {
            match_key,
            match_id: match_id.clone(),
            game_duration_seconds: info.game_duration,
            game_version: info.game_version.clone(),
            timestamp: info.game_creation,
        });

        for (index, participant) in info.participants.iter().enumerate() {
            self.bridge_match_participants
                .push(participant_row(match_key, index + 1, participant, info, &self.puuid));
        }

        self.processed += 1;
    }

    fn champion_key(&mut self, player: &ParticipantStats) -> u32 {
        if let Some(&key) = self.champion_key_by_id.get(&player.champion_id) {
            return key;
        }

        let key = self.next_champion_key;
        self.next_champion_key += 1;
        self.champion_key_by_id.insert(player.champion_id, key);
        self.dim_champions.push(DimChampionRow {
            champion_key: key,
            champion_id: player.champion_id,
            champion_name: player.champion_name.clone(),
            role: if player.team_position.is_empty() {
                "UNKNOWN".to_string()
            } else {
                player.team_position.clone()
            },
            icon_url: self.ddragon.champion_icon_url(player.champion_id),
        });
        key
    }

    fn date_key(&mut self, dt: &DateTime<Local>) -> i64 {
        let key = dt.year() as i64 * 10_000 + dt.month() as i64 * 100 + dt.day() as i64;
        if self.date_keys.insert(key) {
            self.dim_dates.push(DimDateRow {
                date_key: key,
                full_date: dt.format("%Y-%m-%d").to_string(),
                year: dt.year(),
                month: dt.month(),
                day: dt.day(),
                day_of_week: dt.format("%A").to_string(),
                week_of_year: dt.iso_week().week(),
                is_weekend: u8::from(matches!(dt.weekday(), Weekday::Sat | Weekday::Sun)),
                hour_of_day: dt.hour(),
            });
        }
        key
    }

    fn queue_key(&mut self, info: &MatchInfo) -> i64 {
        let queue_id = info.queue_id;
        if self.queue_keys.insert(queue_id) {
            self.dim_queues.push(DimQueueRow {
                queue_key: queue_id,
                queue_id,
                queue_name: queue_name(queue_id),
                is_ranked: u8::from(queue_id == 420),
                game_mode: info.game_mode.clone(),
            });
        }
        queue_id
    }

    fn rune_key(&mut self, perks: &Perks) -> u32 {
        let signature = RuneSignature::from_perks(perks);
        if let Some(&key) = self.rune_key_by_signature.get(&signature) {
            return key;
        }

        let key = self.next_rune_key;
        self.next_rune_key += 1;

        let primary = |i: usize| signature.primary_perks.get(i).copied().unwrap_or(0);
        let secondary = |i: usize| signature.secondary_perks.get(i).copied().unwrap_or(0);

        let row = DimRuneRow {
            rune_key: key,
            primary_style_id: signature.primary_style,
            primary_style_name: self.ddragon.style_name(signature.primary_style),
            sub_style_id: signature.sub_style,
            sub_style_name: self.ddragon.style_name(signature.sub_style),
            keystone_id: primary(0),
            keystone_name: self.ddragon.rune_name(primary(0)),
            primary_rune2_id: primary(1),
            primary_rune2_name: self.ddragon.rune_name(primary(1)),
            primary_rune3_id: primary(2),
            primary_rune3_name: self.ddragon.rune_name(primary(2)),
            primary_rune4_id: primary(3),
            primary_rune4_name: self.ddragon.rune_name(primary(3)),
            secondary_rune1_id: secondary(0),
            secondary_rune1_name: self.ddragon.rune_name(secondary(0)),
            secondary_rune2_id: secondary(1),
            secondary_rune2_name: self.ddragon.rune_name(secondary(1)),
        };

        self.dim_runes.push(row);
        self.rune_key_by_signature.insert(signature, key);
        key
    }

    fn add_items(&mut self, items: &[i64; 7]) {
        for &item_id in items {
            if item_id > 0 && self.item_keys.insert(item_id) {
                self.dim_items.push(DimItemRow {
                    item_key: item_id,
                    item_id,
                    item_name: self.ddragon.item_name(item_id),
                    icon_url: self.ddragon.item_icon_url(item_id),
                });
            }
        }
    }

    /// Serializes every table as a CSV under `out_dir`, one file per table,
    /// overwritten wholesale. Column order is the row struct's field order.
    /// I/O failure here is fatal and propagates.
    pub fn export_all(&self, out_dir: &Path) -> Result<()> {
        fs::create_dir_all(out_dir)
            .with_context(|| format!("cannot create {}", out_dir.display()))?;

        eprintln!("Exporting star schema to {}", out_dir.display());

        write_table(out_dir, "dim_champion.csv", &self.dim_champions)?;
        write_table(out_dir, "dim_date.csv", &self.dim_dates)?;
        write_table(out_dir, "dim_queue.csv", &self.dim_queues)?;
        write_table(out_dir, "dim_rune.csv", &self.dim_runes)?;
        write_table(out_dir, "dim_items.csv", &self.dim_items)?;
        write_table(out_dir, "dim_match_metadata.csv", &self.dim_match_metadata)?;
        write_table(out_dir, "fact_matches.csv", &self.fact_matches)?;
        write_table(out_dir, "bridge_match_items.csv", &self.bridge_match_items)?;
        write_table(
            out_dir,
            "bridge_match_participants.csv",
            &self.bridge_match_participants,
        )?;

        Ok(())
    }

    pub fn print_summary(&self) {
        eprintln!("Transform summary:");
        eprintln!("  matches processed: {}", self.processed);
        eprintln!("  matches skipped:   {}", self.skipped);
        eprintln!("  champions:         {}", self.dim_champions.len());
        eprintln!("  dates:             {}", self.dim_dates.len());
        eprintln!("  rune pages:        {}", self.dim_runes.len());
        eprintln!("  items:             {}", self.dim_items.len());
        eprintln!("  fact rows:         {}", self.fact_matches.len());
        eprintln!(
            "  bridge rows:       {} items, {} participants",
            self.bridge_match_items.len(),
            self.bridge_match_participants.len()
        );
    }
}

fn participant_row(
    match_key: u32,
    participant_num: usize,
    participant: &ParticipantStats,
    info: &MatchInfo,
    tracked_puuid: &str,
) -> BridgeParticipantRow {
    let minutes = info.game_duration_minutes();
    let team_kills = info.team_kills(participant.team_id);
    let cs_total = participant.cs_total();
    let items = participant.items();

    BridgeParticipantRow {
        match_key,
        participant_num,
        puuid: participant.puuid.clone(),
        summoner_name: participant.summoner_name.clone(),
        riot_id_game_name: participant.riot_id_game_name.clone(),
        riot_id_tag_line: participant.riot_id_tag_line.clone(),
        champion_id: participant.champion_id,
        champion_name: participant.champion_name.clone(),
        team_id: participant.team_id,
        team_position: participant.team_position.clone(),
        is_player: u8::from(participant.puuid == tracked_puuid),
        win: u8::from(participant.win),
        kills: participant.kills,
        deaths: participant.deaths,
        assists: participant.assists,
        kda: round2(kda(participant.kills, participant.deaths, participant.assists)),
        cs_total,
        cs_per_minute: round2(per_minute(cs_total, minutes)),
        gold_earned: participant.gold_earned,
        gold_per_minute: round2(per_minute(participant.gold_earned, minutes)),
        damage_dealt: participant.total_damage_dealt_to_champions,
        damage_per_minute: round2(per_minute(
            participant.total_damage_dealt_to_champions,
            minutes,
        )),
        vision_score: participant.vision_score,
        control_wards_purchased: participant.vision_wards_bought_in_game,
        kill_participation: round3(kill_participation(
            participant.kills,
            participant.assists,
            team_kills,
        )),
        champ_level: participant.champ_level,
        items: serde_json::to_string(&items).unwrap_or_else(|_| "[]".to_string()),
    }
}

fn write_table<T: Serialize>(out_dir: &Path, name: &str, rows: &[T]) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }

    let path = out_dir.join(name);
    let mut writer =
        Writer::from_path(&path).with_context(|| format!("cannot write {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    eprintln!("  {} ({} rows)", path.display(), rows.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TRACKED: &str = "tracked-puuid";

    fn participant(puuid: &str, team_id: i64, kills: i64, assists: i64) -> Value {
        json!({
            "puuid": puuid,
            "championId": 266,
            "championName": "Aatrox",
            "teamId": team_id,
            "teamPosition": "TOP",
            "win": team_id == 100,
            "kills": kills,
            "deaths": 0,
            "assists": assists,
            "goldEarned": 5000,
            "totalDamageDealtToChampions": 10000,
            "totalDamageTaken": 9000,
            "totalMinionsKilled": 100,
            "neutralMinionsKilled": 20,
            "visionScore": 15,
            "wardsPlaced": 8,
            "wardsKilled": 2,
            "visionWardsBoughtInGame": 3,
            "champLevel": 14,
            "item0": 3071,
            "item1": 0,
            "item6": 3364,
            "perks": { "styles": [
                { "style": 8000, "selections": [
                    { "perk": 8010 }, { "perk": 9111 }, { "perk": 9104 }, { "perk": 8014 }
                ] },
                { "style": 8400, "selections": [{ "perk": 8444 }, { "perk": 8453 }] }
            ] }
        })
    }

    fn sample_match(match_id: &str, tracked_puuid: &str) -> MatchRecord {
        let mut participants = vec![participant(tracked_puuid, 100, 2, 3)];
        for i in 1..5 {
            participants.push(participant(&format!("ally-{}", i), 100, if i == 1 { 5 } else { 0 }, 0));
        }
        for i in 0..5 {
            participants.push(participant(&format!("enemy-{}", i), 200, 1, 0));
        }

        let value = json!({
            "metadata": {
                "matchId": match_id,
                "participants": participants.iter()
                    .map(|p| p["puuid"].clone())
                    .collect::<Vec<_>>()
            },
            "info": {
                "queueId": 420,
                "gameCreation": 1_700_000_000_000i64,
                "gameDuration": 600,
                "gameMode": "CLASSIC",
                "gameVersion": "14.1.1",
                "participants": participants
            }
        });

        serde_json::from_value(value).expect("sample match should parse")
    }

    fn builder() -> StarSchemaBuilder {
        StarSchemaBuilder::new(TRACKED, DdragonIndex::default())
    }

    #[test]
    fn kda_floors_deaths_at_one() {
        assert_eq!(kda(3, 0, 5), 8.0);
        assert_eq!(kda(3, 2, 5), 4.0);
    }

    #[test]
    fn kill_participation_handles_zero_team_kills() {
        assert_eq!(kill_participation(2, 3, 10), 0.5);
        assert_eq!(kill_participation(0, 0, 0), 0.0);
    }

    #[test]
    fn processing_the_same_match_twice_is_a_no_op() {
        let mut b = builder();
        let record = sample_match("EUW1_100", TRACKED);

        b.process_match(&record);
        b.process_match(&record);

        assert_eq!(b.fact_matches.len(), 1);
        assert_eq!(b.dim_match_metadata.len(), 1);
        assert_eq!(b.processed(), 1);
    }

    #[test]
    fn derived_metrics_match_the_formulas() {
        let mut b = builder();
        b.process_match(&sample_match("EUW1_101", TRACKED));

        let fact = &b.fact_matches[0];
        // 600s game: 5000 gold -> 500.0/min; 120 cs -> 12.0/min.
        assert_eq!(fact.game_duration_minutes, 10.0);
        assert_eq!(fact.gold_per_minute, 500.0);
        assert_eq!(fact.cs_per_minute, 12.0);
        // 2 kills + 3 assists, 0 deaths -> 5.0.
        assert_eq!(fact.kda, 5.0);
        // Team 100 kills: 2 + 5 = 7; (2 + 3) / 7 rounded to 3 places.
        assert_eq!(fact.kill_participation, 0.714);
        assert_eq!(fact.win, 1);
    }

    #[test]
    fn champion_dimension_deduplicates_by_champion_id() {
        let mut b = builder();
        b.process_match(&sample_match("EUW1_102", TRACKED));
        b.process_match(&sample_match("EUW1_103", TRACKED));

        assert_eq!(b.fact_matches.len(), 2);
        assert_eq!(b.dim_champions.len(), 1);
        assert_eq!(b.fact_matches[0].champion_key, b.fact_matches[1].champion_key);
    }

    #[test]
    fn equal_rune_loadouts_share_one_key() {
        let mut b = builder();
        b.process_match(&sample_match("EUW1_104", TRACKED));
        b.process_match(&sample_match("EUW1_105", TRACKED));

        assert_eq!(b.dim_runes.len(), 1);
        assert_eq!(b.fact_matches[0].rune_key, b.fact_matches[1].rune_key);

        let rune = &b.dim_runes[0];
        assert_eq!(rune.primary_style_id, 8000);
        assert_eq!(rune.sub_style_id, 8400);
        assert_eq!(rune.keystone_id, 8010);
        assert_eq!(rune.secondary_rune2_id, 8453);
        // No Data Dragon cache loaded: placeholder names, key still assigned.
        assert_eq!(rune.primary_style_name, "Style_8000");
        assert_eq!(rune.keystone_name, "Rune_8010");
    }

    #[test]
    fn item_bridge_preserves_slot_positions() {
        let mut b = builder();
        b.process_match(&sample_match("EUW1_106", TRACKED));

        let rows: Vec<(i64, usize)> = b
            .bridge_match_items
            .iter()
            .map(|r| (r.item_key, r.item_position))
            .collect();
        assert_eq!(rows, vec![(3071, 0), (3364, 6)]);
        // Item dimension holds each distinct id once.
        assert_eq!(b.dim_items.len(), 2);
    }

    #[test]
    fn participant_bridge_covers_all_ten_and_flags_the_player() {
        let mut b = builder();
        b.process_match(&sample_match("EUW1_107", TRACKED));

        assert_eq!(b.bridge_match_participants.len(), 10);
        let flagged: Vec<&BridgeParticipantRow> = b
            .bridge_match_participants
            .iter()
            .filter(|r| r.is_player == 1)
            .collect();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].puuid, TRACKED);
        assert_eq!(flagged[0].participant_num, 1);
    }

    #[test]
    fn match_without_tracked_player_is_skipped() {
        let mut b = builder();
        b.process_match(&sample_match("EUW1_108", "someone-else"));

        assert_eq!(b.fact_matches.len(), 0);
        assert_eq!(b.bridge_match_items.len(), 0);
        assert_eq!(b.bridge_match_participants.len(), 0);
        assert_eq!(b.skipped(), 1);
    }

    #[test]
    fn surrogate_keys_are_stable_across_interleaved_matches() {
        let mut b = builder();
        b.process_match(&sample_match("EUW1_109", TRACKED));
        b.process_match(&sample_match("EUW1_110", "someone-else"));
        b.process_match(&sample_match("EUW1_111", TRACKED));

        assert_eq!(b.fact_matches[0].match_key, 1);
        assert_eq!(b.fact_matches[1].match_key, 2);
        assert_eq!(b.fact_matches[0].champion_key, 1);
        assert_eq!(b.fact_matches[1].champion_key, 1);
    }

    #[test]
    fn export_writes_one_csv_per_table() {
        use std::time::{SystemTime, UNIX_EPOCH};

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock before epoch")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("star_schema_export_{}", nanos));

        let mut b = builder();
        b.process_match(&sample_match("EUW1_112", TRACKED));
        b.export_all(&dir).expect("export should succeed");

        for file in [
            "dim_champion.csv",
            "dim_date.csv",
            "dim_queue.csv",
            "dim_rune.csv",
            "dim_items.csv",
            "dim_match_metadata.csv",
            "fact_matches.csv",
            "bridge_match_items.csv",
            "bridge_match_participants.csv",
        ] {
            assert!(dir.join(file).exists(), "{} missing", file);
        }

        let fact = fs::read_to_string(dir.join("fact_matches.csv")).expect("read fact csv");
        let header = fact.lines().next().expect("header row");
        assert!(header.starts_with("match_key,champion_key,date_key,queue_key,rune_key,win"));
        assert_eq!(fact.lines().count(), 2);

        fs::remove_dir_all(&dir).ok();
    }
}
