use crate::players::Player;
use crate::riot_api::RiotClient;
use anyhow::{Context, Result, bail};
use chrono::{TimeZone, Utc};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

const PAGE_SIZE: usize = 100;
const SAVE_EVERY: usize = 20;

#[derive(Debug, Default)]
pub struct FetchSummary {
    pub fetched: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Fetches all matches for a player between two months (inclusive), one raw
/// JSON array per month under `out_dir/<player id>/`. Per-item failures are
/// reported and skipped; only whole-run preconditions abort.
pub fn fetch_player(
    client: &RiotClient,
    player: &Player,
    from: &str,
    to: &str,
    queues: &[u32],
    out_dir: &Path,
) -> Result<FetchSummary> {
    let months = month_range(from, to)?;

    let player_dir = out_dir.join(&player.id);
    fs::create_dir_all(&player_dir)
        .with_context(|| format!("cannot create {}", player_dir.display()))?;

    eprintln!(
        "Fetching {} ({}): {} month(s), queues {:?}",
        player.display_name, player.riot_id, months.len(), queues
    );

    let mut summary = FetchSummary::default();

    for (year, month) in months {
        let month_key = format!("{:04}-{:02}", year, month);
        let Some(window) = month_window(year, month) else {
            eprintln!("Skipping invalid month {}", month_key);
            continue;
        };

        let month_summary =
            extract_month(client, player, &month_key, window, queues, &player_dir)?;
        summary.fetched += month_summary.fetched;
        summary.skipped += month_summary.skipped;
        summary.failed += month_summary.failed;
    }

    eprintln!(
        "Fetch complete for {}: {} fetched, {} skipped, {} failed",
        player.id, summary.fetched, summary.skipped, summary.failed
    );

    Ok(summary)
}

fn extract_month(
    client: &RiotClient,
    player: &Player,
    month_key: &str,
    window: (i64, i64),
    queues: &[u32],
    player_dir: &Path,
) -> Result<FetchSummary> {
    let output_file = player_dir.join(format!("raw_matches_{}.json", month_key));
    eprintln!("Extracting {}...", month_key);

    let mut summary = FetchSummary::default();
    let mut matches: Vec<Value> = Vec::new();
    let mut seen_match_ids: HashSet<String> = HashSet::new();

    for &queue in queues {
        let mut start_index = 0;

        loop {
            let match_ids =
                client.get_match_ids(&player.puuid, Some(window), start_index, PAGE_SIZE, Some(queue))?;

            if match_ids.is_empty() {
                break;
            }

            eprintln!(
                "  queue {}: {} match ids (offset {})",
                queue,
                match_ids.len(),
                start_index
            );

            let page_len = match_ids.len();
            for (index, match_id) in match_ids.into_iter().enumerate() {
                if !seen_match_ids.insert(match_id.clone()) {
                    summary.skipped += 1;
                    continue;
                }

                eprintln!("  [{}/{}] fetching {}", index + 1, page_len, match_id);

                let Some(detail) = client.get_match_detail(&match_id)? else {
                    summary.failed += 1;
                    continue;
                };

                // The listing endpoint can leak matches just outside the
                // requested window or queue; re-validate before keeping.
                if !matches_window_and_queue(&detail, window, queue) {
                    summary.skipped += 1;
                    continue;
                }

                matches.push(detail);
                summary.fetched += 1;

                if matches.len() % SAVE_EVERY == 0 {
                    save_batch(&output_file, &matches)?;
                    eprintln!("  progress saved: {} matches", matches.len());
                }
            }

            // A short page means the listing is exhausted.
            if page_len < PAGE_SIZE {
                break;
            }
            start_index += PAGE_SIZE;
        }
    }

    save_batch(&output_file, &matches)?;
    eprintln!("  {} matches for {}", matches.len(), month_key);

    Ok(summary)
}

fn matches_window_and_queue(detail: &Value, window: (i64, i64), queue: u32) -> bool {
    let Some(info) = detail.get("info") else {
        return false;
    };

    let queue_ok = info
        .get("queueId")
        .and_then(|q| q.as_i64())
        .map(|q| q == queue as i64)
        .unwrap_or(false);

    let creation_ok = info
        .get("gameCreation")
        .and_then(|c| c.as_i64())
        .map(|c| window.0 <= c && c <= window.1)
        .unwrap_or(false);

    queue_ok && creation_ok
}

fn save_batch(path: &PathBuf, matches: &[Value]) -> Result<()> {
    let serialized = serde_json::to_vec_pretty(&matches)?;
    fs::write(path, serialized).with_context(|| format!("cannot write {}", path.display()))?;
    Ok(())
}

/// Inclusive list of (year, month) pairs between two `YYYY-MM` strings.
fn month_range(from: &str, to: &str) -> Result<Vec<(i32, u32)>> {
    let (mut year, mut month) = parse_month(from)?;
    let (end_year, end_month) = parse_month(to)?;

    if (year, month) > (end_year, end_month) {
        bail!("--from {} is after --to {}", from, to);
    }

    let mut months = Vec::new();
    while (year, month) <= (end_year, end_month) {
        months.push((year, month));
        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
    }
    Ok(months)
}

fn parse_month(value: &str) -> Result<(i32, u32)> {
    let Some((year, month)) = value.split_once('-') else {
        bail!("month '{}' is not in YYYY-MM form", value);
    };
    let year: i32 = year.parse().with_context(|| format!("bad year in '{}'", value))?;
    let month: u32 = month.parse().with_context(|| format!("bad month in '{}'", value))?;
    if !(1..=12).contains(&month) {
        bail!("month '{}' is out of range", value);
    }
    Ok((year, month))
}

/// `[first millisecond of the month, last millisecond of the month]` in UTC.
fn month_window(year: i32, month: u32) -> Option<(i64, i64)> {
    let start = Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()?;
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let end = Utc
        .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
        .single()?;

    Some((start.timestamp_millis(), end.timestamp_millis() - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn month_window_bounds_are_exact_milliseconds() {
        assert_eq!(
            month_window(2024, 1),
            Some((1_704_067_200_000, 1_706_745_599_999))
        );
        // Leap February.
        assert_eq!(
            month_window(2024, 2),
            Some((1_706_745_600_000, 1_709_251_199_999))
        );
        // Year rollover.
        assert_eq!(
            month_window(2024, 12),
            Some((1_733_011_200_000, 1_735_689_599_999))
        );
    }

    #[test]
    fn month_range_is_inclusive_and_crosses_years() {
        let months = month_range("2024-11", "2025-02").expect("valid range");
        assert_eq!(
            months,
            vec![(2024, 11), (2024, 12), (2025, 1), (2025, 2)]
        );
    }

    #[test]
    fn month_range_rejects_malformed_input() {
        assert!(month_range("2024-13", "2024-12").is_err());
        assert!(month_range("202401", "2024-12").is_err());
        assert!(month_range("2024-05", "2024-01").is_err());
    }

    #[test]
    fn revalidation_drops_out_of_window_and_wrong_queue_matches() {
        let window = month_window(2024, 1).expect("window");
        let in_window = json!({ "info": { "queueId": 420, "gameCreation": window.0 + 1000 } });
        let wrong_queue = json!({ "info": { "queueId": 400, "gameCreation": window.0 + 1000 } });
        let too_late = json!({ "info": { "queueId": 420, "gameCreation": window.1 + 1 } });
        let no_info = json!({ "metadata": {} });

        assert!(matches_window_and_queue(&in_window, window, 420));
        assert!(!matches_window_and_queue(&wrong_queue, window, 420));
        assert!(!matches_window_and_queue(&too_late, window, 420));
        assert!(!matches_window_and_queue(&no_info, window, 420));
    }
}
