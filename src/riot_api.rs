use crate::error::FetchError;
use crate::rate_limit::RateLimiter;
use anyhow::Result;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use serde::Deserialize;
use serde_json::Value;
use std::env;
use std::sync::Mutex;
use std::thread::sleep;
use std::time::Duration;

const MAX_ATTEMPTS: usize = 5;
const BACKOFF_BASE_SECS: u64 = 60;
const MAX_REQS_PER_WINDOW: usize = 80;
const WINDOW_SECS: u64 = 120;
const MIN_DELAY_MILLIS: u64 = 500;

#[derive(Debug, Deserialize)]
pub struct AccountResponse {
    pub puuid: String,
    #[serde(rename = "gameName")]
    pub game_name: String,
    #[serde(rename = "tagLine")]
    pub tag_line: String,
}

fn build_headers() -> Result<HeaderMap> {
    let api_key = env::var("RIOT_API_KEY")?;

    let mut headers = HeaderMap::new();
    headers.insert("X-Riot-Token", HeaderValue::from_str(&api_key)?);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    Ok(headers)
}

/// Blocking Riot API client. Each instance owns its own rate limiter, so
/// clients for different players pace their budgets independently.
pub struct RiotClient {
    client: Client,
    headers: HeaderMap,
    base_url: String,
    limiter: Mutex<RateLimiter>,
}

impl RiotClient {
    pub fn new(region: &str) -> Result<Self> {
        Self::new_with_max(region, MAX_REQS_PER_WINDOW)
    }

    pub fn new_with_max(region: &str, max_reqs_per_window: usize) -> Result<Self> {
        Ok(Self {
            client: Client::new(),
            headers: build_headers()?,
            base_url: format!("https://{}.api.riotgames.com", region),
            limiter: Mutex::new(RateLimiter::new(
                max_reqs_per_window,
                Duration::from_secs(WINDOW_SECS),
                Duration::from_millis(MIN_DELAY_MILLIS),
            )),
        })
    }

    pub fn get_account_by_riot_id(
        &self,
        game_name: &str,
        tag_line: &str,
    ) -> Result<Option<AccountResponse>> {
        let url = format!(
            "{}/riot/account/v1/accounts/by-riot-id/{}/{}",
            self.base_url, game_name, tag_line
        );

        match self.request_with_retry(&url) {
            Ok(response) => Ok(Some(response.json()?)),
            Err(FetchError::NotFound(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Lists match ids for a player, newest first. `window` bounds results to
    /// matches created within `[start_ms, end_ms]`; the API expects epoch
    /// seconds, so the bounds are converted here. A page that still fails
    /// after the retry budget is reported and comes back empty so the caller
    /// can tolerate the gap.
    pub fn get_match_ids(
        &self,
        puuid: &str,
        window: Option<(i64, i64)>,
        start: usize,
        count: usize,
        queue: Option<u32>,
    ) -> Result<Vec<String>> {
        let mut url = format!(
            "{}/lol/match/v5/matches/by-puuid/{}/ids?start={}&count={}",
            self.base_url, puuid, start, count
        );

        if let Some((start_ms, end_ms)) = window {
            url.push_str(&format!(
                "&startTime={}&endTime={}",
                start_ms / 1000,
                end_ms / 1000
            ));
        }

        if let Some(queue) = queue {
            url.push_str(&format!("&queue={}", queue));
        }

        match self.request_with_retry(&url) {
            Ok(response) => Ok(response.json()?),
            Err(FetchError::NotFound(_)) => Ok(Vec::new()),
            Err(err) => {
                eprintln!("Failed to list match ids (offset {}): {}", start, err);
                Ok(Vec::new())
            }
        }
    }

    /// Fetches one full match record. 404, an exhausted retry budget, and
    /// unexpected statuses all come back as `None`; the batch goes on.
    pub fn get_match_detail(&self, match_id: &str) -> Result<Option<Value>> {
        let url = format!("{}/lol/match/v5/matches/{}", self.base_url, match_id);

        match self.request_with_retry(&url) {
            Ok(response) => Ok(Some(response.json()?)),
            Err(FetchError::NotFound(_)) => Ok(None),
            Err(err) => {
                eprintln!("Giving up on match {}: {}", match_id, err);
                Ok(None)
            }
        }
    }

    fn request_with_retry(&self, url: &str) -> Result<reqwest::blocking::Response, FetchError> {
        let mut attempt = 0;

        loop {
            self.wait_for_slot();

            let response = match self.client.get(url).headers(self.headers.clone()).send() {
                Ok(response) => response,
                Err(err) => {
                    attempt += 1;
                    if attempt >= MAX_ATTEMPTS {
                        return Err(FetchError::Transient(format!(
                            "{} after {} attempts",
                            err, attempt
                        )));
                    }
                    let delay = backoff_delay(attempt);
                    eprintln!(
                        "Request error for {}: {}. Retrying in {}s...",
                        url,
                        err,
                        delay.as_secs()
                    );
                    sleep(delay);
                    continue;
                }
            };

            match classify_status(response.status(), url) {
                None => return Ok(response),
                Some(FetchError::RateLimited(_)) => {
                    // Retried indefinitely; does not consume an attempt.
                    let wait = parse_retry_after(&response).unwrap_or_else(|| {
                        Duration::from_secs(BACKOFF_BASE_SECS * (attempt as u64 + 1))
                    });
                    eprintln!("Rate limited on {}. Waiting {}s...", url, wait.as_secs());
                    sleep(wait);
                }
                Some(FetchError::Transient(reason)) => {
                    attempt += 1;
                    if attempt >= MAX_ATTEMPTS {
                        return Err(FetchError::Transient(format!(
                            "{} after {} attempts",
                            reason, attempt
                        )));
                    }
                    let delay = backoff_delay(attempt);
                    eprintln!(
                        "Server error for {}: {}. Retrying in {}s...",
                        url,
                        reason,
                        delay.as_secs()
                    );
                    sleep(delay);
                }
                Some(err) => return Err(err),
            }
        }
    }

    fn wait_for_slot(&self) {
        let mut limiter = self
            .limiter
            .lock()
            .expect("Rate limiter mutex poisoned while waiting");
        limiter.wait();
    }
}

fn classify_status(status: StatusCode, url: &str) -> Option<FetchError> {
    if status.is_success() {
        return None;
    }

    Some(match status {
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited(url.to_string()),
        StatusCode::NOT_FOUND => FetchError::NotFound(url.to_string()),
        s if s.is_server_error() => FetchError::Transient(format!("status {}", s)),
        s => FetchError::Status {
            status: s.as_u16(),
            url: url.to_string(),
        },
    })
}

fn backoff_delay(attempt: usize) -> Duration {
    Duration::from_secs(BACKOFF_BASE_SECS * 2u64.pow(attempt.saturating_sub(1) as u32))
}

fn parse_retry_after(response: &reqwest::blocking::Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_maps_statuses_to_the_error_taxonomy() {
        assert!(classify_status(StatusCode::OK, "u").is_none());
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, "u"),
            Some(FetchError::NotFound(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, "u"),
            Some(FetchError::RateLimited(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE, "u"),
            Some(FetchError::Transient(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, "u"),
            Some(FetchError::Status { status: 403, .. })
        ));
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(backoff_delay(1), Duration::from_secs(60));
        assert_eq!(backoff_delay(2), Duration::from_secs(120));
        assert_eq!(backoff_delay(3), Duration::from_secs(240));
    }
}
