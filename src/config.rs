use crate::error::ConfigError;
use crate::models::RunLabel;
use crate::publish::AnnouncementTemplate;
use chrono::{DateTime, FixedOffset};
use log::warn;
use std::path::PathBuf;
use std::time::Duration;

pub const MAX_TOP_N: usize = 30;
// Upper bound for MAX_WAIT_SECONDS; the lead may not exceed the wait itself
pub const MAX_WAIT_CEILING_SECONDS: u64 = 24 * 60 * 60;

const DEFAULT_VOTE_URL: &str = "https://sugushinu-anime.jp/vote/";
const DEFAULT_MARKERS: &str = "吸血鬼すぐ死ぬ,吸血鬼すぐ死ぬ２";
const DEFAULT_TOP_N: usize = 10;
const DEFAULT_FINAL_ANCHOR: &str = "2025-10-01T18:00:00+09:00";
const DEFAULT_STOP_AT: &str = "2025-10-02T20:00:00+09:00";
const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 20;
const DEFAULT_LEAD_SECONDS: u64 = 60;
const DEFAULT_MAX_WAIT_SECONDS: u64 = 15 * 60;
const DEFAULT_PUBLIC_DIR: &str = "public";
const DEFAULT_SENTINEL: &str = ".FINAL_DONE";
const DEFAULT_GIT_REF: &str = "main";
const DEFAULT_CHART_FONT: &str = "fonts/GenEiMGothic2-Bold.ttf";
const DEFAULT_HEADLINE: &str = "中間発表";
const DEFAULT_CAMPAIGN_PERIOD: &str = "投票期間：9月19日（金）～10月3日（金）";
const DEFAULT_HASHTAGS: &str = "#吸血鬼すぐ死ぬ,#吸血鬼すぐ死ぬ２,#応援上映エッヒョッヒョ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IftttConfig {
    pub key: String,
    pub event: String,
}

/// Everything a run needs, read once at startup and never touched again.
#[derive(Debug, Clone)]
pub struct Config {
    pub vote_url: String,
    pub group_markers: Vec<String>,
    pub group_captions: Vec<String>,
    pub top_n: usize,
    pub run_label: RunLabel,
    pub final_mode: bool,
    pub final_anchor: DateTime<FixedOffset>,
    pub stop_at: DateTime<FixedOffset>,
    pub poll_interval: Duration,
    pub lead_seconds: i64,
    pub max_wait: Duration,
    pub public_dir: PathBuf,
    pub chart_font: PathBuf,
    pub sentinel_path: PathBuf,
    pub git_publish: bool,
    pub github_repository: Option<String>,
    pub github_ref: String,
    pub ifttt: Option<IftttConfig>,
    pub template: AnnouncementTemplate,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let vote_url = get("VOTE_URL").unwrap_or_else(|| DEFAULT_VOTE_URL.to_string());

        let group_markers = split_list(&get("GROUP_MARKERS").unwrap_or_else(|| DEFAULT_MARKERS.to_string()));
        if group_markers.is_empty() {
            return Err(ConfigError::Empty { key: "GROUP_MARKERS" });
        }
        let group_captions = get("GROUP_CAPTIONS")
            .map(|raw| split_list(&raw))
            .unwrap_or_else(|| group_markers.clone());

        let top_n = match get("TOP_N") {
            Some(raw) => parse_top_n(&raw)?,
            None => DEFAULT_TOP_N,
        };

        let run_label_raw = get("RUN_LABEL").unwrap_or_default();
        let run_label = RunLabel::parse(&run_label_raw).ok_or(ConfigError::Invalid {
            key: "RUN_LABEL",
            expected: "run label (AM, PM or empty)",
            value: run_label_raw.clone(),
        })?;

        let final_mode = parse_flag("FINAL_MODE", get("FINAL_MODE"), false)?;
        let final_anchor = parse_instant("FINAL_ANCHOR_JST", get("FINAL_ANCHOR_JST"), DEFAULT_FINAL_ANCHOR)?;
        let stop_at = parse_instant("STOP_AT_JST", get("STOP_AT_JST"), DEFAULT_STOP_AT)?;

        let poll_interval = parse_seconds("POLL_INTERVAL_SECONDS", get("POLL_INTERVAL_SECONDS"), DEFAULT_POLL_INTERVAL_SECONDS)?;
        if poll_interval.is_zero() {
            return Err(ConfigError::Invalid {
                key: "POLL_INTERVAL_SECONDS",
                expected: "positive number of seconds",
                value: "0".into(),
            });
        }
        let lead = parse_seconds("PRE_ANCHOR_LEAD_SECONDS", get("PRE_ANCHOR_LEAD_SECONDS"), DEFAULT_LEAD_SECONDS)?;
        let max_wait = parse_seconds("MAX_WAIT_SECONDS", get("MAX_WAIT_SECONDS"), DEFAULT_MAX_WAIT_SECONDS)?;
        if max_wait.as_secs() > MAX_WAIT_CEILING_SECONDS {
            return Err(ConfigError::Invalid {
                key: "MAX_WAIT_SECONDS",
                expected: "number of seconds no larger than one day",
                value: max_wait.as_secs().to_string(),
            });
        }
        let lead_invalid = || ConfigError::Invalid {
            key: "PRE_ANCHOR_LEAD_SECONDS",
            expected: "number of seconds no larger than MAX_WAIT_SECONDS",
            value: lead.as_secs().to_string(),
        };
        if lead > max_wait {
            return Err(lead_invalid());
        }
        let lead_seconds = i64::try_from(lead.as_secs()).map_err(|_| lead_invalid())?;

        let git_publish = parse_flag("GIT_PUBLISH", get("GIT_PUBLISH"), true)?;
        let github_repository = get("GITHUB_REPOSITORY");
        if git_publish && github_repository.is_none() {
            return Err(ConfigError::Empty { key: "GITHUB_REPOSITORY" });
        }

        let ifttt = match (get("IFTTT_KEY"), get("IFTTT_EVENT")) {
            (Some(key), Some(event)) => Some(IftttConfig { key, event }),
            _ => None,
        };

        let template = AnnouncementTemplate {
            headline: DEFAULT_HEADLINE.to_string(),
            campaign_period: get("CAMPAIGN_PERIOD").unwrap_or_else(|| DEFAULT_CAMPAIGN_PERIOD.to_string()),
            vote_url: vote_url.clone(),
            hashtags: split_list(&get("HASHTAGS").unwrap_or_else(|| DEFAULT_HASHTAGS.to_string())),
        };

        Ok(Self {
            vote_url,
            group_markers,
            group_captions,
            top_n,
            run_label,
            final_mode,
            final_anchor,
            stop_at,
            poll_interval,
            lead_seconds,
            max_wait,
            public_dir: PathBuf::from(get("PUBLIC_DIR").unwrap_or_else(|| DEFAULT_PUBLIC_DIR.to_string())),
            chart_font: PathBuf::from(get("CHART_FONT").unwrap_or_else(|| DEFAULT_CHART_FONT.to_string())),
            sentinel_path: PathBuf::from(get("FINAL_SENTINEL").unwrap_or_else(|| DEFAULT_SENTINEL.to_string())),
            git_publish,
            github_repository,
            github_ref: get("GITHUB_REF_NAME").unwrap_or_else(|| DEFAULT_GIT_REF.to_string()),
            ifttt,
            template,
        })
    }

    // Campaign wall-clock offset, taken from the configured final anchor
    pub fn offset(&self) -> FixedOffset {
        *self.final_anchor.offset()
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_top_n(raw: &str) -> Result<usize, ConfigError> {
    let n: usize = raw.parse().map_err(|_| ConfigError::Invalid {
        key: "TOP_N",
        expected: "positive integer",
        value: raw.to_string(),
    })?;
    if n == 0 {
        return Err(ConfigError::Invalid {
            key: "TOP_N",
            expected: "positive integer",
            value: raw.to_string(),
        });
    }
    if n > MAX_TOP_N {
        warn!("TOP_N={} exceeds the maximum; using {}", n, MAX_TOP_N);
        return Ok(MAX_TOP_N);
    }
    Ok(n)
}

fn parse_flag(key: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            expected: "boolean flag",
            value: raw,
        }),
    }
}

fn parse_instant(
    key: &'static str,
    raw: Option<String>,
    default: &str,
) -> Result<DateTime<FixedOffset>, ConfigError> {
    let raw = raw.unwrap_or_else(|| default.to_string());
    DateTime::parse_from_rfc3339(&raw).map_err(|_| ConfigError::Invalid {
        key,
        expected: "ISO-8601 timestamp with UTC offset",
        value: raw,
    })
}

fn parse_seconds(key: &'static str, raw: Option<String>, default: u64) -> Result<Duration, ConfigError> {
    let Some(raw) = raw else {
        return Ok(Duration::from_secs(default));
    };
    raw.parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| ConfigError::Invalid {
            key,
            expected: "number of seconds",
            value: raw,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::instant;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_match_the_campaign() {
        let cfg = config(&[("GITHUB_REPOSITORY", "octo/votes")]).unwrap();
        assert_eq!(cfg.top_n, 10);
        assert_eq!(cfg.group_markers, vec!["吸血鬼すぐ死ぬ", "吸血鬼すぐ死ぬ２"]);
        assert_eq!(cfg.group_captions, cfg.group_markers);
        assert_eq!(cfg.run_label, RunLabel::Unset);
        assert!(!cfg.final_mode);
        assert_eq!(cfg.final_anchor, instant("2025-10-01T18:00:00+09:00"));
        assert_eq!(cfg.stop_at, instant("2025-10-02T20:00:00+09:00"));
        assert_eq!(cfg.poll_interval, Duration::from_secs(20));
        assert_eq!(cfg.lead_seconds, 60);
        assert_eq!(cfg.max_wait, Duration::from_secs(900));
        assert_eq!(cfg.sentinel_path, PathBuf::from(".FINAL_DONE"));
        assert_eq!(cfg.chart_font, PathBuf::from("fonts/GenEiMGothic2-Bold.ttf"));
        assert_eq!(cfg.github_ref, "main");
        assert!(cfg.ifttt.is_none());
        assert_eq!(cfg.offset(), FixedOffset::east_opt(9 * 3600).unwrap());
        assert_eq!(cfg.template.hashtags.len(), 3);
    }

    #[test]
    fn reads_overrides() {
        let cfg = config(&[
            ("GIT_PUBLISH", "0"),
            ("TOP_N", "5"),
            ("RUN_LABEL", "pm"),
            ("FINAL_MODE", "1"),
            ("FINAL_ANCHOR_JST", "2025-10-03T18:00:00+09:00"),
            ("POLL_INTERVAL_SECONDS", "10"),
            ("PRE_ANCHOR_LEAD_SECONDS", "90"),
            ("GROUP_MARKERS", "Alpha, Beta"),
            ("IFTTT_KEY", "k"),
            ("IFTTT_EVENT", "e"),
        ])
        .unwrap();
        assert_eq!(cfg.top_n, 5);
        assert_eq!(cfg.run_label, RunLabel::SecondCheckpoint);
        assert!(cfg.final_mode);
        assert!(!cfg.git_publish);
        assert_eq!(cfg.final_anchor, instant("2025-10-03T18:00:00+09:00"));
        assert_eq!(cfg.poll_interval, Duration::from_secs(10));
        assert_eq!(cfg.lead_seconds, 90);
        assert_eq!(cfg.group_markers, vec!["Alpha", "Beta"]);
        assert_eq!(
            cfg.ifttt,
            Some(IftttConfig {
                key: "k".into(),
                event: "e".into()
            })
        );
    }

    #[test]
    fn top_n_is_capped_and_must_be_positive() {
        let capped = config(&[("GIT_PUBLISH", "0"), ("TOP_N", "500")]).unwrap();
        assert_eq!(capped.top_n, MAX_TOP_N);
        assert!(config(&[("GIT_PUBLISH", "0"), ("TOP_N", "0")]).is_err());
        assert!(config(&[("GIT_PUBLISH", "0"), ("TOP_N", "-3")]).is_err());
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(config(&[("GIT_PUBLISH", "0"), ("RUN_LABEL", "noon")]).is_err());
        assert!(config(&[("GIT_PUBLISH", "0"), ("FINAL_MODE", "maybe")]).is_err());
        assert!(config(&[("GIT_PUBLISH", "0"), ("FINAL_ANCHOR_JST", "2025-10-01 18:00")]).is_err());
        assert!(config(&[("GIT_PUBLISH", "0"), ("POLL_INTERVAL_SECONDS", "0")]).is_err());
        assert!(config(&[("GIT_PUBLISH", "0"), ("GROUP_MARKERS", " , ")]).is_err());
    }

    #[test]
    fn lead_and_wait_are_bounded() {
        let huge_lead = config(&[
            ("GIT_PUBLISH", "0"),
            ("FINAL_MODE", "1"),
            ("PRE_ANCHOR_LEAD_SECONDS", "100000000000000"),
        ]);
        assert!(matches!(
            huge_lead,
            Err(ConfigError::Invalid { key: "PRE_ANCHOR_LEAD_SECONDS", .. })
        ));

        let past_wait = config(&[
            ("GIT_PUBLISH", "0"),
            ("PRE_ANCHOR_LEAD_SECONDS", "120"),
            ("MAX_WAIT_SECONDS", "60"),
        ]);
        assert!(matches!(
            past_wait,
            Err(ConfigError::Invalid { key: "PRE_ANCHOR_LEAD_SECONDS", .. })
        ));

        let huge_wait = config(&[("GIT_PUBLISH", "0"), ("MAX_WAIT_SECONDS", "86401")]);
        assert!(matches!(
            huge_wait,
            Err(ConfigError::Invalid { key: "MAX_WAIT_SECONDS", .. })
        ));

        let edge = config(&[
            ("GIT_PUBLISH", "0"),
            ("PRE_ANCHOR_LEAD_SECONDS", "86400"),
            ("MAX_WAIT_SECONDS", "86400"),
        ])
        .unwrap();
        assert_eq!(edge.lead_seconds, 86_400);
    }

    #[test]
    fn git_publishing_needs_a_repository() {
        assert!(matches!(
            config(&[]),
            Err(ConfigError::Empty { key: "GITHUB_REPOSITORY" })
        ));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let cfg = config(&[("GIT_PUBLISH", "0"), ("TOP_N", "  "), ("IFTTT_KEY", "k"), ("IFTTT_EVENT", "")]).unwrap();
        assert_eq!(cfg.top_n, 10);
        assert!(cfg.ifttt.is_none());
    }
}
