//! Phase inference from plotting engine logs.
//!
//! Every call re-reads the whole log text. The result depends only on the
//! cumulative content, so a writer that buffers or reorders lines is
//! tolerated.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::types::Phase;

/// Log line grammar of a plotting engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogDialect {
    /// `chia plots create`.
    ChiaPlotter,
    /// The madMAx fast plotter.
    MadMax,
}

/// Identity and start time read from the top of a log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogHeader {
    pub plot_id: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
}

impl LogHeader {
    /// Both the plot id and the start marker were found.
    pub fn is_complete(&self) -> bool {
        self.plot_id.is_some() && self.start_time.is_some()
    }
}

// "Starting phase 1/4: Forward Propagation into tmp files... Sat Oct 31 11:27:04 2020"
static STARTING_PHASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Starting phase (\d)").expect("valid regex"));
// "Computing table 2"
static COMPUTING_TABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Computing table (\d)").expect("valid regex"));
// "Backpropagating on table 2"
static BACKPROPAGATING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Backpropagating on table (\d)").expect("valid regex"));
// "Compressing tables 4 and 5"
static COMPRESSING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Compressing tables (\d) and (\d)").expect("valid regex"));

// "[P1] Table 1 took 10.7436 sec"
// "[P2] Table 7 rewrite took 7.6 sec, dropped 0 entries (0 %)"
// "[P3-1] Table 2 took 26.8535 sec, wrote 3429434557 right entries"
static MADMAX_TABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[P(\d)[^\]]*\] Table (\d+) .*took").expect("valid regex"));
// "Phase 1 took 631.199 sec"
static MADMAX_PHASE_DONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Phase (\d) took").expect("valid regex"));

static CHIA_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^ID: ([0-9a-f]*)").expect("valid regex"));
static CHIA_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Starting phase 1/4:.*\.\.\. (.*)").expect("valid regex"));
// "Plot Name: plot-k32-2021-06-14-18-07-<id>"
static MADMAX_PLOT_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Plot Name: plot-k\d+-(\d{4}-\d{2}-\d{2}-\d{2}-\d{2})-([0-9a-f]+)")
        .expect("valid regex")
});

/// Infer the current phase from the full text of a job's log.
pub fn parse_phase(dialect: LogDialect, text: &str) -> Phase {
    let subphases = match dialect {
        LogDialect::ChiaPlotter => chia_subphases(text),
        LogDialect::MadMax => madmax_subphases(text),
    };

    match subphases.last_key_value() {
        Some((&major, &minor)) => Phase::new(major, minor),
        None => Phase::not_started(),
    }
}

/// Read plot id and start time from a log.
pub fn parse_log_header(dialect: LogDialect, text: &str) -> LogHeader {
    match dialect {
        LogDialect::ChiaPlotter => chia_header(text),
        LogDialect::MadMax => madmax_header(text),
    }
}

fn capture_u32(caps: &regex_lite::Captures<'_>, idx: usize) -> Option<u32> {
    caps.get(idx).and_then(|m| m.as_str().parse().ok())
}

fn raise(subphases: &mut BTreeMap<u32, u32>, major: u32, minor: u32) {
    let entry = subphases.entry(major).or_insert(0);
    *entry = (*entry).max(minor);
}

// Phase 1 subphases are <started>, table1, table2, ...
// Phase 2 subphases are <started>, table7, table6, ...
// Phase 3 subphases are <started>, tables1&2, tables2&3, ...
// Phase 4 subphases are <started>
fn chia_subphases(text: &str) -> BTreeMap<u32, u32> {
    let mut subphases = BTreeMap::new();

    for line in text.lines() {
        if let Some(major) = STARTING_PHASE.captures(line).and_then(|c| capture_u32(&c, 1)) {
            subphases.insert(major, 0);
        } else if let Some(table) = COMPUTING_TABLE.captures(line).and_then(|c| capture_u32(&c, 1)) {
            raise(&mut subphases, 1, table);
        } else if let Some(table) = BACKPROPAGATING.captures(line).and_then(|c| capture_u32(&c, 1)) {
            raise(&mut subphases, 2, 7u32.saturating_sub(table));
        } else if let Some(first) = COMPRESSING.captures(line).and_then(|c| capture_u32(&c, 1)) {
            raise(&mut subphases, 3, first);
        }
    }

    subphases
}

fn madmax_subphases(text: &str) -> BTreeMap<u32, u32> {
    // Phase 1 has no start marker.
    let mut subphases = BTreeMap::from([(1, 1)]);

    for line in text.lines() {
        if let Some(caps) = MADMAX_TABLE.captures(line) {
            let (Some(major), Some(table)) = (capture_u32(&caps, 1), capture_u32(&caps, 2)) else {
                continue;
            };
            let minor = if major == 2 {
                let pass = if line.contains("rewrite") { 2 } else { 1 };
                7u32.saturating_sub(table) + pass
            } else {
                table + 1
            };
            raise(&mut subphases, major, minor);
        } else if let Some(done) = MADMAX_PHASE_DONE.captures(line).and_then(|c| capture_u32(&c, 1)) {
            raise(&mut subphases, done + 1, 1);
        }
    }

    subphases
}

fn chia_header(text: &str) -> LogHeader {
    let mut header = LogHeader::default();

    for line in text.lines() {
        if let Some(caps) = CHIA_ID.captures(line) {
            header.plot_id = caps.get(1).map(|m| m.as_str().to_string());
        }
        if let Some(caps) = CHIA_START.captures(line) {
            // "Mon Nov  2 08:39:53 2020"
            header.start_time = caps
                .get(1)
                .and_then(|m| parse_local_time(m.as_str(), "%a %b %d %H:%M:%S %Y"));
            break;
        }
    }

    header
}

fn madmax_header(text: &str) -> LogHeader {
    for line in text.lines() {
        if let Some(caps) = MADMAX_PLOT_NAME.captures(line) {
            let stamp = caps.get(1).map(|m| format!("{}-00", m.as_str()));
            return LogHeader {
                plot_id: caps.get(2).map(|m| m.as_str().to_string()),
                start_time: stamp
                    .as_deref()
                    .and_then(|s| parse_local_time(s, "%Y-%m-%d-%H-%M-%S")),
            };
        }
    }

    LogHeader::default()
}

/// Parse a timestamp written in the plotting host's local time.
fn parse_local_time(raw: &str, format: &str) -> Option<DateTime<Utc>> {
    let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let naive = NaiveDateTime::parse_from_str(&normalized, format).ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}
