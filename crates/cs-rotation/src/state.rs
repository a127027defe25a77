use crate::types::RotationResult;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const LAST_REPLACE_KEY: &str = "last_replace_unix";

/// Persisted rotation state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationState {
    /// Unix seconds of the last successful renewal, 0 when never rotated
    #[serde(default)]
    pub last_replace_unix: i64,
}

impl RotationState {
    /// Whole days elapsed since the last rotation
    pub fn days_since(&self, now_unix: i64) -> i64 {
        now_unix.saturating_sub(self.last_replace_unix) / 86_400
    }
}

/// Whether a rotation may proceed now. A state that never rotated always may.
pub fn is_eligible(state: &RotationState, now_unix: i64, min_interval_secs: i64, force: bool) -> bool {
    force
        || state.last_replace_unix == 0
        || now_unix.saturating_sub(state.last_replace_unix) >= min_interval_secs
}

/// JSON state file holding the last rotation timestamp
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state. A missing or unreadable file means "never rotated".
    pub fn load(&self) -> RotationState {
        match fs::read_to_string(&self.path) {
            Ok(content) => parse_state(&content),
            Err(e) => {
                debug!(path = %self.path.display(), "No rotation state: {}", e);
                RotationState::default()
            }
        }
    }

    /// Record a rotation at `now_unix`, creating parent directories as needed
    pub fn record_rotation(&self, now_unix: i64) -> RotationResult<RotationState> {
        let state = RotationState {
            last_replace_unix: now_unix,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&state)?;
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, &self.path)?;

        Ok(state)
    }
}

fn parse_state(content: &str) -> RotationState {
    match serde_json::from_str::<RotationState>(content) {
        Ok(state) if state.last_replace_unix < 0 => {
            warn!(value = state.last_replace_unix, "Negative rotation timestamp, treating as never rotated");
            RotationState::default()
        }
        Ok(state) => state,
        Err(e) => {
            warn!("Malformed rotation state, scanning for timestamp: {}", e);
            scan_state(content)
        }
    }
}

/// Take the digits after the last `:` once the key is present anywhere.
/// Anything that yields no number reads as 0.
fn scan_state(content: &str) -> RotationState {
    if !content.contains(LAST_REPLACE_KEY) {
        return RotationState::default();
    }
    let Some(colon) = content.rfind(':') else {
        return RotationState::default();
    };
    let digits: String = content[colon + 1..]
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    RotationState {
        last_replace_unix: digits.parse().unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_MIN_INTERVAL_SECS;

    #[test]
    fn test_gate_boundary() {
        let state = RotationState {
            last_replace_unix: 1_000_000,
        };
        let just_before = 1_000_000 + DEFAULT_MIN_INTERVAL_SECS - 1;
        let exactly = 1_000_000 + DEFAULT_MIN_INTERVAL_SECS;

        assert_eq!(DEFAULT_MIN_INTERVAL_SECS, 7_689_600);
        assert!(!is_eligible(&state, just_before, DEFAULT_MIN_INTERVAL_SECS, false));
        assert!(is_eligible(&state, exactly, DEFAULT_MIN_INTERVAL_SECS, false));
        assert!(is_eligible(&state, just_before, DEFAULT_MIN_INTERVAL_SECS, true));
        assert!(is_eligible(&RotationState::default(), 1, DEFAULT_MIN_INTERVAL_SECS, false));
    }

    #[test]
    fn test_extreme_timestamps_do_not_overflow() {
        let state = parse_state(r#"{"last_replace_unix": -9223372036854775808}"#);
        assert_eq!(state, RotationState::default());
        assert!(is_eligible(&state, 1_700_000_000, DEFAULT_MIN_INTERVAL_SECS, false));

        let ancient = RotationState {
            last_replace_unix: i64::MIN,
        };
        assert!(is_eligible(&ancient, 1_700_000_000, DEFAULT_MIN_INTERVAL_SECS, false));
        assert_eq!(ancient.days_since(1_700_000_000), i64::MAX / 86_400);

        let future = RotationState {
            last_replace_unix: i64::MAX,
        };
        assert!(!is_eligible(&future, i64::MIN, DEFAULT_MIN_INTERVAL_SECS, false));
        assert_eq!(future.days_since(i64::MIN), i64::MIN / 86_400);
    }

    #[test]
    fn test_days_since() {
        let state = RotationState {
            last_replace_unix: 0,
        };
        assert_eq!(state.days_since(86_400 * 3 + 5), 3);
    }

    #[test]
    fn test_missing_file_reads_as_never() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("nope.json"));
        assert_eq!(store.load(), RotationState::default());
    }

    #[test]
    fn test_record_creates_parents_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state").join("state.json"));

        store.record_rotation(1_700_000_000).unwrap();
        assert_eq!(store.load().last_replace_unix, 1_700_000_000);

        // writing the same moment twice leaves the same file
        let first = fs::read_to_string(store.path()).unwrap();
        store.record_rotation(1_700_000_000).unwrap();
        let second = fs::read_to_string(store.path()).unwrap();
        assert_eq!(first, second);
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_structured_parse() {
        assert_eq!(parse_state(r#"{"last_replace_unix": 42}"#).last_replace_unix, 42);
        assert_eq!(parse_state("{}").last_replace_unix, 0);
    }

    #[test]
    fn test_malformed_state_is_scanned() {
        assert_eq!(
            parse_state("{\"last_replace_unix\": 1700000000,").last_replace_unix,
            1_700_000_000
        );
        assert_eq!(
            parse_state("last_replace_unix: \"1699\"\n}").last_replace_unix,
            1699
        );
        assert_eq!(parse_state("garbage").last_replace_unix, 0);
        assert_eq!(parse_state("last_replace_unix: never").last_replace_unix, 0);
    }
}
