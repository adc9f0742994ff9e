// Configuration loading and parsing (config/draft.toml).

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::draft::sequence::TOTAL_TURNS;
use crate::draft::timer::TurnTimer;
use crate::gods::GodPool;

/// Name of the single config file under `config/` and `defaults/`.
pub const CONFIG_FILE: &str = "draft.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub draft: DraftConfig,
    pub teams: TeamDefaults,
    pub db_path: String,
    /// Overrides the built-in god catalog when set.
    pub gods: Option<Vec<String>>,
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.draft.poll_interval_ms)
    }

    pub fn timer_tick(&self) -> Duration {
        Duration::from_millis(self.draft.timer_tick_ms)
    }

    pub fn turn_timer(&self) -> TurnTimer {
        TurnTimer::new(self.draft.turn_seconds)
    }

    pub fn god_pool(&self) -> GodPool {
        GodPool::from_roster(self.gods.as_deref())
    }
}

// ---------------------------------------------------------------------------
// draft.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the whole draft.toml file.
#[derive(Debug, Clone, Deserialize)]
struct DraftFile {
    draft: DraftConfig,
    teams: TeamDefaults,
    #[serde(default)]
    database: DatabaseSection,
    #[serde(default)]
    gods: GodsSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DraftConfig {
    pub turn_seconds: u32,
    pub poll_interval_ms: u64,
    pub timer_tick_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamDefaults {
    pub team1_default: String,
    pub team2_default: String,
}

impl TeamDefaults {
    /// Fill blank team names with the configured defaults.
    pub fn resolve(&self, team1: &str, team2: &str) -> (String, String) {
        let pick = |given: &str, fallback: &str| {
            let given = given.trim();
            if given.is_empty() {
                fallback.to_string()
            } else {
                given.to_string()
            }
        };
        (
            pick(team1, &self.team1_default),
            pick(team2, &self.team2_default),
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DatabaseSection {
    path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct GodsSection {
    roster: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/draft.toml` relative to `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy defaults.
/// Prefer `load_config()`, which seeds the file from `defaults/` first.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = read_file(&path)?;
    parse_config(&text, &path)
}

/// Parse and validate config text. `path` is only used in error messages.
pub fn parse_config(text: &str, path: &Path) -> Result<Config, ConfigError> {
    let file: DraftFile = toml::from_str(text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config = Config {
        draft: file.draft,
        teams: file.teams,
        db_path: file.database.path.unwrap_or_else(default_db_path),
        gods: file.gods.roster,
    };

    validate(&config)?;
    Ok(config)
}

/// Database location when `[database] path` is not given: the platform data
/// directory, or the working directory if none can be determined.
pub fn default_db_path() -> String {
    directories::ProjectDirs::from("", "", "snakedraft")
        .and_then(|dirs| {
            let dir = dirs.data_dir();
            std::fs::create_dir_all(dir).ok()?;
            dir.join("snakedraft.db").to_str().map(str::to_string)
        })
        .unwrap_or_else(|| "snakedraft.db".to_string())
}

/// Seed `config/draft.toml` from `defaults/draft.toml` if it is missing.
///
/// Returns the path written, or `None` when a config file was already there.
/// An existing file is never overwritten.
pub fn ensure_config_file(base_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let source = base_dir.join("defaults").join(CONFIG_FILE);
    let target = base_dir.join("config").join(CONFIG_FILE);
    let copy_err = |message: String| ConfigError::DefaultsCopyError { message };

    if target.exists() {
        return Ok(None);
    }
    let content = std::fs::read(&source).map_err(|e| {
        copy_err(format!(
            "no {} and cannot read {}: {e}; run from the project root",
            target.display(),
            source.display()
        ))
    })?;

    if let Some(dir) = target.parent() {
        std::fs::create_dir_all(dir)
            .map_err(|e| copy_err(format!("failed to create {}: {e}", dir.display())))?;
    }

    // `create_new` so two processes starting together cannot clobber each other.
    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&target)
    {
        Ok(mut dest) => {
            std::io::Write::write_all(&mut dest, &content)
                .map_err(|e| copy_err(format!("failed to write {}: {e}", target.display())))?;
            Ok(Some(target))
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
        Err(e) => Err(copy_err(format!(
            "failed to create {}: {e}",
            target.display()
        ))),
    }
}

/// Convenience wrapper: loads config relative to the current working directory.
/// Seeds the config file from defaults before loading.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_file(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let draft = &config.draft;
    let positive: &[(&str, u64)] = &[
        ("draft.turn_seconds", u64::from(draft.turn_seconds)),
        ("draft.poll_interval_ms", draft.poll_interval_ms),
        ("draft.timer_tick_ms", draft.timer_tick_ms),
    ];
    for (name, val) in positive {
        if *val == 0 {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: "must be > 0".into(),
            });
        }
    }

    if draft.timer_tick_ms > draft.poll_interval_ms {
        return Err(ConfigError::ValidationError {
            field: "draft.timer_tick_ms".into(),
            message: format!(
                "must not exceed poll_interval_ms ({}), got {}",
                draft.poll_interval_ms, draft.timer_tick_ms
            ),
        });
    }

    for (name, val) in [
        ("teams.team1_default", &config.teams.team1_default),
        ("teams.team2_default", &config.teams.team2_default),
    ] {
        if val.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                field: name.into(),
                message: "must not be empty".into(),
            });
        }
    }

    if config.db_path.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "database.path".into(),
            message: "must not be empty".into(),
        });
    }

    if let Some(roster) = &config.gods {
        if roster.iter().any(|g| g.trim().is_empty()) {
            return Err(ConfigError::ValidationError {
                field: "gods.roster".into(),
                message: "contains an empty name".into(),
            });
        }
        let unique: HashSet<&str> = roster.iter().map(String::as_str).collect();
        if unique.len() != roster.len() {
            return Err(ConfigError::ValidationError {
                field: "gods.roster".into(),
                message: "contains duplicate names".into(),
            });
        }
        if roster.len() < TOTAL_TURNS {
            return Err(ConfigError::ValidationError {
                field: "gods.roster".into(),
                message: format!(
                    "needs at least {TOTAL_TURNS} gods to finish a draft, got {}",
                    roster.len()
                ),
            });
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
