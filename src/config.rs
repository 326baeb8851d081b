use std::path::PathBuf;

pub const DEFAULT_MAX_WORKERS: usize = 8;
const ENV_MAX_WORKERS: &str = "HIVEBOT_MAX_WORKERS";
const ENV_HOME_DIR: &str = "HIVEBOT_HOME";
const CONFIG_FILENAME: &str = "config.toml";

/// Runtime knobs for the engine. Loaded once at startup: defaults, then the
/// optional `~/.hivebot/config.toml` `[engine]` table, then env overrides.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_workers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

impl EngineConfig {
    pub fn load() -> Self {
        let mut cfg = Self::default();

        let path = hivebot_home_dir().join(CONFIG_FILENAME);
        if let Ok(text) = std::fs::read_to_string(&path) {
            match parse_engine_table(&text) {
                Ok(Some(max)) => cfg.max_workers = max,
                Ok(None) => {}
                Err(e) => tracing::warn!("ignoring `{}`: {e}", path.display()),
            }
        }

        if let Ok(raw) = std::env::var(ENV_MAX_WORKERS)
            && let Ok(n) = raw.trim().parse::<usize>()
        {
            cfg.max_workers = n;
        }

        cfg.max_workers = cfg.max_workers.max(1);
        cfg
    }
}

/// Read `max_workers` from the `[engine]` table, if present.
fn parse_engine_table(text: &str) -> Result<Option<usize>, String> {
    let doc: toml::Value = toml::from_str(text).map_err(|e| format!("not valid TOML: {e}"))?;
    let Some(engine) = doc.get("engine").and_then(|v| v.as_table()) else {
        return Ok(None);
    };
    Ok(engine
        .get("max_workers")
        .and_then(|v| v.as_integer())
        .filter(|n| *n > 0)
        .map(|n| n as usize))
}

/// Returns the current user's home directory in a cross-platform way.
/// - Unix/macOS: `$HOME`
/// - Windows: `$USERPROFILE`, then `$HOMEDRIVE$HOMEPATH`
pub fn home_dir() -> Option<PathBuf> {
    if let Some(home) = std::env::var_os("HOME") {
        return Some(PathBuf::from(home));
    }
    if cfg!(target_os = "windows") {
        if let Some(profile) = std::env::var_os("USERPROFILE") {
            return Some(PathBuf::from(profile));
        }
        if let (Some(drive), Some(path)) =
            (std::env::var_os("HOMEDRIVE"), std::env::var_os("HOMEPATH"))
        {
            let mut p = PathBuf::from(drive);
            p.push(path);
            return Some(p);
        }
    }
    None
}

/// Base directory for config, `.env`, and the memory snapshot.
pub fn hivebot_home_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(ENV_HOME_DIR) {
        let p = PathBuf::from(dir);
        if !p.as_os_str().is_empty() {
            return p;
        }
    }
    if let Some(home) = home_dir() {
        return home.join(".hivebot");
    }
    PathBuf::from(".hivebot")
}
