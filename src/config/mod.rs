/// Configuration system for pulse.
///
/// Layers, lowest to highest precedence:
///
/// 1. **Built-in defaults**: [`schema::PulseConfig::default()`]
/// 2. **User global config**: `~/.nginxpulse/config.toml`
/// 3. **Project local config**: `.nginxpulse.toml` in the current directory
/// 4. **Environment variables**: `PULSE_*` overrides
///
/// File layers are merged key by key: a project file that only sets
/// `server.base_url` keeps the global file's `logging` section.
///
/// # Usage
///
/// ```rust,ignore
/// use pulse_query::{api::StatsClient, config};
///
/// let client = StatsClient::from_config(&config::load());
/// ```
pub mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub use schema::PulseConfig;

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the fully resolved configuration: defaults → global TOML → project
/// TOML → env vars.
pub fn load() -> PulseConfig {
    let mut config = load_files(&[global_config_path(), project_config_path()]);
    apply_env_overrides(&mut config);
    config
}

/// Merge the given TOML files over the defaults, in order.
///
/// Missing or malformed files are skipped; a broken config file must not
/// stop a query from running with defaults.
pub fn load_files(paths: &[Option<PathBuf>]) -> PulseConfig {
    let Ok(mut merged) = toml::Value::try_from(PulseConfig::default()) else {
        return PulseConfig::default();
    };

    for path in paths.iter().flatten() {
        if let Some(overlay) = load_toml_value(path) {
            merge_values(&mut merged, overlay);
        }
    }

    merged.try_into().unwrap_or_default()
}

fn load_toml_value(path: &Path) -> Option<toml::Value> {
    let content = fs::read_to_string(path).ok()?;
    let value: toml::Value = toml::from_str(&content).ok()?;
    // Reject files whose shape doesn't fit the schema at all.
    value.clone().try_into::<PulseConfig>().ok()?;
    Some(value)
}

/// Recursively overlay `overlay` onto `base`. Tables merge key by key; any
/// other value replaces what was there.
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

// ---------------------------------------------------------------------------
// File paths
// ---------------------------------------------------------------------------

/// `~/.nginxpulse/config.toml`.
fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".nginxpulse").join("config.toml"))
}

/// `.nginxpulse.toml` in the current directory.
fn project_config_path() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .map(|cwd| cwd.join(".nginxpulse.toml"))
}

/// Path to the global config file for display/init purposes.
pub fn global_config_file() -> Option<PathBuf> {
    global_config_path()
}

/// Path to the project config file for display purposes.
pub fn project_config_file() -> Option<PathBuf> {
    project_config_path()
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides (highest precedence layer).
///
/// - `PULSE_BASE_URL`: backend base URL
/// - `PULSE_TIMEOUT_MS`: request timeout
/// - `PULSE_ACCESS_KEY`: access key (overrides the key file)
/// - `PULSE_LOG`: request logging on/off (`1`/`true`/`yes`/`on`)
fn apply_env_overrides(config: &mut PulseConfig) {
    if let Ok(val) = std::env::var("PULSE_BASE_URL")
        && !val.trim().is_empty()
    {
        config.server.base_url = val.trim().to_string();
    }
    if let Ok(val) = std::env::var("PULSE_TIMEOUT_MS")
        && let Ok(ms) = val.trim().parse::<u64>()
        && ms > 0
    {
        config.server.timeout_ms = ms;
    }
    if let Ok(val) = std::env::var("PULSE_ACCESS_KEY")
        && !val.trim().is_empty()
    {
        config.auth.access_key = Some(val.trim().to_string());
    }
    if let Ok(val) = std::env::var("PULSE_LOG") {
        config.logging.enabled = is_truthy(&val);
    }
}

/// Check if a string value represents a truthy boolean.
pub(crate) fn is_truthy(val: &str) -> bool {
    matches!(
        val.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

// ---------------------------------------------------------------------------
// Config init / set / reset
// ---------------------------------------------------------------------------

/// Write the annotated default config to `~/.nginxpulse/config.toml`.
///
/// Fails if the file exists, unless `force` is set.
pub fn init_config(force: bool) -> Result<PathBuf> {
    let path = global_config_path().context("could not determine home directory")?;

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create ~/.nginxpulse/ directory")?;
    }

    fs::write(&path, PulseConfig::default_toml()).context("failed to write config file")?;

    Ok(path)
}

/// Set a dotted key (e.g. `server.base_url`) in the global config file.
pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let path = global_config_path().context("could not determine home directory")?;
    set_config_value_in(&path, key, value)
}

/// Set a dotted key in the config file at `path`, creating it from the
/// defaults if it does not exist yet.
pub fn set_config_value_in(path: &Path, key: &str, value: &str) -> Result<()> {
    let content = if path.exists() {
        fs::read_to_string(path).context("failed to read config file")?
    } else {
        toml::to_string_pretty(&PulseConfig::default())
            .context("failed to serialize default config")?
    };

    let mut root: toml::Value =
        toml::from_str(&content).context("failed to parse config as TOML value")?;
    set_toml_value(&mut root, key, value)?;

    // The result must still load, or every later command silently falls back.
    let updated = root
        .clone()
        .try_into::<PulseConfig>()
        .with_context(|| format!("invalid value for '{key}': {value}"))?;
    if updated.server.timeout_ms == 0 {
        anyhow::bail!("server.timeout_ms must be greater than 0");
    }

    let output = toml::to_string_pretty(&root).context("failed to serialize updated config")?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create config directory")?;
    }
    fs::write(path, output).context("failed to write config file")?;

    Ok(())
}

/// Set a value in a TOML value tree using a dotted key path.
///
/// Unknown leaves in a known section are inserted as strings, which lets
/// `auth.access_key` be set even though it is omitted from the defaults.
fn set_toml_value(root: &mut toml::Value, key: &str, raw_value: &str) -> Result<()> {
    let parts: Vec<&str> = key.split('.').filter(|p| !p.is_empty()).collect();
    let Some((leaf, sections)) = parts.split_last() else {
        anyhow::bail!("empty config key");
    };

    let mut current = root;
    for &part in sections {
        current = current
            .get_mut(part)
            .with_context(|| format!("config key not found: section '{part}' in '{key}'"))?;
    }

    let table = current.as_table_mut().with_context(|| {
        format!(
            "expected table at '{}'",
            key.rsplit_once('.').map(|(s, _)| s).unwrap_or("")
        )
    })?;

    let new_value = match table.get(*leaf) {
        Some(toml::Value::Boolean(_)) => toml::Value::Boolean(is_truthy(raw_value)),
        Some(toml::Value::Integer(_)) => {
            let n: i64 = raw_value
                .trim()
                .parse()
                .with_context(|| format!("expected integer for '{key}', got '{raw_value}'"))?;
            toml::Value::Integer(n)
        }
        Some(toml::Value::Table(_)) => {
            anyhow::bail!("'{key}' is a section, not a value")
        }
        _ => toml::Value::String(raw_value.to_string()),
    };

    table.insert(leaf.to_string(), new_value);
    Ok(())
}

/// Reset the global config to defaults (overwrite the file).
pub fn reset_config() -> Result<PathBuf> {
    init_config(true)
}

/// The effective (fully resolved) config as TOML. The access key is masked.
pub fn show_effective_config() -> Result<String> {
    let mut config = load();
    if config.auth.access_key.is_some() {
        config.auth.access_key = Some("***".to_string());
    }
    toml::to_string_pretty(&config).context("failed to serialize effective config")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
