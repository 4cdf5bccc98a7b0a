//! Index tuning settings.
//!
//! Settings for a new index are rendered fresh on every use by merging
//! four ordered sources, last value wins per key:
//!
//! 1. built-in defaults
//! 2. built-in per-index defaults
//! 3. environment-wide override (config `[tuning.default]`)
//! 4. environment per-index override (config `[tuning.index.<key>]`)
//!
//! The sentinel value [`REMOVE_SETTING`] unsets a previously set key
//! instead of overwriting it. Unknown keys in any override source are a
//! hard configuration error.

use serde_json::{json, Map, Value};

use crate::config::TuningOverrides;
use crate::error::{Error, Result};

/// Sentinel: a later source may delete a key set by an earlier one.
pub const REMOVE_SETTING: &str = "__remove__";

/// The settings surface this layer is willing to manage. Anything else
/// belongs in a migration operation's explicit metadata.
const KNOWN_KEYS: &[&str] = &[
    "number_of_replicas",
    "number_of_shards",
    "refresh_interval",
    "max_result_window",
    "mapping.total_fields.limit",
];

fn builtin_defaults() -> Map<String, Value> {
    let mut defaults = Map::new();
    defaults.insert("number_of_shards".into(), json!(5));
    defaults.insert("number_of_replicas".into(), json!(0));
    defaults
}

/// Built-in per-index defaults, keyed by an adapter's settings key.
/// Deployments layer their own values on top via config.
fn builtin_index_defaults(settings_key: &str) -> Map<String, Value> {
    match settings_key {
        // Export-style indices hold large corpora read via deep scrolls.
        "exports" => {
            let mut map = Map::new();
            map.insert("max_result_window".into(), json!(1_000_000));
            map
        }
        _ => Map::new(),
    }
}

/// Merge the four tuning sources for one index.
///
/// `settings_key` selects the per-index layers; adapters without a
/// settings key only receive the index-wide layers.
pub fn render_index_tuning_settings(
    settings_key: Option<&str>,
    overrides: &TuningOverrides,
) -> Result<Map<String, Value>> {
    let mut sources: Vec<(&str, Map<String, Value>)> = vec![("defaults", builtin_defaults())];
    if let Some(key) = settings_key {
        sources.push(("index defaults", builtin_index_defaults(key)));
    }
    sources.push((
        "tuning.default",
        overrides.default.clone().into_iter().collect(),
    ));
    if let Some(key) = settings_key {
        if let Some(values) = overrides.index.get(key) {
            sources.push(("tuning.index", values.clone().into_iter().collect()));
        }
    }

    let mut merged = Map::new();
    for (name, values) in sources {
        for (key, value) in values {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                return Err(Error::InvalidTuningSettings(format!(
                    "unknown setting {key:?} in {name} source"
                )));
            }
            if value == json!(REMOVE_SETTING) {
                merged.remove(&key);
            } else {
                merged.insert(key, value);
            }
        }
    }
    Ok(merged)
}
