//! Environment variable fallbacks.
//!
//! Env vars are **fallback**, not override: they only apply to fields that
//! no config file set.

use std::collections::HashMap;

use tracing::debug;

use crate::merge::{ConfigLayer, FieldSources};

/// Mapping from environment variable name to config field path.
struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
}

/// All supported `MODHOST_*` env var mappings.
const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "MODHOST_STORAGE_ROOT",
        field_path: "storage.root",
    },
    EnvMapping {
        var_name: "MODHOST_STORAGE_DIR",
        field_path: "storage.dir_name",
    },
    EnvMapping {
        var_name: "MODHOST_BUNDLE_EXTENSION",
        field_path: "storage.bundle_extension",
    },
    EnvMapping {
        var_name: "MODHOST_VERIFIER",
        field_path: "storage.verifier",
    },
    EnvMapping {
        var_name: "MODHOST_WASM_MEMORY_LIMIT_MB",
        field_path: "wasm.memory_limit_mb",
    },
    EnvMapping {
        var_name: "MODHOST_WASM_TIMEOUT_SECS",
        field_path: "wasm.timeout_secs",
    },
    EnvMapping {
        var_name: "MODHOST_WASM_REQUIRE_HASH",
        field_path: "wasm.require_hash",
    },
    EnvMapping {
        var_name: "MODHOST_LOCALE",
        field_path: "host.locale",
    },
    EnvMapping {
        var_name: "MODHOST_ORIENTATION",
        field_path: "host.orientation",
    },
    EnvMapping {
        var_name: "MODHOST_DENSITY_DPI",
        field_path: "host.density_dpi",
    },
    EnvMapping {
        var_name: "MODHOST_LOG_LEVEL",
        field_path: "logging.level",
    },
    EnvMapping {
        var_name: "MODHOST_LOG_FORMAT",
        field_path: "logging.format",
    },
    EnvMapping {
        var_name: "MODHOST_LOG_DIR",
        field_path: "logging.log_dir",
    },
];

/// Apply environment variable fallbacks to fields that were **not** set by
/// any config file layer.
///
/// Returns the number of env vars applied.
pub fn apply_env_fallbacks<S: ::std::hash::BuildHasher>(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env_vars: &HashMap<String, String, S>,
) -> usize {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        if sources
            .get(mapping.field_path)
            .is_some_and(ConfigLayer::is_file)
        {
            continue;
        }

        if let Some(val) = env_vars.get(mapping.var_name) {
            debug!(
                var = mapping.var_name,
                field = mapping.field_path,
                "applying env var fallback"
            );
            set_field_from_string(merged, mapping.field_path, val);
            sources.insert(mapping.field_path.to_owned(), ConfigLayer::Environment);
            count = count.saturating_add(1);
        }
    }

    count
}

/// Set a dotted `section.key` field from a string value, coercing known
/// numeric and boolean fields.
fn set_field_from_string(root: &mut toml::Value, path: &str, val: &str) {
    let Some((section, key)) = path.split_once('.') else {
        return;
    };
    let Some(root) = root.as_table_mut() else {
        return;
    };
    let section = root
        .entry(section.to_owned())
        .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    if let Some(table) = section.as_table_mut() {
        table.insert(key.to_owned(), coerce_to_toml_value(path, val));
    }
}

/// Attempt to coerce a string env var value to the appropriate TOML type
/// based on the field path.
fn coerce_to_toml_value(path: &str, val: &str) -> toml::Value {
    if matches!(
        path,
        "wasm.memory_limit_mb" | "wasm.timeout_secs" | "host.density_dpi"
    ) {
        if let Ok(i) = val.parse::<i64>() {
            return toml::Value::Integer(i);
        }
    }

    if path == "wasm.require_hash" {
        if let Ok(b) = val.parse::<bool>() {
            return toml::Value::Boolean(b);
        }
    }

    toml::Value::String(val.to_owned())
}

/// Collect all current environment variables into a map.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}
