//! Configuration loading and environment parsing.

use super::validation::validate_config;
use super::Config;
use serde_json::Value;
use std::fs;
use std::path::Path;

const CONFIG_JSON_VAR: &str = "TLS_ROTOR_CONFIG_JSON";
const CONFIG_STDIN_VAR: &str = "TLS_ROTOR_CONFIG_STDIN";
const CONFIG_PATH_VAR: &str = "TLS_ROTOR_CONFIG_PATH";
const OVERRIDE_PREFIX: &str = "TLS_ROTOR__";

/// Load configuration with the following precedence (highest first):
/// 1) `TLS_ROTOR_CONFIG_JSON` env var containing raw JSON
/// 2) If `TLS_ROTOR_CONFIG_STDIN=true/1`, read JSON from stdin
/// 3) File pointed by `TLS_ROTOR_CONFIG_PATH` env var
/// 4) config.json in current working directory
/// 5) config.json next to the executable (application directory)
/// 6) Defaults compiled into the binary
///
/// Individual fields can then be overridden by environment variables with
/// prefix `TLS_ROTOR__`, using `__` as the nested separator, e.g.
/// `TLS_ROTOR__PORT=9443` or `TLS_ROTOR__TLS__SESSION_TICKETS__RING_SIZE=8`.
/// Comma-separated values become arrays.
///
/// Read and parse errors are printed to stderr and the remaining sources are
/// used. Validation problems are reported but not propagated; callers that
/// need a hard failure call [`validate_config`] themselves.
#[must_use]
pub fn load() -> Config {
    use std::env;
    use std::io::Read;
    use std::path::PathBuf;

    let defaults = Config::default();
    let mut merged =
        serde_json::to_value(&defaults).unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

    // Lowest precedence first, so later sources win.
    if let Ok(exe_path) = env::current_exe() {
        if let Some(mut exe_dir) = exe_path.parent().map(Path::to_path_buf) {
            exe_dir.push("config.json");
            merge_file_source(&mut merged, &exe_dir);
        }
    }

    merge_file_source(&mut merged, &PathBuf::from("config.json"));

    if let Ok(path) = env::var(CONFIG_PATH_VAR) {
        merge_file_source(&mut merged, &PathBuf::from(path));
    }

    if let Ok(val) = env::var(CONFIG_STDIN_VAR) {
        if env_var_truthy(&val) {
            let mut buf = String::new();
            if let Err(e) = std::io::stdin().read_to_string(&mut buf) {
                eprintln!("Failed to read config from stdin: {e}");
            } else if let Some(value) = parse_json_document(&buf, "stdin") {
                merge_values(&mut merged, value);
            }
        }
    }

    if let Ok(json) = env::var(CONFIG_JSON_VAR) {
        if let Some(value) = parse_json_document(&json, CONFIG_JSON_VAR) {
            merge_values(&mut merged, value);
        }
    }

    apply_env_overrides(&mut merged, env::vars());

    let config = match serde_json::from_value::<Config>(merged) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to deserialize config; using defaults: {e}");
            defaults
        }
    };

    if let Err(e) = validate_config(&config) {
        eprintln!("Configuration validation error: {e:#}");
    }

    config
}

fn parse_json_document(raw: &str, label: &str) -> Option<Value> {
    if raw.trim().is_empty() {
        return None;
    }

    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            eprintln!("Failed to parse config from {label}: {err}");
            None
        }
    }
}

fn merge_file_source(target: &mut Value, path: &Path) {
    if path.as_os_str().is_empty() || !path.exists() {
        return;
    }

    match fs::read_to_string(path) {
        Ok(contents) => {
            if let Some(value) = parse_json_document(&contents, &format!("file {}", path.display()))
            {
                merge_values(target, value);
            }
        }
        Err(err) => {
            eprintln!("Failed to read config from {}: {}", path.display(), err);
        }
    }
}

fn merge_values(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, value) in source_map {
                match target_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        target_map.insert(key, value);
                    }
                }
            }
        }
        (target_slot, source_value) => {
            *target_slot = source_value;
        }
    }
}

fn apply_env_overrides<I>(root: &mut Value, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, raw_value) in vars {
        let Some(stripped) = key.strip_prefix(OVERRIDE_PREFIX) else {
            continue;
        };

        let segments: Vec<String> = stripped
            .split("__")
            .filter(|segment| !segment.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();

        if segments.is_empty() {
            continue;
        }

        let value = parse_env_value(&raw_value);
        set_nested_value(root, &segments, value);
    }
}

fn env_var_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

fn parse_env_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.contains(',') {
        let items = trimmed
            .split(',')
            .map(|segment| parse_scalar(segment.trim()))
            .collect::<Vec<_>>();
        return Value::Array(items);
    }

    parse_scalar(trimmed)
}

fn parse_scalar(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::String(String::new());
    }

    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn set_nested_value(target: &mut Value, segments: &[String], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *target = value;
        return;
    };

    let map = ensure_object(target);
    if rest.is_empty() {
        map.insert(first.clone(), value);
        return;
    }

    let entry = map
        .entry(first.clone())
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    set_nested_value(entry, rest, value);
}

fn ensure_object(value: &mut Value) -> &mut serde_json::Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(serde_json::Map::new());
    }

    // SAFETY: The branch above guarantees `value` is a `Value::Object`, so
    // `as_object_mut()` will always return `Some`.
    #[allow(clippy::expect_used)]
    value
        .as_object_mut()
        .expect("value should be coerced into an object")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn overrides_set_nested_fields() {
        let mut root = serde_json::to_value(Config::default()).expect("defaults");
        apply_env_overrides(
            &mut root,
            vars(&[
                ("TLS_ROTOR__PORT", "9443"),
                ("TLS_ROTOR__TLS__SESSION_TICKETS__RING_SIZE", "8"),
                ("TLS_ROTOR__TLS__ACME__HOSTS", "a.example,b.example"),
                ("UNRELATED", "1"),
            ]),
        );

        let config: Config = serde_json::from_value(root).expect("config");
        assert_eq!(config.port, 9443);
        assert_eq!(config.tls.session_tickets.ring_size, 8);
        assert_eq!(config.tls.acme.hosts, vec!["a.example", "b.example"]);
    }

    #[test]
    fn merge_keeps_untouched_siblings() {
        let mut target = json!({"tls": {"min_version": "1.2", "modern_ciphers": true}});
        merge_values(&mut target, json!({"tls": {"min_version": "1.3"}}));
        assert_eq!(
            target,
            json!({"tls": {"min_version": "1.3", "modern_ciphers": true}})
        );
    }

    #[test]
    fn scalars_parse_as_json_when_possible() {
        assert_eq!(parse_env_value("true"), json!(true));
        assert_eq!(parse_env_value("42"), json!(42));
        assert_eq!(parse_env_value("1.3"), json!(1.3));
        assert_eq!(parse_env_value("\"1.3\""), json!("1.3"));
        assert_eq!(parse_env_value("h2"), json!("h2"));
    }

    #[test]
    fn blank_documents_are_ignored() {
        assert!(parse_json_document("  ", "test").is_none());
        assert!(parse_json_document("{not json", "test").is_none());
    }
}
