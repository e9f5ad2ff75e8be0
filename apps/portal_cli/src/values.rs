//! Per-step answers for the `wizard` command, read from a TOML file:
//!
//! ```toml
//! [step2]
//! department = "Physics"
//! designation = "Professor"
//! ```

use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{anyhow, Context, Result};
use shared::domain::StepNumber;

pub type StepValues = BTreeMap<StepNumber, BTreeMap<String, String>>;

pub fn load_step_values(path: &Path) -> Result<StepValues> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read step values '{}'", path.display()))?;
    parse_step_values(&raw).with_context(|| format!("invalid step values '{}'", path.display()))
}

pub fn parse_step_values(raw: &str) -> Result<StepValues> {
    let tables: BTreeMap<String, BTreeMap<String, toml::Value>> = toml::from_str(raw)?;
    let mut values = StepValues::new();

    for (key, fields) in tables {
        let step = parse_step_key(&key)?;
        let entry = values.entry(step).or_default();
        for (name, value) in fields {
            let text = match value {
                toml::Value::String(text) => text,
                toml::Value::Integer(_)
                | toml::Value::Float(_)
                | toml::Value::Boolean(_)
                | toml::Value::Datetime(_) => value.to_string(),
                toml::Value::Array(_) | toml::Value::Table(_) => {
                    return Err(anyhow!("[{key}] {name}: nested values are not supported"));
                }
            };
            entry.insert(name, text);
        }
    }

    Ok(values)
}

fn parse_step_key(key: &str) -> Result<StepNumber> {
    let digits = key.strip_prefix("step").unwrap_or(key);
    match digits.parse::<u32>() {
        Ok(step) if step >= 1 => Ok(StepNumber(step)),
        _ => Err(anyhow!(
            "table [{key}] must be named step<N> with N starting at 1"
        )),
    }
}
