use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use alert_config::RuleOptions;
use alert_core::{build_rule, Event, RuleType, Value};
use anyhow::{Context, Result};

use crate::log_macros::{al_info, al_log, al_warn};

pub fn run(rule_file: PathBuf, events_file: PathBuf) -> Result<()> {
    let rule_doc = std::fs::read_to_string(&rule_file)
        .with_context(|| format!("failed to read {}", rule_file.display()))?;
    let opts = RuleOptions::from_toml(&rule_doc).context("invalid rule options")?;
    al_info!(sys, rule_type = ?opts.rule_type, "rule constructed");

    let mut rule = build_rule(&opts)?;

    let reader = BufReader::new(
        std::fs::File::open(&events_file)
            .with_context(|| format!("failed to open {}", events_file.display()))?,
    );

    let mut event_count: u64 = 0;
    let mut error_count: u64 = 0;
    let mut last_timestamp = None;

    for (lineno, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let json: serde_json::Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                al_warn!(replay, line = lineno + 1, error = %e, "skipping invalid JSON");
                error_count += 1;
                continue;
            }
        };

        let event = json_to_event(&json);
        if let Some(ts) = event.moment(&opts.timestamp_field) {
            last_timestamp = Some(ts);
        }
        event_count += 1;

        rule.add_data(std::slice::from_ref(&event))?;
        for m in rule.drain_matches() {
            println!("{}", event_to_json(&m));
        }
    }

    if let Some(now) = last_timestamp {
        rule.garbage_collect(now)?;
        for m in rule.drain_matches() {
            println!("{}", event_to_json(&m));
        }
    }

    al_info!(replay, events = event_count, errors = error_count, "replay complete");
    Ok(())
}

fn json_to_event(json: &serde_json::Value) -> Event {
    let mut fields = HashMap::new();
    if let serde_json::Value::Object(map) = json {
        for (key, val) in map {
            let v = match val {
                serde_json::Value::Number(n) => match n.as_f64() {
                    Some(f) => Value::Number(f),
                    None => continue,
                },
                serde_json::Value::String(s) => Value::Str(s.clone()),
                serde_json::Value::Bool(b) => Value::Bool(*b),
                serde_json::Value::Null => Value::Null,
                _ => continue, // arrays/objects are the lookup utility's concern, not ours
            };
            fields.insert(key.clone(), v);
        }
    }
    Event { fields }
}

fn event_to_json(event: &Event) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = event
        .fields
        .iter()
        .map(|(k, v)| (k.clone(), value_to_json(v)))
        .collect();
    serde_json::Value::Object(map)
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Str(s) => serde_json::Value::String(s.clone()),
    }
}
