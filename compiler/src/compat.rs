//! Field-level comparison of an emitted schema against a hand-authored
//! baseline. Only a regression signal; it never fails a compilation.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompatReport {
    pub added:   Vec<String>,
    pub removed: Vec<String>,
    /// Present in both, but with a different property schema.
    pub changed: Vec<String>,
}

impl CompatReport {
    pub fn is_compatible(&self) -> bool {
        self.removed.is_empty() && self.changed.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

fn top_level_properties(schema: &Value) -> Map<String, Value> {
    match schema.get("properties") {
        Some(Value::Object(properties)) => properties.clone(),
        _ => {
            warn!("schema has no top-level properties object");
            Map::new()
        }
    }
}

/// Diffs the root `properties` of `emitted` against `baseline`. Names are
/// reported in sorted order.
pub fn diff_fields(emitted: &Value, baseline: &Value) -> CompatReport {
    let new = top_level_properties(emitted);
    let old = top_level_properties(baseline);

    let new_names: BTreeSet<&String> = new.keys().collect();
    let old_names: BTreeSet<&String> = old.keys().collect();

    let report = CompatReport {
        added:   new_names.difference(&old_names).map(|s| s.to_string()).collect(),
        removed: old_names.difference(&new_names).map(|s| s.to_string()).collect(),
        changed: new_names
            .intersection(&old_names)
            .filter(|name| new.get(name.as_str()) != old.get(name.as_str()))
            .map(|s| s.to_string())
            .collect(),
    };
    debug!(
        added = report.added.len(),
        removed = report.removed.len(),
        changed = report.changed.len(),
        "compatibility diff"
    );
    report
}
