//! Serde schema for rules, views and rendered reports.

mod report;
mod rule;
mod view;


use serde::de;
use serde_json::{Map, Value};

pub use report::{Report, ReportEntry, ReportItem, ReportSection};
pub use rule::{Rule, RuleLevel, RuleViolation};
pub use view::{View, ViewEntry, ViewItem, ViewSection};

/// What a section-or-entry map holds: sections carry `items`, entries
/// carry `key`, and exactly one of the two must be present.
enum ItemKind {
    Section,
    Entry,
}

fn item_kind<E: de::Error>(map: &Map<String, Value>) -> Result<ItemKind, E> {
    let name = map.get("name").and_then(Value::as_str).unwrap_or_default();
    match (map.contains_key("items"), map.contains_key("key")) {
        (true, false) => Ok(ItemKind::Section),
        (false, true) => Ok(ItemKind::Entry),
        (true, true) => Err(E::custom(format!(
            "item {name:?} has both `items` and `key`; a section cannot also be an entry"
        ))),
        (false, false) => Err(E::custom(format!(
            "item {name:?} has neither `items` (section) nor `key` (entry)"
        ))),
    }
}

/// Deserialize a section-or-entry map into whichever of `S` and `T` its
/// keys select. Field errors of the selected type are reported as is.
fn deserialize_item<'de, D, S, T, R>(
    deserializer: D,
    section: impl FnOnce(S) -> R,
    entry: impl FnOnce(T) -> R,
) -> Result<R, D::Error>
where
    D: de::Deserializer<'de>,
    S: de::DeserializeOwned,
    T: de::DeserializeOwned,
{
    let map = <Map<String, Value> as de::Deserialize>::deserialize(deserializer)?;
    let item = match item_kind::<D::Error>(&map)? {
        ItemKind::Section => serde_json::from_value(Value::Object(map)).map(section),
        ItemKind::Entry => serde_json::from_value(Value::Object(map)).map(entry),
    };
    item.map_err(<D::Error as de::Error>::custom)
}
