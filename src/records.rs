use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::fees::{ClassCounts, LicenseClass};

pub const KIND_CLASS_COUNTS: &str = "classCounts";
pub const KIND_ROSTER: &str = "candidateRoster";

/// A school's candidate record is exactly one of two shapes: aggregate
/// per-class counters, or per-candidate registration entries. Stored data
/// carries a `kind` tag; untagged values from older deployments are
/// classified by their contents.
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateRecord {
    ClassCounts(ClassCounts),
    Roster(BTreeMap<String, RosterCandidate>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RosterCandidate {
    pub name: String,
    pub phone: String,
    pub license_type: String,
    pub registration_month: String,
    pub gender: String,
    pub instructor_id: Option<String>,
    pub created_at: i64,
}

impl CandidateRecord {
    pub fn empty() -> CandidateRecord {
        CandidateRecord::ClassCounts(ClassCounts::default())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CandidateRecord::ClassCounts(_) => KIND_CLASS_COUNTS,
            CandidateRecord::Roster(_) => KIND_ROSTER,
        }
    }

    /// Tolerant reader. Tagged values parse by their tag; untagged objects
    /// (pre-tagging data) are counts when scalar-valued and a roster when
    /// their values are objects. Anything unreadable is an empty counter
    /// record.
    pub fn from_value(value: Option<&Value>) -> CandidateRecord {
        let Some(value) = value else {
            return CandidateRecord::empty();
        };
        let Some(map) = value.as_object() else {
            return CandidateRecord::empty();
        };
        match map.get("kind").and_then(|v| v.as_str()) {
            Some(KIND_ROSTER) => {
                let roster = map.get("roster").and_then(|v| v.as_object());
                CandidateRecord::Roster(parse_roster(roster))
            }
            Some(_) => CandidateRecord::ClassCounts(ClassCounts::from_value(
                map.get("counts").unwrap_or(&Value::Null),
            )),
            None => {
                if map.values().any(|v| v.is_object()) {
                    CandidateRecord::Roster(parse_roster(Some(map)))
                } else {
                    CandidateRecord::ClassCounts(ClassCounts::from_value(value))
                }
            }
        }
    }

    pub fn to_value(&self) -> Value {
        let mut out = Map::new();
        out.insert("kind".to_string(), Value::from(self.kind()));
        match self {
            CandidateRecord::ClassCounts(counts) => {
                out.insert("counts".to_string(), counts.to_value());
            }
            CandidateRecord::Roster(roster) => {
                let mut entries = Map::new();
                for (id, candidate) in roster {
                    entries.insert(id.clone(), candidate.to_value());
                }
                out.insert("roster".to_string(), Value::Object(entries));
            }
        }
        Value::Object(out)
    }

    /// Counts as the aggregation sees them: counter records verbatim, roster
    /// records grouped on enumerated license codes (other codes, e.g. the
    /// registration form's B_AUTO, do not count).
    pub fn effective_counts(&self) -> ClassCounts {
        match self {
            CandidateRecord::ClassCounts(counts) => *counts,
            CandidateRecord::Roster(roster) => {
                let mut counts = ClassCounts::default();
                for candidate in roster.values() {
                    if let Some(class) = LicenseClass::parse(&candidate.license_type) {
                        counts.increment(class);
                    }
                }
                counts
            }
        }
    }
}

fn str_or_empty(map: &Map<String, Value>, key: &str) -> String {
    map.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn parse_roster(entries: Option<&Map<String, Value>>) -> BTreeMap<String, RosterCandidate> {
    let mut roster = BTreeMap::new();
    let Some(entries) = entries else {
        return roster;
    };
    for (id, entry) in entries {
        if let Some(candidate) = RosterCandidate::from_value(entry) {
            roster.insert(id.clone(), candidate);
        }
    }
    roster
}

impl RosterCandidate {
    /// Entries need at least a name; every other field degrades to a
    /// default rather than dropping the record.
    pub fn from_value(value: &Value) -> Option<RosterCandidate> {
        let map = value.as_object()?;
        let name = map.get("name").and_then(|v| v.as_str())?.to_string();
        Some(RosterCandidate {
            name,
            phone: str_or_empty(map, "phone"),
            license_type: str_or_empty(map, "licenseType"),
            registration_month: str_or_empty(map, "registrationMonth"),
            gender: str_or_empty(map, "gender"),
            instructor_id: map
                .get("instructorId")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            created_at: map.get("createdAt").and_then(|v| v.as_i64()).unwrap_or(0),
        })
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("name".to_string(), Value::from(self.name.clone()));
        map.insert("phone".to_string(), Value::from(self.phone.clone()));
        map.insert(
            "licenseType".to_string(),
            Value::from(self.license_type.clone()),
        );
        map.insert(
            "registrationMonth".to_string(),
            Value::from(self.registration_month.clone()),
        );
        map.insert("gender".to_string(), Value::from(self.gender.clone()));
        if let Some(id) = &self.instructor_id {
            map.insert("instructorId".to_string(), Value::from(id.clone()));
        }
        map.insert("createdAt".to_string(), Value::from(self.created_at));
        Value::Object(map)
    }
}
