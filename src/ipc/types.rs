use std::path::PathBuf;

use serde::Deserialize;
use serde_json::json;

use crate::exam::ExamCandidate;
use crate::fees::ClassCounts;
use crate::store::Store;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Session {
    School {
        school_id: String,
        email: String,
    },
    Admin {
        email: String,
    },
    Instructor {
        school_id: String,
        instructor_id: String,
        name: String,
    },
}

impl Session {
    pub fn is_admin(&self) -> bool {
        matches!(self, Session::Admin { .. })
    }

    pub fn school_id(&self) -> Option<&str> {
        match self {
            Session::School { school_id, .. } | Session::Instructor { school_id, .. } => {
                Some(school_id)
            }
            Session::Admin { .. } => None,
        }
    }

    pub fn describe(&self) -> serde_json::Value {
        match self {
            Session::School { school_id, email } => json!({
                "role": "school",
                "schoolId": school_id,
                "email": email,
            }),
            Session::Admin { email } => json!({
                "role": "admin",
                "email": email,
            }),
            Session::Instructor {
                school_id,
                instructor_id,
                name,
            } => json!({
                "role": "instructor",
                "schoolId": school_id,
                "instructorId": instructor_id,
                "name": name,
            }),
        }
    }
}

/// Working copy of one (school, instructor, month) exam record. Mutations
/// edit this; the store changes only on an explicit send.
pub struct ExamDraft {
    pub school_id: String,
    pub instructor_id: String,
    pub month: String,
    pub saturday: Vec<ExamCandidate>,
    pub sunday: Vec<ExamCandidate>,
}

/// Working copy of one school's per-class counters, persisted wholesale on
/// submit.
pub struct CountsDraft {
    pub school_id: String,
    pub counts: ClassCounts,
}

pub struct Watcher {
    pub id: String,
    pub path: String,
}

#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub store: Option<Store>,
    pub session: Option<Session>,
    pub exam_draft: Option<ExamDraft>,
    pub counts_draft: Option<CountsDraft>,
    pub watchers: Vec<Watcher>,
}

impl AppState {
    /// Forced or voluntary sign-out: drafts and watchers belong to the
    /// session and go with it. Pending writes are never rolled back.
    pub fn clear_session(&mut self) {
        self.session = None;
        self.exam_draft = None;
        self.counts_draft = None;
        self.watchers.clear();
    }
}
