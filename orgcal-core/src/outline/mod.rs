//! Outline source: heading records read from org files.

pub mod org;
pub mod source;

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};

/// Workflow keywords recognized at the start of a heading.
#[derive(Debug, Clone, PartialEq)]
pub struct TodoKeywords {
    pub todo: Vec<String>,
    pub done: Vec<String>,
}

impl Default for TodoKeywords {
    fn default() -> Self {
        TodoKeywords {
            todo: ["TODO", "NEXT", "RUNNING", "PAUSED", "WAIT"]
                .map(String::from)
                .to_vec(),
            done: ["DONE", "CANCELLED", "DELEGATED"].map(String::from).to_vec(),
        }
    }
}

impl TodoKeywords {
    pub fn contains(&self, word: &str) -> bool {
        self.is_todo(word) || self.is_done(word)
    }

    pub fn is_todo(&self, word: &str) -> bool {
        self.todo.iter().any(|k| k == word)
    }

    pub fn is_done(&self, word: &str) -> bool {
        self.done.iter().any(|k| k == word)
    }

    /// Add keywords not already known, keeping existing order.
    pub fn extend(&mut self, other: &TodoKeywords) {
        for k in &other.todo {
            if !self.contains(k) {
                self.todo.push(k.clone());
            }
        }
        for k in &other.done {
            if !self.contains(k) {
                self.done.push(k.clone());
            }
        }
    }
}

/// An org timestamp such as `<2024-01-01 Mon 10:00-11:30 +1w>`.
#[derive(Debug, Clone, PartialEq)]
pub struct OrgTimestamp {
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    /// End of a `HH:MM-HH:MM` time range on the same timestamp
    pub end_time: Option<NaiveTime>,
    /// End of a `<...>--<...>` range
    pub range_end: Option<(NaiveDate, Option<NaiveTime>)>,
    /// Raw repeater cookie, e.g. `+1w`, `.+2d`
    pub repeater: Option<String>,
}

impl OrgTimestamp {
    pub fn on(date: NaiveDate) -> Self {
        OrgTimestamp {
            date,
            start_time: None,
            end_time: None,
            range_end: None,
            repeater: None,
        }
    }

    pub fn at(date: NaiveDate, time: NaiveTime) -> Self {
        OrgTimestamp {
            start_time: Some(time),
            ..Self::on(date)
        }
    }
}

/// One heading from an outline document.
#[derive(Debug, Clone, PartialEq)]
pub struct Heading {
    /// Line number of the heading in its file (1-based)
    pub line: usize,
    /// Heading text without the workflow keyword and tags
    pub title: String,
    pub body: String,
    /// Property drawer contents, keys uppercased
    pub properties: BTreeMap<String, String>,
    pub tags: Vec<String>,
    pub todo: Option<String>,
    /// `todo` is a done state in the vocabulary of the heading's own file
    pub done: bool,
    pub scheduled: Option<OrgTimestamp>,
    pub deadline: Option<OrgTimestamp>,
}

impl Heading {
    pub fn new(title: &str) -> Self {
        Heading {
            line: 0,
            title: title.to_string(),
            body: String::new(),
            properties: BTreeMap::new(),
            tags: Vec::new(),
            todo: None,
            done: false,
            scheduled: None,
            deadline: None,
        }
    }

    /// Property lookup, case-insensitive on the key.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .get(&key.to_ascii_uppercase())
            .map(String::as_str)
    }

    /// Explicit identifier from the `ID` property.
    pub fn source_id(&self) -> Option<&str> {
        self.property("ID").map(str::trim).filter(|id| !id.is_empty())
    }

    /// Latest date this heading is relevant on, used for cutoff filtering.
    pub fn latest_date(&self) -> Option<NaiveDate> {
        [&self.scheduled, &self.deadline]
            .into_iter()
            .flatten()
            .map(|t| t.date)
            .max()
    }
}
