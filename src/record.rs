//! Record Model
//!
//! Canonical in-memory representation of a directory entry and its version
//! history. Pure value types: no I/O, no failure modes. Records are
//! reconstructed fresh on every fetch and never mutated in place.

use crate::types::Cid;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// One entry of a record's version history, exactly as supplied by the
/// directory API. Ordering is API-owned; this crate never reorders or
/// deduplicates history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub cid: Cid,
    pub date: String,
}

impl Version {
    /// Opportunistic date parse for display purposes. The API owns the date
    /// format; a value that does not parse is shown verbatim instead.
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        self.date
            .parse::<NaiveDate>()
            .ok()
            .or_else(|| self.date.get(..10)?.parse().ok())
    }
}

/// A directory entry: `owner/name` mapped to the cid of its current version.
///
/// Every optional field normalizes to its default on both JSON absence and
/// explicit `null`, so consumers never branch on absent-vs-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub owner: String,
    pub name: String,
    pub cid: Cid,
    #[serde(default, deserialize_with = "null_as_default")]
    pub note: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub body: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub star_count: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub history: Vec<Version>,
}

impl Record {
    /// Stable identity key, `owner + "/" + name`. Unique within one
    /// directory snapshot; the key for any keyed collection of records.
    pub fn identity_key(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// The history entry matching the record's current cid, used to mark
    /// the "current" row when rendering history. `None` when the supplied
    /// history does not contain the current cid; callers highlight nothing.
    pub fn current_version(&self) -> Option<&Version> {
        self.history.iter().find(|v| v.cid == self.cid)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
