//! Sheet row: the flat, serializable shape of one exported record.

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use cagetrack_core::OrderRecord;

/// Column headers in sheet order.
pub const HEADER: [&str; 4] = ["id", "cage", "createdAt", "status"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetRow {
    pub id: String,
    /// Empty when the record has no cage.
    pub cage: String,
    /// RFC 3339, UTC, millisecond precision.
    pub created_at: String,
    pub status: String,
}

impl SheetRow {
    pub fn from_record(record: &OrderRecord) -> Self {
        Self {
            id: record.id.as_str().to_string(),
            cage: record
                .cage
                .as_ref()
                .map(|c| c.as_str().to_string())
                .unwrap_or_default(),
            created_at: record
                .created_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            status: record.status.as_str().to_string(),
        }
    }

    /// Cells in [`HEADER`] order.
    pub fn cells(&self) -> [&str; 4] {
        [&self.id, &self.cage, &self.created_at, &self.status]
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn unassigned_cage_is_empty_cell() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).single().expect("ts");
        let row = SheetRow::from_record(&OrderRecord::in_cage("ORD-1".into(), None, at));
        assert_eq!(row.cells(), ["ORD-1", "", "2024-05-01T09:30:00.000Z", "In Cage"]);
    }
}
