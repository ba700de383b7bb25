//! Row decoding helpers shared by the query modules.

use std::str::FromStr;

use jiff::Timestamp;
use rusqlite::{types::Type, Row};

/// SQL list of the in-flight statuses, for `status IN (...)` clauses.
pub(super) const IN_FLIGHT_SQL: &str = "('started', 'running')";

/// Reads an RFC 3339 timestamp column.
pub(super) fn timestamp_column(row: &Row, idx: usize) -> rusqlite::Result<Timestamp> {
    row.get::<_, String>(idx)?
        .parse::<Timestamp>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Reads a nullable RFC 3339 timestamp column.
pub(super) fn optional_timestamp_column(
    row: &Row,
    idx: usize,
) -> rusqlite::Result<Option<Timestamp>> {
    row.get::<_, Option<String>>(idx)?
        .map(|s| {
            s.parse::<Timestamp>().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
            })
        })
        .transpose()
}

/// Reads a text column into one of the status/operation enums.
pub(super) fn enum_column<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IN_FLIGHT_STATUSES;

    #[test]
    fn test_in_flight_sql_matches_model() {
        for status in IN_FLIGHT_STATUSES {
            assert!(IN_FLIGHT_SQL.contains(&format!("'{}'", status.as_str())));
        }
        assert_eq!(IN_FLIGHT_SQL.matches('\'').count(), IN_FLIGHT_STATUSES.len() * 2);
    }
}
