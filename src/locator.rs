//! Composite keys for addressing rows by their business fields.
//!
//! A [`RecordKey`] joins natural-key fields with `|`. It only disambiguates
//! rows picked from a selection list; it is never stored. Resolving a key
//! against candidate rows must yield exactly one match, otherwise nothing
//! is written.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use crate::errors::ServiceError;

pub const KEY_DELIMITER: char = '|';

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct RecordKey(String);

impl RecordKey {
    /// Joins the given fields. Fails when a field contains the delimiter,
    /// since such a key could not be split back unambiguously.
    pub fn from_fields<I, S>(fields: I) -> Result<Self, ServiceError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parts = Vec::new();
        for field in fields {
            let field = field.as_ref();
            ensure_key_safe("key field", field)?;
            parts.push(field.to_string());
        }
        if parts.is_empty() {
            return Err(ServiceError::validation("record key needs at least one field"));
        }
        Ok(Self(parts.join(&KEY_DELIMITER.to_string())))
    }

    /// Key for an order line: client, product and creation instant.
    pub fn for_order(
        client_name: &str,
        product_name: &str,
        ordered_at: &DateTime<Utc>,
    ) -> Result<Self, ServiceError> {
        Self::from_fields([client_name, product_name, &format_instant(ordered_at)])
    }

    /// Key for a stock movement: product and movement instant.
    pub fn for_stock_movement(
        product_name: &str,
        moved_at: &DateTime<Utc>,
    ) -> Result<Self, ServiceError> {
        Self::from_fields([product_name, &format_instant(moved_at)])
    }

    /// Accepts a key received from a caller.
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        if raw.trim().is_empty() {
            return Err(ServiceError::validation("record key must not be empty"));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn fields(&self) -> Vec<&str> {
        self.0.split(KEY_DELIMITER).collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rejects values that would break key composition.
pub fn ensure_key_safe(field_name: &str, value: &str) -> Result<(), ServiceError> {
    if value.contains(KEY_DELIMITER) {
        return Err(ServiceError::validation(format!(
            "{field_name} must not contain '{KEY_DELIMITER}'"
        )));
    }
    Ok(())
}

/// Microsecond RFC 3339 rendering so keys survive a round trip through the store.
pub fn format_instant(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Implemented by rows addressable through a [`RecordKey`].
pub trait Locatable {
    fn record_key(&self) -> Result<RecordKey, ServiceError>;
}

/// Picks the single candidate whose key equals `key`.
///
/// Zero matches is `NotFound`; more than one is `AmbiguousSelection`. There is
/// no fallback to the first match.
pub fn resolve_unique<T: Locatable>(key: &RecordKey, candidates: Vec<T>) -> Result<T, ServiceError> {
    let mut matches = Vec::new();
    for candidate in candidates {
        if &candidate.record_key()? == key {
            matches.push(candidate);
        }
    }

    match matches.len() {
        0 => Err(ServiceError::not_found(format!("no record matches '{key}'"))),
        1 => Ok(matches.remove(0)),
        n => {
            tracing::warn!(key = %key, matches = n, "refusing ambiguous selection");
            Err(ServiceError::AmbiguousSelection {
                key: key.to_string(),
                matches: n,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: u32,
        client: &'static str,
        product: &'static str,
        at: DateTime<Utc>,
    }

    impl Locatable for Row {
        fn record_key(&self) -> Result<RecordKey, ServiceError> {
            RecordKey::for_order(self.client, self.product, &self.at)
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_717_236_000 + secs, 0).unwrap()
    }

    #[test]
    fn key_joins_fields_with_delimiter() {
        let key = RecordKey::for_order("Ana", "Water", &at(0)).unwrap();
        assert_eq!(key.as_str(), "Ana|Water|2024-06-01T10:00:00.000000Z");
        assert_eq!(key.fields(), vec!["Ana", "Water", "2024-06-01T10:00:00.000000Z"]);
    }

    #[test]
    fn fields_containing_delimiter_are_rejected() {
        assert_matches!(
            RecordKey::from_fields(["Ana|Bia", "Water"]),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn resolves_single_match() {
        let rows = vec![
            Row { id: 1, client: "Ana", product: "Water", at: at(0) },
            Row { id: 2, client: "Ana", product: "Juice", at: at(0) },
        ];
        let key = RecordKey::for_order("Ana", "Juice", &at(0)).unwrap();
        assert_eq!(resolve_unique(&key, rows).unwrap().id, 2);
    }

    #[test]
    fn duplicate_rows_are_ambiguous() {
        let rows = vec![
            Row { id: 1, client: "Ana", product: "Water", at: at(0) },
            Row { id: 2, client: "Ana", product: "Water", at: at(0) },
        ];
        let key = RecordKey::for_order("Ana", "Water", &at(0)).unwrap();
        assert_matches!(
            resolve_unique(&key, rows),
            Err(ServiceError::AmbiguousSelection { matches: 2, .. })
        );
    }

    #[test]
    fn missing_row_is_not_found() {
        let key = RecordKey::for_order("Ana", "Water", &at(5)).unwrap();
        assert_matches!(resolve_unique::<Row>(&key, vec![]), Err(ServiceError::NotFound(_)));
    }
}
