use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use stockroom_core::ExpectedVersion;

use super::r#trait::StoreError;

/// One mutation inside a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Set { path: String, value: JsonValue },
    Delete { path: String },
}

impl WriteOp {
    pub fn path(&self) -> &str {
        match self {
            WriteOp::Set { path, .. } | WriteOp::Delete { path } => path,
        }
    }
}

/// Precondition checked before any operation of the batch is applied.
///
/// `expected: None` means the path must not exist.
#[derive(Debug, Clone, PartialEq)]
pub struct Guard {
    pub path: String,
    pub expected: Option<JsonValue>,
}

/// An all-or-nothing multi-path write.
///
/// Paths are `collection/key[/field...]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
    guards: Vec<Guard>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize `value` and set it at `path`.
    pub fn put<T: Serialize>(&mut self, path: impl Into<String>, value: &T) -> Result<&mut Self, StoreError> {
        let value = serde_json::to_value(value).map_err(|e| StoreError::Encode(e.to_string()))?;
        Ok(self.set(path, value))
    }

    pub fn set(&mut self, path: impl Into<String>, value: JsonValue) -> &mut Self {
        self.ops.push(WriteOp::Set {
            path: path.into(),
            value,
        });
        self
    }

    pub fn delete(&mut self, path: impl Into<String>) -> &mut Self {
        self.ops.push(WriteOp::Delete { path: path.into() });
        self
    }

    /// Require `path` to hold `value` when the batch is applied.
    pub fn expect(&mut self, path: impl Into<String>, value: JsonValue) -> &mut Self {
        self.guards.push(Guard {
            path: path.into(),
            expected: Some(value),
        });
        self
    }

    /// Require `path` to be absent when the batch is applied.
    pub fn expect_absent(&mut self, path: impl Into<String>) -> &mut Self {
        self.guards.push(Guard {
            path: path.into(),
            expected: None,
        });
        self
    }

    /// Guard a revision field with an aggregate's concurrency expectation.
    pub fn expect_version(&mut self, path: impl Into<String>, expected: ExpectedVersion) -> &mut Self {
        match expected {
            ExpectedVersion::Any => self,
            ExpectedVersion::Absent => self.expect_absent(path),
            ExpectedVersion::Exact(revision) => self.expect(path, json!(revision)),
        }
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn guards(&self) -> &[Guard] {
        &self.guards
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Collections touched by the operations, deduplicated in first-touch order.
    pub fn collections(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for op in &self.ops {
            if let Some(collection) = op.path().split('/').next() {
                if !out.contains(&collection) {
                    out.push(collection);
                }
            }
        }
        out
    }
}

/// `collection/key`
pub fn record_path(collection: impl AsRef<str>, key: impl AsRef<str>) -> String {
    format!("{}/{}", collection.as_ref(), key.as_ref())
}

/// `collection/key/field`
pub fn field_path(collection: impl AsRef<str>, key: impl AsRef<str>, field: &str) -> String {
    format!("{}/{}/{}", collection.as_ref(), key.as_ref(), field)
}

/// Split a path into segments; at least `collection/key`, no empty segment.
pub fn parse_path(path: &str) -> Result<Vec<&str>, StoreError> {
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() < 2 || segments.iter().any(|s| s.trim().is_empty()) {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn batch_keeps_operation_order_and_collections() {
        let mut batch = WriteBatch::new();
        batch
            .set("inventoryItems/x/quantity", json!(95))
            .expect("inventoryItems/x/quantity", json!(100))
            .put("adjustmentLogs/a1", &json!({ "fromQuantity": 100 }))
            .unwrap()
            .set("inventoryItems/y/quantity", json!(1));

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.guards().len(), 1);
        assert_eq!(batch.collections(), vec!["inventoryItems", "adjustmentLogs"]);
    }

    #[test]
    fn version_expectations_become_guards() {
        let mut batch = WriteBatch::new();
        batch
            .expect_version("physicalCounts/c1/revision", ExpectedVersion::of(3))
            .expect_version("physicalCounts/c2/revision", ExpectedVersion::of(0))
            .expect_version("physicalCounts/c3/revision", ExpectedVersion::Any);

        assert_eq!(
            batch.guards(),
            &[
                Guard {
                    path: "physicalCounts/c1/revision".to_string(),
                    expected: Some(json!(3)),
                },
                Guard {
                    path: "physicalCounts/c2/revision".to_string(),
                    expected: None,
                },
            ]
        );
    }

    #[test]
    fn paths_need_collection_and_key() {
        assert!(parse_path("inventoryItems").is_err());
        assert!(parse_path("inventoryItems//quantity").is_err());
        assert_eq!(
            parse_path("inventoryItems/x/quantity").unwrap(),
            vec!["inventoryItems", "x", "quantity"]
        );
        assert_eq!(field_path("physicalCounts", "c1", "revision"), "physicalCounts/c1/revision");
    }
}
