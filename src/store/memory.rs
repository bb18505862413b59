//! In-memory document store.
//!
//! Evaluates the translated match document against seeded collections:
//! comparison operators, stable multi-key sorting, then skip/limit. Unknown
//! operators fail the query, like a real backend would. The store counts
//! its `find` calls so tests can observe which lookups were served from the
//! request cache instead.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::document::RawDocument;
use crate::error::Error;
use crate::query::{FindOptions, SortDirection, StoreQuery};

use super::DocumentStore;

/// A thread-safe in-memory store keyed by collection name.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<RawDocument>>>,
    finds: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a collection with documents. Non-object values are skipped.
    pub fn insert_many(&self, collection: &str, documents: Vec<Value>) {
        let mut collections = self.collections.write();
        let rows = collections.entry(collection.to_string()).or_default();
        for document in documents {
            match document {
                Value::Object(map) => rows.push(map),
                other => {
                    tracing::warn!(collection, value = %other, "skipping non-object seed document");
                }
            }
        }
    }

    /// Number of `find` calls issued so far.
    pub fn find_calls(&self) -> usize {
        self.finds.load(AtomicOrdering::Relaxed)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(
        &self,
        collection: &str,
        query: &StoreQuery,
        options: &FindOptions,
    ) -> Result<Vec<RawDocument>, Error> {
        self.finds.fetch_add(1, AtomicOrdering::Relaxed);

        let rows = self
            .collections
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default();

        let mut matched = Vec::new();
        for row in rows {
            if matches_query(&row, query)? {
                matched.push(row);
            }
        }

        sort_rows(&mut matched, &options.sort);

        let skip = options.skip.max(0) as usize;
        let mut page: Vec<RawDocument> = matched.into_iter().skip(skip).collect();
        if options.limit > 0 {
            page.truncate(options.limit as usize);
        }

        Ok(page)
    }
}

/// All predicates of the match document must hold (logical AND). A field
/// absent from the row compares as JSON null, matching common document
/// store behavior.
fn matches_query(row: &RawDocument, query: &StoreQuery) -> Result<bool, Error> {
    for (field, predicates) in query {
        let actual = row.get(field).unwrap_or(&Value::Null);
        for (operator, expected) in predicates {
            if !apply_operator(operator, actual, expected)? {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

fn apply_operator(operator: &str, actual: &Value, expected: &Value) -> Result<bool, Error> {
    match operator {
        "$eq" => Ok(actual == expected),
        "$ne" => Ok(actual != expected),
        "$in" => membership(operator, actual, expected),
        "$nin" => Ok(!membership("$nin", actual, expected)?),
        "$gt" => Ok(compare_same_type(actual, expected) == Some(Ordering::Greater)),
        "$gte" => Ok(matches!(
            compare_same_type(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        "$lt" => Ok(compare_same_type(actual, expected) == Some(Ordering::Less)),
        "$lte" => Ok(matches!(
            compare_same_type(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        )),
        other => Err(Error::query(format!("unsupported query operator `{other}`"))),
    }
}

fn membership(operator: &str, actual: &Value, expected: &Value) -> Result<bool, Error> {
    match expected {
        Value::Array(items) => Ok(items.iter().any(|item| item == actual)),
        other => Err(Error::query(format!(
            "`{operator}` expects an array value, got {other}"
        ))),
    }
}

/// Ordered comparison for range operators; `None` (no match) when the two
/// values are not of one comparable type.
fn compare_same_type(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn sort_rows(rows: &mut [RawDocument], sort: &[(String, SortDirection)]) {
    if sort.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for (field, direction) in sort {
            let left = a.get(field).unwrap_or(&Value::Null);
            let right = b.get(field).unwrap_or(&Value::Null);
            let ordering = match direction {
                SortDirection::Asc => sort_compare(left, right),
                SortDirection::Desc => sort_compare(right, left),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

/// Total order across JSON values for sorting: values are bucketed by type
/// (null < bool < number < string < array < object) and compared within
/// their bucket.
fn sort_compare(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
