//! Query translation: declarative filter/order/pagination arguments into a
//! store-native query specification.
//!
//! The request-facing input shape is fixed:
//!
//! ```text
//! Filter:  { field, operator, value }       combined with logical AND
//! Order:   { field, order }                 "desc" (any case) descends
//! ListArgs: { filter?, order?, limit?, offset? }
//! ```
//!
//! Operators are store-native opcodes (`$eq`, `$in`, ...) and are passed
//! through uninterpreted; it is the store's job to reject ones it does not
//! know. The input types double as async-graphql input objects so the
//! surrounding schema facility can expose them directly.

use std::collections::BTreeMap;

use async_graphql::InputObject;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// Identifier field every document carries within its collection.
pub const ID_FIELD: &str = "_id";

/// Equality operator opcode.
pub const OP_EQ: &str = "$eq";

/// Set-membership operator opcode.
pub const OP_IN: &str = "$in";

/// A single `(field, operator, value)` filter triple.
#[derive(InputObject, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FilterInput {
    /// Document field the predicate applies to.
    pub field: String,
    /// Store-native operator opcode, e.g. `$eq` or `$in`.
    pub operator: String,
    /// Comparison value; an array for membership operators.
    pub value: Value,
}

impl FilterInput {
    pub fn new(field: impl Into<String>, operator: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value,
        }
    }

    /// Equality triple: `field $eq value`.
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, OP_EQ, value)
    }

    /// Membership triple: `field $in [values...]`.
    pub fn is_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(field, OP_IN, Value::Array(values))
    }
}

/// A single `(field, direction)` sort entry.
#[derive(InputObject, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderInput {
    /// Document field to sort by.
    pub field: String,
    /// `"desc"` (case-insensitive) sorts descending; anything else,
    /// including absent, sorts ascending.
    pub order: Option<String>,
}

impl OrderInput {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: None,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: Some("desc".to_string()),
        }
    }
}

/// Arguments accepted by every list operation.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ListArgs {
    pub filter: Option<Vec<FilterInput>>,
    pub order: Option<Vec<OrderInput>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Vec<FilterInput>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn order(mut self, order: Vec<OrderInput>) -> Self {
        self.order = Some(order);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Sort direction after translation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// Map a raw order string: any case-insensitive `"desc"` descends,
    /// everything else (absent or garbage included) ascends.
    pub fn from_order(order: Option<&str>) -> Self {
        match order {
            Some(s) if s.eq_ignore_ascii_case("desc") => Self::Desc,
            _ => Self::Asc,
        }
    }
}

/// Store-native match document: `field -> { operator -> value }`.
pub type StoreQuery = BTreeMap<String, BTreeMap<String, Value>>;

/// Pagination and sorting parameters passed to the store's `find` call.
///
/// A `limit` or `skip` of zero means "no limit" / "no skip", matching the
/// store client convention.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FindOptions {
    pub limit: i64,
    pub skip: i64,
    pub sort: Vec<(String, SortDirection)>,
}

/// A translated query: match document plus find options.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryPlan {
    pub query: StoreQuery,
    pub options: FindOptions,
}

/// Translate list arguments into a store query.
///
/// Each filter triple becomes `field: {operator: value}`. Multiple triples
/// on the same field overwrite rather than merge, a known limitation of
/// the query shape. Sort entries preserve their input order, so
/// the first entry is the primary sort key.
///
/// Fails with [`Error::InvalidArgument`] when `limit` or `offset` is
/// negative; zero and absent both mean unbounded.
pub fn translate(args: &ListArgs) -> Result<QueryPlan, Error> {
    if let Some(limit) = args.limit {
        if limit < 0 {
            return Err(Error::InvalidArgument(format!(
                "limit must be non-negative, got {limit}"
            )));
        }
    }
    if let Some(offset) = args.offset {
        if offset < 0 {
            return Err(Error::InvalidArgument(format!(
                "offset must be non-negative, got {offset}"
            )));
        }
    }

    let mut query = StoreQuery::new();
    if let Some(filter) = &args.filter {
        for triple in filter {
            query.insert(
                triple.field.clone(),
                BTreeMap::from([(triple.operator.clone(), triple.value.clone())]),
            );
        }
    }

    let mut sort = Vec::new();
    if let Some(order) = &args.order {
        for entry in order {
            sort.push((
                entry.field.clone(),
                SortDirection::from_order(entry.order.as_deref()),
            ));
        }
    }

    Ok(QueryPlan {
        query,
        options: FindOptions {
            limit: args.limit.unwrap_or(0),
            skip: args.offset.unwrap_or(0),
            sort,
        },
    })
}
