//! Deferred resolution of reference fields.
//!
//! A reference field stores a foreign identifier (or a list of them). The
//! list operation replaces that raw value with a [`ReferenceResolver`], an
//! explicit deferred computation bound to the raw value, the target
//! entity's controller and the shared request context. The surrounding
//! resolution facility invokes [`ReferenceResolver::resolve`] when the
//! field's value is actually needed; because the lookup re-enters the list
//! operation with the shared context, references already fetched in this
//! request are served from the cache fast path.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::context::RequestContext;
use crate::controller::Controller;
use crate::document::{Document, DocumentId};
use crate::error::Error;
use crate::query::{FilterInput, ID_FIELD, ListArgs, OP_EQ, OP_IN};

/// Outcome of resolving a reference field.
#[derive(Debug)]
pub enum Resolved {
    /// A singular reference: the referenced document, or `None` if absent.
    One(Option<Document>),
    /// A list reference: the referenced documents, in the order of the
    /// stored identifier list.
    Many(Vec<Document>),
}

impl Resolved {
    /// The single resolved document; for a list reference, its first entry.
    pub fn into_document(self) -> Option<Document> {
        match self {
            Self::One(doc) => doc,
            Self::Many(docs) => docs.into_iter().next(),
        }
    }

    /// The resolved documents; a singular reference yields zero or one.
    pub fn into_documents(self) -> Vec<Document> {
        match self {
            Self::One(doc) => doc.into_iter().collect(),
            Self::Many(docs) => docs,
        }
    }
}

/// A deferred lookup of the document(s) a reference field points at.
#[derive(Clone)]
pub struct ReferenceResolver {
    field: String,
    raw: Value,
    target: Arc<Controller>,
    ctx: RequestContext,
}

impl ReferenceResolver {
    pub(crate) fn new(
        field: impl Into<String>,
        raw: Value,
        target: Arc<Controller>,
        ctx: RequestContext,
    ) -> Self {
        Self {
            field: field.into(),
            raw,
            target,
            ctx,
        }
    }

    /// The raw stored value the resolver was built from.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Logical name of the entity the reference points at.
    pub fn target_entity(&self) -> &str {
        self.target.entity().singular()
    }

    /// Evaluate the deferred lookup.
    ///
    /// A list raw value issues an `_id $in [...]` query and yields
    /// [`Resolved::Many`], re-sorted to match the input identifier order
    /// (identifiers absent from the store are simply missing from the
    /// result). A scalar raw value issues `_id $eq value` and yields
    /// [`Resolved::One`] with the first match.
    ///
    /// Failures surface as [`Error::Resolution`] naming this field; the
    /// shared cache is left untouched by a failed lookup.
    pub async fn resolve(&self) -> Result<Resolved, Error> {
        let multiple = self.raw.is_array();
        let operator = if multiple { OP_IN } else { OP_EQ };

        tracing::debug!(
            field = %self.field,
            entity = %self.target_entity(),
            operator,
            "resolving reference field"
        );

        let args = ListArgs::new().filter(vec![FilterInput::new(
            ID_FIELD,
            operator,
            self.raw.clone(),
        )]);
        let result = self
            .target
            .list(&args, Some(&self.ctx))
            .await
            .map_err(|source| Error::Resolution {
                field: self.field.clone(),
                source: Box::new(source),
            })?;

        if let Value::Array(ids) = &self.raw {
            Ok(Resolved::Many(reorder_to_input(ids, result)))
        } else {
            Ok(Resolved::One(result.into_iter().next()))
        }
    }
}

impl fmt::Debug for ReferenceResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceResolver")
            .field("field", &self.field)
            .field("entity", &self.target_entity())
            .field("raw", &self.raw)
            .finish()
    }
}

/// Re-sort membership-lookup results to the input identifier order. The
/// store does not guarantee `$in` result order, so each input identifier
/// claims its document in turn; documents no identifier claims are kept at
/// the end rather than dropped.
fn reorder_to_input(ids: &[Value], documents: Vec<Document>) -> Vec<Document> {
    let input_ids: Vec<DocumentId> = ids.iter().filter_map(DocumentId::from_value).collect();
    let mut slots: Vec<Option<Document>> = vec![None; input_ids.len()];
    let mut rest = Vec::new();

    'documents: for doc in documents {
        if let Some(id) = doc.id() {
            for (slot, want) in slots.iter_mut().zip(&input_ids) {
                if slot.is_none() && *want == id {
                    *slot = Some(doc);
                    continue 'documents;
                }
            }
        }
        rest.push(doc);
    }

    slots.into_iter().flatten().chain(rest).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn doc(id: &str) -> Document {
        let Value::Object(map) = json!({"_id": id}) else {
            unreachable!()
        };
        Document::from_raw(map)
    }

    fn ids_of(docs: &[Document]) -> Vec<String> {
        docs.iter().map(|d| d.id().unwrap().to_string()).collect()
    }

    #[test]
    fn reorder_matches_input_identifier_order() {
        let ids = vec![json!("2"), json!("3"), json!("1")];
        let out = reorder_to_input(&ids, vec![doc("1"), doc("2"), doc("3")]);
        assert_eq!(ids_of(&out), vec!["2", "3", "1"]);
    }

    #[test]
    fn reorder_skips_identifiers_absent_from_the_store() {
        let ids = vec![json!("9"), json!("1")];
        let out = reorder_to_input(&ids, vec![doc("1")]);
        assert_eq!(ids_of(&out), vec!["1"]);
    }

    #[test]
    fn reorder_keeps_unclaimed_documents() {
        let ids = vec![json!("1")];
        let out = reorder_to_input(&ids, vec![doc("7"), doc("1")]);
        assert_eq!(ids_of(&out), vec!["1", "7"]);
    }
}
