//! Error taxonomy for the data-fetching layer.
//!
//! Everything propagates to the immediate caller: registration failures are
//! fatal at startup, store failures surface unchanged from the list
//! operation, and resolution failures surface to the specific field whose
//! deferred lookup triggered them. Nothing is retried or swallowed here.

/// Boxed error type used to carry a store backend's native error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by registration, query translation, store execution and
/// reference resolution.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An entity was registered without the required naming metadata, or a
    /// reference field targets an entity that is not registered.
    ///
    /// Raised at startup; never recovered.
    #[error("entity registration failed: {0}")]
    Registration(String),

    /// The store rejected or failed a query (bad operator, connectivity
    /// failure). Surfaced unchanged to the caller of the list operation.
    #[error("store query failed: {0}")]
    Query(BoxError),

    /// A deferred reference lookup failed. Carries the field that was being
    /// resolved; sibling resolutions and the request cache are unaffected.
    #[error("failed to resolve reference field `{field}`: {source}")]
    Resolution {
        field: String,
        source: Box<Error>,
    },

    /// Nonsensical request arguments (negative limit/offset), rejected
    /// before the query reaches the store.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Build a [`Error::Query`] from a plain message. Store implementations
    /// with a native error type should box it instead to keep the cause.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query(message.into().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_error_keeps_message() {
        let err = Error::query("unsupported operator `$foo`");
        assert_eq!(
            err.to_string(),
            "store query failed: unsupported operator `$foo`"
        );
    }

    #[test]
    fn resolution_error_names_field() {
        let err = Error::Resolution {
            field: "publisher".to_string(),
            source: Box::new(Error::query("boom")),
        };
        assert!(err.to_string().contains("`publisher`"));
        assert!(err.to_string().contains("boom"));
    }
}
