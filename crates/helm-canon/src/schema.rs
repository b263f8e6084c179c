use std::collections::BTreeMap;

/// A CSNF schema. Schemas are plain records, not runtime-reflected types,
/// consulted by [`crate::transform::transform`] to decide array
/// classification, null-stripping, and scalar profile validation.
#[derive(Debug, Clone)]
pub enum Schema {
    /// No constraint; recurse structurally with conservative defaults.
    Any,
    Array(ArraySchema),
    Object(ObjectSchema),
    /// Opaque decimal string profile: `^[+-]?(0|[1-9][0-9]*)(\.[0-9]+)?$`.
    Decimal { scale: Option<u32> },
    /// Minor-units integer + ISO-4217 currency + optional period descriptor.
    /// Applies to an object with fields `amount_minor` (int), `currency`
    /// (3-letter code), `period` (optional string).
    Money,
    /// RFC-3339 timestamp with explicit offset, normalized to UTC
    /// millisecond precision.
    Timestamp,
}

#[derive(Debug, Clone)]
pub struct ArraySchema {
    pub kind: ArrayKind,
    pub element: Box<Schema>,
}

#[derive(Debug, Clone)]
pub enum ArrayKind {
    Ordered,
    Set {
        /// JSON pointer into each element used as the sort key.
        sort_key_pointer: String,
        unique: bool,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ObjectSchema {
    pub fields: BTreeMap<String, FieldSchema>,
}

#[derive(Debug, Clone)]
pub struct FieldSchema {
    pub nullable: bool,
    pub schema: Schema,
}

impl ObjectSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.get(name)
    }
}
