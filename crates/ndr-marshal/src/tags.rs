//! Field attribute interpretation
//!
//! Each field of an input structure carries a raw, comma-separated attribute
//! list. The recognized keys are `pointer`, `conformant`, `varying`,
//! `union_tag` and `union_field:<name>`; unknown keys are ignored so that
//! future attributes do not break existing payloads.

/// The field is emitted as a referent id; its content is deferred.
pub const TAG_POINTER: &str = "pointer";
/// The field contributes its element count as a hoisted maximum.
pub const TAG_CONFORMANT: &str = "conformant";
/// The field's actual element count precedes its contents.
pub const TAG_VARYING: &str = "varying";
/// The field holds the discriminant of an immediately following union.
pub const TAG_UNION_TAG: &str = "union_tag";
/// The field is a union arm; carries the arm name after a colon.
pub const TAG_UNION_FIELD: &str = "union_field";

/// Parsed attribute flags for one field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTags {
    pub pointer: bool,
    pub conformant: bool,
    pub varying: bool,
    pub union_tag: bool,
    pub union_field: Option<String>,
}

impl FieldTags {
    /// Parse a raw attribute list, e.g. `"pointer,conformant"`.
    pub fn parse(raw: &str) -> Self {
        let mut tags = Self::default();
        for token in raw.split(',') {
            let token = token.trim();
            match token {
                "" => {}
                TAG_POINTER => tags.pointer = true,
                TAG_CONFORMANT => tags.conformant = true,
                TAG_VARYING => tags.varying = true,
                TAG_UNION_TAG => tags.union_tag = true,
                _ => {
                    if let Some(rest) = token.strip_prefix(TAG_UNION_FIELD) {
                        if let Some(name) = rest.strip_prefix(':') {
                            tags.union_field = Some(name.to_string());
                        }
                    }
                    // anything else is a future attribute: ignore
                }
            }
        }
        tags
    }

    /// Strip the pointer flag.
    ///
    /// Must be applied before a deferred referent is processed, otherwise a
    /// self-referential declaration would recurse forever.
    pub fn without_pointer(&self) -> Self {
        Self {
            pointer: false,
            ..self.clone()
        }
    }

    /// Strip the array-shape flags for fixed-array elements.
    pub fn without_shape(&self) -> Self {
        Self {
            conformant: false,
            varying: false,
            ..self.clone()
        }
    }
}
