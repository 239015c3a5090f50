//! Runtime value tree
//!
//! The encoder walks a caller-built tree of typed values rather than
//! reflecting over native types. Each struct field carries its raw attribute
//! list; a struct that contains a union also carries the caller-supplied
//! mapping from discriminant values to arm names.

/// One node of the input value tree.
#[derive(Debug, Clone, PartialEq)]
pub enum NdrValue {
    Bool(bool),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Single(f32),
    Double(f64),
    Str(String),
    Struct(NdrStruct),
    /// Fixed-size array: elements in order, no length prefix.
    FixedArray(Vec<NdrValue>),
    /// Runtime-sized array; layout selected by the field's attributes.
    Slice(Vec<NdrValue>),
}

impl NdrValue {
    /// Short kind name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            NdrValue::Bool(_) => "bool",
            NdrValue::UInt8(_) => "uint8",
            NdrValue::UInt16(_) => "uint16",
            NdrValue::UInt32(_) => "uint32",
            NdrValue::UInt64(_) => "uint64",
            NdrValue::Int8(_) => "int8",
            NdrValue::Int16(_) => "int16",
            NdrValue::Int32(_) => "int32",
            NdrValue::Int64(_) => "int64",
            NdrValue::Single(_) => "single",
            NdrValue::Double(_) => "double",
            NdrValue::Str(_) => "string",
            NdrValue::Struct(_) => "struct",
            NdrValue::FixedArray(_) => "fixed array",
            NdrValue::Slice(_) => "slice",
        }
    }

    /// Whether this value equals the zero value of its kind.
    ///
    /// Decides between a live referent and a null reference for
    /// pointer-tagged fields. Strings are special-cased at the pointer site:
    /// an empty string is still emitted as a non-null reference.
    pub fn is_default(&self) -> bool {
        match self {
            NdrValue::Bool(v) => !v,
            NdrValue::UInt8(v) => *v == 0,
            NdrValue::UInt16(v) => *v == 0,
            NdrValue::UInt32(v) => *v == 0,
            NdrValue::UInt64(v) => *v == 0,
            NdrValue::Int8(v) => *v == 0,
            NdrValue::Int16(v) => *v == 0,
            NdrValue::Int32(v) => *v == 0,
            NdrValue::Int64(v) => *v == 0,
            NdrValue::Single(v) => *v == 0.0,
            NdrValue::Double(v) => *v == 0.0,
            NdrValue::Str(s) => s.is_empty(),
            NdrValue::Struct(s) => s.fields.iter().all(|f| f.value.is_default()),
            NdrValue::FixedArray(elements) | NdrValue::Slice(elements) => {
                elements.iter().all(NdrValue::is_default)
            }
        }
    }

    /// The integer value of a union discriminant, if this is an integer kind.
    pub fn scalar(&self) -> Option<i64> {
        match self {
            NdrValue::UInt8(v) => Some(i64::from(*v)),
            NdrValue::UInt16(v) => Some(i64::from(*v)),
            NdrValue::UInt32(v) => Some(i64::from(*v)),
            NdrValue::UInt64(v) => Some(*v as i64),
            NdrValue::Int8(v) => Some(i64::from(*v)),
            NdrValue::Int16(v) => Some(i64::from(*v)),
            NdrValue::Int32(v) => Some(i64::from(*v)),
            NdrValue::Int64(v) => Some(*v),
            _ => None,
        }
    }
}

/// One field of a constructed type.
#[derive(Debug, Clone, PartialEq)]
pub struct NdrField {
    pub name: String,
    /// Raw comma-separated attribute list, e.g. `"pointer,conformant"`.
    pub tags: String,
    pub value: NdrValue,
}

/// A constructed type: named fields in declaration order.
///
/// For a struct that embeds a union, `arms` maps discriminant values to arm
/// names; the mapping is schema-local and supplied by the type owner.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NdrStruct {
    pub name: String,
    pub fields: Vec<NdrField>,
    pub arms: Vec<(i64, String)>,
}

impl NdrStruct {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            arms: Vec::new(),
        }
    }

    /// Append a field in declaration order.
    pub fn field(mut self, name: impl Into<String>, tags: impl Into<String>, value: NdrValue) -> Self {
        self.fields.push(NdrField {
            name: name.into(),
            tags: tags.into(),
            value,
        });
        self
    }

    /// Declare that discriminant value `discriminant` selects arm `arm`.
    pub fn arm(mut self, discriminant: i64, arm: impl Into<String>) -> Self {
        self.arms.push((discriminant, arm.into()));
        self
    }

    /// Look up the arm name selected by a discriminant value.
    pub fn selected_arm(&self, discriminant: i64) -> Option<&str> {
        self.arms
            .iter()
            .find(|(d, _)| *d == discriminant)
            .map(|(_, name)| name.as_str())
    }
}

/// Dimensionality of a slice value and whether its base element is a string.
///
/// A flat slice has dimension 1; a slice of slices adds one per level. The
/// scanner uses the string flag to append the common string-max.
pub(crate) fn slice_dimensions(elements: &[NdrValue]) -> (usize, bool) {
    match elements.first() {
        Some(NdrValue::Slice(inner)) => {
            let (dims, string_elements) = slice_dimensions(inner);
            (dims + 1, string_elements)
        }
        Some(NdrValue::Str(_)) => (1, true),
        _ => (1, false),
    }
}
