//! Encoder for the NDR Transfer Syntax 1 wire format (the serialization
//! used by DCE RPC "Type Serialization 1").
//!
//! The encoder marshals a tree of typed values into a self-consistent octet
//! stream. Key characteristics of the format:
//! - Primitives align to their natural size (1, 2, 4, or 8 bytes), measured
//!   from the start of the stream
//! - Maximum counts of embedded conformant arrays are hoisted to the head
//!   of their enclosing constructed type
//! - Pointers travel as 4-byte referent ids; the pointed-to data follows as
//!   a deferred referent after the pointing structure completes
//! - A discriminated union emits its discriminant and the selected arm only
//!
//! ```
//! use ndr_marshal::{Encoder, NdrStruct, NdrValue};
//! use bytes::BytesMut;
//!
//! let value = NdrStruct::new("Point")
//!     .field("x", "", NdrValue::Int32(3))
//!     .field("y", "", NdrValue::Int32(-4));
//!
//! let mut encoder = Encoder::new(BytesMut::new(), false);
//! let wire = encoder.encode(&NdrValue::Struct(value)).unwrap();
//! assert_eq!(&wire[..4], &[0xFF, 0xFF, 0xFF, 0xFF]);
//! ```

mod arrays;
mod context;
mod encode;
mod error;
pub mod header;
mod strings;
mod tags;
mod value;

pub use context::{ByteOrder, NdrContext};
pub use encode::Encoder;
pub use error::{NdrError, Result};
pub use tags::{
    FieldTags, TAG_CONFORMANT, TAG_POINTER, TAG_UNION_FIELD, TAG_UNION_TAG, TAG_VARYING,
};
pub use value::{NdrField, NdrStruct, NdrValue};

/// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};
