//! NDR Transfer Syntax 1 encoder
//!
//! The encoder turns a value tree into a self-consistent octet stream in
//! two entangled passes per constructed type:
//!
//! 1. a shallow conformant scan hoists the maximum counts of embedded
//!    conformant strings and slices to the head of the type, and
//! 2. the fill pass emits aligned primitives, writes referent ids in place
//!    of pointer-tagged fields, and queues their referents for emission
//!    after the pointing frame completes (FIFO per frame, depth-first
//!    across frames).
//!
//! A union discriminant is carried as transient state of the struct walk;
//! only the arm selected by the type's discriminant mapping contributes
//! bytes.

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace};

use crate::context::{ByteOrder, NdrContext};
use crate::error::{NdrError, Result};
use crate::header;
use crate::tags::FieldTags;
use crate::value::{slice_dimensions, NdrStruct, NdrValue};

/// First referent id handed out within one encoding. Ids advance by 4 per
/// allocation; receivers may rely on the sequence to de-duplicate aliases.
const INITIAL_REFERENT_ID: u32 = 0x0002_0000;

/// Marker written ahead of the root body: "top-level referent follows".
/// Never collides with an allocated referent id.
const TOP_LEVEL_REFERENT: u32 = 0xFFFF_FFFF;

/// Step between consecutive referent ids.
const REFERENT_ID_STEP: u32 = 4;

/// A pointer referent queued for emission after the current frame.
pub(crate) struct DeferredPtr<'a> {
    pub(crate) value: &'a NdrValue,
    pub(crate) tags: FieldTags,
}

/// Marshals one value tree into one NDR byte stream.
///
/// An encoder instance owns the output buffer and is strictly
/// single-threaded; all alignment is computed against the buffer base.
#[derive(Debug)]
pub struct Encoder {
    pub(crate) out: BytesMut,
    pub(crate) ctx: NdrContext,
    next_referent_id: u32,
    /// Conformant maxes collected by the scan, emitted at the head of the
    /// constructed type being processed and cleared afterwards.
    conformant_max: Vec<u32>,
    /// Diagnostic stack of struct and field names, for error messages only.
    current: Vec<String>,
    include_headers: bool,
}

impl Encoder {
    /// Create an encoder writing into `out`.
    ///
    /// With `include_headers` set, [`Encoder::encode`] prepends the Type
    /// Serialization 1 common and private headers to the returned stream.
    pub fn new(out: BytesMut, include_headers: bool) -> Self {
        Self {
            out,
            ctx: NdrContext::new(),
            next_referent_id: INITIAL_REFERENT_ID,
            conformant_max: Vec::new(),
            current: Vec::new(),
            include_headers,
        }
    }

    /// Select the byte order of emitted primitives.
    ///
    /// The order is fixed for the lifetime of one encoding; the common
    /// header is always written little-endian.
    pub fn set_endianness(&mut self, order: ByteOrder) {
        self.ctx = NdrContext::with_byte_order(order);
    }

    /// The raw body buffer written so far (headers excluded).
    pub fn bytes(&self) -> &[u8] {
        &self.out
    }

    /// Marshal `value` and return the complete octet stream.
    pub fn encode(&mut self, value: &NdrValue) -> Result<Bytes> {
        let root_tags = FieldTags::default();

        // Conformant maxes of the root constructed type come first.
        self.write_conformant_maxes(value, &root_tags)?;

        // Top-level referent marker ahead of the root body.
        self.align(4);
        self.ctx.put_u32(&mut self.out, TOP_LEVEL_REFERENT);

        let mut deferred = Vec::new();
        self.fill(value, &root_tags, &mut deferred)?;
        self.drain(deferred)?;

        if self.include_headers {
            let framed = header::frame(&mut self.out);
            debug!("encoded {} framed bytes", framed.len());
            Ok(framed)
        } else {
            debug!("encoded {} bytes", self.out.len());
            Ok(self.out.clone().freeze())
        }
    }

    /// Encode one constructed type: scan, fill, then emit its deferred
    /// referents in the order their referent ids were written.
    fn process(&mut self, value: &NdrValue, tags: &FieldTags) -> Result<()> {
        self.write_conformant_maxes(value, tags)?;
        let mut deferred = Vec::new();
        self.fill(value, tags, &mut deferred)?;
        self.drain(deferred)
    }

    fn drain(&mut self, deferred: Vec<DeferredPtr<'_>>) -> Result<()> {
        for entry in deferred {
            trace!("writing deferred referent at offset {}", self.out.len());
            self.process(entry.value, &entry.tags)?;
        }
        Ok(())
    }

    /// Scan `value` for embedded conformant fields and emit the hoisted
    /// maxes as consecutive u32s. The accumulator is cleared afterwards so
    /// deferred referents never inherit maxes belonging to their parent.
    fn write_conformant_maxes(&mut self, value: &NdrValue, tags: &FieldTags) -> Result<()> {
        self.conformant_scan(value, tags);
        let maxes = std::mem::take(&mut self.conformant_max);
        if !maxes.is_empty() {
            trace!("hoisting {} conformant max counts", maxes.len());
            self.align(4);
            for max in maxes {
                self.ctx.put_u32(&mut self.out, max);
            }
        }
        Ok(())
    }

    /// Shallow recursive walk collecting maximum element counts of
    /// conformant strings and slices in declaration order.
    fn conformant_scan(&mut self, value: &NdrValue, tags: &FieldTags) {
        // Conformant information belongs to the referent, not the pointer
        // site; the deferred referent runs its own scan.
        if tags.pointer {
            return;
        }
        match value {
            NdrValue::Struct(s) => {
                for field in &s.fields {
                    let field_tags = FieldTags::parse(&field.tags);
                    self.conformant_scan(&field.value, &field_tags);
                }
            }
            NdrValue::Str(s) if tags.conformant => {
                // Max counts elements (UTF-16 code units), not bytes.
                self.conformant_max.push(s.encode_utf16().count() as u32);
            }
            NdrValue::Slice(elements) if tags.conformant => {
                let (dims, string_elements) = slice_dimensions(elements);
                for _ in 0..dims {
                    self.conformant_max.push(elements.len() as u32);
                }
                if string_elements {
                    // Common max for the strings within the array.
                    self.conformant_max.push(0);
                }
            }
            _ => {}
        }
    }

    /// Emit one field. Pointer-tagged fields write a referent id (or a null
    /// reference) and queue the pointee; everything else dispatches on kind.
    pub(crate) fn fill<'a>(
        &mut self,
        value: &'a NdrValue,
        tags: &FieldTags,
        deferred: &mut Vec<DeferredPtr<'a>>,
    ) -> Result<()> {
        if tags.pointer {
            return self.write_pointer(value, tags, deferred);
        }

        match value {
            NdrValue::Struct(s) => self.fill_struct(s, deferred),
            NdrValue::Bool(v) => {
                self.write_bool(*v);
                Ok(())
            }
            NdrValue::UInt8(v) => {
                self.write_u8(*v);
                Ok(())
            }
            NdrValue::UInt16(v) => {
                self.write_u16(*v);
                Ok(())
            }
            NdrValue::UInt32(v) => {
                self.write_u32(*v);
                Ok(())
            }
            NdrValue::UInt64(v) => {
                self.write_u64(*v);
                Ok(())
            }
            NdrValue::Int8(v) => {
                self.write_i8(*v);
                Ok(())
            }
            NdrValue::Int16(v) => {
                self.write_i16(*v);
                Ok(())
            }
            NdrValue::Int32(v) => {
                self.write_i32(*v);
                Ok(())
            }
            NdrValue::Int64(v) => {
                self.write_i64(*v);
                Ok(())
            }
            NdrValue::Single(v) => {
                self.write_f32(*v);
                Ok(())
            }
            NdrValue::Double(v) => {
                self.write_f64(*v);
                Ok(())
            }
            NdrValue::Str(s) => {
                if tags.conformant {
                    self.write_conformant_varying_string(s)
                } else {
                    // Varying strings without a conformant bound have no
                    // defined layout in this feature set.
                    Err(self.unsupported("varying string"))
                }
            }
            NdrValue::FixedArray(elements) => self.write_fixed_array(elements, tags, deferred),
            NdrValue::Slice(elements) => self.write_slice(elements, tags, deferred),
        }
    }

    /// Write a referent id for a live pointer and queue its referent, or a
    /// 4-byte null reference for the zero value.
    fn write_pointer<'a>(
        &mut self,
        value: &'a NdrValue,
        tags: &FieldTags,
        deferred: &mut Vec<DeferredPtr<'a>>,
    ) -> Result<()> {
        // An empty string still gets a live referent: an empty varying
        // string follows as the deferred body.
        let live = matches!(value, NdrValue::Str(_)) || !value.is_default();
        self.align(4);
        if live {
            let id = self.next_referent_id;
            self.next_referent_id += REFERENT_ID_STEP;
            trace!("deferring referent {:#010x}", id);
            self.ctx.put_u32(&mut self.out, id);
            deferred.push(DeferredPtr {
                value,
                tags: tags.without_pointer(),
            });
        } else {
            self.ctx.put_u32(&mut self.out, 0);
        }
        Ok(())
    }

    /// Walk a struct's fields in declaration order, driving the union-arm
    /// filter: the discriminant value is captured from the `union_tag`
    /// field, the first `union_field` triggers the arm lookup, and every
    /// non-selected arm is skipped with no bytes and no alignment.
    fn fill_struct<'a>(
        &mut self,
        s: &'a NdrStruct,
        deferred: &mut Vec<DeferredPtr<'a>>,
    ) -> Result<()> {
        self.current.push(s.name.clone());

        let mut discriminant: Option<i64> = None;
        let mut selected: Option<String> = None;

        for field in &s.fields {
            self.current.push(field.name.clone());
            let field_tags = FieldTags::parse(&field.tags);

            if field_tags.union_tag {
                if field_tags.union_field.is_some() {
                    return Err(self.bad_attributes("union_tag combined with union_field"));
                }
                if discriminant.is_none() {
                    discriminant = Some(match field.value.scalar() {
                        Some(v) => v,
                        None => {
                            return Err(self.bad_attributes(&format!(
                                "union_tag on non-integer {}",
                                field.value.kind()
                            )))
                        }
                    });
                }
            } else if let Some(arm) = &field_tags.union_field {
                let tag_value = match discriminant {
                    Some(v) => v,
                    None => {
                        return Err(
                            self.bad_attributes("union arm without a preceding union_tag")
                        )
                    }
                };
                if selected.is_none() {
                    selected = match s.selected_arm(tag_value) {
                        Some(name) => Some(name.to_string()),
                        None => {
                            return Err(NdrError::UnionSelection {
                                path: self.path(),
                                union: s.name.clone(),
                                discriminant: tag_value,
                            })
                        }
                    };
                }
                if selected.as_deref() != Some(arm.as_str()) {
                    // Not the selected arm: no bytes, no alignment.
                    self.current.pop();
                    continue;
                }
                // The selected arm starts on a 4-byte boundary.
                self.align(4);
            }

            self.fill(&field.value, &field_tags, deferred)?;
            self.current.pop();
        }

        self.current.pop();
        Ok(())
    }

    // Primitive writers. Each aligns to the primitive's width against the
    // buffer base, then emits in the configured byte order.

    pub(crate) fn align(&mut self, alignment: usize) {
        let position = self.out.len();
        self.ctx.write_align(&mut self.out, position, alignment);
    }

    fn write_bool(&mut self, v: bool) {
        self.ctx.put_u8(&mut self.out, u8::from(v));
    }

    fn write_u8(&mut self, v: u8) {
        self.ctx.put_u8(&mut self.out, v);
    }

    fn write_i8(&mut self, v: i8) {
        self.ctx.put_i8(&mut self.out, v);
    }

    fn write_u16(&mut self, v: u16) {
        self.align(2);
        self.ctx.put_u16(&mut self.out, v);
    }

    fn write_i16(&mut self, v: i16) {
        self.align(2);
        self.ctx.put_i16(&mut self.out, v);
    }

    fn write_u32(&mut self, v: u32) {
        self.align(4);
        self.ctx.put_u32(&mut self.out, v);
    }

    fn write_i32(&mut self, v: i32) {
        self.align(4);
        self.ctx.put_i32(&mut self.out, v);
    }

    fn write_u64(&mut self, v: u64) {
        self.align(8);
        self.ctx.put_u64(&mut self.out, v);
    }

    fn write_i64(&mut self, v: i64) {
        self.align(8);
        self.ctx.put_i64(&mut self.out, v);
    }

    fn write_f32(&mut self, v: f32) {
        self.align(4);
        self.ctx.put_f32(&mut self.out, v);
    }

    fn write_f64(&mut self, v: f64) {
        self.align(8);
        self.ctx.put_f64(&mut self.out, v);
    }

    // Diagnostics

    fn path(&self) -> String {
        self.current.join("/")
    }

    pub(crate) fn unsupported(&self, kind: &str) -> NdrError {
        NdrError::UnsupportedType {
            path: self.path(),
            kind: kind.to_string(),
        }
    }

    fn bad_attributes(&self, detail: &str) -> NdrError {
        NdrError::BadAttributes {
            path: self.path(),
            detail: detail.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: NdrValue) -> Bytes {
        let mut enc = Encoder::new(BytesMut::new(), false);
        enc.encode(&value).unwrap()
    }

    #[test]
    fn test_referent_ids_advance_by_four() {
        let s = NdrStruct::new("Pair")
            .field("a", "pointer", NdrValue::UInt32(0x11111111))
            .field("b", "pointer", NdrValue::UInt32(0x22222222));
        let out = encode(NdrValue::Struct(s));

        assert_eq!(
            &out[..],
            &[
                0xFF, 0xFF, 0xFF, 0xFF, // top-level referent marker
                0x00, 0x00, 0x02, 0x00, // referent id 0x00020000
                0x04, 0x00, 0x02, 0x00, // referent id 0x00020004
                0x11, 0x11, 0x11, 0x11, // deferred referent a
                0x22, 0x22, 0x22, 0x22, // deferred referent b
            ]
        );
    }

    #[test]
    fn test_null_pointer_for_zero_value() {
        let s = NdrStruct::new("Holder").field("p", "pointer", NdrValue::UInt32(0));
        let out = encode(NdrValue::Struct(s));

        assert_eq!(&out[..], &[0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 0]);
    }

    #[test]
    fn test_empty_string_pointer_is_live() {
        let s = NdrStruct::new("Holder").field(
            "name",
            "pointer,conformant",
            NdrValue::Str(String::new()),
        );
        let out = encode(NdrValue::Struct(s));

        assert_eq!(
            &out[..],
            &[
                0xFF, 0xFF, 0xFF, 0xFF, // marker
                0x00, 0x00, 0x02, 0x00, // live referent despite ""
                0x00, 0x00, 0x00, 0x00, // hoisted max = 0
                0x00, 0x00, 0x00, 0x00, // offset
                0x00, 0x00, 0x00, 0x00, // actual count
            ]
        );
    }

    #[test]
    fn test_primitive_alignment_inside_struct() {
        let s = NdrStruct::new("Mixed")
            .field("flag", "", NdrValue::UInt8(1))
            .field("count", "", NdrValue::UInt32(2))
            .field("total", "", NdrValue::UInt64(3));
        let out = encode(NdrValue::Struct(s));

        // marker(4) + u8(1) + pad(3) + u32(4) + pad(4) + u64(8)
        assert_eq!(out.len(), 24);
        assert_eq!(out[4], 1);
        assert_eq!(&out[5..8], &[0, 0, 0]);
        assert_eq!(&out[8..12], &[2, 0, 0, 0]);
        assert_eq!(&out[16..24], &[3, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_union_selects_single_arm() {
        let s = NdrStruct::new("Choice")
            .arm(1, "arm_a")
            .arm(2, "arm_b")
            .field("tag", "union_tag", NdrValue::UInt16(1))
            .field("arm_a", "union_field:arm_a", NdrValue::UInt32(0xAABBCCDD))
            .field("arm_b", "union_field:arm_b", NdrValue::UInt16(0x0102));
        let out = encode(NdrValue::Struct(s));

        assert_eq!(
            &out[..],
            &[
                0xFF, 0xFF, 0xFF, 0xFF, // marker
                0x01, 0x00, // discriminant
                0x00, 0x00, // pad to the arm boundary
                0xDD, 0xCC, 0xBB, 0xAA, // arm_a only
            ]
        );
    }

    #[test]
    fn test_union_selection_error_names_struct_and_value() {
        let s = NdrStruct::new("Choice")
            .arm(1, "arm_a")
            .field("tag", "union_tag", NdrValue::UInt16(9))
            .field("arm_a", "union_field:arm_a", NdrValue::UInt32(5));
        let mut enc = Encoder::new(BytesMut::new(), false);

        let err = enc.encode(&NdrValue::Struct(s)).unwrap_err();
        match err {
            NdrError::UnionSelection {
                union,
                discriminant,
                path,
            } => {
                assert_eq!(union, "Choice");
                assert_eq!(discriminant, 9);
                assert_eq!(path, "Choice/arm_a");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_union_tag_on_non_integer_is_bad_attributes() {
        let s = NdrStruct::new("Broken")
            .field("tag", "union_tag", NdrValue::Slice(vec![]))
            .field("arm", "union_field:arm", NdrValue::UInt32(1));
        let mut enc = Encoder::new(BytesMut::new(), false);

        let err = enc.encode(&NdrValue::Struct(s)).unwrap_err();
        assert!(matches!(err, NdrError::BadAttributes { .. }));
    }

    #[test]
    fn test_arm_without_discriminant_is_bad_attributes() {
        let s = NdrStruct::new("Broken").field("arm", "union_field:arm", NdrValue::UInt32(1));
        let mut enc = Encoder::new(BytesMut::new(), false);

        let err = enc.encode(&NdrValue::Struct(s)).unwrap_err();
        assert!(matches!(err, NdrError::BadAttributes { .. }));
    }

    #[test]
    fn test_plain_string_is_unsupported() {
        let s = NdrStruct::new("Holder").field("name", "", NdrValue::Str("x".into()));
        let mut enc = Encoder::new(BytesMut::new(), false);

        let err = enc.encode(&NdrValue::Struct(s)).unwrap_err();
        match err {
            NdrError::UnsupportedType { path, kind } => {
                assert_eq!(kind, "varying string");
                assert_eq!(path, "Holder/name");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_deferred_referent_rescans_conformance() {
        // A pointer to a struct with a conformant string: the max must be
        // emitted with the referent, not with the parent.
        let inner = NdrStruct::new("Inner").field("s", "conformant", NdrValue::Str("Hi".into()));
        let outer = NdrStruct::new("Outer").field("p", "pointer", NdrValue::Struct(inner));
        let out = encode(NdrValue::Struct(outer));

        assert_eq!(
            &out[..],
            &[
                0xFF, 0xFF, 0xFF, 0xFF, // marker (no maxes hoisted at root)
                0x00, 0x00, 0x02, 0x00, // referent id
                0x02, 0x00, 0x00, 0x00, // hoisted max, local to the referent
                0x00, 0x00, 0x00, 0x00, // offset
                0x02, 0x00, 0x00, 0x00, // actual count
                0x48, 0x00, 0x69, 0x00, // "Hi" UTF-16LE
            ]
        );
    }

    #[test]
    fn test_big_endian_body() {
        let s = NdrStruct::new("One").field("x", "", NdrValue::UInt32(0x01020304));
        let mut enc = Encoder::new(BytesMut::new(), false);
        enc.set_endianness(ByteOrder::Big);
        let out = enc.encode(&NdrValue::Struct(s)).unwrap();

        assert_eq!(&out[..], &[0xFF, 0xFF, 0xFF, 0xFF, 0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_bytes_exposes_body_after_encode() {
        let s = NdrStruct::new("One").field("x", "", NdrValue::UInt32(7));
        let mut enc = Encoder::new(BytesMut::new(), false);
        let out = enc.encode(&NdrValue::Struct(s)).unwrap();

        assert_eq!(enc.bytes(), &out[..]);
    }
}
