//! Array emission
//!
//! Three slice layouts, selected by the field's attributes:
//!
//! | Layout             | Header emitted in place            | Body     |
//! |--------------------|------------------------------------|----------|
//! | Conformant         | none (max hoisted by the scan)     | elements |
//! | Varying            | `offset=0`, `actual_count`         | elements |
//! | Conformant varying | `offset=0`, `actual_count`         | elements |
//!
//! Untagged slices default to the conformant layout. Fixed arrays emit bare
//! elements with no header at all.

use crate::encode::{DeferredPtr, Encoder};
use crate::error::Result;
use crate::tags::FieldTags;
use crate::value::NdrValue;

impl Encoder {
    /// Elements in order, no length prefix. Shape flags do not apply to the
    /// elements of a fixed array.
    pub(crate) fn write_fixed_array<'a>(
        &mut self,
        elements: &'a [NdrValue],
        tags: &FieldTags,
        deferred: &mut Vec<DeferredPtr<'a>>,
    ) -> Result<()> {
        let element_tags = tags.without_shape();
        for element in elements {
            self.fill(element, &element_tags, deferred)?;
        }
        Ok(())
    }

    /// Runtime-sized array. Varying layouts emit their actual count in
    /// place; the conformant maximum never appears here because the scan
    /// hoisted it to the head of the enclosing type.
    ///
    /// Attributes propagate to the elements, so nested slices repeat the
    /// layout per dimension and conformant string elements take the
    /// conformant varying string path.
    pub(crate) fn write_slice<'a>(
        &mut self,
        elements: &'a [NdrValue],
        tags: &FieldTags,
        deferred: &mut Vec<DeferredPtr<'a>>,
    ) -> Result<()> {
        if tags.varying {
            self.align(4);
            self.ctx.put_u32(&mut self.out, 0); // offset
            self.ctx.put_u32(&mut self.out, elements.len() as u32);
        }
        for element in elements {
            self.fill(element, tags, deferred)?;
        }
        Ok(())
    }
}
