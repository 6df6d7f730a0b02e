//! std140 / std430 block layout.
//!
//! A [`Block`] is an ordered list of fields; adding a field computes its
//! offset from the running size of the fields added so far, following the
//! stride/align tables for the selected [`BlockLayout`]. The tables and the
//! offset/size recurrences below are a direct port of the reference
//! implementation's `strides_map` / `sizes_map` / `aligns_map` and
//! `fill_tail_field_info` (§3.4; Testable Properties #9, #10).

use crate::error::{ErrorCode, NglError};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BlockLayout {
    Std140,
    Std430,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum FieldType {
    Bool,
    I32,
    IVec2,
    IVec3,
    IVec4,
    U32,
    UVec2,
    UVec3,
    UVec4,
    F32,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
}

const VEC4_ALIGN: usize = 16;

impl FieldType {
    fn size(self) -> usize {
        use FieldType::*;
        match self {
            Bool | I32 | U32 | F32 => 4,
            IVec2 | UVec2 | Vec2 => 8,
            IVec3 | UVec3 | Vec3 => 12,
            IVec4 | UVec4 | Vec4 => 16,
            Mat3 => 48,
            Mat4 => 64,
        }
    }

    fn align_non_array(self) -> usize {
        use FieldType::*;
        match self {
            Bool | I32 | U32 | F32 => 4,
            IVec2 | UVec2 | Vec2 => 8,
            IVec3 | IVec4 | UVec3 | UVec4 | Vec3 | Vec4 => 16,
            Mat3 | Mat4 => 16,
        }
    }

    fn stride(self, layout: BlockLayout) -> usize {
        use FieldType::*;
        match layout {
            BlockLayout::Std140 => match self {
                Mat3 => 16 * 3,
                Mat4 => 16 * 4,
                _ => 16,
            },
            BlockLayout::Std430 => match self {
                Bool | I32 | U32 | F32 => 4,
                IVec2 | UVec2 | Vec2 => 8,
                IVec3 | IVec4 | UVec3 | UVec4 | Vec3 | Vec4 => 16,
                Mat3 => 16 * 3,
                Mat4 => 16 * 4,
            },
        }
    }

    fn is_matrix(self) -> bool {
        matches!(self, FieldType::Mat3 | FieldType::Mat4)
    }
}

/// `None` count marks the variadic tail field (§3.4: "one field per block
/// may be declared variadic").
#[derive(Clone, Debug)]
pub struct BlockField {
    pub name: String,
    pub ty: FieldType,
    pub count: Option<usize>,
    pub offset: usize,
    pub size: usize,
    pub stride: usize,
}

impl BlockField {
    /// Copies a tightly-packed CPU-side value of this field's type from
    /// `src` into `dst` (the whole block's staging buffer) at `self.offset`,
    /// spacing repeated elements `self.stride` bytes apart in `dst`. `count`
    /// overrides the field's own declared count (needed for the variadic
    /// tail field, whose runtime count isn't known until upload time);
    /// `None` falls back to the field's own count, or one element for a
    /// non-array field — matching `count ? count : fi->count` in
    /// `ngli_block_field_copy_count`.
    ///
    /// `Mat3` is special-cased exactly as the original does: a mat3 is
    /// stored CPU-side as three tightly-packed `vec3` columns (36 bytes),
    /// but each column lands at `self.stride / 3` bytes apart in `dst`
    /// (16-byte vec4-rounded), since std140/std430 both align a matrix's
    /// columns like an array of vectors.
    pub fn copy_into(&self, dst: &mut [u8], src: &[u8], count: Option<usize>) {
        let dst = &mut dst[self.offset..];
        let n = count.or(self.count).unwrap_or(1).max(1);

        if self.ty == FieldType::Mat3 {
            let dst_vec_stride = self.stride / 3;
            let src_vec_stride = FieldType::Vec3.size();
            let mut d = 0;
            let mut s = 0;
            for _ in 0..3 * n {
                dst[d..d + src_vec_stride].copy_from_slice(&src[s..s + src_vec_stride]);
                d += dst_vec_stride;
                s += src_vec_stride;
            }
            return;
        }

        let elem_size = self.ty.size();
        let mut d = 0;
        let mut s = 0;
        for _ in 0..n {
            dst[d..d + elem_size].copy_from_slice(&src[s..s + elem_size]);
            d += self.stride;
            s += elem_size;
        }
    }
}

/// One field's worth of tightly-packed CPU-side source data, fed to
/// [`Block::copy_fields`]; `count` overrides the field's declared count
/// (used for the variadic tail field).
pub struct FieldData<'a> {
    pub data: &'a [u8],
    pub count: Option<usize>,
}

#[derive(Clone, Debug)]
pub struct Block {
    layout: BlockLayout,
    fields: Vec<BlockField>,
    size: usize,
}

impl Block {
    pub fn new(layout: BlockLayout) -> Self {
        Block {
            layout,
            fields: Vec::new(),
            size: 0,
        }
    }

    pub fn fields(&self) -> &[BlockField] {
        &self.fields
    }

    pub fn layout(&self) -> BlockLayout {
        self.layout
    }

    fn field_size(&self, ty: FieldType, count: Option<usize>) -> usize {
        match count {
            Some(n) => n * ty.stride(self.layout),
            None => ty.size(),
        }
    }

    fn field_align(&self, ty: FieldType, count: Option<usize>) -> usize {
        match count {
            Some(_) if !ty.is_matrix() => ty.stride(self.layout),
            _ => ty.align_non_array(),
        }
    }

    /// Appends a field, computing its offset from the block's current size.
    /// `count = None` for a scalar/vector/matrix field, `Some(n)` for a
    /// fixed-size array, or `Some(0)` to mark the variadic tail field.
    pub fn add_field(
        &mut self,
        name: impl Into<String>,
        ty: FieldType,
        count: Option<usize>,
    ) -> crate::Result<()> {
        if let Some(last) = self.fields.last() {
            if last.count == Some(0) {
                return Err(NglError::new(
                    ErrorCode::Bug,
                    "cannot add a field after a variadic tail field",
                ));
            }
        }

        let is_variadic = count == Some(0);
        let (size, stride, offset) = if is_variadic {
            (0, 0, self.size)
        } else {
            let size = self.field_size(ty, count);
            let align = self.field_align(ty, count);
            let remain = self.size % align;
            let offset = self.size + if remain == 0 { 0 } else { align - remain };
            let stride = ty.stride(self.layout);
            (size, stride, offset)
        };

        if !is_variadic {
            self.size = offset + size;
        }

        self.fields.push(BlockField {
            name: name.into(),
            ty,
            count,
            offset,
            size,
            stride,
        });
        Ok(())
    }

    /// Copies one CPU-side value into its field's place in a std140/std430
    /// staging buffer, mirroring `ngli_block_fields_copy`/
    /// `ngli_block_field_copy_count` from the original implementation this
    /// block layout was ported from (§3.4). `sources[i]` feeds `fields()[i]`;
    /// fewer sources than fields just leaves the trailing fields untouched.
    /// `dst` must be at least `self.size(variadic_count)` bytes.
    pub fn copy_fields(&self, sources: &[FieldData<'_>], dst: &mut [u8]) {
        for (field, src) in self.fields.iter().zip(sources) {
            field.copy_into(dst, src.data, src.count);
        }
    }

    /// Total block size, vec4-aligned. `variadic_count` is required when the
    /// last field is variadic and ignored otherwise.
    pub fn size(&self, variadic_count: Option<usize>) -> usize {
        match self.fields.last() {
            Some(last) if last.count == Some(0) => {
                let n = variadic_count.unwrap_or(0);
                let mut tmp = self.clone();
                tmp.fields.pop();
                tmp.size = if tmp.fields.is_empty() {
                    0
                } else {
                    let prev = tmp.fields.last().unwrap();
                    prev.offset + prev.size
                };
                let size = self.field_size(last.ty, Some(n));
                let align = self.field_align(last.ty, Some(n));
                let remain = tmp.size % align;
                let offset = tmp.size + if remain == 0 { 0 } else { align - remain };
                crate::memalign::align_up(offset + size, VEC4_ALIGN)
            }
            _ => crate::memalign::align_up(self.size, VEC4_ALIGN),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block(layout: BlockLayout) -> Block {
        let mut b = Block::new(layout);
        b.add_field("a", FieldType::F32, None).unwrap();
        b.add_field("b", FieldType::Vec3, None).unwrap();
        b.add_field("c", FieldType::Mat3, None).unwrap();
        b.add_field("d", FieldType::F32, Some(3)).unwrap();
        b
    }

    #[test]
    fn std140_layout_matches_spec_property_9() {
        let b = sample_block(BlockLayout::Std140);
        let offsets: Vec<usize> = b.fields().iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 16, 32, 80]);
        assert_eq!(b.size(None), 128);
    }

    #[test]
    fn std430_layout_matches_spec_property_10() {
        let b = sample_block(BlockLayout::Std430);
        let offsets: Vec<usize> = b.fields().iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 16, 32, 80]);
        // raw size before the final vec4 round-up is 80 + 3*4 = 92 bytes;
        // std430 strides a scalar array tightly at 4 bytes, unlike std140.
        assert_eq!(b.size(None), 96);
    }

    #[test]
    fn variadic_tail_field_size_is_parametric() {
        let mut b = Block::new(BlockLayout::Std430);
        b.add_field("header", FieldType::Vec4, None).unwrap();
        b.add_field("items", FieldType::F32, Some(0)).unwrap();
        assert_eq!(b.size(Some(4)), crate::memalign::align_up(16 + 4 * 4, 16));
        assert_eq!(b.size(Some(0)), 16);
    }

    #[test]
    fn copy_fields_places_scalars_and_arrays_at_their_strides() {
        let mut b = Block::new(BlockLayout::Std140);
        b.add_field("a", FieldType::F32, None).unwrap();
        b.add_field("d", FieldType::F32, Some(3)).unwrap();
        let mut dst = vec![0u8; b.size(None)];

        let a_src = 1.0f32.to_ne_bytes();
        let d_src: Vec<u8> = [2.0f32, 3.0, 4.0].iter().flat_map(|f| f.to_ne_bytes()).collect();
        b.copy_fields(
            &[FieldData { data: &a_src, count: None }, FieldData { data: &d_src, count: None }],
            &mut dst,
        );

        let d_field = &b.fields()[1];
        assert_eq!(f32::from_ne_bytes(dst[0..4].try_into().unwrap()), 1.0);
        for i in 0..3 {
            let off = d_field.offset + i * d_field.stride;
            assert_eq!(f32::from_ne_bytes(dst[off..off + 4].try_into().unwrap()), 2.0 + i as f32);
        }
    }

    #[test]
    fn copy_fields_widens_mat3_columns_from_packed_vec3() {
        let mut b = Block::new(BlockLayout::Std140);
        b.add_field("m", FieldType::Mat3, None).unwrap();
        let mut dst = vec![0xAAu8; b.size(None)];

        // Tightly packed 3 columns of vec3 (36 bytes), as a math library stores a mat3.
        let src: Vec<u8> = (0..9u32).flat_map(|i| (i as f32).to_ne_bytes()).collect();
        b.copy_fields(&[FieldData { data: &src, count: None }], &mut dst);

        let field = &b.fields()[0];
        let dst_vec_stride = field.stride / 3;
        for col in 0..3 {
            for comp in 0..3 {
                let off = field.offset + col * dst_vec_stride + comp * 4;
                let expected = (col * 3 + comp) as f32;
                assert_eq!(f32::from_ne_bytes(dst[off..off + 4].try_into().unwrap()), expected);
            }
            // the vec4 pad byte after each column's 3rd component is untouched
            let pad_off = field.offset + col * dst_vec_stride + 12;
            assert_eq!(dst[pad_off], 0xAA);
        }
    }

    #[test]
    fn copy_fields_honors_variadic_count_override() {
        let mut b = Block::new(BlockLayout::Std430);
        b.add_field("items", FieldType::F32, Some(0)).unwrap();
        let size = b.size(Some(2));
        let mut dst = vec![0u8; size];
        let src: Vec<u8> = [5.0f32, 6.0].iter().flat_map(|f| f.to_ne_bytes()).collect();
        b.copy_fields(&[FieldData { data: &src, count: Some(2) }], &mut dst);
        assert_eq!(f32::from_ne_bytes(dst[0..4].try_into().unwrap()), 5.0);
        assert_eq!(f32::from_ne_bytes(dst[4..8].try_into().unwrap()), 6.0);
    }

    #[test]
    fn adding_field_after_variadic_is_rejected() {
        let mut b = Block::new(BlockLayout::Std430);
        b.add_field("items", FieldType::F32, Some(0)).unwrap();
        assert!(b.add_field("trailing", FieldType::F32, None).is_err());
    }
}
