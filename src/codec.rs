//! C1: the typed primitive codec.
//!
//! Every value on the wire is preceded by a typing byte packing an element
//! count (high nibble) and a type tag (low nibble); counts above 14 spill
//! into a following typed integer. This module is the single place that
//! knows that encoding, the per-width sentinel table, and the
//! width-minimization rule integer encoders rely on.

use nom::multi::many_m_n;
use nom::number::complete::{le_f32, le_i16, le_i32, le_i8, le_u8};
use nom::IResult;
use num_enum::TryFromPrimitive;

use crate::error::{BcfError, Position, Result};

/// Low nibble of the typing byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum TypeTag {
    Missing = 0,
    Int8 = 1,
    Int16 = 2,
    Int32 = 3,
    Float32 = 5,
    Char = 7,
}

/// The width an integer field was narrowed to. Distinct from [`TypeTag`]
/// because only `Int8`/`Int16`/`Int32` participate in width-minimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IntWidth {
    Int8,
    Int16,
    Int32,
}

impl IntWidth {
    pub fn tag(self) -> TypeTag {
        match self {
            IntWidth::Int8 => TypeTag::Int8,
            IntWidth::Int16 => TypeTag::Int16,
            IntWidth::Int32 => TypeTag::Int32,
        }
    }

    pub fn byte_width(self) -> usize {
        match self {
            IntWidth::Int8 => 1,
            IntWidth::Int16 => 2,
            IntWidth::Int32 => 4,
        }
    }

    /// Minimum/maximum *non-reserved* value this width can carry
    /// (the per-width sentinel table).
    pub fn data_range(self) -> (i64, i64) {
        match self {
            IntWidth::Int8 => (-120, 127),
            IntWidth::Int16 => (-32760, 32767),
            IntWidth::Int32 => (i32::MIN as i64 + 8, i32::MAX as i64),
        }
    }

    pub fn missing(self) -> i32 {
        match self {
            IntWidth::Int8 => i8::MIN as i32,
            IntWidth::Int16 => i16::MIN as i32,
            IntWidth::Int32 => i32::MIN,
        }
    }

    pub fn eov(self) -> i32 {
        self.missing() + 1
    }

    fn fits(self, v: i64) -> bool {
        let (lo, hi) = self.data_range();
        v >= lo && v <= hi
    }
}

pub const MISSING_FLOAT_BITS: u32 = 0x7F800001;
pub const EOV_FLOAT_BITS: u32 = 0x7F800002;

pub fn missing_float() -> f32 {
    f32::from_bits(MISSING_FLOAT_BITS)
}

pub fn eov_float() -> f32 {
    f32::from_bits(EOV_FLOAT_BITS)
}

pub fn is_missing_float(v: f32) -> bool {
    v.to_bits() == MISSING_FLOAT_BITS
}

pub fn is_eov_float(v: f32) -> bool {
    v.to_bits() == EOV_FLOAT_BITS
}

/// Width-minimizing selection for a single scalar value.
pub fn width_for_scalar(v: i64) -> IntWidth {
    if IntWidth::Int8.fits(v) {
        IntWidth::Int8
    } else if IntWidth::Int16.fits(v) {
        IntWidth::Int16
    } else {
        IntWidth::Int32
    }
}

/// Width-minimizing selection across a vector/iterator of values,
/// early-exiting once INT32 is reached. Missing/null entries
/// must not be folded in by the caller — they never widen the type.
pub fn width_for_values<I: IntoIterator<Item = i64>>(values: I) -> IntWidth {
    let mut width = IntWidth::Int8;
    for v in values {
        if width == IntWidth::Int32 {
            break;
        }
        let w = width_for_scalar(v);
        if w > width {
            width = w;
        }
    }
    width
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub kind: TypeTag,
    pub num_elements: usize,
}

fn read_sized_int(kind: TypeTag, input: &[u8]) -> IResult<&[u8], usize> {
    match kind {
        TypeTag::Int8 => nom::combinator::map(le_i8, |v| v as usize)(input),
        TypeTag::Int16 => nom::combinator::map(le_i16, |v| v as usize)(input),
        TypeTag::Int32 => nom::combinator::map(le_i32, |v| v as usize)(input),
        _ => Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        ))),
    }
}

/// Reads one typing byte, following the overflow marker (count nibble ==
/// 15) into a typed int giving the real element count (spec §4.1, §6).
pub fn type_descriptor(input: &[u8]) -> IResult<&[u8], TypeDescriptor> {
    let (input, byte) = le_u8(input)?;
    let type_nibble = byte & 0x0F;
    let count_nibble = (byte >> 4) & 0x0F;
    let kind = TypeTag::try_from(type_nibble).map_err(|_| {
        nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::Tag))
    })?;
    if count_nibble == 15 {
        let (input, overflow) = type_descriptor(input)?;
        let (input, num_elements) = read_sized_int(overflow.kind, input)?;
        Ok((input, TypeDescriptor { kind, num_elements }))
    } else {
        Ok((
            input,
            TypeDescriptor {
                kind,
                num_elements: count_nibble as usize,
            },
        ))
    }
}

pub fn read_int(kind: TypeTag, input: &[u8]) -> IResult<&[u8], i32> {
    match kind {
        TypeTag::Int8 => nom::combinator::map(le_i8, i32::from)(input),
        TypeTag::Int16 => nom::combinator::map(le_i16, i32::from)(input),
        TypeTag::Int32 => le_i32(input),
        _ => Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        ))),
    }
}

pub fn read_ints(kind: TypeTag, n: usize, input: &[u8]) -> IResult<&[u8], Vec<i32>> {
    many_m_n(n, n, |i| read_int(kind, i))(input)
}

pub fn read_f32(input: &[u8]) -> IResult<&[u8], f32> {
    le_f32(input)
}

pub fn read_floats(n: usize, input: &[u8]) -> IResult<&[u8], Vec<f32>> {
    many_m_n(n, n, le_f32)(input)
}

/// One typed scalar integer: descriptor + value, used for dictionary
/// offset keys (spec §4.6).
pub fn typed_int(input: &[u8]) -> IResult<&[u8], i32> {
    let (input, descriptor) = type_descriptor(input)?;
    read_int(descriptor.kind, input)
}

// --- encode side: plain little-endian byte pushes, no combinator crate ---
// needed for writing (nom is a parser library, the teacher only ever reads).

pub fn write_type_descriptor(out: &mut Vec<u8>, num_elements: usize, tag: TypeTag) {
    let tag_byte = tag as u8;
    if num_elements <= 14 {
        out.push(((num_elements as u8) << 4) | tag_byte);
    } else {
        out.push((15 << 4) | tag_byte);
        write_typed_int(out, num_elements as i64);
    }
}

/// Writes the narrowest typed int that can hold `v` (used for element
/// counts > 14 and dictionary offset keys). These are always
/// non-negative, so they can never land in a reserved range (every
/// width's reserved range is strictly negative) — no check needed here,
/// unlike [`write_int`].
pub fn write_typed_int(out: &mut Vec<u8>, v: i64) {
    let width = width_for_scalar(v);
    write_type_descriptor(out, 1, width.tag());
    write_int_raw(out, v as i32, width);
}

fn write_int_raw(out: &mut Vec<u8>, v: i32, width: IntWidth) {
    match width {
        IntWidth::Int8 => out.push(v as i8 as u8),
        IntWidth::Int16 => out.extend_from_slice(&(v as i16).to_le_bytes()),
        IntWidth::Int32 => out.extend_from_slice(&v.to_le_bytes()),
    }
}

/// Writes an ordinary data value. Unlike the sentinel writers below,
/// this rejects a value that falls in `width`'s reserved range: a data
/// value must never be indistinguishable from a missing/EOV sentinel or
/// one of the other reserved codes (spec §7, §9) — `width_for_scalar`'s
/// INT32 fallback has no narrower width to widen into, so this is the
/// only backstop against silently emitting one.
pub fn write_int(out: &mut Vec<u8>, v: i32, width: IntWidth) -> Result<()> {
    let (lo, hi) = width.data_range();
    let v64 = v as i64;
    if v64 < lo || v64 > hi {
        return Err(BcfError::InvalidTyping {
            at: Position::default(),
            reason: format!("value {v} falls in {width:?}'s reserved range"),
        });
    }
    write_int_raw(out, v, width);
    Ok(())
}

pub fn write_f32(out: &mut Vec<u8>, v: f32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn write_missing_int(out: &mut Vec<u8>, width: IntWidth) {
    write_int_raw(out, width.missing(), width);
}

pub fn write_eov_int(out: &mut Vec<u8>, width: IntWidth) {
    write_int_raw(out, width.eov(), width);
}

pub fn write_missing_float(out: &mut Vec<u8>) {
    write_f32(out, missing_float());
}

pub fn write_eov_float(out: &mut Vec<u8>) {
    write_f32(out, eov_float());
}

/// Missing string: the lone byte `0x07` (CHAR typing byte, size 0).
pub const MISSING_STRING_BYTE: u8 = 0x07;

pub fn write_missing_string(out: &mut Vec<u8>) {
    out.push(MISSING_STRING_BYTE);
}

pub fn write_string(out: &mut Vec<u8>, s: &[u8]) {
    write_type_descriptor(out, s.len(), TypeTag::Char);
    out.extend_from_slice(s);
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn width_selection_respects_reserved_ranges() {
        assert_eq!(width_for_scalar(-120), IntWidth::Int8);
        assert_eq!(width_for_scalar(-121), IntWidth::Int16);
        assert_eq!(width_for_scalar(127), IntWidth::Int8);
        assert_eq!(width_for_scalar(1_000_000), IntWidth::Int32);
        assert_eq!(width_for_scalar(32767), IntWidth::Int16);
        assert_eq!(width_for_scalar(32761), IntWidth::Int16);
    }

    #[test]
    fn vector_width_early_exits_at_int32() {
        let width = width_for_values(vec![1, 2, 3, 1_000_000, 4]);
        assert_eq!(width, IntWidth::Int32);
    }

    #[test]
    fn type_descriptor_round_trips_small_count() {
        let mut buf = Vec::new();
        write_type_descriptor(&mut buf, 2, TypeTag::Int8);
        let (rest, desc) = type_descriptor(&buf).unwrap();
        assert!(rest.is_empty());
        assert_eq!(desc.kind, TypeTag::Int8);
        assert_eq!(desc.num_elements, 2);
    }

    #[test]
    fn type_descriptor_overflow_marker_activates_above_14() {
        let mut buf = Vec::new();
        write_type_descriptor(&mut buf, 14, TypeTag::Int8);
        assert_eq!(buf.len(), 1);

        let mut buf2 = Vec::new();
        write_type_descriptor(&mut buf2, 15, TypeTag::Int8);
        assert!(buf2.len() > 1);
        let (rest, desc) = type_descriptor(&buf2).unwrap();
        assert!(rest.is_empty());
        assert_eq!(desc.num_elements, 15);
    }

    #[test]
    fn missing_string_is_single_byte() {
        let mut buf = Vec::new();
        write_missing_string(&mut buf);
        assert_eq!(buf, vec![0x07]);
    }

    #[test]
    fn ordinary_data_in_int32_reserved_range_is_a_hard_error() {
        // width_for_scalar falls back to Int32 here since the value fits
        // neither Int8 nor Int16, but i32::MIN+3 is still in Int32's own
        // reserved range — there is no wider fallback to widen into.
        let v = i32::MIN + 3;
        assert_eq!(width_for_scalar(v as i64), IntWidth::Int32);
        let mut buf = Vec::new();
        let err = write_int(&mut buf, v, IntWidth::Int32).unwrap_err();
        assert!(matches!(err, BcfError::InvalidTyping { .. }));
    }

    #[test]
    fn ordinary_data_outside_reserved_range_still_writes() {
        let mut buf = Vec::new();
        write_int(&mut buf, 1_000_000, IntWidth::Int32).unwrap();
        assert_eq!(buf, 1_000_000i32.to_le_bytes().to_vec());
    }
}
