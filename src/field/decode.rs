//! C5: field decoders, the inverse of [`crate::field::encode`].
//!
//! Vectors are reconstructed by truncating at the first sentinel
//! (missing or end-of-vector) rather than modeling a per-element
//! optional hole — [`crate::record::Value`] has no such slot, and every
//! value this codec itself writes only ever pads as a suffix, never an
//! interior gap.

use nom::IResult;

use crate::codec::{self, IntWidth, TypeDescriptor, TypeTag};
use crate::record::{GtAllele, Value};
use crate::version::MinorVersion;

pub enum RawPayload {
    Ints(Vec<i32>),
    Floats(Vec<f32>),
    Bytes(Vec<u8>),
    Missing,
}

pub fn read_typed_payload(input: &[u8]) -> IResult<&[u8], (TypeDescriptor, RawPayload)> {
    let (input, td) = codec::type_descriptor(input)?;
    let (input, payload) = match td.kind {
        TypeTag::Missing => (input, RawPayload::Missing),
        TypeTag::Int8 | TypeTag::Int16 | TypeTag::Int32 => {
            let (input, v) = codec::read_ints(td.kind, td.num_elements, input)?;
            (input, RawPayload::Ints(v))
        }
        TypeTag::Float32 => {
            let (input, v) = codec::read_floats(td.num_elements, input)?;
            (input, RawPayload::Floats(v))
        }
        TypeTag::Char => {
            let (input, bytes) = nom::bytes::complete::take(td.num_elements)(input)?;
            (input, RawPayload::Bytes(bytes.to_vec()))
        }
    };
    Ok((input, (td, payload)))
}

fn width_of(kind: TypeTag) -> Option<IntWidth> {
    match kind {
        TypeTag::Int8 => Some(IntWidth::Int8),
        TypeTag::Int16 => Some(IntWidth::Int16),
        TypeTag::Int32 => Some(IntWidth::Int32),
        _ => None,
    }
}

/// Index of the first missing/EOV sentinel in `values`, i.e. the
/// boundary between real data and padding.
fn first_sentinel(values: &[i32], width: IntWidth) -> usize {
    values
        .iter()
        .position(|&v| v == width.missing() || v == width.eov())
        .unwrap_or(values.len())
}

fn first_float_sentinel(values: &[f32]) -> usize {
    values
        .iter()
        .position(|&v| codec::is_missing_float(v) || codec::is_eov_float(v))
        .unwrap_or(values.len())
}

fn trim_bytes(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    &bytes[..end]
}

/// Decodes one INFO value, given its header schema's value_type/count and
/// the already-read typing byte + payload.
pub fn decode_info_value(
    is_scalar: bool,
    td: &TypeDescriptor,
    payload: RawPayload,
    is_flag: bool,
    is_string: bool,
    version: MinorVersion,
) -> Value {
    if is_flag {
        return match payload {
            RawPayload::Ints(v) if v.first() == Some(&1) => Value::Flag(true),
            _ => Value::Missing,
        };
    }
    match payload {
        RawPayload::Missing => Value::Missing,
        RawPayload::Ints(values) => {
            let width = width_of(td.kind).unwrap_or(IntWidth::Int32);
            let cut = first_sentinel(&values, width);
            let data = &values[..cut];
            if is_scalar {
                data.first().copied().map(Value::Integer).unwrap_or(Value::Missing)
            } else if data.is_empty() {
                Value::Missing
            } else {
                Value::IntegerVec(data.to_vec())
            }
        }
        RawPayload::Floats(values) => {
            let cut = first_float_sentinel(&values);
            let data = &values[..cut];
            if is_scalar {
                data.first().copied().map(Value::Float).unwrap_or(Value::Missing)
            } else if data.is_empty() {
                Value::Missing
            } else {
                Value::FloatVec(data.to_vec())
            }
        }
        RawPayload::Bytes(bytes) => {
            if bytes.is_empty() {
                return Value::Missing;
            }
            if is_string {
                let text = String::from_utf8_lossy(&bytes);
                let text = if version.leading_comma_join() {
                    text.strip_prefix(',').unwrap_or(&text).to_string()
                } else {
                    text.to_string()
                };
                let parts: Vec<String> = text.split(',').map(str::to_string).collect();
                if parts.len() == 1 {
                    Value::String(parts.into_iter().next().unwrap())
                } else {
                    Value::StringVec(parts)
                }
            } else {
                let trimmed = trim_bytes(&bytes);
                let text = String::from_utf8_lossy(trimmed).to_string();
                if text.chars().count() == 1 {
                    Value::Character(text.chars().next().unwrap())
                } else {
                    Value::String(text)
                }
            }
        }
    }
}

/// GT: never decodes to "whole field absent" — an all-no-call row and a
/// genuinely absent row are indistinguishable on the wire, so this
/// always returns a concrete allele list.
pub fn decode_gt_rows(raw: &[i32], width: IntWidth, n_values: usize, n_samples: usize) -> Vec<Vec<GtAllele>> {
    (0..n_samples)
        .map(|s| {
            let chunk = &raw[s * n_values..(s + 1) * n_values];
            let ploidy = chunk.iter().position(|&v| v == width.eov()).unwrap_or(n_values);
            chunk[..ploidy]
                .iter()
                .enumerate()
                .map(|(i, &v)| {
                    if v == 0 {
                        GtAllele { allele: None, phased: false }
                    } else {
                        let phase_bit = i != 0 && (v & 1) != 0;
                        let allele = ((v >> 1) - 1) as usize;
                        GtAllele { allele: Some(allele), phased: phase_bit }
                    }
                })
                .collect()
        })
        .collect()
}

pub fn decode_ft_rows(raw: &[u8], row_len: usize, n_samples: usize) -> Vec<Option<String>> {
    (0..n_samples)
        .map(|s| {
            let row = &raw[s * row_len..(s + 1) * row_len];
            let text = String::from_utf8_lossy(trim_bytes(row)).to_string();
            if text == "PASS" {
                None
            } else {
                Some(text)
            }
        })
        .collect()
}

pub fn decode_atomic_int_rows(raw: &[i32], width: IntWidth, n_samples: usize) -> Vec<Option<i32>> {
    (0..n_samples)
        .map(|s| {
            let v = raw[s];
            if v == width.missing() {
                None
            } else {
                Some(v)
            }
        })
        .collect()
}

pub fn decode_vector_int_rows(
    raw: &[i32],
    width: IntWidth,
    n_values: usize,
    n_samples: usize,
) -> Vec<Option<Vec<i32>>> {
    (0..n_samples)
        .map(|s| {
            let chunk = &raw[s * n_values..(s + 1) * n_values];
            let cut = first_sentinel(chunk, width);
            if cut == 0 {
                None
            } else {
                Some(chunk[..cut].to_vec())
            }
        })
        .collect()
}

pub fn decode_generic_int_rows(raw: &[i32], width: IntWidth, n_values: usize, n_samples: usize) -> Vec<Value> {
    decode_vector_int_rows(raw, width, n_values, n_samples)
        .into_iter()
        .map(|row| match row {
            None => Value::Missing,
            Some(v) if v.len() == 1 => Value::Integer(v[0]),
            Some(v) => Value::IntegerVec(v),
        })
        .collect()
}

pub fn decode_generic_float_rows(raw: &[f32], n_values: usize, n_samples: usize) -> Vec<Value> {
    (0..n_samples)
        .map(|s| {
            let chunk = &raw[s * n_values..(s + 1) * n_values];
            let cut = first_float_sentinel(chunk);
            if cut == 0 {
                Value::Missing
            } else if cut == 1 {
                Value::Float(chunk[0])
            } else {
                Value::FloatVec(chunk[..cut].to_vec())
            }
        })
        .collect()
}

pub fn decode_generic_char_rows(raw: &[u8], row_len: usize, n_samples: usize) -> Vec<Value> {
    (0..n_samples)
        .map(|s| {
            let row = &raw[s * row_len..(s + 1) * row_len];
            let trimmed = trim_bytes(row);
            if trimmed.is_empty() {
                Value::Missing
            } else {
                Value::String(String::from_utf8_lossy(trimmed).to_string())
            }
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn trims_padding_at_first_sentinel() {
        let raw = vec![1, 2, IntWidth::Int8.eov(), IntWidth::Int8.eov()];
        let rows = decode_vector_int_rows(&raw, IntWidth::Int8, 4, 1);
        assert_eq!(rows[0], Some(vec![1, 2]));
    }

    #[test]
    fn gt_decodes_phase_bit() {
        let width = IntWidth::Int8;
        let raw = vec![0x04, 0x05];
        let rows = decode_gt_rows(&raw, width, 2, 1);
        assert_eq!(rows[0][0], GtAllele { allele: Some(1), phased: false });
        assert_eq!(rows[0][1], GtAllele { allele: Some(1), phased: true });
    }

    #[test]
    fn ft_pass_decodes_to_none() {
        let raw = b"PASS".to_vec();
        let rows = decode_ft_rows(&raw, 4, 1);
        assert_eq!(rows[0], None);
    }
}
