//! C4: field encoders.
//!
//! Each function writes one complete `(typed_int_offset_key, typing_byte,
//! payload)` triple (INFO) or `(typed_int_offset_key, typing_byte,
//! payload[n_samples x n_values])` (FORMAT) into the caller's scratch
//! buffer. FORMAT encoders are necessarily two-pass: the typing byte must
//! declare the narrowest width and longest vector across every sample,
//! and both are known only after every sample has been inspected.

use crate::codec::{
    self, write_eov_int, write_int, write_missing_int, write_missing_string, write_string,
    write_type_descriptor, write_typed_int, IntWidth, TypeTag,
};
use crate::error::{BcfError, Result};
use crate::field::FieldContext;
use crate::header::{CountType, FieldSchema, ValueType};
use crate::record::{Genotype, Value};
use crate::version::MinorVersion;

fn incompatible(key: &str, reason: impl Into<String>) -> BcfError {
    BcfError::IncompatibleValue {
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn cardinality(key: &str, observed: usize, bound: usize) -> BcfError {
    BcfError::CardinalityViolation {
        at: Default::default(),
        key: key.to_string(),
        observed,
        bound,
    }
}

fn pad_int(out: &mut Vec<u8>, width: IntWidth, version: MinorVersion) {
    if version.pads_with_eov() {
        write_eov_int(out, width);
    } else {
        write_missing_int(out, width);
    }
}

fn pad_float(out: &mut Vec<u8>, version: MinorVersion) {
    if version.pads_with_eov() {
        codec::write_eov_float(out);
    } else {
        codec::write_missing_float(out);
    }
}

/// Writes the dictionary-offset key every INFO/FORMAT pair is prefixed
/// with.
fn write_key(out: &mut Vec<u8>, schema: &FieldSchema) {
    write_typed_int(out, schema.dictionary_offset as i64);
}

fn resolved_bound(schema: &FieldSchema, ctx: &FieldContext) -> usize {
    schema.count_type.resolve(ctx.n_alt_alleles, ctx.max_ploidy)
}

// ---------------------------------------------------------------- INFO --

pub fn encode_info_field(
    out: &mut Vec<u8>,
    schema: &FieldSchema,
    value: &Value,
    ctx: &FieldContext,
) -> Result<()> {
    write_key(out, schema);
    match schema.value_type {
        ValueType::Flag => encode_flag(out, schema, value),
        ValueType::Integer => encode_int_values(out, schema, value, ctx),
        ValueType::Float => encode_float_values(out, schema, value, ctx),
        ValueType::String => encode_string(out, schema, value, ctx.version),
        ValueType::Character => encode_character(out, schema, value, ctx),
    }
}

fn encode_flag(out: &mut Vec<u8>, schema: &FieldSchema, value: &Value) -> Result<()> {
    match value {
        Value::Flag(true) => {
            write_type_descriptor(out, 1, TypeTag::Int8);
            out.push(0x01);
        }
        Value::Flag(false) | Value::Missing => {
            write_type_descriptor(out, 1, TypeTag::Int8);
            write_missing_int(out, IntWidth::Int8);
        }
        other => {
            return Err(incompatible(
                &schema.id,
                format!("expected a Flag value, got {other:?}"),
            ))
        }
    }
    Ok(())
}

fn encode_int_values(
    out: &mut Vec<u8>,
    schema: &FieldSchema,
    value: &Value,
    ctx: &FieldContext,
) -> Result<()> {
    let observed = value
        .as_integer_vec()
        .ok_or_else(|| incompatible(&schema.id, format!("expected an integer value, got {value:?}")))?;
    if matches!(schema.count_type, CountType::Fixed(1)) {
        return match value {
            Value::Integer(v) => {
                let width = codec::width_for_scalar(*v as i64);
                write_type_descriptor(out, 1, width.tag());
                write_int(out, *v, width)?;
                Ok(())
            }
            Value::Missing => {
                write_type_descriptor(out, 1, TypeTag::Int8);
                write_missing_int(out, IntWidth::Int8);
                Ok(())
            }
            other => Err(incompatible(&schema.id, format!("expected a scalar integer, got {other:?}"))),
        };
    }
    let n_values = if schema.count_type.is_bounded() {
        let bound = resolved_bound(schema, ctx);
        if observed.len() > bound {
            return Err(cardinality(&schema.id, observed.len(), bound));
        }
        bound
    } else {
        observed.len()
    };
    let width = codec::width_for_values(observed.iter().map(|&v| v as i64));
    write_type_descriptor(out, n_values, width.tag());
    for i in 0..n_values {
        if let Some(v) = observed.get(i) {
            write_int(out, *v, width)?;
        } else {
            pad_int(out, width, ctx.version);
        }
    }
    Ok(())
}

fn encode_float_values(
    out: &mut Vec<u8>,
    schema: &FieldSchema,
    value: &Value,
    ctx: &FieldContext,
) -> Result<()> {
    let observed = value
        .as_float_vec()
        .ok_or_else(|| incompatible(&schema.id, format!("expected a float value, got {value:?}")))?;
    if matches!(schema.count_type, CountType::Fixed(1)) {
        return match value {
            Value::Float(v) => {
                write_type_descriptor(out, 1, TypeTag::Float32);
                codec::write_f32(out, *v);
                Ok(())
            }
            Value::Missing => {
                write_type_descriptor(out, 1, TypeTag::Float32);
                codec::write_missing_float(out);
                Ok(())
            }
            other => Err(incompatible(&schema.id, format!("expected a scalar float, got {other:?}"))),
        };
    }
    let n_values = if schema.count_type.is_bounded() {
        let bound = resolved_bound(schema, ctx);
        if observed.len() > bound {
            return Err(cardinality(&schema.id, observed.len(), bound));
        }
        bound
    } else {
        observed.len()
    };
    write_type_descriptor(out, n_values, TypeTag::Float32);
    for i in 0..n_values {
        if let Some(v) = observed.get(i) {
            codec::write_f32(out, *v);
        } else {
            pad_float(out, ctx.version);
        }
    }
    Ok(())
}

fn encode_string(out: &mut Vec<u8>, schema: &FieldSchema, value: &Value, version: MinorVersion) -> Result<()> {
    let strings = value
        .as_string_vec()
        .ok_or_else(|| incompatible(&schema.id, format!("expected a string value, got {value:?}")))?;
    if strings.is_empty() {
        write_missing_string(out);
        return Ok(());
    }
    let joined = if version.leading_comma_join() {
        format!(",{}", strings.join(","))
    } else {
        strings.join(",")
    };
    write_string(out, joined.as_bytes());
    Ok(())
}

fn encode_character(
    out: &mut Vec<u8>,
    schema: &FieldSchema,
    value: &Value,
    ctx: &FieldContext,
) -> Result<()> {
    let bytes: Vec<u8> = match value {
        Value::Character(c) => c.to_string().into_bytes(),
        Value::String(s) => s.clone().into_bytes(),
        Value::Missing => Vec::new(),
        other => return Err(incompatible(&schema.id, format!("expected a character value, got {other:?}"))),
    };
    let n_values = if schema.count_type.is_bounded() {
        resolved_bound(schema, ctx).max(bytes.len())
    } else {
        bytes.len()
    };
    write_type_descriptor(out, n_values, TypeTag::Char);
    out.extend_from_slice(&bytes);
    out.resize(out.len() + (n_values - bytes.len()), 0u8);
    Ok(())
}

// -------------------------------------------------------------- FORMAT --

/// GT is specialized. `n_values` is the record's resolved
/// max ploidy (floor 2); the typing byte width is sized off
/// `n_alleles << 1`, not off the sample data.
pub fn encode_gt(
    out: &mut Vec<u8>,
    schema: &FieldSchema,
    genotypes: &[Genotype],
    ctx: &FieldContext,
) -> Result<()> {
    write_key(out, schema);
    let n_values = ctx.max_ploidy;
    let width = codec::width_for_scalar((ctx.n_alleles() as i64) << 1);
    write_type_descriptor(out, n_values, width.tag());
    for g in genotypes {
        match &g.gt {
            None => {
                for _ in 0..n_values {
                    write_int(out, 0, width)?;
                }
            }
            Some(alleles) => {
                for (i, a) in alleles.iter().enumerate() {
                    let raw = match a.allele {
                        Some(idx) => {
                            let phase_bit = if i == 0 { 0 } else { a.phased as i64 };
                            (((idx as i64 + 1) << 1) | phase_bit) as i32
                        }
                        None => 0,
                    };
                    write_int(out, raw, width)?;
                }
                for _ in alleles.len()..n_values {
                    write_eov_int(out, width);
                }
            }
        }
    }
    Ok(())
}

/// FT is specialized: a missing filter string on a present genotype
/// encodes as the literal `PASS`, the one FORMAT field where the
/// "null value" distinction is drawn explicitly.
pub fn encode_ft(out: &mut Vec<u8>, schema: &FieldSchema, genotypes: &[Genotype]) {
    write_key(out, schema);
    let max_len = genotypes
        .iter()
        .map(|g| g.ft.as_deref().unwrap_or("PASS").len())
        .max()
        .unwrap_or(0);
    write_type_descriptor(out, max_len, TypeTag::Char);
    for g in genotypes {
        let s = g.ft.as_deref().unwrap_or("PASS");
        out.extend_from_slice(s.as_bytes());
        out.resize(out.len() + (max_len - s.len()), 0u8);
    }
}

/// DP/GQ: one narrow-width scalar int per sample. A Java-level sentinel
/// of `-1` is treated the same as an absent genotype.
pub fn encode_atomic_int_format(
    out: &mut Vec<u8>,
    schema: &FieldSchema,
    values: &[Option<i32>],
) -> Result<()> {
    write_key(out, schema);
    let present: Vec<i64> = values
        .iter()
        .filter_map(|v| v.filter(|&x| x != -1).map(i64::from))
        .collect();
    let width = codec::width_for_values(present);
    write_type_descriptor(out, 1, width.tag());
    for v in values {
        match v {
            Some(x) if *x != -1 => write_int(out, *x, width)?,
            _ => write_missing_int(out, width),
        }
    }
    Ok(())
}

/// AD/PL: fixed-cardinality (R / G) vectors, one row per sample.
pub fn encode_vector_int_format(
    out: &mut Vec<u8>,
    schema: &FieldSchema,
    rows: &[Option<Vec<i32>>],
    ctx: &FieldContext,
) -> Result<()> {
    write_key(out, schema);
    let n_values = resolved_bound(schema, ctx);
    for row in rows {
        if let Some(values) = row {
            if values.len() > n_values {
                return Err(cardinality(&schema.id, values.len(), n_values));
            }
        }
    }
    let width = codec::width_for_values(
        rows.iter()
            .flatten()
            .flatten()
            .map(|&v| v as i64),
    );
    write_type_descriptor(out, n_values, width.tag());
    for row in rows {
        match row {
            Some(values) => {
                for v in values {
                    write_int(out, *v, width)?;
                }
                for _ in values.len()..n_values {
                    pad_int(out, width, ctx.version);
                }
            }
            None => {
                for _ in 0..n_values {
                    pad_int(out, width, ctx.version);
                }
            }
        }
    }
    Ok(())
}

/// Generic FORMAT field (anything not GT/FT/DP/GQ/AD/PL): per-sample
/// rows, padded per the version rule, same shape as an INFO vector.
pub fn encode_generic_format(
    out: &mut Vec<u8>,
    schema: &FieldSchema,
    rows: &[Value],
    ctx: &FieldContext,
) -> Result<()> {
    write_key(out, schema);
    match schema.value_type {
        ValueType::Integer => {
            let n_values = if schema.count_type.is_bounded() {
                resolved_bound(schema, ctx)
            } else {
                rows.iter()
                    .filter_map(|v| v.as_integer_vec())
                    .map(|v| v.len())
                    .max()
                    .unwrap_or(0)
            };
            let width = codec::width_for_values(
                rows.iter()
                    .filter_map(|v| v.as_integer_vec())
                    .flatten()
                    .map(i64::from),
            );
            write_type_descriptor(out, n_values, width.tag());
            for row in rows {
                let values = row.as_integer_vec().unwrap_or_default();
                if values.len() > n_values {
                    return Err(cardinality(&schema.id, values.len(), n_values));
                }
                for v in &values {
                    write_int(out, *v, width)?;
                }
                for _ in values.len()..n_values {
                    pad_int(out, width, ctx.version);
                }
            }
        }
        ValueType::Float => {
            let n_values = if schema.count_type.is_bounded() {
                resolved_bound(schema, ctx)
            } else {
                rows.iter()
                    .filter_map(|v| v.as_float_vec())
                    .map(|v| v.len())
                    .max()
                    .unwrap_or(0)
            };
            write_type_descriptor(out, n_values, TypeTag::Float32);
            for row in rows {
                let values = row.as_float_vec().unwrap_or_default();
                if values.len() > n_values {
                    return Err(cardinality(&schema.id, values.len(), n_values));
                }
                for v in &values {
                    codec::write_f32(out, *v);
                }
                for _ in values.len()..n_values {
                    pad_float(out, ctx.version);
                }
            }
        }
        ValueType::String | ValueType::Character => {
            let bytes: Vec<Vec<u8>> = rows
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone().into_bytes(),
                    Value::Character(c) => c.to_string().into_bytes(),
                    Value::StringVec(v) => v.join(",").into_bytes(),
                    _ => Vec::new(),
                })
                .collect();
            let max_len = bytes.iter().map(|b| b.len()).max().unwrap_or(0);
            write_type_descriptor(out, max_len, TypeTag::Char);
            for b in &bytes {
                out.extend_from_slice(b);
                out.resize(out.len() + (max_len - b.len()), 0u8);
            }
        }
        ValueType::Flag => {
            return Err(incompatible(&schema.id, "FORMAT fields cannot be Flag-typed"))
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::header::FieldSchema;
    use crate::version::MinorVersion;

    fn ctx(n_alt: usize, max_ploidy: usize, n_samples: usize, version: MinorVersion) -> FieldContext {
        FieldContext {
            n_alt_alleles: n_alt,
            max_ploidy,
            n_samples,
            version,
        }
    }

    fn schema(id: &str, value_type: ValueType, count: CountType) -> FieldSchema {
        FieldSchema {
            id: id.into(),
            dictionary_offset: 1,
            value_type,
            count_type: count,
        }
    }

    #[test]
    fn scalar_int_picks_narrowest_width() {
        let mut out = Vec::new();
        let sc = schema("AF", ValueType::Integer, CountType::Fixed(1));
        encode_int_values(&mut out, &sc, &Value::Integer(1_000_000), &ctx(1, 2, 1, MinorVersion::V2)).unwrap();
        // typing byte (1,Int32) then 4 le bytes
        assert_eq!(out[0], (1 << 4) | 3);
        assert_eq!(out.len(), 5);
    }

    #[test]
    fn vector_exceeding_bound_is_cardinality_violation() {
        let mut out = Vec::new();
        let sc = schema("AC", ValueType::Integer, CountType::AltAlleles);
        let err = encode_int_values(
            &mut out,
            &sc,
            &Value::IntegerVec(vec![1, 2]),
            &ctx(1, 2, 1, MinorVersion::V2),
        )
        .unwrap_err();
        assert!(matches!(err, BcfError::CardinalityViolation { .. }));
    }

    #[test]
    fn v1_pads_vectors_with_missing_v2_pads_with_eov() {
        let sc = schema("EFF", ValueType::Integer, CountType::Fixed(3));
        let mut v1 = Vec::new();
        encode_int_values(&mut v1, &sc, &Value::IntegerVec(vec![1]), &ctx(0, 2, 1, MinorVersion::V1)).unwrap();
        let mut v2 = Vec::new();
        encode_int_values(&mut v2, &sc, &Value::IntegerVec(vec![1]), &ctx(0, 2, 1, MinorVersion::V2)).unwrap();
        assert_ne!(v1, v2);
    }

    #[test]
    fn string_join_differs_by_version() {
        let sc = schema("EFFECT", ValueType::String, CountType::Unbounded);
        let value = Value::StringVec(vec!["mis".into(), "non".into()]);
        let mut v1 = Vec::new();
        encode_string(&mut v1, &sc, &value, MinorVersion::V1).unwrap();
        let mut v2 = Vec::new();
        encode_string(&mut v2, &sc, &value, MinorVersion::V2).unwrap();
        assert_eq!(&v1[1..], b",mis,non");
        assert_eq!(&v2[1..], b"mis,non");
    }

    #[test]
    fn gt_encodes_phase_bit_on_non_first_allele() {
        use crate::record::GtAllele;
        let sc = schema("GT", ValueType::String, CountType::Fixed(1));
        let genotypes = vec![Genotype {
            gt: Some(vec![
                GtAllele { allele: Some(1), phased: false },
                GtAllele { allele: Some(1), phased: true },
            ]),
            ..Default::default()
        }];
        let mut out = Vec::new();
        encode_gt(&mut out, &sc, &genotypes, &ctx(1, 2, 1, MinorVersion::V2)).unwrap();
        // key (PASS/offset typed int) + typing byte + 2 values
        let payload = &out[out.len() - 2..];
        assert_eq!(payload, &[0x04, 0x05]);
    }
}
