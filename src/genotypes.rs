//! Lazy genotypes block decode.
//!
//! The sites block is always decoded eagerly; the genotypes block is kept
//! as raw bytes until the caller actually asks for per-sample data, then
//! decoded once and cached by [`crate::reader::DecodedRecord`].

use std::rc::Rc;

use crate::codec::{self, IntWidth, TypeTag};
use crate::error::{BcfError, Position, Result};
use crate::field::decode as fdecode;
use crate::header::HeaderSchema;
use crate::record::Genotype;
use crate::version::MinorVersion;

pub struct LazyGenotypes {
    raw: Vec<u8>,
    n_format_fields: usize,
    n_samples: usize,
    schema: Rc<HeaderSchema>,
    /// Unused on the decode path: sentinel detection works the same for
    /// both minor versions. Kept for symmetry with the encode side and in
    /// case a future standard key needs version-specific decode behavior.
    _version: MinorVersion,
}

impl LazyGenotypes {
    pub fn new(
        raw: Vec<u8>,
        n_format_fields: usize,
        n_samples: usize,
        schema: Rc<HeaderSchema>,
        version: MinorVersion,
    ) -> Self {
        LazyGenotypes {
            raw,
            n_format_fields,
            n_samples,
            schema,
            _version: version,
        }
    }

    /// Decodes the whole block. Consumes `self`: a [`LazyGenotypes`] is a
    /// one-shot ticket, not a cache in its own right (the caller owns the
    /// cache).
    pub fn decode(self) -> Result<(Vec<String>, Vec<Genotype>)> {
        let malformed = |reason: &str| BcfError::MalformedRecord {
            at: Position::default(),
            reason: reason.to_string(),
        };

        let mut format_order = Vec::with_capacity(self.n_format_fields);
        let mut genotypes: Vec<Genotype> = (0..self.n_samples).map(|_| Genotype::default()).collect();
        let mut rest: &[u8] = &self.raw;

        for _ in 0..self.n_format_fields {
            let (r, offset) =
                codec::typed_int(rest).map_err(|_| malformed("truncated FORMAT key"))?;
            let field_schema = self
                .schema
                .format_by_offset(offset as u32)
                .ok_or_else(|| malformed("unknown FORMAT dictionary offset"))?;
            let key = field_schema.id.clone();

            let (r, td) = codec::type_descriptor(r).map_err(|_| malformed("truncated FORMAT typing byte"))?;
            let total = td.num_elements * self.n_samples;
            rest = match td.kind {
                TypeTag::Missing => r,
                TypeTag::Int8 | TypeTag::Int16 | TypeTag::Int32 => {
                    let width = match td.kind {
                        TypeTag::Int8 => IntWidth::Int8,
                        TypeTag::Int16 => IntWidth::Int16,
                        _ => IntWidth::Int32,
                    };
                    let (r2, values) =
                        codec::read_ints(td.kind, total, r).map_err(|_| malformed("truncated FORMAT payload"))?;
                    apply_int_rows(&mut genotypes, &key, &values, width, td.num_elements, self.n_samples);
                    r2
                }
                TypeTag::Float32 => {
                    let (r2, values) = codec::read_floats(total, r).map_err(|_| malformed("truncated FORMAT payload"))?;
                    apply_float_rows(&mut genotypes, &key, &values, td.num_elements, self.n_samples);
                    r2
                }
                TypeTag::Char => {
                    let (r2, bytes) = nom::bytes::complete::take::<_, _, nom::error::Error<&[u8]>>(total)(r)
                        .map_err(|_| malformed("truncated FORMAT payload"))?;
                    apply_char_rows(&mut genotypes, &key, bytes, td.num_elements, self.n_samples);
                    r2
                }
            };
            format_order.push(key);
        }

        Ok((format_order, genotypes))
    }
}

fn apply_int_rows(genotypes: &mut [Genotype], key: &str, values: &[i32], width: IntWidth, n_values: usize, n_samples: usize) {
    match key {
        "GT" => {
            let rows = fdecode::decode_gt_rows(values, width, n_values, n_samples);
            for (g, row) in genotypes.iter_mut().zip(rows) {
                g.gt = Some(row);
            }
        }
        "GQ" => {
            let rows = fdecode::decode_atomic_int_rows(values, width, n_samples);
            for (g, v) in genotypes.iter_mut().zip(rows) {
                g.gq = v;
            }
        }
        "DP" => {
            let rows = fdecode::decode_atomic_int_rows(values, width, n_samples);
            for (g, v) in genotypes.iter_mut().zip(rows) {
                g.dp = v;
            }
        }
        "AD" => {
            let rows = fdecode::decode_vector_int_rows(values, width, n_values, n_samples);
            for (g, v) in genotypes.iter_mut().zip(rows) {
                g.ad = v;
            }
        }
        "PL" => {
            let rows = fdecode::decode_vector_int_rows(values, width, n_values, n_samples);
            for (g, v) in genotypes.iter_mut().zip(rows) {
                g.pl = v;
            }
        }
        other => {
            let rows = fdecode::decode_generic_int_rows(values, width, n_values, n_samples);
            for (g, v) in genotypes.iter_mut().zip(rows) {
                g.other.insert(other.to_string(), v);
            }
        }
    }
}

fn apply_float_rows(genotypes: &mut [Genotype], key: &str, values: &[f32], n_values: usize, n_samples: usize) {
    let rows = fdecode::decode_generic_float_rows(values, n_values, n_samples);
    for (g, v) in genotypes.iter_mut().zip(rows) {
        g.other.insert(key.to_string(), v);
    }
}

fn apply_char_rows(genotypes: &mut [Genotype], key: &str, bytes: &[u8], row_len: usize, n_samples: usize) {
    match key {
        "FT" => {
            let rows = fdecode::decode_ft_rows(bytes, row_len, n_samples);
            for (g, v) in genotypes.iter_mut().zip(rows) {
                g.ft = v;
            }
        }
        other => {
            let rows = fdecode::decode_generic_char_rows(bytes, row_len, n_samples);
            for (g, v) in genotypes.iter_mut().zip(rows) {
                g.other.insert(other.to_string(), v);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::header::{parse_header_text, HeaderSchema};

    const HEADER: &str = "##fileformat=VCFv4.2\n##FORMAT=<ID=GT,Number=1,Type=String,Description=\"x\">\n##FORMAT=<ID=DP,Number=1,Type=Integer,Description=\"x\">\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tHG001\n";

    #[test]
    fn decodes_gt_and_dp_for_one_sample() {
        let parsed = parse_header_text(HEADER).unwrap();
        let schema = Rc::new(HeaderSchema::build(&parsed, MinorVersion::V2).unwrap());
        let gt_offset = schema.format["GT"].dictionary_offset;
        let dp_offset = schema.format["DP"].dictionary_offset;

        let mut raw = Vec::new();
        codec::write_typed_int(&mut raw, gt_offset as i64);
        codec::write_type_descriptor(&mut raw, 2, TypeTag::Int8);
        codec::write_int(&mut raw, 0x04, IntWidth::Int8).unwrap();
        codec::write_int(&mut raw, 0x05, IntWidth::Int8).unwrap();

        codec::write_typed_int(&mut raw, dp_offset as i64);
        codec::write_type_descriptor(&mut raw, 1, TypeTag::Int8);
        codec::write_int(&mut raw, 9, IntWidth::Int8).unwrap();

        let lazy = LazyGenotypes::new(raw, 2, 1, schema, MinorVersion::V2);
        let (order, genotypes) = lazy.decode().unwrap();
        assert_eq!(order, vec!["GT".to_string(), "DP".to_string()]);
        assert_eq!(genotypes[0].dp, Some(9));
        assert_eq!(genotypes[0].gt.as_ref().unwrap().len(), 2);
    }
}
