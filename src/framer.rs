//! C6: per-record framing.
//!
//! Each record is a `(u32 sites_len, u32 genotypes_len)` pair followed by
//! the two blocks themselves. The sites block opens with four implicit,
//! untyped fields before the self-describing typed fields begin. This
//! module owns that layout; the genotypes block's *contents* are decoded
//! lazily by [`crate::genotypes::LazyGenotypes`], but this module still
//! frames/encodes it eagerly on write.

use indexmap::IndexMap;
use nom::number::complete::{le_f32, le_i16, le_i32, le_u24, le_u8};
use nom::sequence::tuple;
use nom::IResult;

use crate::codec::{self, write_type_descriptor, TypeTag};
use crate::error::{BcfError, Position, Result};
use crate::field::{decode as fdecode, encode as fencode, FieldContext};
use crate::genotypes::LazyGenotypes;
use crate::header::HeaderSchema;
use crate::record::{Value, VariantRecord};
use crate::version::MinorVersion;

fn write_typed_string(out: &mut Vec<u8>, s: Option<&str>) {
    match s {
        Some(s) => codec::write_string(out, s.as_bytes()),
        None => codec::write_missing_string(out),
    }
}

/// Encodes one record's sites + genotypes blocks, with the `u32 u32`
/// length prefix, appending to `out`.
pub fn encode_record(
    out: &mut Vec<u8>,
    record: &VariantRecord,
    schema: &HeaderSchema,
    version: MinorVersion,
) -> Result<()> {
    if record.n_alleles() < 1 || record.ref_allele.is_empty() {
        return Err(BcfError::MalformedRecord {
            at: Position::default(),
            reason: "record must declare a non-empty REF allele".into(),
        });
    }
    let n_format = record.format_order.len();
    let n_samples = if n_format == 0 { 0 } else { record.genotypes.len() };
    if n_format > 0 && n_samples != schema.samples.len() {
        return Err(BcfError::MalformedRecord {
            at: Position::default(),
            reason: format!(
                "record has {} genotypes but the header declares {} samples",
                n_samples,
                schema.samples.len()
            ),
        });
    }

    let contig_offset = schema.contig_dict.offset_of(&record.contig).ok_or_else(|| {
        BcfError::MalformedRecord {
            at: Position::default(),
            reason: format!("contig {:?} not present in header", record.contig),
        }
    })?;

    let mut sites = Vec::new();
    sites.extend_from_slice(&(contig_offset as i32).to_le_bytes());
    sites.extend_from_slice(&((record.pos - 1) as i32).to_le_bytes());
    sites.extend_from_slice(&(record.ref_length() as i32).to_le_bytes());
    sites.extend_from_slice(&record.qual.unwrap_or_else(codec::missing_float).to_le_bytes());
    sites.extend_from_slice(&(record.info.len() as i16).to_le_bytes());
    sites.extend_from_slice(&(record.n_alleles() as i16).to_le_bytes());
    let n_sample_u24 = (n_samples as u32) & 0x00FF_FFFF;
    sites.extend_from_slice(&n_sample_u24.to_le_bytes()[..3]);
    sites.push(n_format as u8);

    write_typed_string(&mut sites, record.id.as_deref());

    codec::write_string(&mut sites, record.ref_allele.as_bytes());
    for alt in &record.alt_alleles {
        codec::write_string(&mut sites, alt.as_bytes());
    }

    if record.filters.is_empty() {
        write_type_descriptor(&mut sites, 0, TypeTag::Missing);
    } else {
        let offsets: Vec<i64> = record
            .filters
            .iter()
            .map(|f| {
                schema.string_dict.offset_of(f).map(i64::from).ok_or_else(|| {
                    BcfError::MalformedRecord {
                        at: Position::default(),
                        reason: format!("filter {f:?} not present in header dictionary"),
                    }
                })
            })
            .collect::<Result<_>>()?;
        let width = codec::width_for_values(offsets.iter().copied());
        write_type_descriptor(&mut sites, offsets.len(), width.tag());
        for o in offsets {
            codec::write_int(&mut sites, o as i32, width)?;
        }
    }

    let ctx = FieldContext {
        n_alt_alleles: record.alt_alleles.len(),
        max_ploidy: record.max_ploidy(),
        n_samples,
        version,
    };
    for (key, value) in record.info.iter() {
        let field_schema = schema.info.get(key).ok_or_else(|| BcfError::IncompatibleValue {
            key: key.clone(),
            reason: "INFO key not declared in header".into(),
        })?;
        fencode::encode_info_field(&mut sites, field_schema, value, &ctx)?;
    }

    let mut genotypes_buf = Vec::new();
    if n_format > 0 {
        encode_genotypes_block(&mut genotypes_buf, record, schema, &ctx)?;
    }

    out.extend_from_slice(&(sites.len() as u32).to_le_bytes());
    out.extend_from_slice(&(genotypes_buf.len() as u32).to_le_bytes());
    out.extend_from_slice(&sites);
    out.extend_from_slice(&genotypes_buf);
    Ok(())
}

fn encode_genotypes_block(
    out: &mut Vec<u8>,
    record: &VariantRecord,
    schema: &HeaderSchema,
    ctx: &FieldContext,
) -> Result<()> {
    for key in &record.format_order {
        let field_schema = schema.format.get(key).ok_or_else(|| BcfError::IncompatibleValue {
            key: key.clone(),
            reason: "FORMAT key not declared in header".into(),
        })?;
        match key.as_str() {
            "GT" => fencode::encode_gt(out, field_schema, &record.genotypes, ctx)?,
            "FT" => fencode::encode_ft(out, field_schema, &record.genotypes),
            "GQ" => {
                let values: Vec<Option<i32>> = record.genotypes.iter().map(|g| g.gq).collect();
                fencode::encode_atomic_int_format(out, field_schema, &values)?;
            }
            "DP" => {
                let values: Vec<Option<i32>> = record.genotypes.iter().map(|g| g.dp).collect();
                fencode::encode_atomic_int_format(out, field_schema, &values)?;
            }
            "AD" => {
                let rows: Vec<Option<Vec<i32>>> = record.genotypes.iter().map(|g| g.ad.clone()).collect();
                fencode::encode_vector_int_format(out, field_schema, &rows, ctx)?;
            }
            "PL" => {
                let rows: Vec<Option<Vec<i32>>> = record.genotypes.iter().map(|g| g.pl.clone()).collect();
                fencode::encode_vector_int_format(out, field_schema, &rows, ctx)?;
            }
            other => {
                let rows: Vec<Value> = record
                    .genotypes
                    .iter()
                    .map(|g| g.other.get(other).cloned().unwrap_or(Value::Missing))
                    .collect();
                fencode::encode_generic_format(out, field_schema, &rows, ctx)?;
            }
        }
    }
    Ok(())
}

fn implicit_site_fields(input: &[u8]) -> IResult<&[u8], (i32, i32, i32, f32, i16, i16, u32, u8)> {
    tuple((le_i32, le_i32, le_i32, le_f32, le_i16, le_i16, le_u24, le_u8))(input)
}

/// Decodes one record's sites block eagerly and wraps the genotypes block
/// for lazy decode. `schema` must outlive the returned [`LazyGenotypes`];
/// callers typically hold it in an `Rc`.
pub fn decode_record(
    sites: &[u8],
    genotypes: Vec<u8>,
    schema: &std::rc::Rc<HeaderSchema>,
    version: MinorVersion,
    record_index: usize,
) -> Result<(VariantRecord, LazyGenotypes)> {
    let malformed = |offset: usize, reason: &str| BcfError::MalformedRecord {
        at: Position {
            record_index,
            byte_offset: offset,
        },
        reason: reason.to_string(),
    };

    let (rest, (chrom, pos0, _rlen, qual, n_info, n_allele, n_sample, n_fmt)) =
        implicit_site_fields(sites).map_err(|_| malformed(0, "truncated implicit site fields"))?;

    if n_fmt > 0 && n_sample as usize != schema.samples.len() {
        return Err(malformed(
            sites.len() - rest.len(),
            "sample count disagrees with the header's declared sample count",
        ));
    }

    let contig = schema
        .contig_dict
        .get(chrom as u32)
        .ok_or_else(|| malformed(0, "contig offset not present in header"))?
        .to_string();

    let (rest, id_td) = codec::type_descriptor(rest)
        .map_err(|_| malformed(sites.len() - rest.len(), "truncated ID typing byte"))?;
    let (rest, id_bytes) =
        nom::bytes::complete::take::<_, _, nom::error::Error<&[u8]>>(id_td.num_elements)(rest)
            .map_err(|_| malformed(sites.len() - rest.len(), "truncated ID bytes"))?;
    let id = if id_bytes.is_empty() {
        None
    } else {
        Some(String::from_utf8_lossy(id_bytes).to_string())
    };

    if n_allele < 1 {
        return Err(malformed(sites.len() - rest.len(), "n_alleles < 1"));
    }
    let mut rest = rest;
    let mut alleles = Vec::with_capacity(n_allele as usize);
    for _ in 0..n_allele {
        let (r, td) = codec::type_descriptor(rest).map_err(|_| {
            malformed(sites.len() - rest.len(), "truncated allele typing byte")
        })?;
        if td.kind != TypeTag::Char {
            return Err(malformed(sites.len() - rest.len(), "allele is not CHAR-typed"));
        }
        let (r, bytes) = nom::bytes::complete::take::<_, _, nom::error::Error<&[u8]>>(td.num_elements)(r)
            .map_err(|_| malformed(sites.len() - rest.len(), "truncated allele bytes"))?;
        alleles.push(String::from_utf8_lossy(bytes).to_string());
        rest = r;
    }
    if alleles[0].is_empty() {
        return Err(malformed(sites.len() - rest.len(), "REF allele is empty"));
    }

    let (rest, filter_td) = codec::type_descriptor(rest)
        .map_err(|_| malformed(sites.len() - rest.len(), "truncated FILTER typing byte"))?;
    let (rest, filter_offsets) = if filter_td.kind == TypeTag::Missing || filter_td.num_elements == 0 {
        (rest, Vec::new())
    } else {
        codec::read_ints(filter_td.kind, filter_td.num_elements, rest)
            .map_err(|_| malformed(sites.len() - rest.len(), "truncated FILTER payload"))?
    };
    let filters: Vec<String> = filter_offsets
        .into_iter()
        .map(|o| {
            schema
                .filter_name(o as u32)
                .map(str::to_string)
                .ok_or_else(|| malformed(sites.len() - rest.len(), "unknown filter offset"))
        })
        .collect::<Result<_>>()?;

    let mut rest = rest;
    let mut info = IndexMap::new();
    for _ in 0..n_info {
        let (r, offset) = codec::typed_int(rest)
            .map_err(|_| malformed(sites.len() - rest.len(), "truncated INFO key"))?;
        let field_schema = schema
            .info_by_offset(offset as u32)
            .ok_or_else(|| malformed(sites.len() - rest.len(), "unknown INFO dictionary offset"))?;
        let (r, (td, payload)) = fdecode::read_typed_payload(r)
            .map_err(|_| malformed(sites.len() - r.len(), "truncated INFO payload"))?;
        let is_scalar = matches!(field_schema.count_type, crate::header::CountType::Fixed(1));
        let is_flag = field_schema.value_type == crate::header::ValueType::Flag;
        let is_string = field_schema.value_type == crate::header::ValueType::String;
        let value = fdecode::decode_info_value(is_scalar, &td, payload, is_flag, is_string, version);
        info.insert(field_schema.id.clone(), value);
        rest = r;
    }

    let record = VariantRecord {
        contig,
        pos: (pos0 as u32) + 1,
        id,
        ref_allele: alleles[0].clone(),
        alt_alleles: alleles[1..].to_vec(),
        qual: if codec::is_missing_float(qual) { None } else { Some(qual) },
        filters,
        info,
        format_order: Vec::new(),
        genotypes: Vec::new(),
    };

    let lazy = LazyGenotypes::new(genotypes, n_fmt as usize, n_sample as usize, schema.clone(), version);
    Ok((record, lazy))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::header::{parse_header_text, HeaderSchema};
    use std::rc::Rc;

    const HEADER: &str = "##fileformat=VCFv4.2\n##FILTER=<ID=PASS,Description=\"x\">\n##INFO=<ID=AC,Number=A,Type=Integer,Description=\"x\">\n##contig=<ID=chr1,length=1000>\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n";

    fn schema() -> Rc<HeaderSchema> {
        let parsed = parse_header_text(HEADER).unwrap();
        Rc::new(HeaderSchema::build(&parsed, MinorVersion::V2).unwrap())
    }

    #[test]
    fn encodes_site_only_record_matching_scenario_s2() {
        let schema = schema();
        let record = VariantRecord {
            contig: "chr1".into(),
            pos: 1001,
            id: None,
            ref_allele: "A".into(),
            alt_alleles: vec!["T".into()],
            qual: Some(37.0),
            filters: vec![],
            info: IndexMap::new(),
            format_order: vec![],
            genotypes: vec![],
        };
        let mut out = Vec::new();
        encode_record(&mut out, &record, &schema, MinorVersion::V2).unwrap();
        let l_shared = u32::from_le_bytes(out[0..4].try_into().unwrap());
        let l_indiv = u32::from_le_bytes(out[4..8].try_into().unwrap());
        assert_eq!(l_indiv, 0);
        let sites = &out[8..8 + l_shared as usize];
        assert_eq!(&sites[0..4], &0i32.to_le_bytes()); // contig 0 (only contig)
        assert_eq!(&sites[4..8], &1000i32.to_le_bytes()); // pos0
        assert_eq!(&sites[8..12], &1i32.to_le_bytes()); // rlen
        assert_eq!(&sites[12..16], &37.0f32.to_le_bytes());
    }

    #[test]
    fn round_trips_site_only_record() {
        let schema = schema();
        let record = VariantRecord {
            contig: "chr1".into(),
            pos: 1001,
            id: Some("rs1".into()),
            ref_allele: "A".into(),
            alt_alleles: vec!["T".into()],
            qual: Some(37.0),
            filters: vec!["PASS".into()],
            info: IndexMap::from_iter([("AC".to_string(), Value::IntegerVec(vec![1]))]),
            format_order: vec![],
            genotypes: vec![],
        };
        let mut out = Vec::new();
        encode_record(&mut out, &record, &schema, MinorVersion::V2).unwrap();
        let l_shared = u32::from_le_bytes(out[0..4].try_into().unwrap()) as usize;
        let l_indiv = u32::from_le_bytes(out[4..8].try_into().unwrap()) as usize;
        let sites = out[8..8 + l_shared].to_vec();
        let indiv = out[8 + l_shared..8 + l_shared + l_indiv].to_vec();
        let (decoded, _lazy) = decode_record(&sites, indiv, &schema, MinorVersion::V2, 0).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn decode_rejects_sample_count_disagreeing_with_header() {
        let schema = schema();
        let record = VariantRecord {
            contig: "chr1".into(),
            pos: 1001,
            id: None,
            ref_allele: "A".into(),
            alt_alleles: vec!["T".into()],
            qual: Some(37.0),
            filters: vec![],
            info: IndexMap::new(),
            format_order: vec![],
            genotypes: vec![],
        };
        let mut out = Vec::new();
        encode_record(&mut out, &record, &schema, MinorVersion::V2).unwrap();
        let l_shared = u32::from_le_bytes(out[0..4].try_into().unwrap()) as usize;
        let mut sites = out[8..8 + l_shared].to_vec();
        // the header declares zero samples; forge a wire record that claims
        // one format field and one sample without a matching genotypes block.
        sites[20] = 1; // n_sample low byte
        sites[23] = 1; // n_fmt
        let err = decode_record(&sites, Vec::new(), &schema, MinorVersion::V2, 0).unwrap_err();
        assert!(matches!(err, BcfError::MalformedRecord { .. }));
    }
}
