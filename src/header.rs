//! C3: the header adapter.
//!
//! Projects the embedded textual VCF header into the schema tables C4/C5
//! consume: per-ID dictionary offsets, value/count types, and standard-key
//! validation.

use std::collections::HashMap;

use nom::branch::alt;
use nom::bytes::complete::{escaped, is_not, tag};
use nom::character::complete::none_of;
use nom::multi::{many0, separated_list0};
use nom::sequence::{delimited, separated_pair};
use nom::IResult;

use crate::dict::{DictEntry, Dictionary};
use crate::error::{BcfError, Result};
use crate::version::MinorVersion;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderLineKind {
    Filter,
    Info,
    Format,
    Contig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Integer,
    Float,
    Flag,
    String,
    Character,
}

/// Cardinality type. Named after the VCF `Number=` field it comes from:
/// `A` counts ALT alleles, `R` counts all alleles (REF + ALT), `G` counts
/// genotypes for the record's ploidy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountType {
    Fixed(usize),
    AltAlleles,
    Alleles,
    Genotypes,
    Unbounded,
}

impl CountType {
    fn parse(s: &str) -> CountType {
        match s {
            "A" => CountType::AltAlleles,
            "R" => CountType::Alleles,
            "G" => CountType::Genotypes,
            "." => CountType::Unbounded,
            n => n
                .parse::<usize>()
                .map(CountType::Fixed)
                .unwrap_or(CountType::Unbounded),
        }
    }

    /// Resolves the number of values a field carries for a specific
    /// record.
    pub fn resolve(self, n_alt_alleles: usize, ploidy: usize) -> usize {
        match self {
            CountType::Fixed(n) => n,
            CountType::AltAlleles => n_alt_alleles,
            CountType::Alleles => n_alt_alleles + 1,
            CountType::Genotypes => binomial(ploidy + n_alt_alleles, ploidy),
            CountType::Unbounded => 0,
        }
    }

    pub fn is_bounded(self) -> bool {
        !matches!(self, CountType::Unbounded)
    }
}

fn binomial(n: usize, k: usize) -> usize {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut result: u128 = 1;
    for i in 0..k {
        result = result * (n - i) as u128 / (i + 1) as u128;
    }
    result as usize
}

#[derive(Debug, Clone)]
pub struct FieldSchema {
    pub id: String,
    pub dictionary_offset: u32,
    pub value_type: ValueType,
    pub count_type: CountType,
}

impl FieldSchema {
    pub fn is_unbounded(&self) -> bool {
        !self.count_type.is_bounded()
    }
}

/// One `##INFO=<...>` / `##FORMAT=<...>` / `##FILTER=<...>` / `##contig=<...>`
/// line, reduced to the attributes dictionary/schema building need.
#[derive(Debug, Clone)]
pub struct RawHeaderLine {
    pub kind: HeaderLineKind,
    pub id: String,
    pub idx: Option<u32>,
    pub attrs: HashMap<String, String>,
}

pub struct ParsedHeader {
    pub text: String,
    pub lines: Vec<RawHeaderLine>,
    pub samples: Vec<String>,
}

fn quoted_value(input: &str) -> IResult<&str, &str> {
    delimited(
        tag("\""),
        escaped(none_of("\\\""), '\\', alt((tag("\\"), tag("\"")))),
        tag("\""),
    )(input)
}

fn key_value(input: &str) -> IResult<&str, (&str, &str)> {
    separated_pair(
        is_not("<,=\n"),
        tag("="),
        alt((quoted_value, is_not(">,\n"))),
    )(input)
}

fn keys_and_values(input: &str) -> IResult<&str, Vec<(&str, &str)>> {
    separated_list0(tag(","), key_value)(input)
}

fn structured_line(input: &str) -> IResult<&str, (&str, HashMap<String, String>)> {
    let (input, _) = tag("##")(input)?;
    let (input, key) = is_not("=")(input)?;
    let (input, _) = tag("=<")(input)?;
    let (input, pairs) = keys_and_values(input)?;
    let (input, _) = tag(">")(input)?;
    Ok((
        input,
        (
            key,
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ),
    ))
}

fn kind_of(key: &str) -> Option<HeaderLineKind> {
    match key {
        "INFO" => Some(HeaderLineKind::Info),
        "FORMAT" => Some(HeaderLineKind::Format),
        "FILTER" => Some(HeaderLineKind::Filter),
        "contig" => Some(HeaderLineKind::Contig),
        _ => None,
    }
}

/// Parses the embedded VCF header text (meta-information lines plus the
/// `#CHROM` column header) into structured lines and the sample list.
/// Unstructured meta lines (`##fileformat`, `##PEDIGREE`, free-text
/// `##META`, etc.) are accepted and ignored here; they are not needed by
/// the codec core.
pub fn parse_header_text(text: &str) -> Result<ParsedHeader> {
    let mut lines = Vec::new();
    let mut samples = Vec::new();
    for line in text.trim_end_matches('\0').lines() {
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("#CHROM") {
            samples = rest
                .split('\t')
                .skip(8) // CHROM POS ID REF ALT QUAL FILTER INFO [FORMAT] samples...
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            continue;
        }
        if !line.starts_with("##") {
            return Err(BcfError::InvalidHeader {
                reason: format!("header line does not start with '##' or '#CHROM': {line:?}"),
            });
        }
        match structured_line(line) {
            Ok((_, (key, attrs))) => {
                if let Some(kind) = kind_of(key) {
                    let id = attrs
                        .get("ID")
                        .ok_or_else(|| BcfError::InvalidHeader {
                            reason: format!("{key} header line missing ID: {line:?}"),
                        })?
                        .clone();
                    let idx = attrs.get("IDX").map(|v| v.parse::<u32>()).transpose().map_err(|_| {
                        BcfError::InvalidHeader {
                            reason: format!("non-numeric IDX in line: {line:?}"),
                        }
                    })?;
                    lines.push(RawHeaderLine {
                        kind,
                        id,
                        idx,
                        attrs,
                    });
                }
            }
            Err(_) => continue, // unstructured meta line, e.g. ##fileformat=VCFv4.2
        }
    }
    Ok(ParsedHeader {
        text: text.to_string(),
        lines,
        samples,
    })
}

/// The built-up schema for a single BCF2 stream: dictionaries plus the
/// per-field type/cardinality table, immutable for the stream's lifetime.
#[derive(Debug, Clone)]
pub struct HeaderSchema {
    pub string_dict: Dictionary,
    pub contig_dict: Dictionary,
    pub info: HashMap<String, FieldSchema>,
    pub format: HashMap<String, FieldSchema>,
    pub samples: Vec<String>,
}

/// Canonical (value_type, count_type) contract for the standard keys
/// whose encoding this codec specializes. A header line for one of these
/// IDs that disagrees is a hard error.
fn standard_contract(kind: HeaderLineKind, id: &str) -> Option<(ValueType, CountType)> {
    match (kind, id) {
        (HeaderLineKind::Format, "GT") => Some((ValueType::String, CountType::Fixed(1))),
        (HeaderLineKind::Format, "GQ") => Some((ValueType::Integer, CountType::Fixed(1))),
        (HeaderLineKind::Format, "DP") => Some((ValueType::Integer, CountType::Fixed(1))),
        (HeaderLineKind::Format, "FT") => Some((ValueType::String, CountType::Fixed(1))),
        (HeaderLineKind::Format, "AD") => Some((ValueType::Integer, CountType::Alleles)),
        (HeaderLineKind::Format, "PL") => Some((ValueType::Integer, CountType::Genotypes)),
        _ => None,
    }
}

fn parse_value_type(s: &str) -> Result<ValueType> {
    match s {
        "Integer" => Ok(ValueType::Integer),
        "Float" => Ok(ValueType::Float),
        "Flag" => Ok(ValueType::Flag),
        "String" => Ok(ValueType::String),
        "Character" => Ok(ValueType::Character),
        other => Err(BcfError::InvalidHeader {
            reason: format!("unknown Type={other}"),
        }),
    }
}

impl HeaderSchema {
    pub fn build(parsed: &ParsedHeader, version: MinorVersion) -> Result<Self> {
        let filters: Vec<DictEntry> = parsed
            .lines
            .iter()
            .filter(|l| l.kind == HeaderLineKind::Filter)
            .map(|l| DictEntry {
                id: l.id.clone(),
                idx: l.idx,
            })
            .collect();
        let infos: Vec<DictEntry> = parsed
            .lines
            .iter()
            .filter(|l| l.kind == HeaderLineKind::Info)
            .map(|l| DictEntry {
                id: l.id.clone(),
                idx: l.idx,
            })
            .collect();
        let formats: Vec<DictEntry> = parsed
            .lines
            .iter()
            .filter(|l| l.kind == HeaderLineKind::Format)
            .map(|l| DictEntry {
                id: l.id.clone(),
                idx: l.idx,
            })
            .collect();
        let contigs: Vec<DictEntry> = parsed
            .lines
            .iter()
            .filter(|l| l.kind == HeaderLineKind::Contig)
            .map(|l| DictEntry {
                id: l.id.clone(),
                idx: l.idx,
            })
            .collect();

        let string_dict = Dictionary::build_string_dict(
            filters.into_iter().chain(infos.clone()).chain(formats.clone()).collect(),
            version,
        )?;
        let contig_dict = Dictionary::build_contig_dict(contigs, version)?;

        let mut info = HashMap::new();
        let mut format = HashMap::new();
        for line in parsed.lines.iter() {
            if line.kind != HeaderLineKind::Info && line.kind != HeaderLineKind::Format {
                continue;
            }
            let value_type = match line.attrs.get("Type") {
                Some(t) => parse_value_type(t)?,
                None => {
                    return Err(BcfError::InvalidHeader {
                        reason: format!("{} header line {} missing Type=", kind_label(line.kind), line.id),
                    })
                }
            };
            if line.kind == HeaderLineKind::Format && value_type == ValueType::Flag {
                return Err(BcfError::InvalidHeader {
                    reason: format!("FORMAT line {} cannot declare Type=Flag", line.id),
                });
            }
            let count_type = match line.attrs.get("Number") {
                Some(n) => CountType::parse(n),
                None => {
                    return Err(BcfError::InvalidHeader {
                        reason: format!("{} header line {} missing Number=", kind_label(line.kind), line.id),
                    })
                }
            };
            if let Some((canon_type, canon_count)) = standard_contract(line.kind, &line.id) {
                if canon_type != value_type || !count_types_match(canon_count, count_type) {
                    return Err(BcfError::InvalidHeader {
                        reason: format!(
                            "standard key {} must be Type={canon_type:?}/Number matching {canon_count:?}, header declares Type={value_type:?}/Number={count_type:?}",
                            line.id
                        ),
                    });
                }
            }
            let offset = string_dict.offset_of(&line.id).ok_or_else(|| BcfError::InvalidHeader {
                reason: format!("{} not found in built string dictionary", line.id),
            })?;
            let schema = FieldSchema {
                id: line.id.clone(),
                dictionary_offset: offset,
                value_type,
                count_type,
            };
            match line.kind {
                HeaderLineKind::Info => {
                    info.entry(line.id.clone()).or_insert(schema);
                }
                HeaderLineKind::Format => {
                    format.entry(line.id.clone()).or_insert(schema);
                }
                _ => unreachable!(),
            }
        }

        Ok(HeaderSchema {
            string_dict,
            contig_dict,
            info,
            format,
            samples: parsed.samples.clone(),
        })
    }

    pub fn info_by_offset(&self, offset: u32) -> Option<&FieldSchema> {
        self.info.values().find(|f| f.dictionary_offset == offset)
    }

    pub fn format_by_offset(&self, offset: u32) -> Option<&FieldSchema> {
        self.format
            .values()
            .find(|f| f.dictionary_offset == offset)
    }

    pub fn filter_name(&self, offset: u32) -> Option<&str> {
        self.string_dict.get(offset)
    }
}

fn kind_label(kind: HeaderLineKind) -> &'static str {
    match kind {
        HeaderLineKind::Filter => "FILTER",
        HeaderLineKind::Info => "INFO",
        HeaderLineKind::Format => "FORMAT",
        HeaderLineKind::Contig => "contig",
    }
}

fn count_types_match(a: CountType, b: CountType) -> bool {
    use CountType::*;
    matches!(
        (a, b),
        (Fixed(x), Fixed(y)) if x == y
    ) || matches!((a, b), (AltAlleles, AltAlleles))
        || matches!((a, b), (Alleles, Alleles))
        || matches!((a, b), (Genotypes, Genotypes))
        || matches!((a, b), (Unbounded, Unbounded))
}

#[cfg(test)]
mod test {
    use super::*;

    const HEADER: &str = "##fileformat=VCFv4.2\n##FILTER=<ID=PASS,Description=\"All filters passed\">\n##INFO=<ID=AC,Number=A,Type=Integer,Description=\"Allele count\">\n##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">\n##FORMAT=<ID=AD,Number=R,Type=Integer,Description=\"Allele depth\">\n##contig=<ID=chr1,length=1000>\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tHG001\tHG002\n";

    #[test]
    fn parses_samples_and_lines() {
        let parsed = parse_header_text(HEADER).unwrap();
        assert_eq!(parsed.samples, vec!["HG001", "HG002"]);
        assert_eq!(parsed.lines.len(), 5);
    }

    #[test]
    fn builds_schema_with_expected_types() {
        let parsed = parse_header_text(HEADER).unwrap();
        let schema = HeaderSchema::build(&parsed, MinorVersion::V2).unwrap();
        assert_eq!(schema.info["AC"].value_type, ValueType::Integer);
        assert_eq!(schema.info["AC"].count_type, CountType::AltAlleles);
        assert_eq!(schema.format["AD"].count_type, CountType::Alleles);
        assert_eq!(schema.string_dict.get(0), Some("PASS"));
        assert_eq!(schema.contig_dict.get(0), Some("chr1"));
    }

    #[test]
    fn standard_key_mismatch_is_rejected() {
        let bad = "##fileformat=VCFv4.2\n##FORMAT=<ID=GT,Number=2,Type=String,Description=\"bad\">\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n";
        let parsed = parse_header_text(bad).unwrap();
        assert!(HeaderSchema::build(&parsed, MinorVersion::V2).is_err());
    }

    #[test]
    fn flag_format_line_is_rejected() {
        let bad = "##fileformat=VCFv4.2\n##FORMAT=<ID=XX,Number=0,Type=Flag,Description=\"bad\">\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n";
        let parsed = parse_header_text(bad).unwrap();
        assert!(HeaderSchema::build(&parsed, MinorVersion::V2).is_err());
    }

    #[test]
    fn genotype_count_resolves_via_binomial() {
        assert_eq!(CountType::Genotypes.resolve(1, 2), binomial(3, 2));
        assert_eq!(binomial(3, 2), 3);
    }
}
