//! The logical variant-call model.
//!
//! This is the shape C4 (encoders) consume and C5 (decoders) produce; it
//! has no notion of dictionary offsets or wire widths, those live only in
//! [`crate::header`] and [`crate::codec`].

use indexmap::IndexMap;

/// One INFO value, or one extra (non-specialized) FORMAT value for a
/// sample. `Missing` is not an error at write time: it encodes as the
/// field's missing sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i32),
    IntegerVec(Vec<i32>),
    Float(f32),
    FloatVec(Vec<f32>),
    Flag(bool),
    Character(char),
    String(String),
    StringVec(Vec<String>),
    Missing,
}

impl Value {
    pub fn as_integer_vec(&self) -> Option<Vec<i32>> {
        match self {
            Value::Integer(v) => Some(vec![*v]),
            Value::IntegerVec(v) => Some(v.clone()),
            Value::Missing => Some(vec![]),
            _ => None,
        }
    }

    pub fn as_float_vec(&self) -> Option<Vec<f32>> {
        match self {
            Value::Float(v) => Some(vec![*v]),
            Value::FloatVec(v) => Some(v.clone()),
            Value::Missing => Some(vec![]),
            _ => None,
        }
    }

    pub fn as_string_vec(&self) -> Option<Vec<String>> {
        match self {
            Value::String(s) => Some(vec![s.clone()]),
            Value::StringVec(v) => Some(v.clone()),
            Value::Missing => Some(vec![]),
            _ => None,
        }
    }
}

/// One allele reference inside a sample's GT field. `allele = None` is
/// a no-call (`.`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GtAllele {
    pub allele: Option<usize>,
    /// Set when this allele is joined to the previous one with `|`
    /// (phased). Always `false` for the first allele in the call.
    pub phased: bool,
}

/// A single sample's genotype. AD/PL/DP/GQ/FT are specialized FORMAT
/// fields and get dedicated slots; anything else observed in the
/// record's FORMAT key list lands in `other`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Genotype {
    /// `None` means the entire GT field is absent for this sample (not
    /// the same as an all-no-call `./.`. which is `Some(vec![.., ..])`).
    pub gt: Option<Vec<GtAllele>>,
    pub gq: Option<i32>,
    pub dp: Option<i32>,
    pub ad: Option<Vec<i32>>,
    pub pl: Option<Vec<i32>>,
    /// `None` renders as the literal `PASS` on encode.
    pub ft: Option<String>,
    pub other: IndexMap<String, Value>,
}

impl Genotype {
    pub fn ploidy(&self) -> usize {
        self.gt.as_ref().map(|a| a.len()).unwrap_or(0)
    }
}

/// A decoded or to-be-encoded variant-call record.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantRecord {
    pub contig: String,
    /// 1-based inclusive position (public coordinate; the wire encodes
    /// 0-based).
    pub pos: u32,
    pub id: Option<String>,
    pub ref_allele: String,
    pub alt_alleles: Vec<String>,
    pub qual: Option<f32>,
    /// Resolved filter names. Empty means "unfiltered" (no FILTER data
    /// present at all); `["PASS"]` is an explicit pass.
    pub filters: Vec<String>,
    /// INFO values in source iteration order.
    pub info: IndexMap<String, Value>,
    /// FORMAT key order as declared for this record.
    pub format_order: Vec<String>,
    pub genotypes: Vec<Genotype>,
}

impl VariantRecord {
    pub fn ref_length(&self) -> usize {
        self.ref_allele.len()
    }

    /// 1-based inclusive end position, `pos + ref_length - 1`.
    pub fn stop(&self) -> u32 {
        self.pos + self.ref_length() as u32 - 1
    }

    pub fn n_alleles(&self) -> usize {
        1 + self.alt_alleles.len()
    }

    pub fn max_ploidy(&self) -> usize {
        self.genotypes
            .iter()
            .map(Genotype::ploidy)
            .max()
            .unwrap_or(0)
            .max(2)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn stop_is_inclusive_end() {
        let record = VariantRecord {
            contig: "chr1".into(),
            pos: 1001,
            id: None,
            ref_allele: "AAA".into(),
            alt_alleles: vec!["A".into()],
            qual: None,
            filters: vec![],
            info: IndexMap::new(),
            format_order: vec![],
            genotypes: vec![],
        };
        assert_eq!(record.stop(), 1003);
    }

    #[test]
    fn max_ploidy_floors_at_two() {
        let record = VariantRecord {
            contig: "chr1".into(),
            pos: 1,
            id: None,
            ref_allele: "A".into(),
            alt_alleles: vec![],
            qual: None,
            filters: vec![],
            info: IndexMap::new(),
            format_order: vec![],
            genotypes: vec![Genotype {
                gt: Some(vec![GtAllele {
                    allele: Some(0),
                    phased: false,
                }]),
                ..Default::default()
            }],
        };
        assert_eq!(record.max_ploidy(), 2);
    }
}
