pub mod codec;
pub mod dict;
pub mod error;
pub mod field;
pub mod framer;
pub mod genotypes;
pub mod header;
pub mod reader;
pub mod record;
pub mod version;
pub mod writer;

pub use error::{BcfError, Result};
pub use reader::BcfReader;
pub use record::{Genotype, GtAllele, Value, VariantRecord};
pub use version::MinorVersion;
pub use writer::{BcfWriter, WriterConfig};

#[cfg(test)]
mod test {
    use super::*;
    use indexmap::IndexMap;

    const HEADER: &str = "##fileformat=VCFv4.2\n##FILTER=<ID=PASS,Description=\"x\">\n##INFO=<ID=AC,Number=A,Type=Integer,Description=\"x\">\n##FORMAT=<ID=GT,Number=1,Type=String,Description=\"x\">\n##contig=<ID=chr1,length=1000>\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tHG001\n";

    #[test]
    fn writes_and_reads_back_a_record_with_a_genotype() {
        let mut buf = Vec::new();
        let mut writer = BcfWriter::new(
            &mut buf,
            HEADER,
            WriterConfig {
                minor_version: MinorVersion::V2,
            },
        )
        .unwrap();
        let record = VariantRecord {
            contig: "chr1".into(),
            pos: 100,
            id: None,
            ref_allele: "A".into(),
            alt_alleles: vec!["T".into()],
            qual: Some(99.0),
            filters: vec!["PASS".into()],
            info: IndexMap::from_iter([("AC".to_string(), Value::IntegerVec(vec![1]))]),
            format_order: vec!["GT".to_string()],
            genotypes: vec![Genotype {
                gt: Some(vec![
                    GtAllele { allele: Some(0), phased: false },
                    GtAllele { allele: Some(1), phased: true },
                ]),
                ..Default::default()
            }],
        };
        writer.write_record(&record).unwrap();

        let mut reader = BcfReader::new(buf.as_slice()).unwrap();
        assert_eq!(reader.schema().samples, vec!["HG001"]);
        let mut decoded = reader.read_record().unwrap().unwrap();
        assert_eq!(decoded.site().pos, 100);
        let genotypes = decoded.genotypes().unwrap();
        assert_eq!(genotypes[0].gt.as_ref().unwrap()[1].allele, Some(1));
        assert!(reader.read_record().unwrap().is_none());
    }
}
