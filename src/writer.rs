//! C7: the stream writer.
//!
//! The inverse of [`crate::reader::BcfReader`]: writes the `BCF\x02`
//! prologue, the embedded VCF header text, then a sequential stream of
//! framed records built with the reader's prologue layout and
//! [`crate::framer::encode_record`].

use std::io::Write;
use std::rc::Rc;

use crate::error::Result;
use crate::framer;
use crate::header::{parse_header_text, HeaderSchema};
use crate::record::VariantRecord;
use crate::version::{self, MinorVersion};

/// Ambient configuration for a writer. The minor version governs vector
/// padding and multi-string join behavior.
#[derive(Debug, Clone, Copy)]
pub struct WriterConfig {
    pub minor_version: MinorVersion,
}

pub struct BcfWriter<W: Write> {
    inner: W,
    schema: Rc<HeaderSchema>,
    version: MinorVersion,
}

impl<W: Write> BcfWriter<W> {
    /// Writes the prologue and header text, then builds the schema the
    /// rest of the stream's records will be encoded against.
    pub fn new(mut inner: W, header_text: &str, config: WriterConfig) -> Result<Self> {
        inner.write_all(version::MAGIC)?;
        inner.write_all(&[config.minor_version.as_byte()])?;

        let mut text = header_text.to_string();
        if !text.ends_with('\0') {
            text.push('\0');
        }
        inner.write_all(&(text.len() as u32).to_le_bytes())?;
        inner.write_all(text.as_bytes())?;
        log::info!(
            "wrote BCF2 header ({} bytes, minor={})",
            text.len(),
            config.minor_version.as_byte()
        );

        let parsed = parse_header_text(header_text)?;
        let schema = Rc::new(HeaderSchema::build(&parsed, config.minor_version)?);

        Ok(BcfWriter {
            inner,
            schema,
            version: config.minor_version,
        })
    }

    pub fn schema(&self) -> &HeaderSchema {
        &self.schema
    }

    /// Frames and encodes one record, writing it straight through.
    /// Encoding is two-pass internally (width/length inspection
    /// happens per field before the typing byte is written) but this call
    /// itself streams: nothing about the record stream as a whole is
    /// buffered beyond the one record being written.
    pub fn write_record(&mut self, record: &VariantRecord) -> Result<()> {
        let mut buf = Vec::new();
        framer::encode_record(&mut buf, record, &self.schema, self.version)?;
        self.inner.write_all(&buf)?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use indexmap::IndexMap;

    const HEADER: &str = "##fileformat=VCFv4.2\n##FILTER=<ID=PASS,Description=\"x\">\n##contig=<ID=chr1,length=1000>\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n";

    #[test]
    fn prologue_carries_magic_and_minor_version() {
        let mut buf = Vec::new();
        let mut writer =
            BcfWriter::new(&mut buf, HEADER, WriterConfig { minor_version: MinorVersion::V1 }).unwrap();
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
            genotypes: vec![],
        };
        writer.write_record(&record).unwrap();
        assert_eq!(&buf[0..4], version::MAGIC);
        assert_eq!(buf[4], 1);
    }
}
