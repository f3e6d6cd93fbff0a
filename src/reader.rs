//! C7: the stream reader.
//!
//! Reads the `BCF\x02` prologue, the embedded VCF header, and then a
//! sequential stream of records: `[u8; 5]`/`u32` prologue reads and an
//! `Rc`-held header handle, with records handed out as [`DecodedRecord`]s
//! whose genotypes block decodes lazily on first access.

use std::io::{self, Read};
use std::path::Path;
use std::rc::Rc;

use crate::error::{BcfError, Result};
use crate::framer;
use crate::genotypes::LazyGenotypes;
use crate::header::{parse_header_text, HeaderSchema};
use crate::record::{Genotype, VariantRecord};
use crate::version::{self, MinorVersion};

/// One record off the stream: the sites block is always decoded eagerly,
/// the genotypes block only on first access.
pub struct DecodedRecord {
    record: VariantRecord,
    lazy: Option<LazyGenotypes>,
}

impl DecodedRecord {
    /// The decoded sites (CHROM/POS/REF/ALT/QUAL/FILTER/INFO); does not
    /// trigger genotypes decode.
    pub fn site(&self) -> &VariantRecord {
        &self.record
    }

    /// Decodes the genotypes block on first call; subsequent calls return
    /// the cached result.
    pub fn genotypes(&mut self) -> Result<&[Genotype]> {
        if let Some(lazy) = self.lazy.take() {
            let (format_order, genotypes) = lazy.decode()?;
            self.record.format_order = format_order;
            self.record.genotypes = genotypes;
        }
        Ok(&self.record.genotypes)
    }

    /// Forces genotypes decode and returns the fully-materialized record.
    pub fn into_record(mut self) -> Result<VariantRecord> {
        self.genotypes()?;
        Ok(self.record)
    }
}

pub struct BcfReader<R> {
    inner: R,
    schema: Rc<HeaderSchema>,
    version: MinorVersion,
    next_index: usize,
}

impl<R: Read> BcfReader<R> {
    pub fn new(mut inner: R) -> Result<Self> {
        let mut prologue = [0u8; 5];
        inner.read_exact(&mut prologue)?;
        version::check_magic(&prologue[..3])?;
        version::check_major(prologue[3])?;
        let minor = MinorVersion::from_byte(prologue[4])?;
        log::debug!("BCF2 prologue: minor version {}", minor.as_byte());

        let mut len_buf = [0u8; 4];
        inner.read_exact(&mut len_buf)?;
        let header_len = u32::from_le_bytes(len_buf) as usize;

        let mut header_buf = vec![0u8; header_len];
        inner.read_exact(&mut header_buf)?;
        let text = String::from_utf8_lossy(&header_buf)
            .trim_end_matches('\0')
            .to_string();
        log::debug!("BCF2 header: {header_len} bytes");

        let parsed = parse_header_text(&text)?;
        let schema = Rc::new(HeaderSchema::build(&parsed, minor)?);

        Ok(BcfReader {
            inner,
            schema,
            version: minor,
            next_index: 0,
        })
    }

    pub fn schema(&self) -> &HeaderSchema {
        &self.schema
    }

    pub fn version(&self) -> MinorVersion {
        self.version
    }

    /// Reads the next record, or `None` at a clean end of stream.
    pub fn read_record(&mut self) -> Result<Option<DecodedRecord>> {
        let mut len_buf = [0u8; 8];
        match self.inner.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(BcfError::Io(e)),
        }
        let l_shared = u32::from_le_bytes(len_buf[0..4].try_into().unwrap()) as usize;
        let l_indiv = u32::from_le_bytes(len_buf[4..8].try_into().unwrap()) as usize;

        let mut sites = vec![0u8; l_shared];
        self.inner.read_exact(&mut sites)?;
        let mut genotypes = vec![0u8; l_indiv];
        self.inner.read_exact(&mut genotypes)?;

        let (record, lazy) =
            framer::decode_record(&sites, genotypes, &self.schema, self.version, self.next_index)?;
        self.next_index += 1;
        Ok(Some(DecodedRecord {
            record,
            lazy: Some(lazy),
        }))
    }
}

impl BcfReader<Box<dyn Read>> {
    /// Opens a path, transparently decompressing (bgzip/gzip/plain) via
    /// `niffler`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let (reader, _format) = niffler::from_path(path)
            .map_err(|e| BcfError::Io(io::Error::new(io::ErrorKind::Other, e.to_string())))?;
        Self::new(reader)
    }
}

impl<R: Read> Iterator for BcfReader<R> {
    type Item = Result<DecodedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}
