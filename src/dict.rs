//! C2: the ordered string dictionary.
//!
//! FILTER/INFO/FORMAT IDs and contig names are each assigned a 32-bit
//! offset; this module builds that mapping from a set of header lines and
//! answers both directions of the lookup.

use std::collections::HashMap;

use crate::error::{BcfError, Result};
use crate::version::MinorVersion;

/// A single header line candidate for dictionary construction: just the
/// bits dictionary-building cares about (id and, if present, explicit IDX).
#[derive(Debug, Clone)]
pub struct DictEntry {
    pub id: String,
    pub idx: Option<u32>,
}

/// Ordered `offset <-> string` table. Two variants share one struct: the
/// ordinal variant has `offset == position`, the indexed variant (v2.2
/// `IDX=`) can be sparse, so it additionally tracks the maximum offset to
/// size its dense backing vector.
#[derive(Debug, Clone)]
pub struct Dictionary {
    /// Indexed by offset; `None` for holes in the indexed variant.
    by_offset: Vec<Option<String>>,
    by_id: HashMap<String, u32>,
    indexed: bool,
}

impl Dictionary {
    pub fn get(&self, offset: u32) -> Option<&str> {
        self.by_offset
            .get(offset as usize)
            .and_then(|s| s.as_deref())
    }

    pub fn offset_of(&self, id: &str) -> Option<u32> {
        self.by_id.get(id).copied()
    }

    pub fn size(&self) -> usize {
        self.by_offset.iter().filter(|s| s.is_some()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.by_offset
            .iter()
            .enumerate()
            .filter_map(|(offset, s)| s.as_deref().map(|s| (offset as u32, s)))
    }

    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    fn build(entries: Vec<DictEntry>, seed_pass_at_zero: bool) -> Result<Self> {
        let any_idx = entries.iter().any(|e| e.idx.is_some());
        let all_idx = entries.iter().all(|e| e.idx.is_some());
        if any_idx && !all_idx {
            return Err(BcfError::InvalidHeader {
                reason:
                    "header lines mix explicit IDX= annotations with implicit ones; a file must be all-IDX or all-no-IDX"
                        .into(),
            });
        }

        let mut by_id: HashMap<String, u32> = HashMap::new();
        let mut pairs: Vec<(u32, String)> = Vec::new();

        if any_idx {
            for e in &entries {
                let offset = e.idx.expect("checked all-idx above");
                if by_id.contains_key(&e.id) {
                    continue; // first occurrence wins
                }
                by_id.insert(e.id.clone(), offset);
                pairs.push((offset, e.id.clone()));
            }
            if seed_pass_at_zero && !by_id.contains_key("PASS") {
                // PASS must always resolve; if no FILTER=PASS line with an
                // IDX was declared, and offset 0 is free, seed it there.
                let zero_free = !pairs.iter().any(|(o, _)| *o == 0);
                let offset = if zero_free {
                    0
                } else {
                    pairs.iter().map(|(o, _)| *o).max().unwrap_or(0) + 1
                };
                by_id.insert("PASS".into(), offset);
                pairs.push((offset, "PASS".into()));
            }
        } else {
            let mut ordered: Vec<String> = Vec::new();
            if seed_pass_at_zero {
                ordered.push("PASS".into());
                by_id.insert("PASS".into(), 0);
            }
            for e in &entries {
                if by_id.contains_key(&e.id) {
                    continue;
                }
                let offset = ordered.len() as u32;
                by_id.insert(e.id.clone(), offset);
                ordered.push(e.id.clone());
            }
            pairs = ordered
                .into_iter()
                .enumerate()
                .map(|(i, s)| (i as u32, s))
                .collect();
        }

        let max_offset = pairs.iter().map(|(o, _)| *o).max().unwrap_or(0);
        let mut by_offset = vec![None; max_offset as usize + 1];
        for (offset, id) in pairs {
            by_offset[offset as usize] = Some(id);
        }

        Ok(Dictionary {
            by_offset,
            by_id,
            indexed: any_idx,
        })
    }

    /// Builds the FILTER/INFO/FORMAT string dictionary. `PASS` is always
    /// present at offset 0 (ordinal) or explicitly indexed, regardless of
    /// whether a `FILTER=PASS` line was declared.
    pub fn build_string_dict(entries: Vec<DictEntry>, version: MinorVersion) -> Result<Self> {
        Self::build(Self::normalize_idx(entries, version), true)
    }

    /// Builds the contig dictionary; built the same way, but there is no
    /// PASS seed.
    pub fn build_contig_dict(entries: Vec<DictEntry>, version: MinorVersion) -> Result<Self> {
        Self::build(Self::normalize_idx(entries, version), false)
    }

    /// `IDX=` annotations are only honored starting at minor version 2; a
    /// v2.1 header carrying them still builds an ordinal dictionary.
    fn normalize_idx(entries: Vec<DictEntry>, version: MinorVersion) -> Vec<DictEntry> {
        if version.honors_idx() {
            entries
        } else {
            entries.into_iter().map(|e| DictEntry { idx: None, ..e }).collect()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn entry(id: &str, idx: Option<u32>) -> DictEntry {
        DictEntry {
            id: id.into(),
            idx,
        }
    }

    #[test]
    fn pass_is_seeded_at_zero_without_a_filter_line() {
        let dict = Dictionary::build_string_dict(vec![entry("AC", None), entry("AF", None)], MinorVersion::V2)
            .unwrap();
        assert_eq!(dict.get(0), Some("PASS"));
        assert_eq!(dict.offset_of("PASS"), Some(0));
    }

    #[test]
    fn declared_pass_does_not_duplicate() {
        let dict = Dictionary::build_string_dict(
            vec![entry("PASS", None), entry("AC", None)],
            MinorVersion::V2,
        )
        .unwrap();
        assert_eq!(dict.size(), 2);
        assert_eq!(dict.get(0), Some("PASS"));
        assert_eq!(dict.get(1), Some("AC"));
    }

    #[test]
    fn mixed_idx_and_no_idx_is_a_hard_error() {
        let res = Dictionary::build_string_dict(
            vec![entry("AC", Some(3)), entry("AF", None)],
            MinorVersion::V2,
        );
        assert!(res.is_err());
    }

    #[test]
    fn indexed_variant_is_sparse() {
        let dict = Dictionary::build_string_dict(
            vec![entry("AC", Some(5)), entry("AF", Some(7))],
            MinorVersion::V2,
        )
        .unwrap();
        assert!(dict.is_indexed());
        assert_eq!(dict.get(5), Some("AC"));
        assert_eq!(dict.get(6), None);
        assert_eq!(dict.get(7), Some("AF"));
    }

    #[test]
    fn building_twice_from_the_same_header_is_deterministic() {
        let entries = vec![entry("AC", None), entry("AF", None), entry("DP", None)];
        let d1 = Dictionary::build_string_dict(entries.clone(), MinorVersion::V2).unwrap();
        let d2 = Dictionary::build_string_dict(entries, MinorVersion::V2).unwrap();
        assert_eq!(
            d1.iter().collect::<Vec<_>>(),
            d2.iter().collect::<Vec<_>>()
        );
    }

    #[test]
    fn v1_ignores_idx_and_builds_ordinal() {
        let dict = Dictionary::build_string_dict(
            vec![entry("AC", Some(5)), entry("AF", Some(7))],
            MinorVersion::V1,
        )
        .unwrap();
        assert!(!dict.is_indexed());
        assert_eq!(dict.get(0), Some("PASS"));
        assert_eq!(dict.get(1), Some("AC"));
        assert_eq!(dict.get(2), Some("AF"));
    }
}
