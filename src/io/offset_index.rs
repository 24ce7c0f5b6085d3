use indexmap::map::{Iter, Keys};
use indexmap::IndexMap;

/**
An ordered mapping from entity ID to byte offset into the source
file it resides in.

Used for the chromatogram list, whose entries are addressed by position
and carry a free-form native ID.
*/
#[derive(Default, Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OffsetIndex {
    /// The name of the index. There may potentially be more than one
    /// index per file
    pub name: String,

    /// The mapping from ID to byte offset, ordered by occurrence
    #[cfg_attr(feature = "serde", serde(with = "indexmap::map::serde_seq"))]
    pub offsets: IndexMap<Box<str>, u64>,
}

impl OffsetIndex {
    pub fn new(name: String) -> OffsetIndex {
        OffsetIndex {
            name,
            ..Default::default()
        }
    }

    /// Get the offset of the specified key
    #[inline]
    pub fn get(&self, key: &str) -> Option<u64> {
        self.offsets.get(key).copied()
    }

    /// Get the associated key and offset for the specified index position
    #[inline]
    pub fn get_index(&self, index: usize) -> Option<(&str, u64)> {
        self.offsets
            .get_index(index)
            .map(|(key, offset)| (key.as_ref(), *offset))
    }

    /// Insert `key` into the index with an offset value
    #[inline]
    pub fn insert<T: Into<Box<str>>>(&mut self, key: T, offset: u64) -> Option<u64> {
        self.offsets.insert(key.into(), offset)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn keys(&self) -> Keys<'_, Box<str>, u64> {
        self.offsets.keys()
    }

    pub fn clear(&mut self) {
        self.offsets.clear();
    }

    /// Iterate over the keys and indices
    pub fn iter(&self) -> Iter<'_, Box<str>, u64> {
        self.offsets.iter()
    }
}

/**
A sparse table from scan number to the byte offset of that scan's element.

The position in [`ScanIndex::offsets`] *is* the scan number, so the table is
padded with zeros up to the largest scan number seen. An offset of 0 means the
scan is not present in the file, which is safe because no scan element can start
at the beginning of an XML document.
*/
#[derive(Default, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanIndex {
    pub name: String,
    pub offsets: Vec<u64>,
    /// The scan number of the first entry read from the index
    pub first_scan: u32,
    /// The scan number of the last entry read from the index
    pub last_scan: u32,
    /// Whether any entry carried an explicit scan number
    has_scan_numbers: bool,
}

impl ScanIndex {
    /// The largest scan number the table will grow to hold
    pub const MAX_SCAN_NUMBER: u32 = 1 << 24;

    pub fn new(name: String) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    /**
    Record `offset` for `scan`.

    When `scan` is `None`, the entry has no recognizable scan number and takes the
    next free position instead. Returns the position the offset was stored at, or
    `None` if the position would exceed [`ScanIndex::MAX_SCAN_NUMBER`].
    */
    pub fn insert(&mut self, scan: Option<u32>, offset: u64) -> Option<u32> {
        let is_first = self.offsets.is_empty();
        let position = match scan {
            Some(scan) if scan > Self::MAX_SCAN_NUMBER => return None,
            None if self.offsets.len() > Self::MAX_SCAN_NUMBER as usize => return None,
            Some(scan) => {
                let i = scan as usize;
                if self.offsets.len() <= i {
                    self.offsets.resize(i + 1, 0);
                }
                self.offsets[i] = offset;
                self.last_scan = scan;
                self.has_scan_numbers = true;
                scan
            }
            None => {
                // Position 0 is reserved for absent scans
                if self.offsets.is_empty() {
                    self.offsets.push(0);
                }
                self.offsets.push(offset);
                let position = (self.offsets.len() - 1) as u32;
                self.last_scan = position;
                position
            }
        };
        if is_first {
            self.first_scan = position;
        }
        Some(position)
    }

    /// Settle the scan bounds once every entry has been inserted
    pub fn finish(&mut self) {
        if !self.has_scan_numbers {
            self.last_scan = self.offsets.len().saturating_sub(1) as u32;
        }
    }

    /// The offset of `scan`, if the scan is present
    #[inline]
    pub fn get(&self, scan: u32) -> Option<u64> {
        match self.offsets.get(scan as usize) {
            Some(0) | None => None,
            Some(offset) => Some(*offset),
        }
    }

    /// The number of scans actually present
    pub fn scan_count(&self) -> usize {
        self.offsets.iter().filter(|o| **o != 0).count()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scan_count() == 0
    }

    /// Iterate over the present scans as `(scan number, offset)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (u32, u64)> + '_ {
        self.offsets
            .iter()
            .enumerate()
            .filter(|(_, o)| **o != 0)
            .map(|(i, o)| (i as u32, *o))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sparse_insert() {
        let mut index = ScanIndex::new("spectrum".into());
        index.insert(Some(3), 1200);
        index.insert(Some(4), 5400);
        index.insert(Some(7), 9100);
        index.finish();
        assert_eq!(index.first_scan, 3);
        assert_eq!(index.last_scan, 7);
        assert_eq!(index.len(), 8);
        assert_eq!(index.scan_count(), 3);
        assert_eq!(index.get(5), None);
        assert_eq!(index.get(0), None);
        assert_eq!(index.get(7), Some(9100));
        assert_eq!(index.get(100), None);
        let scans: Vec<u32> = index.iter().map(|(s, _)| s).collect();
        assert_eq!(scans, vec![3, 4, 7]);
    }

    #[test]
    fn test_unnumbered_entries() {
        let mut index = ScanIndex::new("spectrum".into());
        assert_eq!(index.insert(None, 100), Some(1));
        assert_eq!(index.insert(None, 200), Some(2));
        index.finish();
        assert_eq!(index.first_scan, 1);
        assert_eq!(index.last_scan, 2);
        assert_eq!(index.scan_count(), 2);
        assert_eq!(index.get(0), None);
        assert_eq!(index.get(1), Some(100));
        let scans: Vec<u32> = index.iter().map(|(s, _)| s).collect();
        assert_eq!(scans, vec![1, 2]);
    }

    #[test]
    fn test_scan_number_limit() {
        let mut index = ScanIndex::new("spectrum".into());
        assert_eq!(index.insert(Some(2), 100), Some(2));
        assert_eq!(index.insert(Some(u32::MAX), 200), None);
        assert_eq!(index.len(), 3);
        assert_eq!(index.last_scan, 2);
    }

    #[test]
    fn test_chromatogram_positions() {
        let mut index = OffsetIndex::new("chromatogram".into());
        index.insert("TIC", 500);
        index.insert("BPC", 900);
        assert_eq!(index.get_index(1), Some(("BPC", 900)));
        assert_eq!(index.get("TIC"), Some(500));
        assert_eq!(index.len(), 2);
    }
}
