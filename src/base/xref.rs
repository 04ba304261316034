use std::collections::BTreeMap;

use super::dict::Dict;
use super::object::ObjRef;
use super::types::*;

/// One section of a cross-reference table, fully read into memory: either a classical ASCII
/// table or a cross-reference stream, normalised to the same shape.
#[derive(Debug)]
pub struct XRef {
    pub tpe: XRefType,
    pub map: BTreeMap<ObjNum, Record>,
    pub dict: Dict,
    pub size: ObjNum
}

#[derive(Debug)]
pub enum XRefType {
    Table,
    Stream(ObjRef)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    Used { gen: ObjGen, offset: Offset },
    Compr { num_within: ObjNum, index: ObjIndex },
    Free { gen: ObjGen, next: ObjNum }
}

impl Default for Record {
    /// The generation `65535` sentinel matches a free entry that will never collide with a real
    /// generation number, used when a lookup falls through (out of bounds, or a generation
    /// mismatch on an otherwise-present entry).
    fn default() -> Self {
        Record::Free { gen: 65535, next: 0 }
    }
}

impl XRef {
    /// Folds an older section into this one: entries already present here (the newer section)
    /// win, and `/Prev`/`/XRefStm` of the older section are not inherited.
    pub fn merge_prev(&mut self, prev: XRef) {
        self.size = self.size.max(prev.size);
        for (num, rec) in prev.map {
            self.map.entry(num).or_insert(rec);
        }
    }
}
