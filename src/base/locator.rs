use super::object::ObjRef;
use super::xref::{Record, XRef};

/// Resolves object numbers to their cross-reference entries.
///
/// A null implementation is provided for `()`, used where no xref context is available (e.g.
/// reading raw bytes ahead of any structure) and always reports "not found".
pub trait Locator {
    /// Looks up `objref`. Implementors should check the requested generation against the one on
    /// file and return `Some(Record::default())` on a mismatch (rather than `None`, which means
    /// "this object number does not exist here at all").
    fn locate(&self, objref: &ObjRef) -> Option<Record>;
}

impl Locator for () {
    fn locate(&self, _objref: &ObjRef) -> Option<Record> {
        None
    }
}

impl Locator for XRef {
    /// `Some(record)` if found here and the generation agrees with `objref.gen`.
    /// `Some(Record::default())` on a generation mismatch, or when `objref.num` is out of
    /// bounds for this section's `/Size` even though the number happens to look up something.
    /// `None` if this section simply has no entry for the number at all.
    fn locate(&self, objref: &ObjRef) -> Option<Record> {
        if objref.num >= self.size {
            return Some(Record::default());
        }
        match self.map.get(&objref.num)? {
            rec @ &Record::Used{gen, ..} if gen == objref.gen => Some(*rec),
            rec @ &Record::Compr{..} if objref.gen == 0 => Some(*rec),
            rec @ &Record::Free{..} => Some(*rec),
            _ => Some(Record::default())
        }
    }
}

impl Locator for [&XRef] {
    fn locate(&self, objref: &ObjRef) -> Option<Record> {
        self.iter().flat_map(|xref| xref.locate(objref)).next()
    }
}
