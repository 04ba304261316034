use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::{BufRead, Read, Seek};

use crate::base::*;
use crate::parser::{FileParser, ObjParser};

use super::esr::EndstreamReader;

struct ObjStm {
    entries: Vec<(ObjNum, Offset)>,
    source: Vec<u8>
}

pub(crate) fn read_objstm_int<T: BufRead>(op: &mut ObjParser<T>) -> Result<u64, Error> {
    match op.read_number()? {
        Number::Int(n) if n >= 0 => Ok(n as u64),
        _ => Err(Error::parse("malformed object stream header"))
    }
}

/// Resolves a stream's payload: direct bytes already in memory, or the raw slice read from
/// `parser` at its recorded offset, length-resolved and filter-decoded.
pub(crate) fn read_stream_data<'a, T: BufRead + Seek>(parser: &'a FileParser<T>, stream: &Stream, locator: &dyn Locator) -> Result<Box<dyn BufRead + 'a>, Error> {
    let data_start = match stream.data.clone() {
        Data::Val(v) => return Ok(Box::new(std::io::Cursor::new(v))),
        Data::Ref(offset) => offset
    };
    let length = match parser.resolve_stream_length(&stream.dict, data_start, Some(locator)) {
        Ok(len) => len,
        Err(_) => {
            log::warn!("falling back to endstream-scanning for a stream with bad /Length");
            let raw = parser.read_raw(data_start)?;
            return Ok(Box::new(EndstreamReader::new(raw)));
        }
    };
    let raw = parser.read_raw(data_start)?;
    let mut limited = raw.take(length);
    let mut buf = Vec::new();
    limited.read_to_end(&mut buf)?;

    let filter_obj = resolve_filters_via(parser, locator, stream.dict.lookup(b"Filter"))?;
    let filters = crate::codecs::to_filters(&filter_obj)?;
    let parms_obj = resolve_filters_via(parser, locator, stream.dict.lookup(b"DecodeParms"))?;
    let params = crate::codecs::to_params(&parms_obj, filters.len())?;
    Ok(crate::codecs::decode(std::io::Cursor::new(buf), &filters, &params))
}

/// Resolves `obj` (or, for an array, each of its elements) one level of indirection at a time
/// against `locator`, without the object-stream cache a [`BaseReader`] keeps.
fn resolve_filters_via<T: BufRead + Seek>(parser: &FileParser<T>, locator: &dyn Locator, obj: &Object) -> Result<Object, Error> {
    fn resolve_one<T: BufRead + Seek>(parser: &FileParser<T>, locator: &dyn Locator, obj: &Object) -> Result<Object, Error> {
        let mut cur = obj.clone();
        loop {
            match cur {
                Object::Ref(objref) => cur = match locator.locate(&objref) {
                    Some(Record::Used{offset, ..}) => parser.read_obj_at(offset)?.1,
                    _ => Object::Null
                },
                other => return Ok(other)
            }
        }
    }
    match obj {
        Object::Array(arr) => Ok(Object::Array(
            arr.iter().map(|o| resolve_one(parser, locator, o)).collect::<Result<_, _>>()?
        )),
        obj => resolve_one(parser, locator, obj)
    }
}

/// Resolves indirect references and stream payloads against a [`FileParser`] and whatever
/// [`Locator`] the caller supplies. Holds no xref state of its own (that's the caller's job,
/// see [`super::simple::SimpleReader`]/[`super::full::FullReader`]) besides a cache of object
/// streams already decompressed, since those are comparatively expensive to redo.
pub struct BaseReader<T: BufRead + Seek> {
    pub(crate) parser: FileParser<T>,
    objstms: RefCell<BTreeMap<Offset, ObjStm>>,
    max_objstm_objects: usize
}

impl<T: BufRead + Seek> BaseReader<T> {
    pub fn new(parser: FileParser<T>) -> Self {
        Self::with_max_objstm_objects(parser, 1000)
    }

    pub fn with_max_objstm_objects(parser: FileParser<T>, max_objstm_objects: usize) -> Self {
        BaseReader { parser, objstms: RefCell::new(BTreeMap::new()), max_objstm_objects }
    }

    /// Walks the `/Prev`/`/XRefStm` chain starting at `entry`, yielding each section in the
    /// order encountered (hybrid-reference `/XRefStm` sections come right after the table that
    /// names them, ahead of that table's own `/Prev`). Does not itself guard against a `/Prev`
    /// cycle; callers walking this must track visited offsets themselves.
    pub fn read_xref_chain(parser: &FileParser<T>, entry: Offset, reject_multi_pair_index: bool) -> XRefIterator<'_, T> {
        XRefIterator { parser, next: Some(entry), pending_prev: None, is_aside: false, reject_multi_pair_index }
    }

    pub fn resolve_ref(&self, objref: &ObjRef, locator: &dyn Locator) -> Result<Object, Error> {
        match locator.locate(objref) {
            Some(Record::Used{offset, ..}) => self.read_uncompressed(offset, objref),
            Some(Record::Compr{num_within, index}) => self.read_compressed(num_within, index, locator, objref),
            _ => Ok(Object::Null)
        }
    }

    pub fn resolve_obj(&self, obj: &Object, locator: &dyn Locator) -> Result<Object, Error> {
        match obj {
            Object::Ref(objref) => self.resolve_ref(objref, locator),
            obj => Ok(obj.clone())
        }
    }

    /// Follows indirect references repeatedly until landing on a direct object (or `Null`).
    /// Used for values that are legal to be indirect anywhere they're nested, e.g. `/Filter`
    /// entries inside an array.
    pub fn resolve_deep(&self, obj: &Object, locator: &dyn Locator) -> Result<Object, Error> {
        let mut cur = obj.clone();
        loop {
            match cur {
                Object::Ref(objref) => cur = self.resolve_ref(&objref, locator)?,
                other => return Ok(other)
            }
        }
    }

    fn read_uncompressed(&self, offset: Offset, expected: &ObjRef) -> Result<Object, Error> {
        let (found, obj) = self.parser.read_obj_at(offset)?;
        if found.num != expected.num {
            return Err(Error::parse("object number mismatch at xref-indicated offset"));
        }
        Ok(obj)
    }

    fn read_compressed(&self, num_within: ObjNum, index: ObjIndex, locator: &dyn Locator, expected: &ObjRef) -> Result<Object, Error> {
        self.read_cache_objstm(num_within, locator)?;
        let objstms = self.objstms.borrow();
        let objstm = objstms.get(&num_within).expect("just inserted");
        let &(num, rel_offset) = objstm.entries.get(index as usize)
            .ok_or(Error::Parse(ErrorKind::DanglingObjectStream, "object index out of range in object stream"))?;
        if num != expected.num {
            return Err(Error::parse("object number mismatch within object stream"));
        }
        let cursor = std::io::Cursor::new(&objstm.source[rel_offset as usize..]);
        let mut op = crate::parser::ObjParser::new(cursor);
        op.read_obj()
    }

    fn read_cache_objstm(&self, parent: ObjNum, locator: &dyn Locator) -> Result<(), Error> {
        if self.objstms.borrow().contains_key(&parent) {
            return Ok(());
        }
        let objstm = self.read_objstm(parent, locator)?;
        self.objstms.borrow_mut().insert(parent, objstm);
        Ok(())
    }

    fn read_objstm(&self, parent: ObjNum, locator: &dyn Locator) -> Result<ObjStm, Error> {
        let obj = self.resolve_ref(&ObjRef{num: parent, gen: 0}, locator)?;
        let Object::Stream(stream) = obj else {
            return Err(Error::Parse(ErrorKind::DanglingObjectStream, "compressed object's parent is not a stream"));
        };
        let n: usize = stream.dict.lookup(b"N").num_value()
            .ok_or(Error::Parse(ErrorKind::DanglingObjectStream, "object stream missing /N"))?;
        if n > self.max_objstm_objects {
            return Err(Error::Parse(ErrorKind::TooManyObjects, "object stream /N exceeds configured limit"));
        }
        let first: u64 = stream.dict.lookup(b"First").num_value()
            .ok_or(Error::Parse(ErrorKind::DanglingObjectStream, "object stream missing /First"))?;
        let mut data = self.read_stream_data(&stream, locator)?;
        let mut header = vec![0u8; first as usize];
        data.read_exact(&mut header)
            .map_err(|_| Error::Parse(ErrorKind::DanglingObjectStream, "object stream header shorter than /First"))?;
        let mut op = crate::parser::ObjParser::new(std::io::Cursor::new(header));
        let mut entries = Vec::with_capacity(n);
        for _ in 0..n {
            let num = read_objstm_int(&mut op)?;
            let offset = read_objstm_int(&mut op)?;
            entries.push((num, offset));
        }
        let mut source = Vec::new();
        data.read_to_end(&mut source)?;
        Ok(ObjStm{entries, source})
    }

    pub fn resolve_filters(&self, filter: &Object, locator: &dyn Locator) -> Result<Object, Error> {
        match filter {
            Object::Array(arr) => Ok(Object::Array(
                arr.iter().map(|o| self.resolve_deep(o, locator)).collect::<Result<_, _>>()?
            )),
            obj => self.resolve_deep(obj, locator)
        }
    }

    pub fn read_stream_data(&self, stream: &Stream, locator: &dyn Locator) -> Result<Box<dyn BufRead + '_>, Error> {
        read_stream_data(&self.parser, stream, locator)
    }
}

/// Walks a `/Prev`/`/XRefStm` chain, materialising one [`XRef`] section per step. A hybrid
/// table's `/XRefStm` is yielded right after the table itself, ahead of that table's own
/// `/Prev` (`pending_prev` holds the table's `/Prev` while the aside section is in flight).
pub struct XRefIterator<'a, T: BufRead + Seek> {
    parser: &'a FileParser<T>,
    next: Option<Offset>,
    pending_prev: Option<Offset>,
    is_aside: bool,
    reject_multi_pair_index: bool
}

impl<T: BufRead + Seek> Iterator for XRefIterator<'_, T> {
    type Item = Result<(Offset, XRef), Error>;

    /// `None` means the `/Prev` chain genuinely ended. A parse failure is a real error, not a
    /// normal end of chain, so it's surfaced as `Some(Err(..))` rather than swallowed to `None`.
    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.next.take()?;
        let xref = match self.parser.read_at(offset, self.reject_multi_pair_index) {
            Ok(crate::parser::Structural::XRef(xref)) => xref,
            Ok(crate::parser::Structural::Obj(..)) => {
                return Some(Err(Error::Parse(ErrorKind::MalformedXref, "expected xref section, found an object instead")));
            },
            Err(err) => return Some(Err(err))
        };
        if self.is_aside {
            if xref.dict.lookup(b"Prev").num_value::<Offset>().is_some()
                || xref.dict.lookup(b"XRefStm").num_value::<Offset>().is_some() {
                log::warn!("ignoring /Prev or /XRefStm on a hybrid /XRefStm section at {offset}");
            }
            self.is_aside = false;
            self.next = self.pending_prev.take();
            return Some(Ok((offset, xref)));
        }
        let prev = xref.dict.lookup(b"Prev").num_value();
        match xref.dict.lookup(b"XRefStm").num_value() {
            Some(aside) => {
                self.pending_prev = prev;
                self.is_aside = true;
                self.next = Some(aside);
            },
            None => self.next = prev
        }
        Some(Ok((offset, xref)))
    }
}
