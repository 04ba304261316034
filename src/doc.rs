use std::cell::RefCell;
use std::collections::BTreeSet;
use std::io::{BufRead, Read, Seek};

use crate::base::*;
use crate::base::types::*;
use crate::parser::FileParser;
use crate::reader::base::{read_objstm_int, read_stream_data, BaseReader};

/// Where an [`IndirectRecord`]'s value lives until it is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Byte offset (from `%PDF`) of an `N G obj ... endobj` definition.
    Offset(Offset),
    /// Entry `index` within the object stream named by `parent`.
    Compressed { parent: ObjNum, index: u32 }
}

/// One slot in the [`ObjectIndex`]: where an object lives, and its value once parsed.
#[derive(Debug, Clone)]
pub struct IndirectRecord {
    pub num: ObjNum,
    pub gen: ObjGen,
    pub location: Location,
    pub value: Option<Object>
}

/// The document's flat object table: one slot per object number ever mentioned by any xref
/// section, sorted by number. Placeholders are inserted by the xref loader and the object-stream
/// expander during [`Document::open`]; later accesses fill a placeholder's value at most once.
#[derive(Debug, Default)]
pub struct ObjectIndex(Vec<IndirectRecord>);

impl ObjectIndex {
    pub fn new() -> Self {
        ObjectIndex(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Inserts a placeholder for `num`, unless one is already present (the first writer during
    /// an newest-to-oldest xref walk is the newest revision, so it wins).
    pub fn insert_placeholder(&mut self, num: ObjNum, gen: ObjGen, location: Location) {
        if self.find(num).is_some() {
            return;
        }
        self.0.push(IndirectRecord { num, gen, location, value: None });
        let n = self.0.len();
        if n >= 2 && self.0[n - 2].num > num {
            self.0.sort_by_key(|r| r.num);
        }
    }

    /// Fills a placeholder's value, unless it is already filled (re-fills are ignored).
    pub fn set_value(&mut self, num: ObjNum, value: Object) {
        if let Ok(i) = self.0.binary_search_by_key(&num, |r| r.num) {
            if self.0[i].value.is_none() {
                self.0[i].value = Some(value);
            }
        }
    }

    pub fn find(&self, num: ObjNum) -> Option<&IndirectRecord> {
        self.0.binary_search_by_key(&num, |r| r.num).ok().map(|i| &self.0[i])
    }

    pub fn get_by_index(&self, i: usize) -> Option<&IndirectRecord> {
        self.0.get(i)
    }

    /// Reserves a fresh object number (`len() + 1`) carrying `dict` as an already-resolved
    /// value. Not used by the resolver itself; kept as the hook a future writer would call to
    /// add a new object ahead of serialising it anywhere.
    pub fn allocate(&mut self, dict: Dict) -> ObjRef {
        let num = self.0.last().map_or(1, |r| r.num + 1);
        self.0.push(IndirectRecord { num, gen: 0, location: Location::Offset(0), value: Some(Object::Dict(dict)) });
        ObjRef { num, gen: 0 }
    }
}

/// Adapts an [`ObjectIndex`] to the [`Locator`] interface the parser's `/Length` resolution
/// expects, so a single indirect reference can be chased without a full [`BaseReader`].
struct IndexLocator<'a>(&'a ObjectIndex);

impl Locator for IndexLocator<'_> {
    fn locate(&self, objref: &ObjRef) -> Option<Record> {
        let rec = self.0.find(objref.num)?;
        Some(match rec.location {
            Location::Offset(offset) => Record::Used { gen: rec.gen, offset },
            Location::Compressed { parent, index } => Record::Compr { num_within: parent, index: index as ObjIndex }
        })
    }
}

/// The document's composite trailer: the newest xref section's dictionary, plus `/Root`,
/// `/Info`, `/Encrypt` and `/ID` resolved to direct values where present.
#[derive(Debug)]
pub struct Trailer {
    dict: Dict,
    root: Object,
    info: Option<Object>,
    encrypt: Option<Object>,
    id: Option<Object>
}

impl Trailer {
    /// `/Root` must resolve to something other than `Null`; a missing or dangling catalog is
    /// fatal. `/Info`, `/Encrypt` and `/ID` are best-effort: a resolution failure there is
    /// swallowed rather than aborting the open.
    fn from_dict<T: BufRead + Seek>(dict: Dict, parser: &FileParser<T>, index: &ObjectIndex) -> Result<Trailer, Error> {
        let locator = IndexLocator(index);
        let root = resolve_deep(parser, &locator, dict.lookup(b"Root"))?;
        if root == Object::Null {
            return Err(Error::Parse(ErrorKind::MissingCatalog, "trailer /Root missing or unresolved"));
        }
        let info = optional(resolve_deep(parser, &locator, dict.lookup(b"Info")));
        let encrypt = optional(resolve_deep(parser, &locator, dict.lookup(b"Encrypt")));
        let id = optional(resolve_deep(parser, &locator, dict.lookup(b"ID")));
        Ok(Trailer { dict, root, info, encrypt, id })
    }
}

fn optional(result: Result<Object, Error>) -> Option<Object> {
    match result {
        Ok(Object::Null) => None,
        Ok(obj) => Some(obj),
        Err(err) => {
            log::warn!("ignoring unresolvable trailer entry: {err}");
            None
        }
    }
}

fn resolve_deep<T: BufRead + Seek>(parser: &FileParser<T>, locator: &dyn Locator, obj: &Object) -> Result<Object, Error> {
    let mut cur = obj.clone();
    loop {
        match cur {
            Object::Ref(objref) => cur = match locator.locate(&objref) {
                Some(Record::Used { offset, .. }) => parser.read_obj_at(offset)?.1,
                _ => Object::Null
            },
            other => return Ok(other)
        }
    }
}

/// Strictness and resource knobs left open by the format, plus the error-report override.
///
/// ```no_run
/// # use pdflib::doc::OpenOptions;
/// # use std::io::Cursor;
/// let doc = OpenOptions::new()
///     .reject_multi_pair_index(false)
///     .max_objstm_objects(4000)
///     .open(Cursor::new(Vec::<u8>::new()));
/// ```
pub struct OpenOptions {
    reject_multi_pair_index: bool,
    max_objstm_objects: usize,
    on_error: Option<Box<dyn Fn(&str)>>
}

impl Default for OpenOptions {
    fn default() -> Self {
        OpenOptions { reject_multi_pair_index: true, max_objstm_objects: 1000, on_error: None }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default `true`, matching the most widely deployed reference behaviour: a cross-reference
    /// stream's `/Index` naming more than one subsection pair is rejected rather than looped
    /// over, even though ISO 32000 permits it.
    pub fn reject_multi_pair_index(mut self, value: bool) -> Self {
        self.reject_multi_pair_index = value;
        self
    }

    pub fn max_objstm_objects(mut self, value: usize) -> Self {
        self.max_objstm_objects = value;
        self
    }

    pub fn on_error(mut self, callback: Box<dyn Fn(&str)>) -> Self {
        self.on_error = Some(callback);
        self
    }

    fn report(&self, msg: &str) {
        match &self.on_error {
            Some(cb) => cb(msg),
            None => log::error!("{msg}")
        }
    }

    pub fn open<T: BufRead + Seek>(&self, source: T) -> Result<Document<T>, Error> {
        self.open_inner(source).map_err(|err| {
            self.report(&err.to_string());
            err
        })
    }

    fn open_inner<T: BufRead + Seek>(&self, source: T) -> Result<Document<T>, Error> {
        let parser = FileParser::new(source);
        let header = parser.find_header()?;
        let entry = parser.entrypoint()?;

        let mut visited = vec![entry];
        let mut iter = BaseReader::read_xref_chain(&parser, entry, self.reject_multi_pair_index);
        let (_, first) = iter.next().ok_or_else(|| Error::parse("could not read entrypoint xref section"))??;
        let trailer_dict = first.dict.clone();

        let mut index = ObjectIndex::new();
        let mut seen = BTreeSet::new();
        let mut parents = BTreeSet::new();
        ingest(&mut index, &mut seen, &mut parents, &first);
        for item in iter {
            let (offset, xref) = item?;
            if visited.contains(&offset) {
                log::warn!("breaking xref chain detected at {offset}");
                break;
            }
            visited.push(offset);
            ingest(&mut index, &mut seen, &mut parents, &xref);
        }

        for parent in parents {
            expand_object_stream(&parser, &mut index, parent, self.max_objstm_objects)?;
        }

        let trailer = Trailer::from_dict(trailer_dict, &parser, &index)?;

        Ok(Document {
            parser,
            index: RefCell::new(index),
            trailer,
            version: header.version,
            filename: None
        })
    }
}

fn ingest(index: &mut ObjectIndex, seen: &mut BTreeSet<ObjNum>, parents: &mut BTreeSet<ObjNum>, xref: &XRef) {
    for (&num, rec) in &xref.map {
        if !seen.insert(num) {
            continue;
        }
        match *rec {
            Record::Used { gen, offset } => index.insert_placeholder(num, gen, Location::Offset(offset)),
            Record::Compr { num_within, index: idx } => {
                index.insert_placeholder(num, 0, Location::Compressed { parent: num_within, index: idx as u32 });
                parents.insert(num_within);
            },
            Record::Free { .. } => ()
        }
    }
}

/// Resolves `parent`'s placeholder, decodes its payload, and parses every object its `/N`-pair
/// header names, back-patching each one's own placeholder (tolerating names the xref never
/// declared a placeholder for, per §4.5).
fn expand_object_stream<T: BufRead + Seek>(parser: &FileParser<T>, index: &mut ObjectIndex, parent: ObjNum, max_objstm_objects: usize) -> Result<(), Error> {
    let rec = index.find(parent)
        .ok_or(Error::Parse(ErrorKind::DanglingObjectStream, "object stream parent not found in xref"))?;
    let Location::Offset(offset) = rec.location else {
        return Err(Error::Parse(ErrorKind::DanglingObjectStream, "object stream parent is itself compressed"));
    };
    let (oref, obj) = parser.read_obj_at(offset)?;
    if oref.num != parent {
        return Err(Error::parse("object number mismatch at xref-indicated offset"));
    }
    let stream = obj.into_stream()
        .ok_or(Error::Parse(ErrorKind::DanglingObjectStream, "object stream parent is not a stream"))?;
    if stream.dict.lookup(b"Type") != &Object::new_name(b"ObjStm") {
        return Err(Error::Parse(ErrorKind::DanglingObjectStream, "object stream parent /Type is not /ObjStm"));
    }
    let n: usize = stream.dict.lookup(b"N").num_value()
        .ok_or(Error::Parse(ErrorKind::DanglingObjectStream, "object stream missing /N"))?;
    if n > max_objstm_objects {
        return Err(Error::Parse(ErrorKind::TooManyObjects, "object stream /N exceeds configured limit"));
    }
    let first: u64 = stream.dict.lookup(b"First").num_value()
        .ok_or(Error::Parse(ErrorKind::DanglingObjectStream, "object stream missing /First"))?;

    let locator = IndexLocator(index);
    let mut data = read_stream_data(parser, &stream, &locator)?;
    let mut header = vec![0u8; first as usize];
    data.read_exact(&mut header)
        .map_err(|_| Error::Parse(ErrorKind::DanglingObjectStream, "object stream header shorter than /First"))?;
    let mut op = crate::parser::ObjParser::new(std::io::Cursor::new(header));
    let mut entries = Vec::with_capacity(n);
    for _ in 0..n {
        let num = read_objstm_int(&mut op)?;
        let rel_offset = read_objstm_int(&mut op)?;
        entries.push((num, rel_offset));
    }
    let mut source = Vec::new();
    data.read_to_end(&mut source)?;
    drop(data);

    for (i, &(num, rel_offset)) in entries.iter().enumerate() {
        let cursor = std::io::Cursor::new(&source[rel_offset as usize..]);
        let mut obj_parser = crate::parser::ObjParser::new(cursor);
        let value = obj_parser.read_obj()?;
        let expects_this_slot = matches!(
            index.find(num).map(|r| r.location),
            Some(Location::Compressed { parent: p, index: idx }) if p == parent && idx as usize == i
        );
        if expects_this_slot {
            index.set_value(num, value);
        }
    }
    Ok(())
}

/// An opened PDF: the resolved object graph behind a `/Root`-rooted trailer, backed by a
/// `BufRead + Seek` source held for the document's lifetime.
pub struct Document<T: BufRead + Seek> {
    parser: FileParser<T>,
    index: RefCell<ObjectIndex>,
    trailer: Trailer,
    version: (u8, u8),
    filename: Option<String>
}

impl<T: BufRead + Seek> Document<T> {
    pub fn open(source: T) -> Result<Self, Error> {
        OpenOptions::default().open(source)
    }

    pub fn num_objects(&self) -> usize {
        self.index.borrow().len()
    }

    pub fn get_object_by_index(&self, i: usize) -> Option<Result<Object, Error>> {
        let num = self.index.borrow().get_by_index(i)?.num;
        self.resolve_num(num)
    }

    pub fn find_object_by_number(&self, num: ObjNum) -> Option<Result<Object, Error>> {
        self.resolve_num(num)
    }

    fn resolve_num(&self, num: ObjNum) -> Option<Result<Object, Error>> {
        let location = {
            let index = self.index.borrow();
            let rec = index.find(num)?;
            if let Some(value) = &rec.value {
                return Some(Ok(value.clone()));
            }
            rec.location
        };
        match location {
            Location::Offset(offset) => {
                let result = self.parser.read_obj_at(offset).and_then(|(found, obj)| {
                    if found.num != num {
                        return Err(Error::parse("object number mismatch at xref-indicated offset"));
                    }
                    Ok(obj)
                });
                if let Ok(obj) = &result {
                    self.index.borrow_mut().set_value(num, obj.clone());
                }
                Some(result)
            },
            // Never back-patched by its parent's own expansion (over-declared or absent entry):
            // tolerated as a missing value rather than an error.
            Location::Compressed { .. } => Some(Ok(Object::Null))
        }
    }

    pub fn trailer(&self) -> &Dict {
        &self.trailer.dict
    }

    pub fn catalog(&self) -> &Object {
        &self.trailer.root
    }

    pub fn info(&self) -> Option<&Object> {
        self.trailer.info.as_ref()
    }

    pub fn encrypt(&self) -> Option<&Object> {
        self.trailer.encrypt.as_ref()
    }

    pub fn id(&self) -> Option<&Object> {
        self.trailer.id.as_ref()
    }

    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Resolves a stream's payload the same way an indirect reference inside it would be: one
    /// level of indirection against this document's object table.
    pub fn read_stream_data(&self, stream: &Stream) -> Result<Box<dyn BufRead + '_>, Error> {
        let locator = self.index.borrow();
        read_stream_data(&self.parser, stream, &IndexLocator(&locator))
    }

    /// Drops the source, closing it if it owns a descriptor (e.g. a `File`). Takes `self` by
    /// value, so a second close is a compile error rather than a runtime double-close.
    pub fn close(self) {
        log::debug!("closing document ({} objects)", self.num_objects());
    }
}

impl Document<std::io::BufReader<std::fs::File>> {
    pub fn open_file(path: impl AsRef<std::path::Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let mut doc = OpenOptions::default().open(std::io::BufReader::new(file))?;
        doc.filename = Some(path.display().to_string());
        Ok(doc)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn open(src: &str) -> Document<Cursor<Vec<u8>>> {
        Document::open(Cursor::new(src.as_bytes().to_vec())).unwrap()
    }

    fn classic(trailer_extra: &str) -> String {
        let header = "%PDF-1.4\n";
        let obj1 = "1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n";
        let obj2 = "2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n";
        let off1 = header.len();
        let off2 = off1 + obj1.len();
        let body = format!("{header}{obj1}{obj2}");
        let xref_off = body.len();
        let xref = format!(
            "xref\n0 3\n0000000000 65535 f \n{:010} 00000 n \n{:010} 00000 n \ntrailer\n<< /Size 3 /Root 1 0 R {trailer_extra}>>\nstartxref\n{}\n%%EOF",
            off1, off2, xref_off
        );
        body + &xref
    }

    #[test]
    fn test_open_classic() {
        let doc = open(&classic(""));
        assert_eq!(doc.version(), (1, 4));
        assert_eq!(doc.num_objects(), 2);
        assert_eq!(doc.catalog().as_dict().unwrap().lookup(b"Type"), &Object::new_name(b"Catalog"));
    }

    #[test]
    fn test_find_object_by_number() {
        let doc = open(&classic(""));
        let pages = doc.find_object_by_number(2).unwrap().unwrap();
        assert_eq!(pages.as_dict().unwrap().lookup(b"Type"), &Object::new_name(b"Pages"));
        assert!(doc.find_object_by_number(99).is_none());
    }

    #[test]
    fn test_get_object_by_index() {
        let doc = open(&classic(""));
        let mut types: Vec<_> = (0..doc.num_objects())
            .map(|i| doc.get_object_by_index(i).unwrap().unwrap().as_dict().unwrap().lookup(b"Type").clone())
            .collect();
        types.sort_by_key(|o| format!("{o}"));
        assert_eq!(types, vec![Object::new_name(b"Catalog"), Object::new_name(b"Pages")]);
    }

    #[test]
    fn test_missing_catalog_is_fatal() {
        let header = "%PDF-1.4\n";
        let xref = format!(
            "xref\n0 1\n0000000000 65535 f \ntrailer\n<< /Size 1 >>\nstartxref\n{}\n%%EOF",
            header.len()
        );
        let src = header.to_string() + &xref;
        let err = Document::open(Cursor::new(src.into_bytes())).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::MissingCatalog));
    }

    #[test]
    fn test_malformed_xref_entry_width() {
        let header = "%PDF-1.4\n";
        let xref = format!(
            "xref\n0 1\n000000000 65535 f\ntrailer\n<< /Size 1 /Root 1 0 R >>\nstartxref\n{}\n%%EOF",
            header.len()
        );
        let src = header.to_string() + &xref;
        let err = Document::open(Cursor::new(src.into_bytes())).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::MalformedXref));
    }

    #[test]
    fn test_chained_update_newest_wins() {
        let header = "%PDF-1.4\n";
        let obj1a = "1 0 obj\n<< /Type /Catalog /Pages 2 0 R /Count 1 >>\nendobj\n";
        let obj2 = "2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n";
        let off1a = header.len();
        let off2 = off1a + obj1a.len();
        let base = format!("{header}{obj1a}{obj2}");
        let xref1_off = base.len();
        let xref1 = format!(
            "xref\n0 3\n0000000000 65535 f \n{:010} 00000 n \n{:010} 00000 n \ntrailer\n<< /Size 3 /Root 1 0 R >>\nstartxref\n{}\n%%EOF",
            off1a, off2, xref1_off
        );
        let rev1 = base + &xref1;

        let obj1b = "1 0 obj\n<< /Type /Catalog /Pages 2 0 R /Count 2 >>\nendobj\n";
        let off1b = rev1.len();
        let rev2_body = rev1.clone() + obj1b;
        let xref2_off = rev2_body.len();
        let xref2 = format!(
            "xref\n1 1\n{:010} 00000 n \ntrailer\n<< /Size 3 /Root 1 0 R /Prev {} >>\nstartxref\n{}\n%%EOF",
            off1b, xref1_off, xref2_off
        );
        let src = rev2_body + &xref2;

        let doc = Document::open(Cursor::new(src.into_bytes())).unwrap();
        assert_eq!(doc.num_objects(), 2);
        let catalog = doc.find_object_by_number(1).unwrap().unwrap();
        assert_eq!(catalog.as_dict().unwrap().lookup(b"Count"), &Object::Number(Number::Int(2)));
    }

    #[test]
    fn test_compressed_object_expansion() {
        let mut src = b"%PDF-1.4\n".to_vec();

        let header_tokens = b"1 0 2 10";
        let content: &[u8] = b"<< /X 1 >><< /Y 2 >>";
        let mut stream_data = Vec::new();
        stream_data.extend_from_slice(header_tokens);
        stream_data.push(b'\n');
        stream_data.extend_from_slice(content);
        let first = header_tokens.len() + 1;
        let length = stream_data.len();

        let off3 = src.len() as u64;
        src.extend_from_slice(format!("3 0 obj\n<< /Type /ObjStm /N 2 /First {first} /Length {length} >>\nstream\n").as_bytes());
        src.extend_from_slice(&stream_data);
        src.extend_from_slice(b"\nendstream\nendobj\n");

        let off4 = src.len() as u64;
        src.extend_from_slice(b"4 0 obj\n<< /Type /Catalog >>\nendobj\n");

        let off5 = src.len() as u64;
        let mut rows = Vec::new();
        let mut push_row = |tpe: u8, f2: u32, f3: u8| {
            rows.push(tpe);
            rows.extend_from_slice(&f2.to_be_bytes());
            rows.push(f3);
        };
        push_row(0, 0, 0);
        push_row(2, 3, 0);
        push_row(2, 3, 1);
        push_row(1, off3 as u32, 0);
        push_row(1, off4 as u32, 0);
        push_row(1, off5 as u32, 0);

        src.extend_from_slice(format!(
            "5 0 obj\n<< /Type /XRef /Size 6 /W [1 4 1] /Root 4 0 R /Length {} >>\nstream\n",
            rows.len()
        ).as_bytes());
        src.extend_from_slice(&rows);
        src.extend_from_slice(b"\nendstream\nendobj\n");
        src.extend_from_slice(format!("startxref\n{off5}\n%%EOF").as_bytes());

        let doc = Document::open(Cursor::new(src)).unwrap();
        assert_eq!(doc.num_objects(), 5);
        let x = doc.find_object_by_number(1).unwrap().unwrap();
        assert_eq!(x.as_dict().unwrap().lookup(b"X"), &Object::Number(Number::Int(1)));
        let y = doc.find_object_by_number(2).unwrap().unwrap();
        assert_eq!(y.as_dict().unwrap().lookup(b"Y"), &Object::Number(Number::Int(2)));
    }

    #[test]
    fn test_xref_stream_w_without_generation_column() {
        let mut src = b"%PDF-1.4\n".to_vec();
        let off1 = src.len() as u64;
        src.extend_from_slice(b"1 0 obj\n<< /Type /Catalog >>\nendobj\n");
        let off2 = src.len() as u64;

        let mut rows = Vec::new();
        rows.extend_from_slice(&[0, 0, 0, 0, 0]);
        rows.push(1);
        rows.extend_from_slice(&(off1 as u32).to_be_bytes());
        rows.push(1);
        rows.extend_from_slice(&(off2 as u32).to_be_bytes());

        src.extend_from_slice(format!(
            "2 0 obj\n<< /Type /XRef /Size 3 /W [1 4 0] /Root 1 0 R /Length {} >>\nstream\n",
            rows.len()
        ).as_bytes());
        src.extend_from_slice(&rows);
        src.extend_from_slice(b"\nendstream\nendobj\n");
        src.extend_from_slice(format!("startxref\n{off2}\n%%EOF").as_bytes());

        let doc = Document::open(Cursor::new(src)).unwrap();
        assert_eq!(doc.num_objects(), 2);
        let catalog = doc.find_object_by_number(1).unwrap().unwrap();
        assert_eq!(catalog.as_dict().unwrap().lookup(b"Type"), &Object::new_name(b"Catalog"));
    }

    #[test]
    fn test_xref_stream_w2_too_wide_is_rejected() {
        let header = "%PDF-1.4\n";
        let obj = "<< /Type /XRef /Size 1 /W [1 4 10] /Root 1 0 R /Length 0 >>\nstream\n\nendstream\nendobj\n";
        let off = header.len();
        let src = format!("{header}1 0 obj\n{obj}startxref\n{off}\n%%EOF");
        let err = Document::open(Cursor::new(src.into_bytes())).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::BadXrefStreamParams));
    }
}
