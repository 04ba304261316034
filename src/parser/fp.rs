use std::cell::RefMut;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::io::{BufRead, Read, Seek, SeekFrom};
use std::ops::ControlFlow;

use crate::base::*;
use crate::utils;

use super::bp::ByteProvider;
use super::op::ObjParser;

/// What [`FileParser::read_at`] found at a given offset: either the start of an xref section
/// (classical table or stream) or an indirect object definition.
pub(crate) enum Structural {
    XRef(XRef),
    Obj(ObjRef, Object)
}

/// Reads structure (header, xref sections, indirect objects) out of a seekable byte source.
///
/// Every read here is eager: an xref section is fully materialised into a [`BTreeMap`] as soon
/// as it's read, rather than handed back as a lazy iterator. This is what lets
/// [`crate::doc::Document::open`] surface every structural error up front instead of only when
/// some particular object is later touched.
pub struct FileParser<T: BufRead + Seek> {
    op: std::cell::RefCell<ObjParser<T>>
}

impl<T: BufRead + Seek> FileParser<T> {
    pub fn new(reader: T) -> Self {
        FileParser { op: std::cell::RefCell::new(ObjParser::new(reader)) }
    }

    fn seek_to(&self, pos: u64) -> Result<(), Error> {
        self.op.borrow_mut().tkn.seek_to(pos)?;
        Ok(())
    }

    /// Finds the `%PDF-m.n` header by scanning forward from the start in doubling-sized windows
    /// (conforming files keep it within the first kilobyte or two, but some tools prepend junk).
    pub fn find_header(&self) -> Result<Header, Error> {
        let mut window = 1024u64;
        let found = loop {
            self.seek_to(0)?;
            let mut buf = vec![0u8; window as usize];
            let n = {
                let mut reader = self.op.borrow_mut();
                read_at_most(reader.tkn.bytes(), &mut buf)?
            };
            buf.truncate(n);
            match buf.windows(5).enumerate().try_fold((), |_, (i, w)| {
                if w == b"%PDF-" { ControlFlow::Break(i) } else { ControlFlow::Continue(()) }
            }) {
                ControlFlow::Break(i) => break Some(i),
                ControlFlow::Continue(()) => {
                    if (n as u64) < window || window >= 1 << 20 {
                        break None;
                    }
                    window *= 2;
                }
            }
        };
        let Some(start) = found else {
            return Err(Error::Parse(ErrorKind::BadHeader, "PDF header not found"));
        };
        self.seek_to(start as u64)?;
        let line = {
            let mut reader = self.op.borrow_mut();
            reader.tkn.bytes().read_line_excl()?
        };
        let version_str = line.strip_prefix(b"%PDF-")
            .ok_or(Error::Parse(ErrorKind::BadHeader, "malformed PDF header"))?;
        let mut parts = version_str.splitn(2, |c| *c == b'.');
        let major: u8 = parts.next().and_then(utils::parse_num)
            .ok_or(Error::Parse(ErrorKind::BadHeader, "malformed PDF header"))?;
        let minor: u8 = parts.next().and_then(utils::parse_num)
            .ok_or(Error::Parse(ErrorKind::BadHeader, "malformed PDF header"))?;
        log::info!("found PDF-{major}.{minor} header at offset {start}");
        Ok(Header { start: start as Offset, version: (major, minor) })
    }

    /// Finds the last `startxref` keyword near the end of file and returns the offset it names.
    pub fn entrypoint(&self) -> Result<Offset, Error> {
        let (len, window, buf) = {
            let mut reader = self.op.borrow_mut();
            let bytes = reader.tkn.bytes();
            let len = bytes.seek(SeekFrom::End(0))?;
            let window = len.min(1024);
            bytes.seek(SeekFrom::Start(len - window))?;
            let mut buf = vec![0u8; window as usize];
            bytes.read_exact(&mut buf)?;
            (len, window, buf)
        };
        let pos = buf.windows(9).rposition(|w| w == b"startxref")
            .ok_or(Error::Parse(ErrorKind::MalformedTrailer, "startxref not found"))?;
        self.seek_to(len - window + pos as u64 + 9)?;
        let tok = self.op.borrow_mut().tkn.next()?;
        utils::parse_num(&tok)
            .ok_or(Error::Parse(ErrorKind::MalformedTrailer, "malformed startxref"))
    }

    /// Reads whatever structure sits at `start`: a classical table, an xref stream, or an
    /// indirect object definition.
    pub(crate) fn read_at(&self, start: Offset, reject_multi_pair_index: bool) -> Result<Structural, Error> {
        self.seek_to(start)?;
        let tok = self.op.borrow_mut().tkn.next()?;
        if tok == b"xref" {
            self.read_xref_table().map(Structural::XRef)
        } else {
            let num: ObjNum = utils::parse_num(&tok)
                .ok_or(Error::parse("expected an object number"))?;
            let gen: ObjGen = utils::parse_num(&self.op.borrow_mut().tkn.next()?)
                .ok_or(Error::parse("expected a generation number"))?;
            let kw = self.op.borrow_mut().tkn.next()?;
            if kw != b"obj" {
                return Err(Error::parse("expected 'obj' keyword"));
            }
            let obj = self.op.borrow_mut().read_obj()?;
            if obj.as_dict().is_some() {
                let kw = self.op.borrow_mut().tkn.next()?;
                if kw == b"stream" {
                    let data_start = self.after_stream_keyword()?;
                    let dict = obj.into_dict().unwrap();
                    if dict.lookup(b"Type") == &Object::new_name(b"XRef") {
                        return self.read_xref_stream(dict, data_start, reject_multi_pair_index)
                            .map(Structural::XRef);
                    }
                    return Ok(Structural::Obj(ObjRef{num, gen},
                        Object::Stream(Stream{dict, data: Data::Ref(data_start)})));
                } else {
                    self.op.borrow_mut().tkn.unread(kw);
                }
            }
            Ok(Structural::Obj(ObjRef{num, gen}, obj))
        }
    }

    /// Past the `stream` keyword: one EOL (CRLF or LF, never a bare CR), then the raw data start.
    fn after_stream_keyword(&self) -> Result<Offset, Error> {
        let mut reader = self.op.borrow_mut();
        let bytes = reader.tkn.bytes();
        match bytes.next_or_eof()? {
            b'\r' => { bytes.next_if(|c| c == b'\n'); },
            b'\n' => (),
            _ => return Err(Error::parse("missing EOL after 'stream' keyword"))
        }
        Ok(bytes.stream_position()?)
    }

    /// Reads an object definition at `start`, expected to be a plain (non-xref) indirect object.
    pub(crate) fn read_obj_at(&self, start: Offset) -> Result<(ObjRef, Object), Error> {
        match self.read_at(start, true)? {
            Structural::Obj(oref, obj) => Ok((oref, obj)),
            Structural::XRef(_) => Err(Error::parse("expected an object, found an xref section"))
        }
    }

    /// Returns a reader positioned at `start`, borrowing the underlying byte source.
    pub(crate) fn read_raw(&self, start: Offset) -> Result<StreamReader<'_, T>, Error> {
        self.seek_to(start)?;
        let reader = self.op.borrow_mut();
        Ok(StreamReader(RefMut::map(reader, |op| op.tkn.bytes())))
    }

    fn read_xref_table(&self) -> Result<XRef, Error> {
        let mut map = BTreeMap::new();
        loop {
            let tok = self.op.borrow_mut().tkn.next()?;
            if tok == b"trailer" { break; }
            let start: ObjNum = utils::parse_num(&tok)
                .ok_or(Error::Parse(ErrorKind::MalformedXref, "malformed xref subsection header"))?;
            let count: ObjNum = utils::parse_num(&self.op.borrow_mut().tkn.next()?)
                .ok_or(Error::Parse(ErrorKind::MalformedXref, "malformed xref subsection header"))?;
            {
                let mut reader = self.op.borrow_mut();
                reader.tkn.bytes().skip_past_eol()?;
            }
            for i in 0..count {
                let line = {
                    let mut reader = self.op.borrow_mut();
                    reader.tkn.bytes().read_line_incl()?
                };
                if line.len() < 20 || line[10] != b' ' || line[16] != b' ' {
                    return Err(Error::Parse(ErrorKind::MalformedXref, "malformed xref entry (wrong width)"));
                }
                let offset: Offset = utils::parse_num(&line[0..10])
                    .ok_or(Error::Parse(ErrorKind::MalformedXref, "malformed xref entry (offset)"))?;
                let gen: ObjGen = utils::parse_num(&line[11..16])
                    .ok_or(Error::Parse(ErrorKind::MalformedXref, "malformed xref entry (generation)"))?;
                let record = match line[17] {
                    b'n' => Record::Used{gen, offset},
                    b'f' => Record::Free{gen, next: offset},
                    _ => return Err(Error::Parse(ErrorKind::MalformedXref, "malformed xref entry (type)"))
                };
                match map.entry(start + i) {
                    Entry::Vacant(e) => { e.insert(record); },
                    Entry::Occupied(_) => log::warn!("duplicate object number {} in xref table", start + i)
                }
            }
        }
        let dict = self.op.borrow_mut().read_obj()?.into_dict()
            .ok_or(Error::Parse(ErrorKind::MalformedTrailer, "trailer is not a dictionary"))?;
        let size = dict.lookup(b"Size").num_value()
            .ok_or(Error::Parse(ErrorKind::MalformedTrailer, "trailer /Size missing or invalid"))?;
        Ok(XRef{tpe: XRefType::Table, map, dict, size})
    }

    fn read_xref_stream(&self, dict: Dict, data_start: Offset, reject_multi_pair_index: bool) -> Result<XRef, Error> {
        let size: ObjNum = dict.lookup(b"Size").num_value()
            .ok_or(Error::Parse(ErrorKind::BadXrefStreamParams, "xref stream /Size missing or invalid"))?;
        let index: Vec<ObjNum> = match dict.lookup(b"Index") {
            Object::Array(arr) => arr.iter()
                .map(|o| o.num_value().ok_or(Error::Parse(ErrorKind::BadXrefStreamParams, "xref stream /Index entry invalid")))
                .collect::<Result<_, _>>()?,
            Object::Null => vec![0, size],
            _ => return Err(Error::Parse(ErrorKind::BadXrefStreamParams, "xref stream /Index invalid"))
        };
        if index.len() % 2 != 0 {
            return Err(Error::Parse(ErrorKind::BadXrefStreamParams, "xref stream /Index has odd length"));
        }
        if index.len() > 2 && reject_multi_pair_index {
            return Err(Error::Parse(ErrorKind::UnsupportedXrefIndex, "xref stream /Index has more than one subsection pair"));
        }
        let w: Vec<usize> = match dict.lookup(b"W") {
            Object::Array(arr) if arr.len() == 3 => arr.iter()
                .map(|o| o.num_value().ok_or(Error::Parse(ErrorKind::BadXrefStreamParams, "xref stream /W entry invalid")))
                .collect::<Result<_, _>>()?,
            _ => return Err(Error::Parse(ErrorKind::BadXrefStreamParams, "xref stream /W missing or malformed"))
        };
        let (w0, w1, w2) = (w[0], w[1], w[2]);
        if w1 == 0 || w2 > 2 || w0 + w1 + w2 > 32 {
            return Err(Error::Parse(ErrorKind::BadXrefStreamParams, "xref stream /W entry out of range"));
        }
        let row_len = w0 + w1 + w2;

        let length = self.resolve_stream_length(&dict, data_start, None)?;
        let mut raw = self.read_raw(data_start)?;
        let mut encoded = vec![0u8; length as usize];
        raw.read_exact(&mut encoded)?;
        drop(raw);
        let filters = crate::codecs::to_filters(dict.lookup(b"Filter"))?;
        let params = crate::codecs::to_params(dict.lookup(b"DecodeParms"), filters.len())?;
        let mut decoded = Vec::new();
        crate::codecs::decode(std::io::Cursor::new(encoded), &filters, &params)
            .read_to_end(&mut decoded)?;

        let mut map = BTreeMap::new();
        let mut cursor = 0usize;
        for pair in index.chunks_exact(2) {
            let (start, count) = (pair[0], pair[1]);
            for i in 0..count {
                if cursor + row_len > decoded.len() {
                    return Err(Error::Parse(ErrorKind::MalformedXref, "xref stream data too short"));
                }
                let row = &decoded[cursor..cursor + row_len];
                cursor += row_len;
                let tpe = if w0 == 0 { 1 } else { be_int(&row[0..w0]) };
                let f2 = be_int(&row[w0..w0 + w1]);
                let f3 = be_int(&row[w0 + w1..w0 + w1 + w2]);
                let record = match tpe {
                    0 => Record::Free{gen: f3 as ObjGen, next: f2},
                    1 => Record::Used{offset: f2, gen: f3 as ObjGen},
                    2 => Record::Compr{num_within: f2, index: f3 as ObjIndex},
                    _ => return Err(Error::Parse(ErrorKind::MalformedXref, "unknown xref stream entry type"))
                };
                match map.entry(start + i) {
                    Entry::Vacant(e) => { e.insert(record); },
                    Entry::Occupied(_) => log::warn!("duplicate object number {} in xref stream", start + i)
                }
            }
        }
        Ok(XRef{tpe: XRefType::Table, map, dict, size})
    }

    /// Resolves `/Length`, following one indirect reference through `locator` if given and the
    /// value is a reference; otherwise scans for `endstream` (logging a warning: this is a
    /// tolerant fallback for malformed files, not the common case).
    pub(crate) fn resolve_stream_length(&self, dict: &Dict, data_start: Offset, locator: Option<&dyn Locator>) -> Result<u64, Error> {
        let len_obj = dict.lookup(b"Length");
        let len = match (len_obj, locator) {
            (Object::Ref(oref), Some(locator)) => match locator.locate(oref) {
                Some(Record::Used{offset, ..}) => self.read_obj_at(offset)?.1.num_value::<u64>(),
                _ => None
            },
            _ => len_obj.num_value::<u64>()
        };
        if let Some(len) = len {
            return Ok(len);
        }
        log::warn!("stream /Length missing or unresolvable, scanning for 'endstream'");
        let mut raw = self.read_raw(data_start)?;
        let mut buf = Vec::new();
        raw.read_to_end(&mut buf)?;
        drop(raw);
        let pos = buf.windows(9).position(|w| w == b"endstream")
            .ok_or(Error::parse("could not locate 'endstream' for a stream with missing /Length"))?;
        let mut end = pos;
        while end > 0 && matches!(buf[end - 1], b'\r' | b'\n') { end -= 1; }
        Ok(end as u64)
    }
}

fn be_int(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

fn read_at_most(r: &mut impl BufRead, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        let n = r.read(&mut buf[total..])?;
        if n == 0 { break; }
        total += n;
    }
    Ok(total)
}

/// A view into a borrowed, shared [`FileParser`] reader, positioned at a fixed offset (used to
/// hand out stream payloads without taking `T` by value).
pub(crate) struct StreamReader<'a, T: BufRead + Seek>(RefMut<'a, T>);

impl<T: BufRead + Seek> Read for StreamReader<'_, T> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf)
    }
}

impl<T: BufRead + Seek> BufRead for StreamReader<'_, T> {
    fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
        self.0.fill_buf()
    }
    fn consume(&mut self, amt: usize) {
        self.0.consume(amt)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parser(s: &str) -> FileParser<Cursor<Vec<u8>>> {
        FileParser::new(Cursor::new(s.as_bytes().to_vec()))
    }

    #[test]
    fn test_find_header() {
        let fp = parser("garbage\n%PDF-1.7\nrest");
        let hdr = fp.find_header().unwrap();
        assert_eq!(hdr.version, (1, 7));
        assert_eq!(hdr.start, 8);
    }

    #[test]
    fn test_find_header_missing() {
        let fp = parser("no header here at all");
        assert!(fp.find_header().is_err());
    }

    #[test]
    fn test_entrypoint() {
        let fp = parser("%PDF-1.4\n...\nstartxref\n1234\n%%EOF");
        assert_eq!(fp.entrypoint().unwrap(), 1234);
    }

    #[test]
    fn test_read_obj_at() {
        let fp = parser("%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\n");
        let (oref, obj) = fp.read_obj_at(9).unwrap();
        assert_eq!(oref, ObjRef{num: 1, gen: 0});
        assert_eq!(obj.as_dict().unwrap().lookup(b"Type"), &Object::new_name(b"Catalog"));
    }

    #[test]
    fn test_read_xref_table() {
        let src = "xref\n0 3\n\
0000000000 65535 f \n\
0000000009 00000 n \n\
0000000074 00000 n \n\
trailer\n<< /Size 3 /Root 1 0 R >>\n";
        let fp = parser(src);
        match fp.read_at(0, true).unwrap() {
            Structural::XRef(xref) => {
                assert_eq!(xref.size, 3);
                assert_eq!(xref.map.get(&1), Some(&Record::Used{gen: 0, offset: 9}));
                assert_eq!(xref.map.get(&0), Some(&Record::Free{gen: 65535, next: 0}));
            },
            _ => panic!("expected xref")
        }
    }
}
