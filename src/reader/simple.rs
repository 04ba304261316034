use std::io::{BufRead, Seek};

use crate::base::*;
use crate::parser::FileParser;

use super::base::BaseReader;

/// A document's cross-reference sections, merged into one flat [`XRef`] with the newest
/// section's entries winning, walked and merged once at construction time.
pub struct SimpleReader<T: BufRead + Seek> {
    base: BaseReader<T>,
    xref: XRef
}

impl<T: BufRead + Seek> SimpleReader<T> {
    pub fn new(source: T, entry: Offset, reject_multi_pair_index: bool, max_objstm_objects: usize) -> Result<Self, Error> {
        let parser = FileParser::new(source);
        let xref = Self::build_xref(&parser, entry, reject_multi_pair_index)?;
        let base = BaseReader::with_max_objstm_objects(parser, max_objstm_objects);
        Ok(Self { base, xref })
    }

    fn build_xref(parser: &FileParser<T>, entry: Offset, reject_multi_pair_index: bool) -> Result<XRef, Error> {
        let mut visited = vec![entry];
        let mut iter = BaseReader::read_xref_chain(parser, entry, reject_multi_pair_index);
        let (_, mut xref) = iter.next().ok_or_else(|| Error::parse("could not read entrypoint xref section"))??;
        for item in iter {
            let (offset, next_xref) = item?;
            if visited.contains(&offset) {
                log::warn!("breaking xref chain detected at {offset}");
                break;
            }
            visited.push(offset);
            xref.merge_prev(next_xref);
        }
        Ok(xref)
    }

    pub fn xref(&self) -> &XRef {
        &self.xref
    }

    pub fn objects(&self) -> impl Iterator<Item = (ObjRef, Result<Object, Error>)> + '_ {
        self.xref.map.iter()
            .filter_map(move |(&num, rec)| {
                let gen = match *rec {
                    Record::Used{gen, ..} => gen,
                    Record::Compr{..} => 0,
                    Record::Free{..} => return None
                };
                let objref = ObjRef{num, gen};
                Some((objref, self.base.resolve_ref(&objref, &self.xref)))
            })
    }

    pub fn resolve_ref(&self, objref: &ObjRef) -> Result<Object, Error> {
        self.base.resolve_ref(objref, &self.xref)
    }

    pub fn resolve_obj(&self, obj: &Object) -> Result<Object, Error> {
        self.base.resolve_obj(obj, &self.xref)
    }

    pub fn resolve_deep(&self, obj: &Object) -> Result<Object, Error> {
        self.base.resolve_deep(obj, &self.xref)
    }

    pub fn read_stream_data(&self, stream: &Stream) -> Result<Box<dyn BufRead + '_>, Error> {
        self.base.read_stream_data(stream, &self.xref)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    fn open(src: &str) -> SimpleReader<Cursor<Vec<u8>>> {
        let bytes = src.as_bytes().to_vec();
        let parser = FileParser::new(Cursor::new(bytes.clone()));
        let entry = parser.entrypoint().unwrap();
        SimpleReader::new(Cursor::new(bytes), entry, true, 1000).unwrap()
    }

    fn sample() -> String {
        let obj1 = "1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n";
        let obj2 = "2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n";
        let header = "%PDF-1.4\n";
        let off1 = header.len();
        let off2 = off1 + obj1.len();
        let body = format!("{header}{obj1}{obj2}");
        let xref_off = body.len();
        let xref = format!(
            "xref\n0 3\n0000000000 65535 f \n{:010} 00000 n \n{:010} 00000 n \ntrailer\n<< /Size 3 /Root 1 0 R >>\nstartxref\n{}\n%%EOF",
            off1, off2, xref_off
        );
        body + &xref
    }

    #[test]
    fn test_resolve_ref() {
        let rdr = open(&sample());
        let root = rdr.resolve_ref(&ObjRef{num: 1, gen: 0}).unwrap();
        assert_eq!(root.as_dict().unwrap().lookup(b"Type"), &Object::new_name(b"Catalog"));
    }

    #[test]
    fn test_objects_iter() {
        let rdr = open(&sample());
        let mut found: Vec<_> = rdr.objects().map(|(oref, _)| oref.num).collect();
        found.sort();
        assert_eq!(found, vec![1, 2]);
    }

    #[test]
    fn test_stream_data() {
        let header = "%PDF-1.4\n";
        let obj1 = "1 0 obj\n<< /Length 5 >>\nstream\nhello\nendstream\nendobj\n";
        let off1 = header.len();
        let body = format!("{header}{obj1}");
        let xref_off = body.len();
        let src = body + &format!(
            "xref\n0 2\n0000000000 65535 f \n{:010} 00000 n \ntrailer\n<< /Size 2 /Root 1 0 R >>\nstartxref\n{}\n%%EOF",
            off1, xref_off
        );
        let rdr = open(&src);
        let Object::Stream(stm) = rdr.resolve_ref(&ObjRef{num: 1, gen: 0}).unwrap() else { panic!() };
        let mut data = rdr.read_stream_data(&stm).unwrap();
        let mut out = Vec::new();
        data.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello");
    }
}
