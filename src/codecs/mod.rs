mod flate;
pub(crate) mod asciihex;
pub(crate) mod ascii85;

use std::io::{BufRead, BufReader};

use crate::base::*;

/// A decoding filter named in a stream's `/Filter` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Flate,
    AsciiHex,
    Ascii85
}

impl Filter {
    fn from_name(name: &Name) -> Result<Filter, Error> {
        match name.0.as_slice() {
            b"FlateDecode" | b"Fl" => Ok(Filter::Flate),
            b"ASCIIHexDecode" | b"AHx" => Ok(Filter::AsciiHex),
            b"ASCII85Decode" | b"A85" => Ok(Filter::Ascii85),
            _ => Err(Error::parse("unsupported stream filter"))
        }
    }
}

/// Normalises a `/Filter` entry (absent, a single name, or an array of names) into an ordered
/// filter chain. Does not follow indirect references: by the time this is called the caller is
/// expected to have already resolved them (xref stream dictionaries, in particular, may not
/// contain indirect references at all).
pub fn to_filters(filter: &Object) -> Result<Vec<Filter>, Error> {
    match filter {
        Object::Null => Ok(Vec::new()),
        Object::Name(n) => Ok(vec![Filter::from_name(n)?]),
        Object::Array(arr) => arr.iter()
            .map(|o| match o {
                Object::Name(n) => Filter::from_name(n),
                _ => Err(Error::parse("malformed /Filter entry"))
            })
            .collect(),
        _ => Err(Error::parse("malformed /Filter"))
    }
}

/// Normalises a `/DecodeParms` entry into one optional dict per filter. `count` is the number
/// of filters found by [`to_filters`], used to pad/validate the parallel array form.
pub fn to_params(parms: &Object, count: usize) -> Result<Vec<Option<Dict>>, Error> {
    match parms {
        Object::Null => Ok(vec![None; count]),
        Object::Dict(d) if count <= 1 => Ok(vec![Some(d.clone())]),
        Object::Array(arr) => {
            if arr.len() != count {
                return Err(Error::parse("/DecodeParms length does not match /Filter"));
            }
            Ok(arr.iter().map(|o| o.as_dict().cloned()).collect())
        },
        _ => Err(Error::parse("malformed /DecodeParms"))
    }
}

/// Applies `filters` in order, each optionally configured by the matching entry in `params`.
pub fn decode<'a, R: BufRead + 'a>(input: R, filters: &[Filter], params: &[Option<Dict>]) -> Box<dyn BufRead + 'a> {
    let mut cur: Box<dyn BufRead + 'a> = Box::new(input);
    for (i, filter) in filters.iter().enumerate() {
        let parm = params.get(i).and_then(|p| p.as_ref());
        cur = match filter {
            Filter::Flate => Box::new(BufReader::new(flate::decode(cur))),
            Filter::AsciiHex => Box::new(BufReader::new(asciihex::decode(cur))),
            Filter::Ascii85 => {
                let _ = parm; // ASCII85Decode takes no parameters
                Box::new(ascii85::decode(cur))
            }
        };
    }
    cur
}
