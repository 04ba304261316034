use super::dict::Dict;
use super::types::Offset;

/// A PDF stream object: a dictionary paired with a (possibly still-encoded) byte payload.
#[derive(Debug, PartialEq, Clone)]
pub struct Stream {
    pub dict: Dict,
    pub data: Data
}

/// The data backing a [`Stream`].
#[derive(Debug, PartialEq, Clone)]
pub enum Data {
    /// Offset (from `%PDF`) of the raw, still-encoded payload within the source file.
    ///
    /// `/Length` and `/Filter` live in [`Stream::dict`] and may themselves be indirect, so
    /// resolving the payload length and decoding it is left to the reader, not recorded here.
    Ref(Offset),
    /// Payload already read into memory, e.g. a value pulled out of an object stream.
    Val(Vec<u8>)
}
