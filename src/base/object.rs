use std::fmt::{Display, Formatter};

use super::name::Name;
use super::dict::Dict;
use super::number::Number;
use super::string::format_string;
use super::stream::Stream;
use super::types::*;

/// The base type of all PDF objects.
#[derive(Debug, PartialEq, Clone)]
pub enum Object {
    /// Bool (`true` or `false`)
    Bool(bool),
    /// Number (integer or real)
    Number(Number),
    /// String. No distinction is retained between literal and hex-string source syntax.
    String(Vec<u8>),
    /// Name (like `/Length`), stored without the leading slash.
    Name(Name),
    /// Array (`[1 2 3]`)
    Array(Vec<Object>),
    /// Dictionary (`<< /Root 1 0 R >>`)
    Dict(Dict),
    /// Stream (`<< ... >> stream ... endstream`)
    Stream(Stream),
    /// Indirect object reference (`3 0 R`)
    Ref(ObjRef),
    /// Null object (`null`), also used as the fall-back for a missing dictionary entry.
    Null
}

impl Object {
    pub fn new_string(s: &[u8]) -> Self {
        Self::String(s.to_owned())
    }

    /// Don't pass the initial `/`, unless the name is actually supposed to start with `#2F`.
    pub fn new_name(s: &[u8]) -> Self {
        Self::Name(Name::from(s))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            &Self::Bool(val) => Some(val),
            _ => None
        }
    }

    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Self::String(val) => Some(val),
            _ => None
        }
    }

    pub fn as_name(&self) -> Option<&Name> {
        match self {
            Self::Name(val) => Some(val),
            _ => None
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Self>> {
        match self {
            Self::Array(val) => Some(val),
            _ => None
        }
    }

    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Self::Dict(val) => Some(val),
            Self::Stream(stm) => Some(&stm.dict),
            _ => None
        }
    }

    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Self::Stream(val) => Some(val),
            _ => None
        }
    }

    pub fn as_objref(&self) -> Option<&ObjRef> {
        match self {
            Self::Ref(val) => Some(val),
            _ => None
        }
    }

    pub fn into_array(self) -> Option<Vec<Self>> {
        match self {
            Self::Array(val) => Some(val),
            _ => None
        }
    }

    pub fn into_dict(self) -> Option<Dict> {
        match self {
            Self::Dict(val) => Some(val),
            _ => None
        }
    }

    pub fn into_stream(self) -> Option<Stream> {
        match self {
            Self::Stream(val) => Some(val),
            _ => None
        }
    }

    /// For `Self::Number(Number::Int(n))`, extracts `n` cast into `T`. `None` both for other
    /// object types and for a value that doesn't fit into `T`.
    pub fn num_value<T: TryFrom<i64>>(&self) -> Option<T> {
        match self {
            &Self::Number(Number::Int(num)) => num.try_into().ok(),
            _ => None
        }
    }
}

impl Display for Object {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(true) => f.write_str("true"),
            Self::Bool(false) => f.write_str("false"),
            Self::Number(Number::Int(x)) => write!(f, "{x}"),
            Self::Number(Number::Real(x)) => write!(f, "{x}"),
            Self::String(s) => format_string(f, s),
            Self::Name(name) => write!(f, "{}", name),
            Self::Array(arr) => {
                f.write_str("[ ")?;
                for obj in arr {
                    write!(f, "{obj} ")?;
                }
                f.write_str("]")
            },
            Self::Dict(dict) => write!(f, "{}", dict),
            Self::Stream(stm) => write!(f, "{} [stream]", stm.dict),
            Self::Ref(ObjRef{num, gen}) => write!(f, "{num} {gen} R"),
            Self::Null => f.write_str("null")
        }
    }
}

/// An indirect object reference: object number plus generation.
#[derive(PartialEq, Eq, Debug, Clone, Copy, PartialOrd, Ord, Hash)]
pub struct ObjRef {
    pub num: ObjNum,
    pub gen: ObjGen
}

impl Display for ObjRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.num, self.gen)
    }
}
