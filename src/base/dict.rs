use std::fmt::{Display, Formatter};

use super::name::Name;
use super::object::Object;

/// A PDF dictionary, preserving insertion order (duplicate keys are legal in malformed input;
/// the first occurrence wins on lookup, matching the behaviour of most PDF consumers).
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Dict(pub Vec<(Name, Object)>);

impl Dict {
    /// Looks up `key`, returning [`Object::Null`] if absent (never `None`: a missing key and an
    /// explicit `/Key null` are indistinguishable to callers, as in the PDF specification).
    pub fn lookup(&self, key: &[u8]) -> &Object {
        self.0.iter()
            .find(|(name, _obj)| name == &key)
            .map(|(_name, obj)| obj)
            .unwrap_or(&Object::Null)
    }

    pub fn into_inner(self) -> Vec<(Name, Object)> {
        self.0
    }
}

impl From<Vec<(Name, Object)>> for Dict {
    fn from(v: Vec<(Name, Object)>) -> Dict {
        Dict(v)
    }
}

impl IntoIterator for Dict {
    type Item = (Name, Object);
    type IntoIter = std::vec::IntoIter<(Name, Object)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl Display for Dict {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("<< ")?;
        for (key, val) in &self.0 {
            write!(f, "{key} {val} ")?;
        }
        f.write_str(">>")
    }
}
