pub mod types {
    /// Object number: type alias for `u64`.
    pub type ObjNum = u64;
    /// Object generation: type alias for `u16`.
    ///
    /// PDF technically allows generation numbers up to 65535 via classical xref tables, and
    /// arbitrarily large ones via xref streams. The latter is not seen in practice; encountering
    /// one here is a runtime error rather than a wider integer type throughout the crate.
    pub type ObjGen = u16;
    /// Index within an object stream: type alias for `u16`.
    pub type ObjIndex = ObjGen;
    /// Offset within a file (relative to the `%PDF` marker): type alias for `u64`.
    pub type Offset = u64;
}

mod name;
pub use name::*;

mod number;
pub use number::*;

mod dict;
pub use dict::*;

mod object;
pub use object::*;

mod stream;
pub use stream::*;

mod string;

mod xref;
pub use xref::*;

mod locator;
pub use locator::*;

mod error;
pub use error::*;

mod header;
pub use header::*;
