pub(crate) mod bp;
pub(crate) mod cc;
pub(crate) mod tk;
mod op;
mod fp;

pub use fp::FileParser;
pub(crate) use fp::Structural;
pub(crate) use tk::Tokenizer;
pub(crate) use op::ObjParser;
