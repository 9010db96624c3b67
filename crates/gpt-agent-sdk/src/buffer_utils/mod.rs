mod buffering;
mod sse_parser;

pub use buffering::CircularLineBuffer;
pub use sse_parser::parse_sse_stream;
