pub mod chunked;
pub mod parser;
pub mod request;
pub mod response;

pub use chunked::ChunkedDecoder;
pub use request::{HeaderMap, Method, Request};
pub use response::Response;
