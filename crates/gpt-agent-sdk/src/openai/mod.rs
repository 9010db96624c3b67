pub mod responses;
pub mod transport;

pub use responses::{
    IncompleteDetails, InputTokensDetails, OutputItem, OutputTokensDetails, RawEvent,
    ResponseSnapshot, WireError, WireUsage,
};
pub use transport::{build_request_payload, OpenAITransport};
