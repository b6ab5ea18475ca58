pub mod api_token;
pub mod request_id;

pub use api_token::require_api_token;
pub use request_id::{make_span_with_request_id, request_id_middleware, RequestId};
