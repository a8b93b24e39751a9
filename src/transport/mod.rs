//! HTTP transport port and its reqwest adapter.

pub mod contract;
pub mod http;

pub use contract::{HttpRequest, HttpResponse, HttpTransport, Method};
pub use http::ReqwestTransport;
