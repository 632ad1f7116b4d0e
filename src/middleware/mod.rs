pub mod logging;

pub use logging::{current_request_id, LoggingLayer, REQUEST_ID_HEADER};
