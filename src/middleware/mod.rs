// Middleware module - request logging

pub mod request_logger;

pub use request_logger::{REQUEST_ID_HEADER, request_logger_middleware};
