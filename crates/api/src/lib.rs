//! HTTP boundary for the NERDm record editor

pub mod rest;

pub use rest::{
    create_router, ApiConfig, ApiError, ApiState, ErrorInfo, DEFAULT_BASE_PATH, DEFAULT_MAX_BODY_BYTES,
};
