pub mod core;
pub mod okx;

pub use core::{
    config::{Credentials, OkxConfig},
    errors::{ApiError, ApiErrorKind, OkxError, ValidationError},
    kernel::{CallContext, Dispatch, Dispatcher},
    types::{Expect, Request},
};
pub use okx::OkxRest;
