pub mod rest;
pub mod types;

// Re-export main components
pub use rest::{acks_from_error, OkxRest, MAX_BATCH_SIZE};
pub use types::{
    OkxAccountInfo, OkxBalance, OkxCancelRequest, OkxInstrument, OkxOrderAck, OkxOrderRequest,
    OkxSystemTime, OkxTicker,
};
