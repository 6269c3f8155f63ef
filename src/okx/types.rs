use crate::core::errors::ValidationError;
use crate::core::types::Validate;
use serde::{Deserialize, Serialize};

/// Server time
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct OkxSystemTime {
    pub ts: String, // Unix time in milliseconds
}

/// OKX Instrument information
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct OkxInstrument {
    pub inst_type: String,          // SPOT, MARGIN, SWAP, FUTURES, OPTION
    pub inst_id: String,            // e.g., BTC-USDT
    pub base_ccy: String,           // Base currency
    pub quote_ccy: String,          // Quote currency
    pub settle_ccy: Option<String>, // Settlement currency
    pub tick_sz: String,            // Tick size
    pub lot_sz: String,             // Lot size
    pub min_sz: String,             // Minimum order size
    pub state: String,              // live, suspend, preopen, test
}

/// OKX Ticker data
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct OkxTicker {
    pub inst_type: String,
    pub inst_id: String,
    pub last: String,
    pub last_sz: String,
    pub ask_px: String,
    pub ask_sz: String,
    pub bid_px: String,
    pub bid_sz: String,
    pub open_24h: String,
    pub high_24h: String,
    pub low_24h: String,
    pub vol_ccy_24h: String,
    pub vol_24h: String,
    pub ts: String,
}

/// OKX Account balance detail
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct OkxBalance {
    pub ccy: String,        // Currency
    pub eq: String,         // Equity
    pub cash_bal: String,   // Cash balance
    pub avail_bal: String,  // Available balance
    pub frozen_bal: String, // Frozen balance
}

/// OKX Account information
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct OkxAccountInfo {
    pub total_eq: String,         // Total equity in USD
    pub u_time: String,           // Update time
    pub details: Vec<OkxBalance>, // Balance details
}

/// OKX Order request
#[derive(Debug, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct OkxOrderRequest {
    pub inst_id: String,  // Instrument ID
    pub td_mode: String,  // Trade mode: cash, cross, isolated
    pub side: String,     // Order side: buy, sell
    pub ord_type: String, // Order type: market, limit, post_only, fok, ioc
    pub sz: String,       // Quantity to buy or sell
    #[serde(skip_serializing_if = "Option::is_none")]
    pub px: Option<String>, // Order price
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cl_ord_id: Option<String>, // Client order ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>, // Order tag
}

impl Validate for OkxOrderRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        let priced = matches!(self.ord_type.as_str(), "limit" | "post_only" | "fok" | "ioc");
        ValidationError::new("order request")
            .require("instId", !self.inst_id.is_empty())
            .require("tdMode", !self.td_mode.is_empty())
            .require("side", !self.side.is_empty())
            .require("ordType", !self.ord_type.is_empty())
            .require("sz", !self.sz.is_empty())
            .require("px", !priced || self.px.is_some())
            .conflict_if(
                self.ord_type == "market" && self.px.is_some(),
                "px is not allowed for market orders",
            )
            .into_result()
    }
}

/// OKX Cancel request
#[derive(Debug, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct OkxCancelRequest {
    pub inst_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ord_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cl_ord_id: Option<String>,
}

impl Validate for OkxCancelRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::new("cancel request")
            .require("instId", !self.inst_id.is_empty())
            .require("ordId or clOrdId", self.ord_id.is_some() || self.cl_ord_id.is_some())
            .into_result()
    }
}

/// Per-order acknowledgement returned by place/cancel endpoints
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct OkxOrderAck {
    pub ord_id: String,            // Order ID
    pub cl_ord_id: Option<String>, // Client order ID
    pub tag: Option<String>,       // Order tag
    pub s_code: String,            // Success code
    pub s_msg: String,             // Success message
}
