use crate::core::errors::{OkxError, ValidationError};
use crate::core::kernel::{CallContext, Dispatch};
use crate::core::types::{Expect, Request, Validate};
use crate::okx::types::{
    OkxAccountInfo, OkxCancelRequest, OkxInstrument, OkxOrderAck, OkxOrderRequest,
    OkxSystemTime, OkxTicker,
};
use serde::de::DeserializeOwned;

/// Exchange limit on orders per batch request
pub const MAX_BATCH_SIZE: usize = 20;

/// A few representative OKX endpoints built on the dispatch kernel
#[derive(Debug)]
pub struct OkxRest<D: Dispatch> {
    dispatcher: D,
}

impl<D: Dispatch> OkxRest<D> {
    pub fn new(dispatcher: D) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    /// Get system time from OKX, in milliseconds
    pub async fn get_system_time(&self, ctx: &CallContext) -> Result<u64, OkxError> {
        let request = Request::get("/api/v5/public/time");
        let outcome = self
            .dispatcher
            .execute(ctx, &request, Expect::AtLeastOne)
            .await?;
        let time: OkxSystemTime = outcome.first()?;

        time.ts
            .parse::<u64>()
            .map_err(|e| outcome.decode_error(format!("Invalid timestamp {:?}: {}", time.ts, e)))
    }

    /// Get trading instruments
    pub async fn get_instruments(
        &self,
        ctx: &CallContext,
        inst_type: &str,
    ) -> Result<Vec<OkxInstrument>, OkxError> {
        let request = Request::get("/api/v5/public/instruments").query("instType", inst_type);
        self.rows(ctx, &request).await
    }

    /// Get ticker information
    pub async fn get_ticker(&self, ctx: &CallContext, inst_id: &str) -> Result<OkxTicker, OkxError> {
        let request = Request::get("/api/v5/market/ticker").query("instId", inst_id);
        self.dispatcher
            .execute(ctx, &request, Expect::AtLeastOne)
            .await?
            .first()
    }

    /// Order book as a raw SBE frame; decoding is left to the caller
    pub async fn get_order_book_sbe(
        &self,
        ctx: &CallContext,
        inst_id: &str,
        depth: Option<u32>,
    ) -> Result<Vec<u8>, OkxError> {
        let request = Request::get("/api/v5/market/books-sbe")
            .query("instId", inst_id)
            .query_opt("sz", depth)
            .sbe();
        self.dispatcher
            .execute(ctx, &request, Expect::Rows)
            .await?
            .into_binary()
    }

    // Account API endpoints (require authentication)

    /// Get account balance
    pub async fn get_balance(
        &self,
        ctx: &CallContext,
        ccy: Option<&str>,
    ) -> Result<OkxAccountInfo, OkxError> {
        let request = Request::get("/api/v5/account/balance")
            .query_opt("ccy", ccy)
            .signed();
        self.dispatcher
            .execute(ctx, &request, Expect::AtLeastOne)
            .await?
            .first()
    }

    // Trading API endpoints (require authentication)

    /// Place a new order; exactly one acknowledgement is accepted
    pub async fn place_order(
        &self,
        ctx: &CallContext,
        order: &OkxOrderRequest,
    ) -> Result<OkxOrderAck, OkxError> {
        order.validate()?;
        let request = Request::post("/api/v5/trade/order").json(order)?.signed();
        self.dispatcher
            .execute(ctx, &request, Expect::Acks(1))
            .await?
            .first()
    }

    /// Place up to [`MAX_BATCH_SIZE`] orders
    ///
    /// A rejected order fails the call with a partial-failure error; use
    /// [`acks_from_error`] to recover every acknowledgement.
    pub async fn place_batch_orders(
        &self,
        ctx: &CallContext,
        orders: &[OkxOrderRequest],
    ) -> Result<Vec<OkxOrderAck>, OkxError> {
        validate_batch("batch order request", orders)?;
        let request = Request::post("/api/v5/trade/batch-orders")
            .json(orders)?
            .signed();
        self.dispatcher
            .execute(ctx, &request, Expect::Acks(orders.len()))
            .await?
            .rows()
    }

    /// Cancel up to [`MAX_BATCH_SIZE`] orders
    pub async fn cancel_batch_orders(
        &self,
        ctx: &CallContext,
        cancels: &[OkxCancelRequest],
    ) -> Result<Vec<OkxOrderAck>, OkxError> {
        validate_batch("batch cancel request", cancels)?;
        let request = Request::post("/api/v5/trade/cancel-batch-orders")
            .json(cancels)?
            .signed();
        self.dispatcher
            .execute(ctx, &request, Expect::Acks(cancels.len()))
            .await?
            .rows()
    }

    async fn rows<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        request: &Request,
    ) -> Result<Vec<T>, OkxError> {
        self.dispatcher
            .execute(ctx, request, Expect::Rows)
            .await?
            .rows()
    }
}

fn validate_batch<T: Validate>(target: &'static str, items: &[T]) -> Result<(), ValidationError> {
    ValidationError::new(target)
        .require("items", !items.is_empty())
        .conflict_if(
            items.len() > MAX_BATCH_SIZE,
            format!("at most {} items per batch, got {}", MAX_BATCH_SIZE, items.len()),
        )
        .into_result()?;
    items.iter().try_for_each(Validate::validate)
}

/// Every acknowledgement carried by a partial-failure error, in request order
pub fn acks_from_error(err: &OkxError) -> Option<Vec<OkxOrderAck>> {
    let api = err.api()?;
    if api.data.is_empty() {
        return None;
    }
    api.data
        .iter()
        .map(|item| serde_json::from_value(item.clone()).ok())
        .collect()
}
