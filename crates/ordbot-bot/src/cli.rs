//! Command-line arguments.

use std::time::Duration;

use clap::{Parser, ValueEnum};
use ordbot_core::{parse_price, parse_size, OrderRequest, OrderSide, TimeInForce};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SideArg {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OrderTypeArg {
    Market,
    Limit,
    Twap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TimeInForceArg {
    #[default]
    Gtc,
    Ioc,
    Fok,
}

/// Place a single order on the futures REST API.
#[derive(Parser, Debug)]
#[command(name = "ordbot", version, about, long_about = None)]
pub struct Args {
    /// Trading pair (e.g., BTCUSDT)
    #[arg(long)]
    pub symbol: String,

    #[arg(long, value_enum, ignore_case = true)]
    pub side: SideArg,

    #[arg(long = "order-type", value_enum, ignore_case = true)]
    pub order_type: OrderTypeArg,

    /// Total quantity (for TWAP, summed over all slices)
    #[arg(long)]
    pub quantity: String,

    /// Limit price (LIMIT only)
    #[arg(long)]
    pub price: Option<String>,

    /// Number of slices (TWAP only)
    #[arg(long)]
    pub slices: Option<u32>,

    /// Seconds between slices (TWAP only)
    #[arg(long)]
    pub interval: Option<f64>,

    #[arg(long = "time-in-force", value_enum, ignore_case = true, default_value_t)]
    pub time_in_force: TimeInForceArg,

    /// Only reduce an existing position
    #[arg(long)]
    pub reduce_only: bool,

    /// Configuration file path (can also be set via ORDBOT_CONFIG env var)
    #[arg(short, long)]
    pub config: Option<String>,
}

impl Args {
    /// Build the engine request, enforcing which flags go with which type.
    pub fn to_order_request(&self) -> AppResult<OrderRequest> {
        let side = match self.side {
            SideArg::Buy => OrderSide::Buy,
            SideArg::Sell => OrderSide::Sell,
        };
        let quantity = parse_size(&self.quantity)
            .map_err(|e| AppError::InvalidArgs(format!("--quantity: {e}")))?;

        let request = match self.order_type {
            OrderTypeArg::Market => {
                self.reject_extra(&["price", "slices", "interval"])?;
                OrderRequest::market(&self.symbol, side, quantity)
            }
            OrderTypeArg::Limit => {
                self.reject_extra(&["slices", "interval"])?;
                let raw = self
                    .price
                    .as_deref()
                    .ok_or_else(|| AppError::InvalidArgs("--price is required for LIMIT".into()))?;
                let price = parse_price(raw)
                    .map_err(|e| AppError::InvalidArgs(format!("--price: {e}")))?;
                OrderRequest::limit(&self.symbol, side, quantity, price, self.time_in_force())
            }
            OrderTypeArg::Twap => {
                self.reject_extra(&["price"])?;
                let slices = self
                    .slices
                    .ok_or_else(|| AppError::InvalidArgs("--slices is required for TWAP".into()))?;
                let seconds = self
                    .interval
                    .ok_or_else(|| AppError::InvalidArgs("--interval is required for TWAP".into()))?;
                let interval = Duration::try_from_secs_f64(seconds).map_err(|_| {
                    AppError::InvalidArgs(format!("--interval: {seconds} is not a valid duration"))
                })?;
                OrderRequest::twap(&self.symbol, side, quantity, slices, interval)
            }
        };

        Ok(request.with_reduce_only(self.reduce_only))
    }

    fn time_in_force(&self) -> TimeInForce {
        match self.time_in_force {
            TimeInForceArg::Gtc => TimeInForce::GoodTilCancelled,
            TimeInForceArg::Ioc => TimeInForce::ImmediateOrCancel,
            TimeInForceArg::Fok => TimeInForce::FillOrKill,
        }
    }

    fn reject_extra(&self, flags: &[&str]) -> AppResult<()> {
        for flag in flags {
            let present = match *flag {
                "price" => self.price.is_some(),
                "slices" => self.slices.is_some(),
                "interval" => self.interval.is_some(),
                _ => false,
            };
            if present {
                return Err(AppError::InvalidArgs(format!(
                    "--{flag} is not valid for this order type"
                )));
            }
        }
        Ok(())
    }
}
