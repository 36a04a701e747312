use crate::error::{Error, Result};
use crate::market::{round_to, TVLP_PRICE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Protocol fee taken from the input amount.
pub const PROTOCOL_FEE_RATE: f64 = 0.005;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Asset {
    Usdt,
    Tvlp,
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Usdt => f.write_str("USDT"),
            Asset::Tvlp => f.write_str("TVLP"),
        }
    }
}

impl FromStr for Asset {
    type Err = Error;

    fn from_str(symbol: &str) -> Result<Self> {
        match symbol.to_ascii_uppercase().as_str() {
            "USDT" => Ok(Asset::Usdt),
            "TVLP" => Ok(Asset::Tvlp),
            other => Err(Error::ValidationError(format!("Unknown asset '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub from: Asset,
    pub to: Asset,
    pub amount_in: f64,
    pub amount_out: f64,
    pub price: f64,
    pub fee: f64,
}

/// Prices a swap at the fixed TVLP price.
pub fn quote(from: Asset, to: Asset, amount: f64) -> Result<Quote> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::ValidationError("Please enter a valid amount".to_string()));
    }

    let amount_out = match (from, to) {
        (Asset::Usdt, Asset::Tvlp) => round_to(amount / TVLP_PRICE, 6),
        (Asset::Tvlp, Asset::Usdt) => round_to(amount * TVLP_PRICE, 2),
        _ => {
            return Err(Error::ValidationError(format!(
                "Cannot swap {} for itself",
                from
            )))
        }
    };

    Ok(Quote {
        from,
        to,
        amount_in: amount,
        amount_out,
        price: TVLP_PRICE,
        fee: round_to(amount * PROTOCOL_FEE_RATE, 6),
    })
}
