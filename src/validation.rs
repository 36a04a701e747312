use crate::error::{Result, Error};
use ruint::aliases::U256;

pub fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() {
        return Err(Error::ValidationError("Amount must be a finite number".to_string()));
    }
    if amount <= 0.0 {
        return Err(Error::ValidationError("Amount must be positive".to_string()));
    }
    Ok(())
}

/// Converts a decimal token amount into raw units: `round(amount * 10^decimals)`.
pub fn to_raw_units(amount: f64, decimals: u8) -> Result<U256> {
    validate_amount(amount)?;

    let scaled = (amount * 10f64.powi(i32::from(decimals))).round();
    if !scaled.is_finite() {
        return Err(Error::ValidationError("Amount is too large".to_string()));
    }
    if scaled < 1.0 {
        return Err(Error::ValidationError(format!(
            "Amount is below the smallest unit (10^-{})",
            decimals
        )));
    }
    U256::try_from(scaled)
        .map_err(|_| Error::ValidationError("Amount is too large".to_string()))
}

/// Renders raw units as a decimal string with exactly `decimals` fraction digits.
pub fn format_units(raw: U256, decimals: u8) -> String {
    let digits = raw.to_string();
    let decimals = usize::from(decimals);
    if decimals == 0 {
        return digits;
    }
    let padded = format!("{:0>width$}", digits, width = decimals + 1);
    let (whole, fraction) = padded.split_at(padded.len() - decimals);
    format!("{}.{}", whole, fraction)
}
