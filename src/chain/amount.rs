use crate::error::AmountError;
use bitcoin::{Amount, Denomination};

/// Exact conversion of a node-reported BTC decimal to satoshis.
///
/// `f64`'s `Display` is the shortest round-tripping decimal and never uses
/// exponent notation, so parsing it back in the bitcoin denomination is an
/// exact ×10^8 that refuses sub-satoshi precision.
pub fn btc_to_sat(btc: f64) -> Result<u64, AmountError> {
    if !btc.is_finite() || btc < 0.0 {
        return Err(AmountError::OutOfRange(btc.to_string()));
    }
    let text = format!("{btc}");
    Amount::from_str_in(&text, Denomination::Bitcoin)
        .map(Amount::to_sat)
        .map_err(|_| AmountError::Inexact(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_exact_values() {
        assert_eq!(btc_to_sat(0.1), Ok(10_000_000));
        assert_eq!(btc_to_sat(50.0), Ok(5_000_000_000));
        assert_eq!(btc_to_sat(0.00000001), Ok(1));
        assert_eq!(btc_to_sat(49.9898), Ok(4_998_980_000));
        assert_eq!(btc_to_sat(0.0), Ok(0));
    }

    #[test]
    fn rejects_sub_satoshi_precision() {
        assert!(matches!(btc_to_sat(0.000000001), Err(AmountError::Inexact(_))));
        assert!(matches!(btc_to_sat(1.123456789), Err(AmountError::Inexact(_))));
    }

    #[test]
    fn rejects_negative_and_non_finite() {
        assert!(matches!(btc_to_sat(-1.0), Err(AmountError::OutOfRange(_))));
        assert!(matches!(btc_to_sat(f64::NAN), Err(AmountError::OutOfRange(_))));
        assert!(matches!(btc_to_sat(f64::INFINITY), Err(AmountError::OutOfRange(_))));
    }
}
