//! Brazilian real formatting.
//!
//! Amounts are rendered as `R$ 1.234,56`: `.` groups thousands, `,` separates
//! cents, always two decimal places, midpoints rounded away from zero.
//! Negative amounts carry the sign before the symbol (`-R$ 10,00`).

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use std::str::FromStr;
use thiserror::Error;

pub const CURRENCY_SYMBOL: &str = "R$";

/// Largest amount a `DECIMAL(12, 2)` money column holds.
pub const MAX_AMOUNT: Decimal = dec!(9999999999.99);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyParseError {
    #[error("missing currency symbol in '{0}'")]
    MissingSymbol(String),
    #[error("malformed amount '{0}'")]
    Malformed(String),
}

/// Rounds to cents using the formatter's rounding rule.
pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `quantity × unit_value` rounded to cents, or `None` when the product
/// overflows or exceeds [`MAX_AMOUNT`].
pub fn checked_amount(quantity: i64, unit_value: Decimal) -> Option<Decimal> {
    Decimal::from(quantity)
        .checked_mul(unit_value)
        .map(round_cents)
        .filter(|amount| amount.abs() <= MAX_AMOUNT)
}

/// Formats a raw decimal amount as BRL text.
pub fn format_brl(amount: Decimal) -> String {
    let rounded = round_cents(amount);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.2}", rounded.abs());
    let (units, cents) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(units.len() + units.len() / 3);
    for (idx, digit) in units.chars().enumerate() {
        if idx > 0 && (units.len() - idx) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    let sign = if negative { "-" } else { "" };
    format!("{sign}{CURRENCY_SYMBOL} {grouped},{cents}")
}

/// Parses text produced by [`format_brl`] back into a decimal.
///
/// Only the exact output shape is accepted; this is not a general locale parser.
pub fn parse_brl(text: &str) -> Result<Decimal, MoneyParseError> {
    let trimmed = text.trim();
    let (negative, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let digits = rest
        .strip_prefix(CURRENCY_SYMBOL)
        .ok_or_else(|| MoneyParseError::MissingSymbol(text.to_string()))?
        .trim_start();

    let (units, cents) = digits
        .split_once(',')
        .ok_or_else(|| MoneyParseError::Malformed(text.to_string()))?;
    let units_ok = !units.is_empty()
        && units.split('.').enumerate().all(|(idx, group)| {
            let len_ok = if idx == 0 {
                (1..=3).contains(&group.len())
            } else {
                group.len() == 3
            };
            len_ok && group.chars().all(|c| c.is_ascii_digit())
        });
    if !units_ok || cents.len() != 2 || !cents.chars().all(|c| c.is_ascii_digit()) {
        return Err(MoneyParseError::Malformed(text.to_string()));
    }

    let plain = format!("{}.{}", units.replace('.', ""), cents);
    let value =
        Decimal::from_str(&plain).map_err(|_| MoneyParseError::Malformed(text.to_string()))?;
    Ok(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(0), "R$ 0,00")]
    #[case(dec!(5), "R$ 5,00")]
    #[case(dec!(15.5), "R$ 15,50")]
    #[case(dec!(999.99), "R$ 999,99")]
    #[case(dec!(1000), "R$ 1.000,00")]
    #[case(dec!(1234567.891), "R$ 1.234.567,89")]
    #[case(dec!(-1234.5), "-R$ 1.234,50")]
    fn formats_brazilian_locale(#[case] amount: Decimal, #[case] expected: &str) {
        assert_eq!(format_brl(amount), expected);
    }

    #[rstest]
    #[case(dec!(0.005), "R$ 0,01")]
    #[case(dec!(2.345), "R$ 2,35")]
    #[case(dec!(-2.345), "-R$ 2,35")]
    #[case(dec!(2.344), "R$ 2,34")]
    fn rounds_half_away_from_zero(#[case] amount: Decimal, #[case] expected: &str) {
        assert_eq!(format_brl(amount), expected);
    }

    #[test]
    fn negative_amount_that_rounds_to_zero_has_no_sign() {
        assert_eq!(format_brl(dec!(-0.001)), "R$ 0,00");
    }

    #[test]
    fn checked_amount_stays_within_column_range() {
        assert_eq!(checked_amount(3, dec!(2.50)), Some(dec!(7.50)));
        assert_eq!(checked_amount(1, MAX_AMOUNT), Some(MAX_AMOUNT));
        assert_eq!(checked_amount(2, MAX_AMOUNT), None);
        assert_eq!(checked_amount(2000, dec!(79228162514264337593543950.33)), None);
    }

    #[test]
    fn parse_reads_back_formatted_text() {
        assert_eq!(parse_brl("R$ 1.234,56").unwrap(), dec!(1234.56));
        assert_eq!(parse_brl("-R$ 0,10").unwrap(), dec!(-0.10));
    }

    #[test]
    fn parse_rejects_other_shapes() {
        assert!(matches!(
            parse_brl("1.234,56"),
            Err(MoneyParseError::MissingSymbol(_))
        ));
        assert!(parse_brl("R$ 1234,5").is_err());
        assert!(parse_brl("R$ 12.34,56").is_err());
        assert!(parse_brl("R$ 1,234.56").is_err());
    }
}
