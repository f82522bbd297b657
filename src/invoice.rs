//! Invoice aggregation and receipt rendering.
//!
//! Line items are grouped by exact product name in order of first
//! appearance. Each group sums quantity and line total; the grand total is
//! the sum of the group totals, which always equals the sum of the raw line
//! totals.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use utoipa::ToSchema;

use crate::money::{checked_amount, format_brl, MAX_AMOUNT};

/// Column width of the product name on a receipt line.
pub const NAME_WIDTH: usize = 20;
/// Column width of the quantity on a receipt line.
pub const QTY_WIDTH: usize = 5;
/// Total printable width of the receipt.
pub const RECEIPT_WIDTH: usize = 42;

pub const GRAND_TOTAL_LABEL: &str = "TOTAL GERAL";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvoiceError {
    #[error("amount for '{0}' exceeds {}", MAX_AMOUNT)]
    AmountOutOfRange(String),
}

/// One order line as read from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LineItem {
    pub product_name: String,
    pub quantity: i64,
    pub unit_value: Decimal,
}

impl LineItem {
    pub fn new(product_name: impl Into<String>, quantity: i64, unit_value: Decimal) -> Self {
        Self {
            product_name: product_name.into(),
            quantity,
            unit_value,
        }
    }

    /// Quantity times the product's unit value at read time.
    pub fn line_total(&self) -> Result<Decimal, InvoiceError> {
        checked_amount(self.quantity, self.unit_value)
            .ok_or_else(|| InvoiceError::AmountOutOfRange(self.product_name.clone()))
    }
}

/// Aggregated quantity and total for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct InvoiceLine {
    pub product_name: String,
    pub quantity: i64,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Invoice {
    pub client_name: String,
    pub issued_at: DateTime<Utc>,
    pub lines: Vec<InvoiceLine>,
    pub grand_total: Decimal,
}

/// Groups line items by product name, keeping first-seen order.
pub fn aggregate(items: &[LineItem]) -> Result<Vec<InvoiceLine>, InvoiceError> {
    let mut lines: Vec<InvoiceLine> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for item in items {
        let total = item.line_total()?;
        match index.get(item.product_name.as_str()) {
            Some(&pos) => {
                let line = &mut lines[pos];
                let out_of_range = || InvoiceError::AmountOutOfRange(item.product_name.clone());
                line.quantity = line.quantity.checked_add(item.quantity).ok_or_else(out_of_range)?;
                line.total = checked_sum(line.total, total).ok_or_else(out_of_range)?;
            }
            None => {
                index.insert(item.product_name.as_str(), lines.len());
                lines.push(InvoiceLine {
                    product_name: item.product_name.clone(),
                    quantity: item.quantity,
                    total,
                });
            }
        }
    }

    Ok(lines)
}

fn checked_sum(a: Decimal, b: Decimal) -> Option<Decimal> {
    a.checked_add(b).filter(|sum| sum.abs() <= MAX_AMOUNT)
}

impl Invoice {
    pub fn build(
        client_name: impl Into<String>,
        issued_at: DateTime<Utc>,
        items: &[LineItem],
    ) -> Result<Self, InvoiceError> {
        let lines = aggregate(items)?;
        let mut grand_total = Decimal::ZERO;
        for line in &lines {
            grand_total = checked_sum(grand_total, line.total)
                .ok_or_else(|| InvoiceError::AmountOutOfRange(GRAND_TOTAL_LABEL.to_string()))?;
        }
        Ok(Self {
            client_name: client_name.into(),
            issued_at,
            lines,
            grand_total,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Renders the fixed-width text receipt.
    pub fn render(&self) -> String {
        let mut out = ReceiptBuilder::new(RECEIPT_WIDTH);

        out.line(&format!("RECIBO - {}", self.client_name));
        out.line(&self.issued_at.format("%d/%m/%Y %H:%M").to_string());
        out.separator();
        out.line(&format!(
            "{}{}  {}",
            pad_right("PRODUTO", NAME_WIDTH),
            pad_left("QTD", QTY_WIDTH),
            "TOTAL"
        ));
        out.separator();

        for line in &self.lines {
            out.line(&format!(
                "{}{}  {}",
                pad_right(&line.product_name, NAME_WIDTH),
                pad_left(&line.quantity.to_string(), QTY_WIDTH),
                format_brl(line.total)
            ));
        }

        out.separator();
        out.line_lr(GRAND_TOTAL_LABEL, &format_brl(self.grand_total));
        out.build()
    }
}

/// Plain-text line builder for receipts.
struct ReceiptBuilder {
    width: usize,
    buf: String,
}

impl ReceiptBuilder {
    fn new(width: usize) -> Self {
        Self {
            width,
            buf: String::new(),
        }
    }

    fn line(&mut self, text: &str) -> &mut Self {
        self.buf.push_str(text.trim_end());
        self.buf.push('\n');
        self
    }

    fn separator(&mut self) -> &mut Self {
        let rule = "-".repeat(self.width);
        self.line(&rule)
    }

    /// Left text left-aligned, right text right-aligned, spaces between.
    fn line_lr(&mut self, left: &str, right: &str) -> &mut Self {
        let used = left.chars().count() + right.chars().count();
        let gap = if used >= self.width { 1 } else { self.width - used };
        let text = format!("{left}{}{right}", " ".repeat(gap));
        self.line(&text)
    }

    fn build(self) -> String {
        self.buf
    }
}

/// Truncates or right-pads to exactly `width` characters.
fn pad_right(text: &str, width: usize) -> String {
    let truncated: String = text.chars().take(width).collect();
    let len = truncated.chars().count();
    format!("{truncated}{}", " ".repeat(width - len))
}

/// Left-pads to `width` characters; longer text is kept whole.
fn pad_left(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        text.to_string()
    } else {
        format!("{}{text}", " ".repeat(width - len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn issued() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 10, 30, 0).unwrap()
    }

    fn sample() -> Vec<LineItem> {
        vec![
            LineItem::new("Water", 2, dec!(5)),
            LineItem::new("Water", 1, dec!(5)),
            LineItem::new("Juice", 3, dec!(6)),
        ]
    }

    #[test]
    fn groups_by_product_in_first_seen_order() {
        let lines = aggregate(&sample()).unwrap();
        assert_eq!(
            lines,
            vec![
                InvoiceLine { product_name: "Water".into(), quantity: 3, total: dec!(15) },
                InvoiceLine { product_name: "Juice".into(), quantity: 3, total: dec!(18) },
            ]
        );
    }

    #[test]
    fn grouping_is_case_sensitive() {
        let lines = aggregate(&[
            LineItem::new("water", 1, dec!(1)),
            LineItem::new("Water", 1, dec!(1)),
        ])
        .unwrap();
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn grand_total_matches_raw_sum() {
        let items = sample();
        let invoice = Invoice::build("Ana", issued(), &items).unwrap();
        let raw: Decimal = items.iter().map(|item| item.line_total().unwrap()).sum();
        assert_eq!(invoice.grand_total, raw);
        assert_eq!(invoice.grand_total, dec!(33));
    }

    #[test]
    fn renders_fixed_width_lines() {
        let receipt = Invoice::build("Ana", issued(), &sample()).unwrap().render();
        let lines: Vec<&str> = receipt.lines().collect();

        assert_eq!(lines[0], "RECIBO - Ana");
        assert_eq!(lines[1], "01/06/2024 10:30");
        assert!(lines.contains(&"Water                   3  R$ 15,00"));
        assert!(lines.contains(&"Juice                   3  R$ 18,00"));

        let last = lines.last().unwrap();
        assert!(last.starts_with(GRAND_TOTAL_LABEL));
        assert!(last.ends_with("R$ 33,00"));
        assert_eq!(last.chars().count(), RECEIPT_WIDTH);
    }

    #[test]
    fn long_product_names_are_truncated() {
        let receipt = Invoice::build(
            "Ana",
            issued(),
            &[LineItem::new("Protetor solar FPS 50 bisnaga", 1, dec!(42.9))],
        )
        .unwrap()
        .render();
        assert!(receipt.contains("Protetor solar FPS 5    1  R$ 42,90"));
    }

    #[test]
    fn empty_invoice_renders_zero_total() {
        let invoice = Invoice::build("Ana", issued(), &[]).unwrap();
        assert!(invoice.is_empty());
        assert_eq!(invoice.grand_total, Decimal::ZERO);
        assert!(invoice.render().lines().last().unwrap().ends_with("R$ 0,00"));
    }

    #[test]
    fn oversized_amounts_are_refused() {
        let item = LineItem::new("Caviar", 2000, dec!(79228162514264337593543950.33));
        assert_eq!(
            item.line_total(),
            Err(InvoiceError::AmountOutOfRange("Caviar".into()))
        );

        let near_limit = LineItem::new("Lancha", 1, dec!(9999999999.99));
        assert!(Invoice::build("Ana", issued(), &[near_limit.clone()]).is_ok());
        assert_eq!(
            Invoice::build("Ana", issued(), &[near_limit.clone(), near_limit]),
            Err(InvoiceError::AmountOutOfRange("Lancha".into()))
        );
    }
}
