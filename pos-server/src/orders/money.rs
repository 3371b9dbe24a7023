//! Money calculation utilities using rust_decimal for precision
//!
//! All calculations are done using `Decimal` internally, then converted to `f64`
//! for storage/serialization.

use rust_decimal::prelude::*;
use shared::models::{CartInput, CartItemInput, CartTotals, CustomerInfo, PaymentInput, Product};

/// Rounding strategy for monetary values (2 decimal places, half-up)
const DECIMAL_PLACES: u32 = 2;

/// Tolerance for monetary comparisons (0.01)
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Convert f64 to Decimal; non-finite input becomes zero
#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

/// Convert Decimal back to f64 for storage, rounded to 2 decimal places
#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or_default()
}

/// quantity × unit_price (tax excluded)
pub fn line_total(quantity: i64, unit_price: f64) -> f64 {
    to_f64(Decimal::from(quantity) * to_decimal(unit_price))
}

/// quantity × unit_price × tax_rate / 100
pub fn line_tax(quantity: i64, unit_price: f64, tax_rate: f64) -> f64 {
    to_f64(Decimal::from(quantity) * to_decimal(unit_price) * to_decimal(tax_rate) / Decimal::ONE_HUNDRED)
}

/// Aggregate totals: total = subtotal − discount + shipping + tax
pub fn compute_totals(items: &[CartItemInput], discount: f64, shipping: f64) -> CartTotals {
    let subtotal: Decimal = items
        .iter()
        .map(|i| Decimal::from(i.quantity) * to_decimal(i.unit_price))
        .sum();
    let tax: Decimal = items.iter().map(|i| to_decimal(i.tax)).sum();
    let discount = to_decimal(discount);
    let shipping = to_decimal(shipping);
    let total = subtotal - discount + shipping + tax;

    CartTotals {
        subtotal: to_f64(subtotal),
        discount: to_f64(discount),
        shipping: to_f64(shipping),
        tax: to_f64(tax),
        total: to_f64(total),
    }
}

/// Sum of tendered amounts
pub fn payments_total(payments: &[PaymentInput]) -> Decimal {
    payments.iter().map(|p| to_decimal(p.amount)).sum()
}

/// Payments cover `total` within [`MONEY_TOLERANCE`]
pub fn is_fully_paid(payments: &[PaymentInput], total: f64) -> bool {
    payments_total(payments) >= to_decimal(total) - MONEY_TOLERANCE
}

/// Builds a priced [`CartInput`] from catalog products
#[derive(Debug, Clone, Default)]
pub struct CartBuilder {
    items: Vec<CartItemInput>,
    payments: Vec<PaymentInput>,
    discount: f64,
    shipping: f64,
    customer: Option<CustomerInfo>,
    notes: Option<String>,
    user_id: Option<i64>,
}

impl CartBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `quantity` of `product`, snapshotting its name, sku, price and tax
    pub fn item(mut self, product: &Product, quantity: i64) -> Self {
        self.items.push(CartItemInput {
            product_id: product.id,
            product_name: product.name.clone(),
            product_sku: product.sku.clone(),
            quantity,
            unit_price: product.price,
            tax: line_tax(quantity, product.price, product.tax_rate),
        });
        self
    }

    /// Add a pre-priced line as is
    pub fn line(mut self, item: CartItemInput) -> Self {
        self.items.push(item);
        self
    }

    pub fn discount(mut self, amount: f64) -> Self {
        self.discount = amount;
        self
    }

    pub fn shipping(mut self, amount: f64) -> Self {
        self.shipping = amount;
        self
    }

    pub fn customer(mut self, customer: CustomerInfo) -> Self {
        self.customer = Some(customer);
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn cashier(mut self, user_id: Option<i64>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn payment(mut self, amount: f64, method: impl Into<String>) -> Self {
        self.payments.push(PaymentInput {
            amount,
            method: method.into(),
            reference: None,
        });
        self
    }

    pub fn payment_with_reference(
        mut self,
        amount: f64,
        method: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        self.payments.push(PaymentInput {
            amount,
            method: method.into(),
            reference: Some(reference.into()),
        });
        self
    }

    pub fn totals(&self) -> CartTotals {
        compute_totals(&self.items, self.discount, self.shipping)
    }

    pub fn build(self) -> CartInput {
        let totals = self.totals();
        CartInput {
            customer: self.customer,
            notes: self.notes,
            items: self.items,
            payments: self.payments,
            totals,
            user_id: self.user_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: i64, price: f64, tax_rate: f64) -> Product {
        Product {
            id,
            sku: format!("SKU-{id}"),
            name: format!("Product {id}"),
            description: String::new(),
            price,
            cost_price: 0.0,
            tax_rate,
            stock_quantity: 10,
            unit: "piece".into(),
            category: String::new(),
            is_active: true,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_to_decimal_precision() {
        // 0.1 + 0.2 != 0.3 in f64
        let sum_dec = to_decimal(0.1) + to_decimal(0.2);
        assert_eq!(to_f64(sum_dec), 0.3);
    }

    #[test]
    fn test_line_tax_rounds_half_up() {
        assert_eq!(line_tax(3, 10.0, 5.0), 1.5);
        assert_eq!(line_tax(1, 0.10, 5.0), 0.01); // 0.005 → 0.01
        assert_eq!(line_tax(2, 19.99, 0.0), 0.0);
    }

    #[test]
    fn test_two_item_cart_totals() {
        let cart = CartBuilder::new()
            .item(&product(1, 10.0, 5.0), 3)
            .item(&product(2, 20.0, 0.0), 1)
            .payment(41.5, "cash")
            .build();

        assert_eq!(cart.totals.subtotal, 50.0);
        assert_eq!(cart.totals.tax, 1.5);
        assert_eq!(cart.totals.total, 51.5);
        assert_eq!(cart.items[0].product_sku, "SKU-1");
        assert_eq!(cart.items[0].tax, 1.5);
    }

    #[test]
    fn test_discount_and_shipping() {
        let totals = CartBuilder::new()
            .item(&product(1, 10.0, 10.0), 2)
            .discount(5.0)
            .shipping(2.5)
            .totals();
        // 20 - 5 + 2.5 + 2
        assert_eq!(totals.total, 19.5);
        assert_eq!(totals.discount, 5.0);
    }

    #[test]
    fn test_fully_paid_tolerance() {
        let payments = vec![
            PaymentInput {
                amount: 30.0,
                method: "cash".into(),
                reference: None,
            },
            PaymentInput {
                amount: 21.495,
                method: "card".into(),
                reference: None,
            },
        ];
        assert!(is_fully_paid(&payments, 51.5));
        assert!(!is_fully_paid(&payments[..1], 51.5));
        assert_eq!(line_total(3, 10.0), 30.0);
    }
}
