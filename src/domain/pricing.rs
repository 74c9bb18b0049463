//! Area-based pricing for made-to-measure line items.
//!
//! Widths and heights arrive in centimetres, catalog prices are per square
//! foot. Money is rounded half-up to two decimals once per line, and the
//! order total is the sum of those rounded lines.

use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive, Zero};
use uuid::Uuid;

use super::errors::DomainError;
use super::order::{OrderItemInput, PaymentMethod};

/// 929.03 square centimetres per square foot, as hundredths.
const SQ_CM_PER_SQ_FT_HUNDREDTHS: i64 = 92_903;
const MONEY_SCALE: i64 = 2;
const AREA_SCALE: i64 = 4;
/// Integer digits allowed by the `NUMERIC(10,2)` dimension columns.
const DIMENSION_INTEGER_DIGITS: u32 = 8;
/// Integer digits allowed by the `NUMERIC(12,2)` money and `NUMERIC(14,4)`
/// area columns.
const AMOUNT_INTEGER_DIGITS: u32 = 10;

#[derive(Debug, Clone)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub width_cm: Option<BigDecimal>,
    pub height_cm: Option<BigDecimal>,
    pub unit_area_sqft: BigDecimal,
    pub price_per_sqft: BigDecimal,
    pub line_total: BigDecimal,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    pub total: BigDecimal,
}

fn sq_cm_per_sq_ft() -> BigDecimal {
    BigDecimal::from(SQ_CM_PER_SQ_FT_HUNDREDTHS) / BigDecimal::from(100)
}

pub fn round_money(amount: &BigDecimal) -> BigDecimal {
    amount.with_scale_round(MONEY_SCALE, RoundingMode::HalfUp)
}

/// Area of one unit in square feet, unrounded.
pub fn unit_area_sqft(width_cm: &BigDecimal, height_cm: &BigDecimal) -> BigDecimal {
    (width_cm * height_cm) / sq_cm_per_sq_ft()
}

/// `area × price × quantity`, rounded to money precision.
pub fn line_total(unit_area: &BigDecimal, price_per_sqft: &BigDecimal, quantity: i32) -> BigDecimal {
    round_money(&(unit_area * price_per_sqft * BigDecimal::from(quantity)))
}

fn upper_bound(integer_digits: u32) -> BigDecimal {
    BigDecimal::from(10i64.pow(integer_digits))
}

/// Rejects values the order snapshot could not store exactly: more than two
/// decimals, or too many integer digits for the column.
fn ensure_storable(
    field: &str,
    product_id: Uuid,
    value: &BigDecimal,
    integer_digits: u32,
) -> Result<(), DomainError> {
    if round_money(value) != *value {
        return Err(DomainError::InvalidInput(format!(
            "{field} {value} for product {product_id} has more than two decimals"
        )));
    }
    if value.abs() >= upper_bound(integer_digits) {
        return Err(DomainError::InvalidInput(format!(
            "{field} {value} for product {product_id} is too large"
        )));
    }
    Ok(())
}

fn price_line(item: OrderItemInput) -> Result<PricedLine, DomainError> {
    if item.quantity <= 0 {
        return Err(DomainError::InvalidInput(format!(
            "quantity for product {} must be positive",
            item.product_id
        )));
    }
    if item.price_per_sqft <= BigDecimal::zero() {
        return Err(DomainError::InvalidInput(format!(
            "price for product {} must be positive",
            item.product_id
        )));
    }

    ensure_storable("price_per_sqft", item.product_id, &item.price_per_sqft, AMOUNT_INTEGER_DIGITS)?;

    let unit_area = match (&item.width_cm, &item.height_cm) {
        (Some(w), Some(h)) => {
            if *w <= BigDecimal::zero() || *h <= BigDecimal::zero() {
                return Err(DomainError::InvalidInput(format!(
                    "dimensions for product {} must be positive",
                    item.product_id
                )));
            }
            ensure_storable("width_cm", item.product_id, w, DIMENSION_INTEGER_DIGITS)?;
            ensure_storable("height_cm", item.product_id, h, DIMENSION_INTEGER_DIGITS)?;
            unit_area_sqft(w, h)
        }
        (None, None) => BigDecimal::zero(),
        _ => {
            return Err(DomainError::InvalidInput(format!(
                "product {} needs both width and height, or neither",
                item.product_id
            )))
        }
    };

    let total = line_total(&unit_area, &item.price_per_sqft, item.quantity);
    if unit_area >= upper_bound(AMOUNT_INTEGER_DIGITS) || total >= upper_bound(AMOUNT_INTEGER_DIGITS) {
        return Err(DomainError::InvalidInput(format!(
            "line for product {} is too large",
            item.product_id
        )));
    }
    Ok(PricedLine {
        product_id: item.product_id,
        quantity: item.quantity,
        width_cm: item.width_cm,
        height_cm: item.height_cm,
        unit_area_sqft: unit_area.with_scale_round(AREA_SCALE, RoundingMode::HalfUp),
        price_per_sqft: item.price_per_sqft,
        line_total: total,
        notes: item.notes,
    })
}

/// Prices every line and sums the order total. Rejects empty carts and carts
/// that add up to nothing.
pub fn price_cart(items: Vec<OrderItemInput>) -> Result<PricedCart, DomainError> {
    if items.is_empty() {
        return Err(DomainError::InvalidInput("an order needs at least one item".to_string()));
    }

    let lines = items.into_iter().map(price_line).collect::<Result<Vec<_>, _>>()?;
    let total = lines
        .iter()
        .fold(BigDecimal::zero(), |acc, line| acc + &line.line_total);

    if total <= BigDecimal::zero() {
        return Err(DomainError::InvalidInput("order total must be positive".to_string()));
    }
    if total >= upper_bound(AMOUNT_INTEGER_DIGITS) {
        return Err(DomainError::InvalidInput(format!("order total {total} is too large")));
    }

    Ok(PricedCart { lines, total })
}

/// Advance collected online for a cash-on-delivery order.
pub fn cod_advance(total: &BigDecimal, advance_percent: u32) -> BigDecimal {
    round_money(&(total * BigDecimal::from(advance_percent) / BigDecimal::from(100)))
}

/// Online payments an order expects, in minor units: the first payment and
/// the balance left after it. `ONLINE` orders pay everything up front.
pub fn payment_schedule(
    total: &BigDecimal,
    method: PaymentMethod,
    advance_percent: u32,
) -> Result<(i64, i64), DomainError> {
    let full = to_minor_units(total)?;
    match method {
        PaymentMethod::Online => Ok((full, 0)),
        PaymentMethod::CashOnDelivery => {
            let advance = to_minor_units(&cod_advance(total, advance_percent))?;
            Ok((advance, full - advance))
        }
    }
}

/// Converts a two-decimal amount into integer minor units (paise).
pub fn to_minor_units(amount: &BigDecimal) -> Result<i64, DomainError> {
    (amount * BigDecimal::from(100))
        .with_scale_round(0, RoundingMode::HalfUp)
        .to_i64()
        .ok_or_else(|| DomainError::InvalidInput(format!("amount {amount} is out of range")))
}
