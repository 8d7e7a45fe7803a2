//! `orders`: transactions referencing existing users and products.

use crate::fake::round2;
use crate::generator::{GenContext, ParentRefs};
use crate::schema::TableKind;
use crate::value::{Record, Value};
use chrono::Duration;

const TAX_RATE: f64 = 0.08;
const FREE_SHIPPING_THRESHOLD: f64 = 100.0;

const ITEM_COUNTS: &[(usize, u32)] = &[(1, 40), (2, 30), (3, 20), (4, 7), (5, 3)];

const ORDER_STATUS: &[(&str, u32)] = &[
    ("pending", 5),
    ("confirmed", 10),
    ("shipped", 20),
    ("delivered", 55),
    ("cancelled", 7),
    ("returned", 3),
];

const PAYMENT_STATUS: &[(&str, u32)] = &[
    ("pending", 5),
    ("paid", 85),
    ("failed", 5),
    ("refunded", 5),
];

const PAYMENT_METHODS: &[(&str, u32)] = &[
    ("credit_card", 45),
    ("debit_card", 25),
    ("paypal", 20),
    ("bank_transfer", 8),
    ("cash", 2),
];

const SHIPPING_METHODS: &[(&str, u32)] = &[
    ("standard", 60),
    ("express", 25),
    ("overnight", 10),
    ("pickup", 5),
];

const SALES_CHANNELS: &[(&str, u32)] = &[
    ("website", 50),
    ("mobile_app", 35),
    ("phone", 10),
    ("store", 5),
];

const CUSTOMER_TYPES: &[(&str, u32)] = &[("new", 25), ("returning", 75)];

const ORDER_SOURCES: &[(&str, u32)] = &[
    ("organic", 70),
    ("marketing_campaign", 25),
    ("referral", 5),
];

const PRIORITY_LEVELS: &[(&str, u32)] = &[
    ("low", 20),
    ("normal", 65),
    ("high", 12),
    ("urgent", 3),
];

/// Orders placed within the last two years.
///
/// `parents` must hold non-empty `users` and `products` id lists; the caller
/// refuses to generate orders otherwise.
pub(crate) fn generate(ctx: &mut GenContext, ids: &[u64], parents: &ParentRefs) -> Vec<Record> {
    let now = ctx.now;
    let no_ids: Vec<u64> = Vec::new();
    let user_ids = parents.get(&TableKind::Users).unwrap_or(&no_ids);
    let product_ids = parents.get(&TableKind::Products).unwrap_or(&no_ids);
    if user_ids.is_empty() || product_ids.is_empty() {
        return Vec::new();
    }

    ids.iter()
        .map(|&order_id| {
            let fake = &mut ctx.fake;
            let user_id = fake.pick_id(user_ids);
            let order_date = fake.datetime_within_days(now, 2 * 365);

            let item_count = *fake.weighted(ITEM_COUNTS);
            let mut items = fake.pick_distinct_ids(product_ids, item_count);
            items.sort_unstable();

            let mut subtotal = 0.0;
            let mut total_quantity = 0;
            for _ in &items {
                let item_price = fake.price(10.0, 500.0);
                let quantity = fake.int_range(1, 5);
                subtotal += item_price * quantity as f64;
                total_quantity += quantity;
            }
            let subtotal = round2(subtotal);
            let tax = round2(subtotal * TAX_RATE);
            let shipping = if subtotal < FREE_SHIPPING_THRESHOLD {
                fake.price(0.0, 25.0)
            } else {
                0.0
            };
            let discount = if fake.bool_with_probability(0.3) {
                fake.price(0.0, (subtotal * 0.2).max(0.01))
            } else {
                0.0
            };
            let total = round2(subtotal + tax + shipping - discount);

            let coupon = if discount > 0.0 {
                Value::Text(format!("{}{}", fake.letters(4), fake.digits(3)))
            } else {
                Value::Null
            };
            let estimated = order_date + Duration::days(fake.int_range(1, 14));
            let actual = if fake.bool_with_probability(0.7) {
                Value::Timestamp(order_date + Duration::days(fake.int_range(1, 14)))
            } else {
                Value::Null
            };
            let tracking = if fake.bool_with_probability(0.8) {
                Value::Text(format!(
                    "{}{}{}",
                    fake.letters(2),
                    fake.digits(8),
                    fake.letters(2)
                ))
            } else {
                Value::Null
            };
            let notes = if fake.bool_with_probability(0.2) {
                Value::Text(fake.sentence())
            } else {
                Value::Null
            };
            let gift_message = if fake.bool_with_probability(0.1) {
                Value::Text(fake.sentence())
            } else {
                Value::Null
            };
            let product_list = items
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(",");

            vec![
                Value::Id(order_id),
                Value::Id(user_id),
                Value::Text(product_list),
                Value::Text(format!(
                    "ORD-{}-{:06}",
                    order_date.format("%Y%m%d"),
                    order_id
                )),
                Value::Timestamp(order_date),
                Value::from(*fake.weighted(ORDER_STATUS)),
                Value::from(*fake.weighted(PAYMENT_STATUS)),
                Value::from(*fake.weighted(PAYMENT_METHODS)),
                Value::from(*fake.weighted(SHIPPING_METHODS)),
                Value::Text(fake.address()),
                Value::Text(fake.address()),
                Value::Float(subtotal),
                Value::Float(tax),
                Value::Float(shipping),
                Value::Float(discount),
                Value::Float(total),
                Value::from("USD"),
                Value::Int(items.len() as i64),
                Value::Int(total_quantity),
                coupon,
                Value::from(*fake.weighted(SALES_CHANNELS)),
                Value::from(*fake.weighted(CUSTOMER_TYPES)),
                Value::from(*fake.weighted(ORDER_SOURCES)),
                Value::Timestamp(estimated),
                actual,
                tracking,
                notes,
                gift_message,
                Value::from(*fake.weighted(PRIORITY_LEVELS)),
            ]
        })
        .collect()
}
