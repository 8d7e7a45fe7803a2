//! `users`: demographics, account state and marketing attributes.

use crate::generator::{GenContext, ParentRefs};
use crate::value::{Record, Value};
use chrono::{Datelike, Duration, NaiveDate};

const GENDERS: &[&str] = &["M", "F", "Other", "prefer not to say"];

const ACCOUNT_STATUS: &[(&str, u32)] = &[
    ("active", 85),
    ("inactive", 10),
    ("suspended", 3),
    ("pending", 2),
];

const LANGUAGES: &[(&str, u32)] = &[("en", 70), ("es", 15), ("fr", 8), ("de", 4), ("it", 3)];

const LOYALTY_TIERS: &[(&str, u32)] = &[
    ("bronze", 50),
    ("silver", 30),
    ("gold", 15),
    ("platinum", 5),
];

const SOURCE_CHANNELS: &[(&str, u32)] = &[
    ("organic", 40),
    ("paid_search", 25),
    ("social_media", 20),
    ("referral", 10),
    ("email", 5),
];

const SEGMENTS: &[(&str, u32)] = &[
    ("high_value", 15),
    ("regular", 45),
    ("occasional", 25),
    ("new", 15),
];

const CREDIT_RANGES: &[(&str, u32)] = &[
    ("excellent", 20),
    ("good", 40),
    ("fair", 30),
    ("poor", 10),
];

/// Users registered within the last five years, aged 18 to 80
pub(crate) fn generate(ctx: &mut GenContext, ids: &[u64], _parents: &ParentRefs) -> Vec<Record> {
    let now = ctx.now;
    let today = now.date();
    let oldest = shift_years(today, -80);
    let youngest = shift_years(today, -18);

    ids.iter()
        .map(|&user_id| {
            let fake = &mut ctx.fake;
            let registered = fake.datetime_within_days(now, 5 * 365);
            let last_login = fake.datetime_between(registered, now);
            let address_line_2 = if fake.bool_with_probability(0.3) {
                Value::Text(fake.secondary_address())
            } else {
                Value::Null
            };

            vec![
                Value::Id(user_id),
                Value::Text(fake.email()),
                Value::Text(fake.username()),
                Value::Text(fake.first_name()),
                Value::Text(fake.last_name()),
                Value::Date(fake.date_between(oldest, youngest)),
                Value::from(*fake.pick(GENDERS)),
                Value::Text(fake.phone()),
                Value::Text(fake.street_address()),
                address_line_2,
                Value::Text(fake.city()),
                Value::Text(fake.state()),
                Value::Text(fake.postcode()),
                Value::Text(fake.country_code()),
                Value::Timestamp(registered),
                Value::Timestamp(last_login),
                Value::from(*fake.weighted(ACCOUNT_STATUS)),
                Value::Bool(fake.bool_with_probability(0.9)),
                Value::Bool(fake.bool_with_probability(0.6)),
                Value::from(*fake.weighted(LANGUAGES)),
                Value::from(*fake.weighted(LOYALTY_TIERS)),
                Value::Text(fake.letters(4)),
                Value::from(*fake.weighted(SOURCE_CHANNELS)),
                Value::from(*fake.weighted(SEGMENTS)),
                Value::from(*fake.weighted(CREDIT_RANGES)),
            ]
        })
        .collect()
}

/// Same calendar day `years` away, clamped for Feb 29
fn shift_years(date: NaiveDate, years: i32) -> NaiveDate {
    let year = date.year() + years;
    date.with_year(year)
        .or_else(|| NaiveDate::from_ymd_opt(year, date.month(), 28))
        .unwrap_or(date - Duration::days(i64::from(-years) * 365))
}
