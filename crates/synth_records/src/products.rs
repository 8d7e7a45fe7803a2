//! `products`: catalog, pricing, inventory and ratings.

use crate::generator::{GenContext, ParentRefs};
use crate::value::{Record, Value};

const CATEGORIES: &[&str] = &[
    "Electronics",
    "Clothing",
    "Home & Garden",
    "Sports",
    "Books",
    "Beauty",
    "Automotive",
    "Toys",
    "Food & Beverage",
    "Health",
];

const BRANDS: &[&str] = &[
    "TechCorp",
    "StyleBrand",
    "HomeComfort",
    "SportsPro",
    "ReadWell",
    "BeautyMax",
    "AutoParts",
    "PlayTime",
    "FreshFood",
    "WellnessPlus",
];

const COLORS: &[&str] = &[
    "Black", "White", "Red", "Blue", "Green", "Silver", "Gold", "Navy", "Teal", "Beige",
];

const SIZES: &[&str] = &["XS", "S", "M", "L", "XL", "XXL", "One Size"];

const MATERIALS: &[&str] = &["Cotton", "Plastic", "Metal", "Wood", "Glass", "Leather"];

const WARRANTY_MONTHS: &[i64] = &[0, 6, 12, 24, 36];

const TAGS: &[&str] = &["popular", "new", "sale", "limited", "bestseller"];

pub(crate) fn generate(ctx: &mut GenContext, ids: &[u64], _parents: &ParentRefs) -> Vec<Record> {
    let now = ctx.now;

    ids.iter()
        .map(|&product_id| {
            let fake = &mut ctx.fake;
            let category = *fake.pick(CATEGORIES);
            let brand = *fake.pick(BRANDS);
            let created = fake.datetime_within_days(now, 5 * 365);
            let updated = fake.datetime_between(created, now);
            let sku = format!(
                "{}-{}{}",
                brand[..3].to_uppercase(),
                fake.letters(3),
                fake.digits(3)
            );
            let subcategory = format!("{} - {}", category, title_case(&fake.word()));
            let dimensions = format!(
                "{}x{}x{}",
                fake.int_range(5, 100),
                fake.int_range(5, 100),
                fake.int_range(5, 100)
            );
            let tag_count = fake.int_range(0, 3) as usize;
            let tags: Vec<&str> = fake
                .pick_distinct_ids(&[0, 1, 2, 3, 4], tag_count)
                .into_iter()
                .map(|i| TAGS[i as usize])
                .collect();

            vec![
                Value::Id(product_id),
                Value::Text(sku),
                Value::Text(fake.catch_phrase()),
                Value::from(brand),
                Value::from(category),
                Value::Text(subcategory),
                Value::Text(fake.text(200)),
                Value::Float(fake.price(5.99, 999.99)),
                Value::Float(fake.price(2.99, 500.00)),
                Value::Float(fake.price(0.1, 50.0)),
                Value::Text(dimensions),
                Value::from(*fake.pick(COLORS)),
                Value::from(*fake.pick(SIZES)),
                Value::from(*fake.pick(MATERIALS)),
                Value::Int(fake.int_range(0, 1000)),
                Value::Int(fake.int_range(10, 100)),
                Value::Int(fake.int_range(1, 50)),
                Value::Text(fake.company()),
                Value::Timestamp(created),
                Value::Timestamp(updated),
                Value::Bool(fake.bool_with_probability(0.9)),
                Value::Bool(fake.bool_with_probability(0.2)),
                Value::Float((fake.int_range(10, 50) as f64) / 10.0),
                Value::Int(fake.int_range(0, 5000)),
                Value::Int(fake.int_range(1, 100_000)),
                Value::Bool(fake.bool_with_probability(0.3)),
                Value::Bool(fake.bool_with_probability(0.25)),
                Value::Int(*fake.pick(WARRANTY_MONTHS)),
                Value::Text(tags.join(",")),
            ]
        })
        .collect()
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
