//! Record source: turns reserved ids (plus parent references) into rows.

use crate::fake::FakeData;
use crate::schema::TableKind;
use crate::value::Record;
use crate::{orders, products, users};
use chrono::{NaiveDateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;

/// Referenceable ids per parent table, as sampled from the ledger
pub type ParentRefs = BTreeMap<TableKind, Vec<u64>>;

/// Signature shared by every per-table generator
pub type GenerateFn = fn(&mut GenContext, &[u64], &ParentRefs) -> Vec<Record>;

/// Mutable state threaded through per-table generators
pub struct GenContext {
    pub fake: FakeData<StdRng>,
    /// Reference "now" for all relative dates in a batch
    pub now: NaiveDateTime,
}

impl TableKind {
    /// Generator function for this table
    pub fn generator(&self) -> GenerateFn {
        match self {
            TableKind::Users => users::generate,
            TableKind::Products => products::generate,
            TableKind::Orders => orders::generate,
        }
    }
}

/// Produces one record per requested id.
///
/// Implementations must emit exactly `ids.len()` records, in `ids` order,
/// and may only use foreign keys present in `parent_refs`.
pub trait RecordSource {
    fn generate(&mut self, table: TableKind, ids: &[u64], parent_refs: &ParentRefs) -> Vec<Record>;
}

/// Seeded record source backed by the `fake` crate
pub struct FakeRecordSource {
    ctx: GenContext,
}

impl FakeRecordSource {
    pub fn new(seed: u64) -> Self {
        Self::with_now(seed, Utc::now().naive_utc())
    }

    /// Fix the reference time (useful for reproducible output)
    pub fn with_now(seed: u64, now: NaiveDateTime) -> Self {
        Self {
            ctx: GenContext {
                fake: FakeData::new(StdRng::seed_from_u64(seed)),
                now,
            },
        }
    }
}

impl RecordSource for FakeRecordSource {
    fn generate(&mut self, table: TableKind, ids: &[u64], parent_refs: &ParentRefs) -> Vec<Record> {
        (table.generator())(&mut self.ctx, ids, parent_refs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{record_id, Value};
    use chrono::NaiveDate;

    fn fixed_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 5, 30)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap()
    }

    fn parents() -> ParentRefs {
        let mut refs = ParentRefs::new();
        refs.insert(TableKind::Users, (1..=20).collect());
        refs.insert(TableKind::Products, (100..=110).collect());
        refs
    }

    #[test]
    fn test_every_table_matches_its_schema() {
        let mut source = FakeRecordSource::with_now(42, fixed_now());
        let ids: Vec<u64> = (1..=25).collect();
        for table in TableKind::ALL {
            let rows = source.generate(table, &ids, &parents());
            assert_eq!(rows.len(), ids.len());
            for (row, id) in rows.iter().zip(&ids) {
                assert_eq!(row.len(), table.columns().len(), "{}", table);
                assert_eq!(record_id(row), Some(*id));
                for (value, column) in row.iter().zip(table.columns()) {
                    if value.is_null() {
                        assert!(column.nullable, "{}.{} is not nullable", table, column.name);
                    }
                }
            }
        }
    }

    #[test]
    fn test_same_seed_same_rows() {
        let ids: Vec<u64> = (1..=10).collect();
        let a = FakeRecordSource::with_now(7, fixed_now()).generate(TableKind::Users, &ids, &ParentRefs::new());
        let b = FakeRecordSource::with_now(7, fixed_now()).generate(TableKind::Users, &ids, &ParentRefs::new());
        assert_eq!(a, b);
    }

    #[test]
    fn test_orders_only_reference_given_parents() {
        let mut source = FakeRecordSource::with_now(1, fixed_now());
        let refs = parents();
        let ids: Vec<u64> = (1..=200).collect();
        let rows = source.generate(TableKind::Orders, &ids, &refs);

        let user_idx = TableKind::Orders.column_index("user_id").unwrap();
        let products_idx = TableKind::Orders.column_index("product_ids").unwrap();
        for row in &rows {
            let user_id = row[user_idx].as_id().unwrap();
            assert!(refs[&TableKind::Users].contains(&user_id));

            let product_ids = row[products_idx].as_text().unwrap();
            for id in product_ids.split(',') {
                let id: u64 = id.parse().unwrap();
                assert!(refs[&TableKind::Products].contains(&id));
            }
        }
    }

    #[test]
    fn test_order_totals_add_up() {
        let mut source = FakeRecordSource::with_now(5, fixed_now());
        let rows = source.generate(TableKind::Orders, &[1, 2, 3, 4, 5], &parents());
        let get = |row: &Record, name: &str| {
            row[TableKind::Orders.column_index(name).unwrap()]
                .as_float()
                .unwrap()
        };
        for row in &rows {
            let expected = get(row, "subtotal_amount") + get(row, "tax_amount")
                + get(row, "shipping_cost")
                - get(row, "discount_amount");
            assert!((get(row, "total_amount") - expected).abs() < 0.02);
            assert_eq!(row[16], Value::Text("USD".to_string()));
        }
    }
}
