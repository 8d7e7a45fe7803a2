//! Record source for synthgen.
//!
//! Generates seeded, FK-consistent rows for the `users`, `products` and
//! `orders` tables. Identity is not managed here: callers hand in the ids to
//! assign and the parent ids that may be referenced.
//!
//! # Example
//!
//! ```rust
//! use synth_records::{FakeRecordSource, ParentRefs, RecordSource, TableKind};
//!
//! let mut source = FakeRecordSource::new(42);
//! let users = source.generate(TableKind::Users, &[1, 2, 3], &ParentRefs::new());
//! assert_eq!(users.len(), 3);
//! ```

pub mod fake;
pub mod generator;
mod orders;
mod products;
pub mod schema;
mod users;
pub mod value;

pub use generator::{FakeRecordSource, GenContext, GenerateFn, ParentRefs, RecordSource};
pub use schema::{Column, ColumnType, TableKind};
pub use value::{record_id, Record, Value};
