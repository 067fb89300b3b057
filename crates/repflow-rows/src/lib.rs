#![forbid(unsafe_code)]
//! repflow-rows: a plain-Rust row backend.
//!
//! Objects expose the `rows` representation. `RowListObject` holds records in
//! memory and can be read any number of times; `RowStreamObject` wraps an
//! iterator and can be read once. `csv_file` opens CSV files as either.
//!
//! `register_all` installs the backend's operations into a context.

pub mod csv_file;
pub mod object;
pub mod ops;
pub mod predicate;

pub use csv_file::{csv_list, csv_source};
pub use object::{rows_of, Record, RowListObject, RowStreamObject, ROWS};
pub use ops::register_all;
