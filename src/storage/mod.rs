//! Storage module for the evaluation info table

pub mod table;

pub use table::InfoTable;
