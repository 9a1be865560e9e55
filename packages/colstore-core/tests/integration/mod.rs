//! Integration test suite.
//!
//! Tests are organized by area:
//! 1. Columns through the public API
//! 2. Row accessors and registry adjustment
//! 3. Handover between groups and threads
//! 4. Typed cells, nulls and links

pub mod column_tests;
pub mod handover_tests;
pub mod helpers;
pub mod link_tests;
pub mod row_accessor_tests;
