//! Integration test harness
//!
//! Each module exercises a slice of the crawler against mock servers or
//! in-memory fakes.

mod crawl_tests;
mod transport_tests;
