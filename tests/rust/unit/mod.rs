//! Unit test suite: everything here runs without a database.

mod common;
mod data_path_tests;
mod etag_tests;
mod pagination_tests;
mod projection_tests;
mod write_tests;
