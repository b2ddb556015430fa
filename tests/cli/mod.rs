//! CLI module tests.

mod decoder_test;
mod process_test;
