mod helpers;
mod manifest_tests;
mod read_tests;
