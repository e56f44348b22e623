pub mod extractor;
pub mod interval;
pub mod jwt;
pub mod test_utils;
