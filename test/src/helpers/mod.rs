pub mod collector;
pub mod records;
