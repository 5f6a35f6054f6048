pub mod aggregation;
pub mod error;
pub mod func_info;
pub mod generic;
pub mod payload;
pub mod payload_type;
pub mod raw_message;
pub mod startup;
