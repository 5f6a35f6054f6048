pub mod connection_entry;
pub mod connection_reader;
pub mod owner_index;
