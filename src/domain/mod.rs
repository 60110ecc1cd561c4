pub mod event;
pub mod memory;
pub mod ports;
pub mod query;
pub mod row;
pub mod value_objects;
