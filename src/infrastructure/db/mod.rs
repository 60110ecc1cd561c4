pub mod client;
pub mod listener;
pub mod row_mapper;
pub mod sql_utils;
