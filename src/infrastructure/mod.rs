pub mod config;
#[cfg(feature = "postgres")]
pub mod db;
