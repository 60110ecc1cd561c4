pub mod contact;
pub mod monitoring;
pub mod orders;
pub mod sync;
