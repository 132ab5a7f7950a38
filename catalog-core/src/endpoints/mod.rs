pub mod catalog;
pub mod fallback;
pub mod status;
