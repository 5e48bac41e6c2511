pub mod export;
pub mod summary;
