pub mod cache;
pub mod embedding;
pub mod profile;
pub mod recommendation;
pub mod store;
pub mod tracking;
pub mod training;
