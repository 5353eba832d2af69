pub mod error;
pub mod filing;
pub mod fsutil;
pub mod ingest;
pub mod normalize;
