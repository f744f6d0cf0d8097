// libs/review-cell/src/services/mod.rs

pub mod reviews;

pub use reviews::ReviewService;
