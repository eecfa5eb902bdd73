pub mod aggregate;
pub mod infer;
pub mod score;
pub mod survey;
