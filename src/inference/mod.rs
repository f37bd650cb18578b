pub mod client;
pub mod model;

pub use client::InferenceClient;
pub use model::{Detection, InferenceOutcome};
