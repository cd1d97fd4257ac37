pub mod inference;

pub use inference::InferenceAdapter;
