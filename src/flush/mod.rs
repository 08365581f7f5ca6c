pub mod jsonl;

pub use jsonl::results_to_jsonl;
