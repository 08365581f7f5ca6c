mod load;
mod migrate;

pub use load::{load_state, save_state};
pub use migrate::migrate;
