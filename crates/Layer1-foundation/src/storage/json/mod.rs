mod store;

pub use store::{load_path, JsonStore};
