pub mod grid_store;

pub use grid_store::{GridStore, GridView};
