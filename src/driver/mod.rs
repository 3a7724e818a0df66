//! Driver module: chunked prompt submission and result presentation

mod batch;
mod render;

pub use batch::{BatchDriver, BatchReport};
pub use render::render_results;
