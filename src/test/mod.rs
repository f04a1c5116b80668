pub mod utils;

mod db;
mod progress;

pub use utils::test_utils;
