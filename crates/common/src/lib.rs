pub mod constants;
pub mod merkle;
pub mod serde_utils;
pub mod types;
pub mod utils;

pub use ethereum_types::{Address, Bloom, BloomInput, H160, H256, U256};
