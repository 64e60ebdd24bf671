mod account;
mod receipt;
mod transaction;

pub use account::*;
pub use receipt::*;
pub use transaction::*;
