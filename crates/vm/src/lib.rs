//! # uevm-vm
//!
//! A pure Rust implementation of an Ethereum-style virtual machine with
//! post-Constantinople semantics.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                           VM                                │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │  CallFrame  │  │   Memory    │  │       Stack         │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! │                                                             │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │  GasTable   │  │ Precompiles │  │    Environment      │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         StateDb                             │
//! │        (journaled accounts, storage, logs, refunds)         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key components
//!
//! - [`word::Word256`]: the 256-bit arithmetic kernel every instruction
//!   runs on
//! - [`vm::Vm`]: the dispatch loop and call-frame recursion
//! - [`db::StateDb`]: account state with snapshot/revert journaling
//! - [`state_transition`]: the transaction applicator
//! - [`tracing`]: opcode-level execution observers
//!
//! ## Internal words vs. boundary integers
//!
//! The interpreter does all arithmetic on [`word::Word256`], a four-limb
//! little-endian fixed-width integer implemented in this crate. At the
//! boundaries (accounts, storage, fixtures) values travel as
//! `ethereum_types::U256`/`H256`; conversions are plain limb copies.

pub mod call_frame;
pub mod constants;
pub mod db;
pub mod environment;
pub mod errors;
pub mod gas_cost;
pub mod jumpdest;
pub mod memory;
pub mod opcode_handlers;
pub mod opcodes;
pub mod precompiles;
pub mod stack;
pub mod state_transition;
pub mod tracing;
pub mod utils;
pub mod vm;
pub mod word;
pub mod word_pool;

pub use environment::Environment;
pub use word::Word256;
