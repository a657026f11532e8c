pub mod account;
pub mod call_frame;
pub mod constants;
pub mod db;
pub mod environment;
pub mod errors;
pub mod gas_cost;
pub mod memory;
pub mod opcode_handlers;
pub mod opcodes;
pub mod precompiles;
pub mod revision;
pub mod storage_status;
pub mod transaction;
pub mod utils;
pub mod vm;

pub use account::*;
pub use environment::*;
pub use revision::Revision;
pub use vm::VM;
