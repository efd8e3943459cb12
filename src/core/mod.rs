//! Core object model
//!
//! Content-addressed objects (transactions and blocks), their ids, and the
//! validator that decides whether a received object is stored and announced.

pub mod block;
pub mod object;
pub mod transaction;
pub mod validation;

pub use block::Block;
pub use object::{Object, ObjectId};
pub use transaction::{Outpoint, Transaction, TxInput, TxOutput};
pub use validation::{
    validate_block, validate_object, validate_transaction, BlockOutcome, ObjectKind,
    ObjectOutcome, TransactionOutcome,
};
