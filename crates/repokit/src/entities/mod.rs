//! Example entities and their repositories.
//!
//! Each module declares the entity, its `Field` enum, create/update inputs
//! and a typed repository that adds domain queries on top of the generic
//! `Repository<T>` contract.

pub mod booking;
pub mod transaction;
pub mod user;

pub use booking::{Booking, BookingDraft, BookingRepository, BookingStatus};
pub use transaction::{
    Transaction, TransactionDraft, TransactionRepository, TransactionStats, TransactionStatus,
};
pub use user::{User, UserDraft, UserPatch, UserRepository, UserStatus};
