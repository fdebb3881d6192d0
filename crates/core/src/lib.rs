//! `atelier-core`: domain foundation building blocks.
//!
//! Pure domain primitives shared by the sizing engine and its infrastructure.
//! Nothing in here performs IO.

pub mod aggregate;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, TenantId};
pub use value_object::ValueObject;
