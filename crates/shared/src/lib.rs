//! Types shared between the review client and the review service:
//! the sample domain model, the wire protocol, and the error taxonomy.

pub mod domain;
pub mod error;
pub mod protocol;
