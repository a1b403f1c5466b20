//! Graph storage boundary.
//!
//! [`GraphBackend`] is the contract; [`InMemoryGraphBackend`] is the default,
//! reference implementation and [`PostgresGraphBackend`] persists the same graph
//! in two relations. Both must give identical answers for identical mutation
//! histories.

pub mod in_memory;
pub mod postgres;
pub mod schema;
pub mod r#trait;

pub use in_memory::InMemoryGraphBackend;
pub use postgres::PostgresGraphBackend;
pub use r#trait::GraphBackend;
