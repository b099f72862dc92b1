pub mod layout;
pub mod query;
pub mod store;

// Re-export key types
pub use query::metric_id_for;
pub use store::Mdb;
