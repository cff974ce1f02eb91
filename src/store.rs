pub mod memory;
pub mod models;
pub mod postgres;
pub mod source;

pub use memory::InMemoryRecordSource;
pub use postgres::PgRecordSource;
pub use source::RecordSource;
