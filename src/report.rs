pub mod layout;
pub mod writer;

pub use layout::{Column, ReportLayout};
pub use writer::ReportWriter;
