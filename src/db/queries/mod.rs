pub mod person;
pub mod request126;
