pub mod health;
pub mod person;
pub mod request126;
