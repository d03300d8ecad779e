pub mod health;
pub mod messaging;
