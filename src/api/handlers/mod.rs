pub mod fallback;
pub mod health;
pub mod hello;
pub mod users;
