pub mod audit;
pub mod health;
pub mod role_assignments;
