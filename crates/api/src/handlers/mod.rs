pub mod health;
pub mod providers;
pub mod scripts;
pub mod system;
