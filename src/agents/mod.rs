pub mod registry;
pub mod spawner;
