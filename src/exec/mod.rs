pub mod dag;
pub mod pool;
pub mod scheduler;
pub mod worker;
