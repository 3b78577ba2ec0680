pub mod agent;
pub mod conversations;
