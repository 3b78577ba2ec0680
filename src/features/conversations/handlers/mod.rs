pub mod chat_handler;
pub mod thread_handler;
