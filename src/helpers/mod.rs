pub mod chat_context;
pub mod handler_404;
