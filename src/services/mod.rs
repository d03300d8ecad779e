pub mod dispatch_queue;
pub mod health_service;
pub mod message_service;
pub mod message_store;
pub mod send_handler;
