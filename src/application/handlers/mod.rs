pub mod message_dispatcher;
