pub mod engine;
pub mod handlers;
pub mod services;
pub mod usecases;
