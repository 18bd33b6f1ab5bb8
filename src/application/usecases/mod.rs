pub mod get_attempt;
pub mod list_attempts;
pub mod submit_message;
