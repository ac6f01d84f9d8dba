//! Model components.
pub mod mobilenet;
