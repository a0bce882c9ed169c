pub mod coordinator;
pub mod document;
pub mod error;
pub mod interval;
pub mod registry;
pub mod schedule;
pub mod sensor;
pub mod view;
