pub mod frame;
pub mod registry;
pub mod vda5050;
