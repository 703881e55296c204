//! Domain types shared between the network layer and its observers.

pub mod connectivity;
pub mod identity;
