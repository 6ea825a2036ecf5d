//! Reference hosts for running a flow outside a UI toolkit.

pub mod cli;
