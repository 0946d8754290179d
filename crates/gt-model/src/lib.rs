#![deny(warnings)]

//! Economic model for GT sweeps: initial-condition policies and the per-window
//! transition.
//!
//! This crate provides:
//! - The four initial-condition policies (file, random-uniform, homogeneous)
//! - The [`Transition`] seam consumed by the sweep driver
//! - [`GtModel`], the reference GT trade rule in exact decimal arithmetic

pub mod initial;
pub mod transition;

pub use initial::{provide, InitialState};
pub use transition::{step, AgentState, GtModel, Transition, WindowRequest};
