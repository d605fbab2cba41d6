//! # Cartpole Controller Library
//!
//! Motion-safety core of the cartpole rig: one or two stepper-driven
//! carriages on a bounded track, commanded by a host over a binary packet
//! link.
//!
//! ## Layers
//!
//! | Layer      | Module          | Context                       |
//! |------------|-----------------|-------------------------------|
//! | Axis       | [`axis`]        | shared by tick and main loop  |
//! | Supervisor | [`supervisor`]  | step tick (timer thread)      |
//! | Homing     | [`homing`]      | main loop                     |
//! | Reactor    | [`reactor`]     | main loop                     |
//! | Experiment | [`experiment`]  | main loop                     |
//! | App        | [`controller`]  | main loop                     |
//!
//! Hardware is reached only through the traits in [`hal`]; [`sim`]
//! provides a deterministic rig for tests, benches and the hosted binary.
//!
//! ## Real-Time Tick
//!
//! The step tick performs no I/O and no allocation. It only `try_lock`s
//! the axes and skips a period rather than waiting for the main loop.

pub mod axis;
pub mod config;
pub mod controller;
pub mod error;
pub mod experiment;
pub mod hal;
pub mod homing;
pub mod link;
pub mod reactor;
pub mod sim;
pub mod supervisor;
