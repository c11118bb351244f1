//! # Fork-Join Frame Synchronization
//!
//! ## The Problem
//!
//! ```text
//! Worker thread:  simulate frame N+1  (physics, scripts, bus)
//! Main thread:    render frame N      (reads last synced transforms)
//! ```
//!
//! Both phases run at once, and the transform sync that follows must see
//! the finished simulation.
//!
//! ## The Solution: Ownership Hand-off
//!
//! The simulation state is *moved* to a persistent worker at the fork and
//! *moved back* at the join. Nothing is shared while the frame is in
//! flight, so nothing needs a lock, and the join is the barrier before sync.

mod frame_worker;

pub use frame_worker::FrameWorker;
