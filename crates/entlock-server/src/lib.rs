//! Entlock server library
//!
//! Configuration loading, logging bootstrap and lifecycle wiring for the
//! `entlock` binary.

pub mod demo;
pub mod model;
pub mod startup;
