//! Internal utilities for the Vessel VST3 bridge.
//!
//! This crate provides low-level helpers shared between `vessel-core` and
//! `vessel-vst3`. Everything here is `const fn` where possible and has zero
//! external dependencies.
//!
//! # Contents
//!
//! - [`fnv1a_32`] - FNV-1a hash of a string, used for stable parameter ids
//! - [`fnv1a_64`] - FNV-1a hash of raw bytes, used to key interned strings

pub mod hash;

pub use hash::{fnv1a_32, fnv1a_64};
