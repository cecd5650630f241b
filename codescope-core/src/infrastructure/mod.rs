//! Infrastructure Layer - persistence adapters

pub mod persistence;
