//! Helpers that do not belong to one schema concern.

pub mod dnf;
