//! Tests for the strata-engine crate.

mod helpers;

mod watch;
