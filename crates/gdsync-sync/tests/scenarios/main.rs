//! Engine scenarios for gdsync-sync
//!
//! Runs the full engine (planner, runner, retry, cache) against an
//! in-memory remote store and a temporary local tree.


mod test_concurrency;
mod test_failures;
mod test_reconcile;
