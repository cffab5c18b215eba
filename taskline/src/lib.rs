//! Durable task lifecycle runner.
//!
//! taskline tracks a work item (EPIC/PBI/SBI) through a fixed workflow
//! (pick -> implement -> review -> done) driven by an external coding
//! agent, and durably records every transition: state snapshots are written
//! atomically (temp file + rename), each transition appends one line to an
//! append-only NDJSON journal, and a health snapshot reflects the most
//! recent turn. The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure lifecycle logic (status machine, task aggregate,
//!   journal normalization). No I/O, deterministic, fully testable in
//!   isolation.
//! - **[`io`]**: Side-effecting operations (atomic writes, journal appends,
//!   health snapshots, config, agent processes). Isolated to enable
//!   scripted fakes in tests.
//!
//! Orchestration modules ([`turn`], [`run`]) coordinate core logic with I/O
//! to implement CLI commands.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod run;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod turn;
