//! Run journal for the analyzer.
//!
//! Keeps running totals of what has been analyzed across invocations so
//! `status` can show them without re-reading any sensor data.

pub mod log;

pub use log::{
    create_shared_journal, create_shared_journal_with_persistence, JournalStats, RunJournal,
    SharedRunJournal,
};
