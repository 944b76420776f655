//! redb table definitions for the team state store.
//!
//! Both tables use team-name `&str` keys and `&[u8]` values holding a
//! JSON-serialized versioned record.

use redb::TableDefinition;

/// Versioned `TeamEnvironmentState` keyed by team name.
pub const TEAMS: TableDefinition<&str, &[u8]> = TableDefinition::new("teams");

/// Versioned `BreakerRecord` keyed by team name.
pub const BREAKERS: TableDefinition<&str, &[u8]> = TableDefinition::new("breakers");
