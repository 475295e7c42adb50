//! Declarative rule evaluation against pull request metadata.

pub mod aggregator;
pub mod matcher;

pub use aggregator::{aggregate, partition, NotificationAggregate, NotificationTargets};
pub use matcher::{CompiledRule, MatchResult, Pattern, PredicateSource};
