//! Result wrapper types for displaying operation outcomes.
//!
//! Each wrapper prefixes the affected resource with a one-line summary of
//! what the operation did.

use std::fmt;

use crate::models::{Operation, Plan};

/// Wrapper type for displaying a newly registered plan.
///
/// # Examples
///
/// ```rust
/// use jiff::Timestamp;
/// use stratum_core::{
///     display::Registered,
///     models::{Plan, PlanStatus},
/// };
///
/// let plan = Plan {
///     id: "p-1".to_string(),
///     user_id: "alice".to_string(),
///     storage_prefix: Plan::prefix_for("alice", "p-1", 1),
///     version: 1,
///     status: PlanStatus::Generated,
///     validation: None,
///     created_at: Timestamp::now(),
///     updated_at: Timestamp::now(),
/// };
///
/// let output = Registered(plan).to_string();
/// assert!(output.starts_with("Registered plan p-1 (version 1)"));
/// ```
pub struct Registered(pub Plan);

impl fmt::Display for Registered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Registered plan {} (version {})", self.0.id, self.0.version)?;
        writeln!(f)?;
        write!(f, "{}", self.0)
    }
}

/// Wrapper type for displaying a plan after its source was replaced.
pub struct Revised(pub Plan);

impl fmt::Display for Revised {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let previous = self.0.version.saturating_sub(1);
        writeln!(
            f,
            "Updated plan {} from version {previous} to version {}",
            self.0.id, self.0.version
        )?;
        writeln!(f)?;
        write!(f, "{}", self.0)
    }
}

/// Acknowledgement of an accepted apply or destroy.
pub struct Accepted<'a> {
    pub deployment_id: &'a str,
    pub plan_id: &'a str,
    pub operation: Operation,
}

impl fmt::Display for Accepted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Accepted {} of plan {} as deployment `{}`",
            self.operation, self.plan_id, self.deployment_id
        )
    }
}

/// Deployments failed by a recovery pass.
pub struct Recovered(pub Vec<String>);

impl fmt::Display for Recovered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "No interrupted deployments found.");
        }
        writeln!(f, "Marked {} interrupted deployment(s) as failed:", self.0.len())?;
        writeln!(f)?;
        for id in &self.0 {
            writeln!(f, "- `{id}`")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;

    use super::*;
    use crate::models::PlanStatus;

    fn plan(version: u32) -> Plan {
        Plan {
            id: "p-9".to_string(),
            user_id: "bob".to_string(),
            storage_prefix: Plan::prefix_for("bob", "p-9", version),
            version,
            status: PlanStatus::Generated,
            validation: None,
            created_at: Timestamp::from_second(1640995200).unwrap(),
            updated_at: Timestamp::from_second(1640995200).unwrap(),
        }
    }

    #[test]
    fn test_revised_names_both_versions() {
        let output = Revised(plan(3)).to_string();
        assert!(output.starts_with("Updated plan p-9 from version 2 to version 3"));
        assert!(output.contains("- Prefix: bob/p-9/v3/"));
    }

    #[test]
    fn test_accepted_display() {
        let accepted = Accepted {
            deployment_id: "d-1",
            plan_id: "p-9",
            operation: Operation::Destroy,
        };
        assert_eq!(
            accepted.to_string(),
            "Accepted destroy of plan p-9 as deployment `d-1`\n"
        );
    }

    #[test]
    fn test_recovered_display() {
        assert_eq!(
            Recovered(vec![]).to_string(),
            "No interrupted deployments found.\n"
        );

        let output = Recovered(vec!["d-1".to_string(), "d-2".to_string()]).to_string();
        assert!(output.contains("Marked 2 interrupted deployment(s) as failed:"));
        assert!(output.contains("- `d-2`"));
    }
}
