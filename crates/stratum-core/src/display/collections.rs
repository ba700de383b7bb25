//! Collection wrapper types for displaying groups of domain objects.

use std::fmt;

use crate::models::{Deployment, Plan};

/// Newtype wrapper for displaying a list of deployments, one line each.
///
/// # Examples
///
/// ```rust
/// use stratum_core::display::Deployments;
///
/// assert_eq!(Deployments(vec![]).to_string(), "No deployments found.\n");
/// ```
pub struct Deployments(pub Vec<Deployment>);

impl Deployments {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Deployment> {
        self.0.iter()
    }
}

impl fmt::Display for Deployments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            writeln!(f, "No deployments found.")
        } else {
            for deployment in &self.0 {
                deployment.fmt_summary(f)?;
            }
            Ok(())
        }
    }
}

/// Newtype wrapper for displaying a list of plans, one line each.
pub struct Plans(pub Vec<Plan>);

impl Plans {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for Plans {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            writeln!(f, "No plans found.")
        } else {
            for plan in &self.0 {
                plan.fmt_summary(f)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;

    use super::*;
    use crate::models::{DeploymentStatus, Operation, PlanStatus};

    fn create_test_deployment(id: &str, operation: Operation, status: DeploymentStatus) -> Deployment {
        Deployment {
            id: id.to_string(),
            plan_id: "p-1".to_string(),
            connection_id: "conn-1".to_string(),
            operation,
            storage_prefix: "alice/p-1/v1/".to_string(),
            status,
            output: None,
            error_message: None,
            state_warning: None,
            created_at: Timestamp::from_second(1640995200).unwrap(), // 2022-01-01 00:00:00 UTC
            updated_at: Timestamp::from_second(1640995200).unwrap(),
            completed_at: None,
        }
    }

    #[test]
    fn test_deployments_display() {
        let deployments = Deployments(vec![
            create_test_deployment("d-2", Operation::Destroy, DeploymentStatus::Destroyed),
            create_test_deployment("d-1", Operation::Apply, DeploymentStatus::Success),
        ]);
        let output = format!("{deployments}");

        assert_eq!(output.lines().count(), 2);
        assert!(output.contains("`d-2` destroy ✓ Destroyed"));
        assert!(output.contains("`d-1` apply ✓ Success"));
        // Listings stay compact: no per-deployment headers
        assert!(!output.contains("# Deployment"));
    }

    #[test]
    fn test_plans_display() {
        let plan = Plan {
            id: "p-1".to_string(),
            user_id: "alice".to_string(),
            storage_prefix: "alice/p-1/v3/".to_string(),
            version: 3,
            status: PlanStatus::Generated,
            validation: None,
            created_at: Timestamp::from_second(1640995200).unwrap(),
            updated_at: Timestamp::from_second(1640995200).unwrap(),
        };

        let output = format!("{}", Plans(vec![plan]));
        assert!(output.contains("`p-1` v3 generated (owner: alice"));
        assert_eq!(format!("{}", Plans(vec![])), "No plans found.\n");
    }
}
