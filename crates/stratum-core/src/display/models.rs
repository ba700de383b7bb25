//! Display implementations for domain models.
//!
//! All output is markdown, rendered by the CLI. Captured Terraform output is
//! always placed in a fenced `text` block so it is shown verbatim.

use std::fmt;

use super::datetime::{Elapsed, LocalDateTime};
use crate::{
    models::{Deployment, DeploymentStatus, Operation, Plan, PlanStatus},
    runner::ValidationResult,
};

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Writes `text` as a fenced block, trimming trailing blank lines.
fn write_fenced(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    writeln!(f, "```text")?;
    writeln!(f, "{}", text.trim_end())?;
    writeln!(f, "```")
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Plan {}", self.id)?;
        writeln!(f)?;

        writeln!(f, "- Owner: {}", self.user_id)?;
        writeln!(f, "- Version: {}", self.version)?;
        writeln!(f, "- Prefix: {}", self.storage_prefix)?;
        writeln!(f, "- Status: {}", self.status)?;
        match &self.validation {
            Some(v) if v.valid => writeln!(f, "- Validation: ✓ valid")?,
            Some(_) => writeln!(f, "- Validation: ✗ invalid")?,
            None => writeln!(f, "- Validation: not validated")?,
        }
        writeln!(f, "- Created: {}", LocalDateTime(&self.created_at))?;
        writeln!(f, "- Updated: {}", LocalDateTime(&self.updated_at))?;

        if let Some(validation) = self.validation.as_ref().filter(|v| !v.valid) {
            if !validation.diagnostics.trim().is_empty() {
                writeln!(f, "\n## Diagnostics")?;
                writeln!(f)?;
                write_fenced(f, &validation.diagnostics)?;
            }
        }

        Ok(())
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.valid {
            writeln!(f, "✓ Configuration is valid")?;
        } else {
            writeln!(f, "✗ Configuration is invalid")?;
        }
        if !self.diagnostics.trim().is_empty() {
            writeln!(f)?;
            write_fenced(f, &self.diagnostics)?;
        }
        Ok(())
    }
}

impl fmt::Display for Deployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Deployment {}", self.id)?;
        writeln!(f)?;

        writeln!(f, "- Plan: {}", self.plan_id)?;
        writeln!(f, "- Operation: {}", self.operation)?;
        writeln!(f, "- Status: {}", self.status.with_icon())?;
        writeln!(f, "- Connection: {}", self.connection_id)?;
        writeln!(f, "- Prefix: {}", self.storage_prefix)?;
        writeln!(f, "- Started: {}", LocalDateTime(&self.created_at))?;
        if let Some(completed_at) = &self.completed_at {
            writeln!(f, "- Completed: {}", LocalDateTime(completed_at))?;
            writeln!(f, "- Duration: {}", Elapsed(&self.created_at, completed_at))?;
        }

        if let Some(error) = &self.error_message {
            writeln!(f, "\n## Error")?;
            writeln!(f)?;
            write_fenced(f, error)?;
        }

        if let Some(warning) = &self.state_warning {
            writeln!(f, "\n## State warning")?;
            writeln!(f)?;
            writeln!(f, "{warning}")?;
        }

        if let Some(output) = self.output.as_deref().filter(|o| !o.trim().is_empty()) {
            writeln!(f, "\n## Output")?;
            writeln!(f)?;
            write_fenced(f, output)?;
        }

        Ok(())
    }
}

impl Deployment {
    /// One-line summary used in listings.
    pub(crate) fn fmt_summary(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "- `{}` {} {} ({})",
            self.id,
            self.operation,
            self.status.with_icon(),
            LocalDateTime(&self.created_at)
        )
    }
}

impl Plan {
    /// One-line summary used in listings.
    pub(crate) fn fmt_summary(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "- `{}` v{} {} (owner: {}, updated {})",
            self.id,
            self.version,
            self.status,
            self.user_id,
            LocalDateTime(&self.updated_at)
        )
    }
}
