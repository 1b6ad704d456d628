//! The decision produced by policy evaluation.

/// The outcome of evaluating a command against the security policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyVerdict {
    /// The command may execute.
    Allow,
    /// The command must not execute.
    Deny {
        /// Why the command was denied (the matched pattern, or "malformed").
        reason: String,
    },
    /// The command may execute only after out-of-band approval.
    RequireConfirmation,
}

impl PolicyVerdict {
    /// Create a Deny verdict for a matched blocked pattern.
    pub fn matched(pattern: &str) -> Self {
        PolicyVerdict::Deny {
            reason: format!("matched '{pattern}'"),
        }
    }

    /// Whether this verdict permits execution without further steps.
    pub fn is_allow(&self) -> bool {
        matches!(self, PolicyVerdict::Allow)
    }
}

impl std::fmt::Display for PolicyVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyVerdict::Allow => write!(f, "allow"),
            PolicyVerdict::Deny { reason } => write!(f, "deny ({reason})"),
            PolicyVerdict::RequireConfirmation => write!(f, "require confirmation"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matched_formats_reason() {
        let verdict = PolicyVerdict::matched("format");
        assert_eq!(
            verdict,
            PolicyVerdict::Deny {
                reason: "matched 'format'".into()
            }
        );
        assert!(!verdict.is_allow());
    }

    #[test]
    fn display_forms() {
        assert_eq!(PolicyVerdict::Allow.to_string(), "allow");
        assert_eq!(
            PolicyVerdict::matched("mkfs").to_string(),
            "deny (matched 'mkfs')"
        );
        assert_eq!(
            PolicyVerdict::RequireConfirmation.to_string(),
            "require confirmation"
        );
    }
}
