//! Built-in blocked-pattern set.
//!
//! Used whenever the configuration supplies no patterns of its own, so a
//! fresh install never runs with an empty deny list. Patterns are matched
//! case-insensitively as substrings of the realized operation string.

/// Destructive operations no remote decision-maker should be able to
/// trigger without an operator editing the configuration first.
pub const DEFAULT_BLOCKED_PATTERNS: &[&str] = &[
    "format c:",
    "rm -rf /",
    "mkfs",
    "dd if=",
    "del /f /s /q c:\\",
    "reg delete hklm",
    "shutdown",
    "diskpart",
    "cipher /w",
    ":(){",
];
