//! Platform package-manager command lines.
//!
//! Install and uninstall run through the same shell path as `run_command`,
//! so the composed line is what the security policy sees and what the
//! operator can audit in the logs.

/// Compose the install command line for the current platform.
#[cfg(target_os = "windows")]
pub fn install_line(program: &str) -> String {
    format!(
        "winget install {program} --silent --accept-package-agreements --accept-source-agreements"
    )
}

/// Compose the install command line for the current platform.
#[cfg(target_os = "macos")]
pub fn install_line(program: &str) -> String {
    format!("brew install {program}")
}

/// Compose the install command line for the current platform.
#[cfg(all(unix, not(target_os = "macos")))]
pub fn install_line(program: &str) -> String {
    format!("apt-get install -y {program}")
}

/// Compose the uninstall command line for the current platform.
#[cfg(target_os = "windows")]
pub fn uninstall_line(program: &str) -> String {
    format!("winget uninstall {program} --silent")
}

/// Compose the uninstall command line for the current platform.
#[cfg(target_os = "macos")]
pub fn uninstall_line(program: &str) -> String {
    format!("brew uninstall {program}")
}

/// Compose the uninstall command line for the current platform.
#[cfg(all(unix, not(target_os = "macos")))]
pub fn uninstall_line(program: &str) -> String {
    format!("apt-get remove -y {program}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_line_names_the_program() {
        let line = install_line("ripgrep");
        assert!(line.contains("ripgrep"));
        assert!(line.contains("install"));
    }

    #[test]
    fn uninstall_line_names_the_program() {
        let line = uninstall_line("ripgrep");
        assert!(line.contains("ripgrep"));
    }
}
