//! Git output parsing helpers.

/// Joins stderr and stdout of a failed command, falling back to the exit code.
pub fn format_git_error(stderr: &str, stdout: &str, code: Option<i32>) -> String {
    let stderr = stderr.trim();
    let stdout = stdout.trim();

    match (stderr.is_empty(), stdout.is_empty()) {
        (true, true) => format!("Command failed with exit code {}", code.unwrap_or(-1)),
        (true, false) => stdout.to_string(),
        (false, true) => stderr.to_string(),
        (false, false) => format!("{}\n{}", stderr, stdout),
    }
}

/// Reads the file count from a `N files changed` summary line.
pub fn count_changed_files(output: &str) -> u32 {
    output
        .lines()
        .filter(|line| line.contains("file") && line.contains("changed"))
        .find_map(|line| line.split_whitespace().find_map(|w| w.parse::<u32>().ok()))
        .unwrap_or(0)
}

/// Whether `git status --porcelain` output lists any change.
pub fn has_changes(porcelain: &str) -> bool {
    porcelain.lines().any(|line| !line.trim().is_empty())
}
