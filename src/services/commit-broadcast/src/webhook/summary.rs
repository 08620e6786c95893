//! Plain-text digest of a push, fed into the post generator

use std::fmt::Write;

use crate::models::PushEvent;

const FALLBACK_MAX_COMMITS: usize = 5;

/// Summarize the first `max_commits` commits of a push.
///
/// Non-positive limits fall back to 5. When commits are left out a single
/// trailing line says how many.
pub fn summarize(event: &PushEvent, max_commits: i32) -> String {
    let limit = usize::try_from(max_commits)
        .ok()
        .filter(|n| *n > 0)
        .unwrap_or(FALLBACK_MAX_COMMITS);
    let total = event.commits.len();

    let mut summary = String::new();
    // Writing into a String cannot fail
    let _ = writeln!(summary, "Repository: {}", event.repository.name);
    let _ = writeln!(summary, "Commits: {}", total);
    summary.push('\n');

    for (index, commit) in event.commits.iter().take(limit).enumerate() {
        let _ = writeln!(summary, "Commit {}:", index + 1);
        let _ = writeln!(summary, "Message: {}", commit.message);
        for (label, files) in [
            ("added", &commit.added),
            ("modified", &commit.modified),
            ("removed", &commit.removed),
        ] {
            if !files.is_empty() {
                let _ = writeln!(summary, "Files {}: {}", label, files.len());
            }
        }
        summary.push('\n');
    }

    if total > limit {
        let _ = writeln!(summary, "...and {} more commits", total - limit);
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Commit, Repository};
    use pretty_assertions::assert_eq;

    fn event_with(count: usize) -> PushEvent {
        PushEvent {
            event_kind: "push".to_string(),
            repository: Repository {
                name: "commitcast".to_string(),
                ..Default::default()
            },
            commits: (1..=count)
                .map(|i| Commit {
                    id: format!("c{}", i),
                    message: format!("change {}", i),
                    ..Default::default()
                })
                .collect(),
            git_ref: None,
            pusher: None,
        }
    }

    #[test]
    fn test_exact_format() {
        let mut event = event_with(2);
        event.commits[0].added = vec!["a.rs".to_string()];
        event.commits[0].modified = vec!["b.rs".to_string(), "c.rs".to_string()];
        event.commits[1].removed = vec!["old.rs".to_string()];

        let expected = "Repository: commitcast\n\
                        Commits: 2\n\
                        \n\
                        Commit 1:\n\
                        Message: change 1\n\
                        Files added: 1\n\
                        Files modified: 2\n\
                        \n\
                        Commit 2:\n\
                        Message: change 2\n\
                        Files removed: 1\n\
                        \n";
        assert_eq!(summarize(&event, 5), expected);
    }

    #[test]
    fn test_truncation_adds_single_omission_line() {
        let summary = summarize(&event_with(8), 3);
        assert_eq!(summary.matches("Commit ").count(), 3);
        assert!(summary.contains("Commits: 8\n"));
        assert!(summary.ends_with("...and 5 more commits\n"));
        assert_eq!(summary.matches("more commits").count(), 1);
    }

    #[test]
    fn test_no_omission_line_within_limit() {
        assert!(!summarize(&event_with(5), 5).contains("more commits"));
        assert!(!summarize(&event_with(3), 5).contains("more commits"));
    }

    #[test]
    fn test_non_positive_limit_means_five() {
        let event = event_with(9);
        assert_eq!(summarize(&event, 0), summarize(&event, 5));
        assert_eq!(summarize(&event, -2), summarize(&event, 5));
    }

    #[test]
    fn test_empty_commit_list() {
        assert_eq!(
            summarize(&event_with(0), 5),
            "Repository: commitcast\nCommits: 0\n\n"
        );
    }

    #[test]
    fn test_deterministic() {
        let event = event_with(7);
        assert_eq!(summarize(&event, 4), summarize(&event, 4));
    }
}
