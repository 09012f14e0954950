//! Turns a push event into chat lines

use crate::push::PushEvent;

/// Most recent commits listed per push, to keep large pushes from flooding a room.
pub const MAX_COMMIT_LINES: usize = 3;

/// Summary line followed by up to [`MAX_COMMIT_LINES`] commit lines, newest first.
pub fn render_lines(event: &PushEvent) -> Vec<String> {
    let verb = if event.forced { "force-pushed" } else { "pushed" };
    let noun = if event.commit_count == 1 {
        "commit"
    } else {
        "commits"
    };

    let mut lines = Vec::with_capacity(1 + event.commits.len().min(MAX_COMMIT_LINES));
    lines.push(format!(
        "[{}] {} {} {} {} to {}:",
        event.repo_short_name, event.pusher_name, verb, event.commit_count, noun, event.branch
    ));

    // Bounded by the delivered list, not commit_count, which may be larger.
    for commit in event.commits.iter().rev().take(MAX_COMMIT_LINES) {
        lines.push(format!(
            "{}/{} {} {}: {}",
            event.repo_short_name,
            event.branch,
            commit.short_id(),
            commit.committer_name,
            commit.title()
        ));
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::Commit;

    fn event(forced: bool, commit_count: i64, ids: &[&str]) -> PushEvent {
        PushEvent {
            repo_short_name: "foo".into(),
            repo_full_name: "alice/foo".into(),
            pusher_name: "alice".into(),
            forced,
            commit_count,
            branch: "main".into(),
            commits: ids
                .iter()
                .map(|id| Commit {
                    id: id.to_string(),
                    message: format!("message {}\nsecond line", &id[..2]),
                    committer_name: "Alice".into(),
                })
                .collect(),
            link: None,
        }
    }

    #[test]
    fn renders_single_commit_push() {
        let lines = render_lines(&event(false, 1, &["abcdef1234567"]));
        assert_eq!(
            lines,
            vec![
                "[foo] alice pushed 1 commit to main:".to_string(),
                "foo/main abcdef1 Alice: message ab".to_string(),
            ]
        );
    }

    #[test]
    fn force_push_changes_verb() {
        let lines = render_lines(&event(true, 2, &["c0aaaaaaa", "c1aaaaaaa"]));
        assert_eq!(lines[0], "[foo] alice force-pushed 2 commits to main:");
    }

    #[test]
    fn shows_three_newest_commits_newest_first() {
        let lines = render_lines(&event(
            false,
            4,
            &["c0aaaaaaa", "c1aaaaaaa", "c2aaaaaaa", "c3aaaaaaa"],
        ));
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("foo/main c3aaaaa "));
        assert!(lines[2].starts_with("foo/main c2aaaaa "));
        assert!(lines[3].starts_with("foo/main c1aaaaa "));
    }

    #[test]
    fn line_count_follows_delivered_commits() {
        for (count, ids) in [
            (0, vec![]),
            (1, vec!["c0aaaaaaa"]),
            (2, vec!["c0aaaaaaa", "c1aaaaaaa"]),
            (20, vec!["c0aaaaaaa", "c1aaaaaaa"]),
            (5, vec!["c0aaaaaaa", "c1aaaaaaa", "c2aaaaaaa", "c3aaaaaaa", "c4aaaaaaa"]),
        ] {
            let lines = render_lines(&event(false, count, &ids));
            assert_eq!(lines.len(), 1 + ids.len().min(MAX_COMMIT_LINES));
        }
    }

    #[test]
    fn zero_commits_is_plural() {
        let lines = render_lines(&event(false, 0, &[]));
        assert_eq!(lines, vec!["[foo] alice pushed 0 commits to main:".to_string()]);
    }

    #[test]
    fn message_without_line_break_is_used_whole() {
        let mut ev = event(false, 1, &["abcdef1234567"]);
        ev.commits[0].message = "one liner".into();
        assert_eq!(render_lines(&ev)[1], "foo/main abcdef1 Alice: one liner");
    }
}
