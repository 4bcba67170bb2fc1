//! Splitting a command line into an argument vector.
//!
//! There is no quoting, expansion or redirection: words are separated by
//! blanks and taken literally.

/// Longest command line considered, in bytes. The rest is dropped.
pub const MAX_CMD_LEN: usize = 1024;

/// Room for the arguments plus the terminating null of an `argv` array.
pub const MAX_ARGS: usize = 64;

const SEPARATORS: &[char] = &[' ', '\t', '\n', '\r'];

/// Split `line` into at most `MAX_ARGS - 1` words.
///
/// Empty or blank input yields an empty vector.
pub fn split_into_tokens(line: &str) -> Vec<String> {
    truncate(line, MAX_CMD_LEN - 1)
        .split(SEPARATORS)
        .filter(|word| !word.is_empty())
        .take(MAX_ARGS - 1)
        .map(str::to_owned)
        .collect()
}

/// Cut `s` to at most `max` bytes without splitting a character.
fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_command() {
        assert_eq!(split_into_tokens("ls -la /tmp"), vec!["ls", "-la", "/tmp"]);
    }

    #[test]
    fn test_mixed_blanks() {
        assert_eq!(
            split_into_tokens("  sleep\t\t5 \n"),
            vec!["sleep".to_string(), "5".to_string()]
        );
    }

    #[test]
    fn test_blank_input_is_empty() {
        assert!(split_into_tokens("").is_empty());
        assert!(split_into_tokens(" \t \n").is_empty());
    }

    #[test]
    fn test_words_are_literal() {
        assert_eq!(
            split_into_tokens("echo \"a b\" $HOME"),
            vec!["echo", "\"a", "b\"", "$HOME"]
        );
    }

    #[test]
    fn test_argument_count_is_capped() {
        let line = (0..100).map(|i| i.to_string()).collect::<Vec<_>>().join(" ");
        let tokens = split_into_tokens(&line);
        assert_eq!(tokens.len(), MAX_ARGS - 1);
        assert_eq!(tokens.last().map(String::as_str), Some("62"));
    }

    #[test]
    fn test_long_line_is_truncated() {
        let line = format!("echo {}", "x".repeat(2 * MAX_CMD_LEN));
        let tokens = split_into_tokens(&line);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].len(), MAX_CMD_LEN - 1 - "echo ".len());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("aé", 2), "a");
        assert_eq!(truncate("abc", 5), "abc");
    }
}
