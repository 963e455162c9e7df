use shared::domain::Verdict;

/// One parsed line of operator input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewCommand {
    Record(Verdict),
    Reset,
    Next,
    Previous,
    Jump(u64),
    ToggleAutoAdvance,
    Status,
    Help,
    Quit,
}

/// Maps a raw input line onto a command. The single-character verdict
/// and movement bindings are fixed; `g <index>` jumps by a sample's
/// stable index rather than its display position.
pub fn parse_command(line: &str) -> Option<ReviewCommand> {
    let line = line.trim();
    match line {
        "+" | "=" => return Some(ReviewCommand::Record(Verdict::Good)),
        "-" => return Some(ReviewCommand::Record(Verdict::Bad)),
        "/" | "]" => return Some(ReviewCommand::Record(Verdict::Poor)),
        "0" | "*" => return Some(ReviewCommand::Record(Verdict::Error)),
        "r" => return Some(ReviewCommand::Reset),
        "n" | "l" => return Some(ReviewCommand::Next),
        "p" | "h" => return Some(ReviewCommand::Previous),
        "a" => return Some(ReviewCommand::ToggleAutoAdvance),
        "s" => return Some(ReviewCommand::Status),
        "?" => return Some(ReviewCommand::Help),
        "q" => return Some(ReviewCommand::Quit),
        _ => {}
    }
    if let Some(rest) = line.strip_prefix('g') {
        if let Ok(index) = rest.trim().parse::<u64>() {
            return Some(ReviewCommand::Jump(index));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_bindings_cover_primary_and_alternate_keys() {
        assert_eq!(parse_command("+"), Some(ReviewCommand::Record(Verdict::Good)));
        assert_eq!(parse_command("="), Some(ReviewCommand::Record(Verdict::Good)));
        assert_eq!(parse_command("-"), Some(ReviewCommand::Record(Verdict::Bad)));
        assert_eq!(parse_command("/"), Some(ReviewCommand::Record(Verdict::Poor)));
        assert_eq!(parse_command("]"), Some(ReviewCommand::Record(Verdict::Poor)));
        assert_eq!(parse_command("0"), Some(ReviewCommand::Record(Verdict::Error)));
        assert_eq!(parse_command("*"), Some(ReviewCommand::Record(Verdict::Error)));
        assert_eq!(parse_command("r"), Some(ReviewCommand::Reset));
    }

    #[test]
    fn movement_bindings_have_vi_style_aliases() {
        assert_eq!(parse_command("n"), Some(ReviewCommand::Next));
        assert_eq!(parse_command("l"), Some(ReviewCommand::Next));
        assert_eq!(parse_command("p"), Some(ReviewCommand::Previous));
        assert_eq!(parse_command("h"), Some(ReviewCommand::Previous));
    }

    #[test]
    fn jump_parses_a_stable_index_and_tolerates_whitespace() {
        assert_eq!(parse_command("g 41"), Some(ReviewCommand::Jump(41)));
        assert_eq!(parse_command("g41"), Some(ReviewCommand::Jump(41)));
        assert_eq!(parse_command("  g 7  "), Some(ReviewCommand::Jump(7)));
        assert_eq!(parse_command("g"), None);
        assert_eq!(parse_command("g -1"), None);
    }

    #[test]
    fn unknown_input_is_rejected() {
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("x"), None);
        assert_eq!(parse_command("good"), None);
    }
}
