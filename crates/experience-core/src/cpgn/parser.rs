//! Compact-game line tokenization.
//!
//! One game per line: `{fen,result,move[:score:depth],…}` where result
//! is `w`, `b`, or `d` and moves are long-algebraic with optional
//! engine score and depth fields.

use crate::types::GameResult;

/// One move token, fields still textual except for the parsed numbers.
#[derive(Debug, PartialEq, Eq)]
pub struct MoveToken<'a> {
    pub lan: &'a str,
    pub score: Option<i32>,
    pub depth: Option<i32>,
}

/// A structurally valid game line: FEN, declared result, move tokens.
#[derive(Debug)]
pub struct GameLine<'a> {
    pub fen: &'a str,
    pub result: GameResult,
    pub moves: Vec<MoveToken<'a>>,
}

/// Strip the `{ … }` wrapper; `None` for lines that are not game
/// records (blank lines, headers from other tools).
pub fn unwrap_braces(line: &str) -> Option<&str> {
    let line = line.trim_end();
    if line.len() < 2 || !line.starts_with('{') || !line.ends_with('}') {
        return None;
    }
    Some(&line[1..line.len() - 1])
}

/// Split a game record into FEN, result, and move tokens. `None` means
/// a malformed line (counted as a game error by the importer).
pub fn parse_game_line(record: &str) -> Option<GameLine<'_>> {
    let mut parts = record.split(',');

    let fen = parts.next()?;
    let result = GameResult::from_code(parts.next()?)?;

    let mut moves = Vec::new();
    for token in parts {
        moves.push(parse_move_token(token)?);
    }

    if moves.is_empty() {
        return None;
    }

    Some(GameLine { fen, result, moves })
}

fn parse_move_token(token: &str) -> Option<MoveToken<'_>> {
    let fields: Vec<&str> = token.split(':').collect();
    if fields.len() >= 4 {
        return None;
    }

    // Check annotations and stray line endings ride on the move text.
    let lan = fields[0].trim_end_matches(['+', '#', '\r', '\n']);
    if lan.is_empty() {
        return None;
    }

    let score = match fields.get(1) {
        Some(s) if !s.is_empty() => Some(s.trim().parse::<i32>().ok()?),
        _ => None,
    };
    let depth = match fields.get(2) {
        Some(d) if !d.is_empty() => Some(d.trim().parse::<i32>().ok()?),
        _ => None,
    };

    Some(MoveToken { lan, score, depth })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwraps_braced_lines_only() {
        assert_eq!(unwrap_braces("{a,b,c}"), Some("a,b,c"));
        assert_eq!(unwrap_braces("{a,b,c}\r"), Some("a,b,c"));
        assert_eq!(unwrap_braces("a,b,c"), None);
        assert_eq!(unwrap_braces(""), None);
        assert_eq!(unwrap_braces("{unterminated"), None);
    }

    #[test]
    fn parses_full_game_line() {
        let g = parse_game_line("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1,w,e2e4:35:12,e7e5:-20:11,g1f3")
            .unwrap();
        assert_eq!(g.result, GameResult::WhiteWins);
        assert_eq!(g.moves.len(), 3);
        assert_eq!(
            g.moves[0],
            MoveToken {
                lan: "e2e4",
                score: Some(35),
                depth: Some(12)
            }
        );
        assert_eq!(
            g.moves[2],
            MoveToken {
                lan: "g1f3",
                score: None,
                depth: None
            }
        );
    }

    #[test]
    fn strips_check_and_mate_annotations() {
        let g = parse_game_line("fen,b,d8h4#:-31000:20").unwrap();
        assert_eq!(g.moves[0].lan, "d8h4");
        assert_eq!(g.moves[0].score, Some(-31000));
    }

    #[test]
    fn rejects_malformed_tokens() {
        // Too many fields.
        assert!(parse_game_line("fen,w,e2e4:1:2:3").is_none());
        // Empty move text.
        assert!(parse_game_line("fen,w,+:1:2").is_none());
        // Unknown result code.
        assert!(parse_game_line("fen,x,e2e4").is_none());
        // Non-numeric score.
        assert!(parse_game_line("fen,w,e2e4:abc:3").is_none());
        // No moves at all.
        assert!(parse_game_line("fen,w").is_none());
    }
}
