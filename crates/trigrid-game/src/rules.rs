//! Win detection, behind a trait so the rule can vary per session.

/// Decides whether `occupant` has won on the given board.
///
/// Cells hold raw player ids, `0` meaning empty. Implementations must
/// not mutate and must work for any square board size.
pub trait WinRule: Send + Sync {
    fn is_win(&self, board: &[Vec<u32>], occupant: u32) -> bool;
}

/// The standard rule: a full row, full column, or full diagonal wins.
#[derive(Debug, Default, Clone, Copy)]
pub struct LineWin;

impl WinRule for LineWin {
    fn is_win(&self, board: &[Vec<u32>], occupant: u32) -> bool {
        let n = board.len();
        if n == 0 || occupant == 0 {
            return false;
        }

        let row_win = (0..n).any(|r| (0..n).all(|c| board[r][c] == occupant));
        let col_win = (0..n).any(|c| (0..n).all(|r| board[r][c] == occupant));
        let diag_win = (0..n).all(|i| board[i][i] == occupant)
            || (0..n).all(|i| board[i][n - 1 - i] == occupant);

        row_win || col_win || diag_win
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(cells: &[&[u32]]) -> Vec<Vec<u32>> {
        cells.iter().map(|row| row.to_vec()).collect()
    }

    #[test]
    fn test_is_win_empty_board_is_not_a_win() {
        let b = board(&[&[0, 0, 0], &[0, 0, 0], &[0, 0, 0]]);
        assert!(!LineWin.is_win(&b, 1));
    }

    #[test]
    fn test_is_win_detects_each_row() {
        for r in 0..3 {
            let mut b = board(&[&[0, 0, 0], &[0, 0, 0], &[0, 0, 0]]);
            b[r] = vec![7, 7, 7];
            assert!(LineWin.is_win(&b, 7), "row {r}");
        }
    }

    #[test]
    fn test_is_win_detects_each_column() {
        for c in 0..3 {
            let mut b = board(&[&[0, 0, 0], &[0, 0, 0], &[0, 0, 0]]);
            for r in 0..3 {
                b[r][c] = 7;
            }
            assert!(LineWin.is_win(&b, 7), "column {c}");
        }
    }

    #[test]
    fn test_is_win_detects_both_diagonals() {
        let main = board(&[&[7, 0, 0], &[0, 7, 0], &[0, 0, 7]]);
        assert!(LineWin.is_win(&main, 7));

        let anti = board(&[&[0, 0, 7], &[0, 7, 0], &[7, 0, 0]]);
        assert!(LineWin.is_win(&anti, 7));
    }

    #[test]
    fn test_is_win_line_of_the_opponent_does_not_count() {
        let b = board(&[&[5, 5, 5], &[0, 7, 0], &[7, 0, 0]]);
        assert!(LineWin.is_win(&b, 5));
        assert!(!LineWin.is_win(&b, 7));
    }

    #[test]
    fn test_is_win_mixed_line_is_not_a_win() {
        let b = board(&[&[7, 5, 7], &[0, 0, 0], &[0, 0, 0]]);
        assert!(!LineWin.is_win(&b, 7));
    }

    #[test]
    fn test_is_win_empty_occupant_never_wins() {
        // A board full of empties must not count zero as a winner.
        let b = board(&[&[0, 0, 0], &[0, 0, 0], &[0, 0, 0]]);
        assert!(!LineWin.is_win(&b, 0));
    }

    #[test]
    fn test_is_win_works_on_larger_boards() {
        let mut b = vec![vec![0u32; 4]; 4];
        for c in 0..4 {
            b[2][c] = 9;
        }
        assert!(LineWin.is_win(&b, 9));

        b[2][3] = 0;
        assert!(!LineWin.is_win(&b, 9));
    }
}
