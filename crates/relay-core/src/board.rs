//! Static opening layout.
//!
//! The relay never reads or validates moves against the board; it is held
//! as inert state so clients can be handed a known starting position.
//! Uppercase codes are the side that moves first, lowercase the other.

/// One square: a piece code or empty.
pub type Square = Option<char>;

/// Number of squares on the board.
pub const SQUARES: usize = 64;

const BACK_RANK_UPPER: [char; 8] = ['R', 'N', 'B', 'K', 'Q', 'B', 'N', 'R'];
const BACK_RANK_LOWER: [char; 8] = ['r', 'n', 'b', 'q', 'k', 'b', 'n', 'r'];

/// Fixed 64-square layout, rank by rank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board {
    squares: [Square; SQUARES],
}

impl Board {
    /// The single opening layout.
    pub fn initial() -> Self {
        let mut squares = [None; SQUARES];
        for file in 0..8 {
            squares[file] = Some(BACK_RANK_UPPER[file]);
            squares[8 + file] = Some('P');
            squares[48 + file] = Some('p');
            squares[56 + file] = Some(BACK_RANK_LOWER[file]);
        }
        Self { squares }
    }

    /// All squares in rank order.
    pub fn squares(&self) -> &[Square; SQUARES] {
        &self.squares
    }

    /// Number of squares holding a piece.
    pub fn occupied(&self) -> usize {
        self.squares.iter().filter(|s| s.is_some()).count()
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::initial()
    }
}
