//! # Tic-Tac-Toe
//!
//! Turn-based reference game. Player 1 moves on even turns, player 2 on odd
//! turns; a move writes the player number into `board[playX][playY]`.
//!
//! ```text
//! state:  { players: [addr, addr], turnNum, winner, board: [[u8; 3]; 3] }
//! action: { actionType, playX, playY, winClaim: { winClaimType, idx } }
//! ```
//!
//! `winner` is 0 while the game runs, the player number once won, and 3
//! for a draw.

use sc_03_app_lifecycle::{AppDefinition, AppError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::Address;

pub const STATE_ENCODING: &str =
    "tuple(address[2] players, uint256 turnNum, uint256 winner, uint256[3][3] board)";
pub const ACTION_ENCODING: &str =
    "tuple(uint8 actionType, uint256 playX, uint256 playY, tuple(uint8 winClaimType, uint256 idx) winClaim)";

const DRAW: u64 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicTacToeState {
    pub players: [Address; 2],
    pub turn_num: u64,
    pub winner: u64,
    pub board: [[u8; 3]; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinClaim {
    /// 0 column, 1 row, 2 diagonal, 3 cross diagonal.
    pub win_claim_type: u8,
    pub idx: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicTacToeAction {
    /// 0 play, 1 play and win, 2 play and draw, 3 draw.
    pub action_type: u8,
    pub play_x: usize,
    pub play_y: usize,
    #[serde(default)]
    pub win_claim: WinClaim,
}

fn parse_state(state: &Value) -> Result<TicTacToeState, AppError> {
    let state: TicTacToeState = serde_json::from_value(state.clone())
        .map_err(|e| AppError::InvalidState(e.to_string()))?;
    if state.winner > DRAW || state.board.iter().flatten().any(|cell| *cell > 2) {
        return Err(AppError::InvalidState("cell or winner out of range".to_string()));
    }
    Ok(state)
}

impl TicTacToeState {
    fn player_to_move(&self) -> u8 {
        (self.turn_num % 2) as u8 + 1
    }

    fn is_full(&self) -> bool {
        self.board.iter().flatten().all(|cell| *cell != 0)
    }

    fn play(&mut self, x: usize, y: usize) -> Result<(), AppError> {
        let player = self.player_to_move();
        let cell = self
            .board
            .get_mut(x)
            .and_then(|row| row.get_mut(y))
            .ok_or_else(|| AppError::InvalidAction(format!("cell ({x}, {y}) is off the board")))?;
        if *cell != 0 {
            return Err(AppError::InvalidAction(format!("cell ({x}, {y}) is taken")));
        }
        *cell = player;
        Ok(())
    }

    fn holds_line(&self, player: u8, claim: WinClaim) -> Result<bool, AppError> {
        let cells: [(usize, usize); 3] = match (claim.win_claim_type, claim.idx) {
            (0, col) if col < 3 => [(0, col), (1, col), (2, col)],
            (1, row) if row < 3 => [(row, 0), (row, 1), (row, 2)],
            (2, _) => [(0, 0), (1, 1), (2, 2)],
            (3, _) => [(0, 2), (1, 1), (2, 0)],
            _ => return Err(AppError::InvalidAction("malformed win claim".to_string())),
        };
        Ok(cells.iter().all(|(x, y)| self.board[*x][*y] == player))
    }
}

/// Reference implementation of the tic-tac-toe app definition.
pub struct TicTacToeApp;

impl AppDefinition for TicTacToeApp {
    /// ABI-style: each player left-padded to 32 bytes, then turnNum, winner
    /// and the nine cells as 32-byte big-endian words.
    fn encode_state(&self, state: &Value) -> Result<Vec<u8>, AppError> {
        let state = parse_state(state)?;
        let mut out = Vec::with_capacity(32 * 13);
        for player in &state.players {
            out.extend_from_slice(&[0u8; 12]);
            out.extend_from_slice(player.as_bytes());
        }
        let words = [state.turn_num, state.winner]
            .into_iter()
            .chain(state.board.iter().flatten().map(|cell| u64::from(*cell)));
        for word in words {
            out.extend_from_slice(&[0u8; 24]);
            out.extend_from_slice(&word.to_be_bytes());
        }
        Ok(out)
    }

    fn apply_action(&self, state: &Value, action: &Value) -> Result<Value, AppError> {
        let mut state = parse_state(state)?;
        let action: TicTacToeAction = serde_json::from_value(action.clone())
            .map_err(|e| AppError::InvalidAction(e.to_string()))?;
        if state.winner != 0 {
            return Err(AppError::InvalidAction("game is over".to_string()));
        }

        let player = state.player_to_move();
        match action.action_type {
            0 => state.play(action.play_x, action.play_y)?,
            1 => {
                state.play(action.play_x, action.play_y)?;
                if !state.holds_line(player, action.win_claim)? {
                    return Err(AppError::InvalidAction("win claim does not hold".to_string()));
                }
                state.winner = u64::from(player);
            }
            2 => {
                state.play(action.play_x, action.play_y)?;
                if !state.is_full() {
                    return Err(AppError::InvalidAction("board is not full".to_string()));
                }
                state.winner = DRAW;
            }
            3 => {
                if !state.is_full() {
                    return Err(AppError::InvalidAction("board is not full".to_string()));
                }
                state.winner = DRAW;
            }
            other => {
                return Err(AppError::InvalidAction(format!("unknown action type {other}")));
            }
        }
        state.turn_num = state
            .turn_num
            .checked_add(1)
            .ok_or_else(|| AppError::InvalidState("turn counter overflow".to_string()))?;

        serde_json::to_value(&state).map_err(|e| AppError::InvalidState(e.to_string()))
    }
}
