use serde::{Deserialize, Serialize};

/// Movement commands the control panel can issue, with their wire opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveCommand {
    Forward,
    Backward,
    Left,
    Right,
    TurnLeft,
    TurnRight,
}

impl MoveCommand {
    pub const ALL: [MoveCommand; 6] = [
        MoveCommand::Forward,
        MoveCommand::Backward,
        MoveCommand::Left,
        MoveCommand::Right,
        MoveCommand::TurnLeft,
        MoveCommand::TurnRight,
    ];

    /// Look up a logical command name as sent by the GUI. Exact, case-sensitive match.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "forward" => Some(MoveCommand::Forward),
            "backward" => Some(MoveCommand::Backward),
            "left" => Some(MoveCommand::Left),
            "right" => Some(MoveCommand::Right),
            "turn-left" => Some(MoveCommand::TurnLeft),
            "turn-right" => Some(MoveCommand::TurnRight),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MoveCommand::Forward => "forward",
            MoveCommand::Backward => "backward",
            MoveCommand::Left => "left",
            MoveCommand::Right => "right",
            MoveCommand::TurnLeft => "turn-left",
            MoveCommand::TurnRight => "turn-right",
        }
    }

    pub fn opcode(&self) -> u8 {
        match self {
            MoveCommand::Forward => 0x50,
            MoveCommand::Backward => 0x52,
            MoveCommand::Left => 0x54,
            MoveCommand::Right => 0x56,
            MoveCommand::TurnLeft => 0x58,
            MoveCommand::TurnRight => 0x5A,
        }
    }
}

/// Resolve a logical name to its command; `None` for anything outside the table.
pub fn resolve(name: &str) -> Option<MoveCommand> {
    MoveCommand::from_name(name)
}
