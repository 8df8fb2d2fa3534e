use crate::Opcode;

/// Encoded size of every actuator command.
pub const FRAME_LEN: usize = 7;

const TERMINATOR: [u8; 2] = [b'\r', b'\n'];

/// Jaw position limits (radians) accepted by `POSITION_CTRL`.
pub const POSITION_MIN: f32 = 0.0;
pub const POSITION_MAX: f32 = 1.68;

/// A single 7-byte actuator command: opcode, f32 LE payload, CR LF.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CommandFrame([u8; FRAME_LEN]);

impl CommandFrame {
    pub fn new(opcode: Opcode, value: f32) -> Self {
        Self(encode_command(opcode, value))
    }

    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }

    pub fn opcode(&self) -> Option<Opcode> {
        Opcode::from_code(self.0[0])
    }

    pub fn value(&self) -> f32 {
        f32::from_le_bytes([self.0[1], self.0[2], self.0[3], self.0[4]])
    }
}

pub fn encode_command(opcode: Opcode, value: f32) -> [u8; FRAME_LEN] {
    let mut out = [0u8; FRAME_LEN];
    out[0] = opcode.code();
    out[1..5].copy_from_slice(&value.to_le_bytes());
    out[5..].copy_from_slice(&TERMINATOR);
    out
}

/// Clamp a requested jaw angle into the actuator's travel.
///
/// NaN maps to the upper limit, matching how the bench tool has always handled it.
pub fn clamp_position(angle: f32) -> f32 {
    if angle.is_nan() {
        return POSITION_MAX;
    }
    angle.clamp(POSITION_MIN, POSITION_MAX)
}
