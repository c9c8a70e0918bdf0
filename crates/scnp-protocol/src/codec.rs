//! SCNP wire codec.
//!
//! Frame layout (network byte order for multi-byte fields):
//! ```text
//! [kind:1][payload...]
//!
//! Key        (1):   code:u16  flags:u8 (bit7=pressed, bit6=repeated)
//! Movement   (2):   code:u16  value:i32
//! ScreenOut  (3):   flags:u8 (bit7=direction, bit6=side)  height:u16
//! Management (254): hostname bytes, zero-padded to HOSTNAME_LEN
//! Ack        (255): empty
//! ```

use scnp_types::{ScnpPacket, ScreenDirection, ScreenSide, HOSTNAME_LEN};

use crate::error::ProtocolError;

pub const KIND_KEY: u8 = 1;
pub const KIND_MOVEMENT: u8 = 2;
pub const KIND_SCREEN_OUT: u8 = 3;
pub const KIND_MANAGEMENT: u8 = 254;
pub const KIND_ACK: u8 = 255;

const FLAG_PRESSED: u8 = 0x80;
const FLAG_REPEATED: u8 = 0x40;
const FLAG_EGRESS: u8 = 0x80;
const FLAG_RIGHT: u8 = 0x40;

/// Quantization scale for the ScreenOut height field.
const HEIGHT_SCALE: f32 = 65535.0;

/// Encode a packet into a wire frame.
#[must_use]
pub fn encode(packet: &ScnpPacket) -> Vec<u8> {
    match packet {
        ScnpPacket::Key {
            code,
            pressed,
            repeated,
        } => {
            let mut flags = 0u8;
            if *pressed {
                flags |= FLAG_PRESSED;
            }
            if *repeated {
                flags |= FLAG_REPEATED;
            }
            let mut buf = Vec::with_capacity(4);
            buf.push(KIND_KEY);
            buf.extend_from_slice(&code.to_be_bytes());
            buf.push(flags);
            buf
        }
        ScnpPacket::Movement { code, value } => {
            let mut buf = Vec::with_capacity(7);
            buf.push(KIND_MOVEMENT);
            buf.extend_from_slice(&code.to_be_bytes());
            buf.extend_from_slice(&value.to_be_bytes());
            buf
        }
        ScnpPacket::ScreenOut {
            direction,
            side,
            height,
        } => {
            let mut flags = 0u8;
            if *direction == ScreenDirection::Egress {
                flags |= FLAG_EGRESS;
            }
            if *side == ScreenSide::Right {
                flags |= FLAG_RIGHT;
            }
            // Out-of-range heights are clamped to the middle of the screen
            // rather than passed through; tolerates float drift upstream.
            let height = if (0.0..=1.0).contains(height) {
                *height
            } else {
                0.5
            };
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let quantized = (height * HEIGHT_SCALE).round() as u16;
            let mut buf = Vec::with_capacity(4);
            buf.push(KIND_SCREEN_OUT);
            buf.push(flags);
            buf.extend_from_slice(&quantized.to_be_bytes());
            buf
        }
        ScnpPacket::Management { hostname } => {
            let mut buf = vec![0u8; 1 + HOSTNAME_LEN];
            buf[0] = KIND_MANAGEMENT;
            let bytes = hostname.as_bytes();
            let len = bytes.len().min(HOSTNAME_LEN);
            buf[1..=len].copy_from_slice(&bytes[..len]);
            buf
        }
        ScnpPacket::Ack => vec![KIND_ACK],
    }
}

/// Decode a wire frame into a packet.
pub fn decode(bytes: &[u8]) -> Result<ScnpPacket, ProtocolError> {
    let (&kind, payload) = bytes
        .split_first()
        .ok_or_else(|| ProtocolError::Framing("empty frame".to_string()))?;

    match kind {
        KIND_KEY => {
            require_len(payload, 3, "key")?;
            let code = u16::from_be_bytes([payload[0], payload[1]]);
            let flags = payload[2];
            Ok(ScnpPacket::Key {
                code,
                pressed: flags & FLAG_PRESSED != 0,
                repeated: flags & FLAG_REPEATED != 0,
            })
        }
        KIND_MOVEMENT => {
            require_len(payload, 6, "movement")?;
            let code = u16::from_be_bytes([payload[0], payload[1]]);
            let value = i32::from_be_bytes([payload[2], payload[3], payload[4], payload[5]]);
            Ok(ScnpPacket::Movement { code, value })
        }
        KIND_SCREEN_OUT => {
            require_len(payload, 3, "screen-out")?;
            let flags = payload[0];
            let quantized = u16::from_be_bytes([payload[1], payload[2]]);
            Ok(ScnpPacket::ScreenOut {
                direction: if flags & FLAG_EGRESS != 0 {
                    ScreenDirection::Egress
                } else {
                    ScreenDirection::Ingress
                },
                side: if flags & FLAG_RIGHT != 0 {
                    ScreenSide::Right
                } else {
                    ScreenSide::Left
                },
                height: f32::from(quantized) / HEIGHT_SCALE,
            })
        }
        KIND_MANAGEMENT => {
            require_len(payload, HOSTNAME_LEN, "management")?;
            let end = payload[..HOSTNAME_LEN]
                .iter()
                .position(|&b| b == 0)
                .unwrap_or(HOSTNAME_LEN);
            let hostname = String::from_utf8_lossy(&payload[..end]).into_owned();
            Ok(ScnpPacket::Management { hostname })
        }
        KIND_ACK => Ok(ScnpPacket::Ack),
        other => Err(ProtocolError::Framing(format!("unknown packet kind {other}"))),
    }
}

fn require_len(payload: &[u8], needed: usize, kind: &str) -> Result<(), ProtocolError> {
    if payload.len() < needed {
        return Err(ProtocolError::Framing(format!(
            "{kind} payload truncated: need {needed} bytes, got {}",
            payload.len()
        )));
    }
    Ok(())
}
