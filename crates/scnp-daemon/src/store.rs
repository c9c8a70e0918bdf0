//! Flat binary persistence for shortcut and peer lists.
//!
//! Internal round-trip state, not a cross-peer wire format. All multi-byte
//! fields are little-endian. A shortcut record is a step count (`u64`)
//! followed by `(code:i32, value:i32, timeout_ms:i32)` triples, a
//! length-prefixed name and description, and a trailing direction byte.
//! `timeout_ms` of 0 means no timeout.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use scnp_types::{ExitDirection, LinkAddr, Offset, Peer, PeerId, Resolution};

use crate::config::{ShortcutConfig, StepConfig};

const DIRECTION_NONE: u8 = 0;
const DIRECTION_LEFT: u8 = 1;
const DIRECTION_RIGHT: u8 = 2;

/// Upper bound on a length-prefixed string in a store file. A corrupt
/// length prefix must fail as invalid data, not as a giant allocation.
const MAX_STRING_LEN: u64 = 64 * 1024;

/// Write the shortcut list to `path`, replacing any existing file.
pub fn save_shortcuts(path: &Path, shortcuts: &[ShortcutConfig]) -> io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    w.write_all(&(shortcuts.len() as u64).to_le_bytes())?;
    for shortcut in shortcuts {
        w.write_all(&(shortcut.steps.len() as u64).to_le_bytes())?;
        for step in &shortcut.steps {
            w.write_all(&i32::from(step.code).to_le_bytes())?;
            w.write_all(&step.state.to_le_bytes())?;
            let timeout_ms = i32::try_from(step.timeout_ms).unwrap_or(i32::MAX);
            w.write_all(&timeout_ms.to_le_bytes())?;
        }
        write_string(&mut w, &shortcut.name)?;
        write_string(&mut w, &shortcut.description)?;
        w.write_all(&[direction_byte(shortcut.direction)])?;
    }
    w.flush()
}

/// Read a shortcut list previously written by [`save_shortcuts`].
pub fn load_shortcuts(path: &Path) -> io::Result<Vec<ShortcutConfig>> {
    let mut r = BufReader::new(File::open(path)?);
    let count = read_u64(&mut r)?;
    let mut shortcuts = Vec::with_capacity(usize::try_from(count).unwrap_or(0));
    for _ in 0..count {
        let step_count = read_u64(&mut r)?;
        let mut steps = Vec::with_capacity(usize::try_from(step_count).unwrap_or(0));
        for _ in 0..step_count {
            let code = read_i32(&mut r)?;
            let state = read_i32(&mut r)?;
            let timeout_ms = read_i32(&mut r)?;
            steps.push(StepConfig {
                code: u16::try_from(code)
                    .map_err(|_| invalid(format!("key code out of range: {code}")))?,
                state,
                timeout_ms: u32::try_from(timeout_ms)
                    .map_err(|_| invalid(format!("negative timeout: {timeout_ms}")))?,
            });
        }
        let name = read_string(&mut r)?;
        let description = read_string(&mut r)?;
        let direction = parse_direction(read_u8(&mut r)?)?;
        shortcuts.push(ShortcutConfig {
            name,
            description,
            direction,
            steps,
        });
    }
    Ok(shortcuts)
}

/// Write the peer list to `path`, replacing any existing file.
pub fn save_peers(path: &Path, peers: &[Peer]) -> io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    w.write_all(&(peers.len() as u64).to_le_bytes())?;
    for peer in peers {
        w.write_all(&peer.id.0.to_le_bytes())?;
        w.write_all(&[u8::from(peer.is_local), u8::from(peer.has_focus)])?;
        write_string(&mut w, &peer.display_name)?;
        w.write_all(&peer.link_addr.octets())?;
        w.write_all(&peer.resolution.width.to_le_bytes())?;
        w.write_all(&peer.resolution.height.to_le_bytes())?;
        w.write_all(&peer.offset.x.to_le_bytes())?;
        w.write_all(&peer.offset.y.to_le_bytes())?;
    }
    w.flush()
}

/// Read a peer list previously written by [`save_peers`].
pub fn load_peers(path: &Path) -> io::Result<Vec<Peer>> {
    let mut r = BufReader::new(File::open(path)?);
    let count = read_u64(&mut r)?;
    let mut peers = Vec::with_capacity(usize::try_from(count).unwrap_or(0));
    for _ in 0..count {
        let id = PeerId(read_u32(&mut r)?);
        let is_local = read_u8(&mut r)? != 0;
        let has_focus = read_u8(&mut r)? != 0;
        let display_name = read_string(&mut r)?;
        let mut octets = [0u8; 6];
        r.read_exact(&mut octets)?;
        let width = read_u32(&mut r)?;
        let height = read_u32(&mut r)?;
        let x = read_i32(&mut r)?;
        let y = read_i32(&mut r)?;
        peers.push(Peer {
            id,
            is_local,
            has_focus,
            display_name,
            link_addr: LinkAddr::new(octets),
            resolution: Resolution::new(width, height),
            offset: Offset { x, y },
        });
    }
    Ok(peers)
}

fn direction_byte(direction: ExitDirection) -> u8 {
    match direction {
        ExitDirection::None => DIRECTION_NONE,
        ExitDirection::Left => DIRECTION_LEFT,
        ExitDirection::Right => DIRECTION_RIGHT,
    }
}

fn parse_direction(byte: u8) -> io::Result<ExitDirection> {
    match byte {
        DIRECTION_NONE => Ok(ExitDirection::None),
        DIRECTION_LEFT => Ok(ExitDirection::Left),
        DIRECTION_RIGHT => Ok(ExitDirection::Right),
        other => Err(invalid(format!("unknown direction byte: {other}"))),
    }
}

fn write_string(w: &mut impl Write, s: &str) -> io::Result<()> {
    w.write_all(&(s.len() as u64).to_le_bytes())?;
    w.write_all(s.as_bytes())
}

fn read_string(r: &mut impl Read) -> io::Result<String> {
    let len = read_u64(r)?;
    if len > MAX_STRING_LEN {
        return Err(invalid(format!("string length {len} exceeds the store limit")));
    }
    let len = usize::try_from(len).map_err(|_| invalid("string length overflow"))?;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|_| invalid("string is not valid utf-8"))
}

fn read_u8(r: &mut impl Read) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u32(r: &mut impl Read) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_i32(r: &mut impl Read) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_u64(r: &mut impl Read) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn invalid(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}
