//! Object headers: group/variation/qualifier plus the range field.
//!
//! The walk is structural. Item data is consumed only for variations with
//! a derivable width; anything else attaches to its header opaquely and
//! ends the walk, which is all a wire dissector needs.

use std::fmt;

use serde::Serialize;

use super::AppError;

/// Range field of an object header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Range {
    /// Qualifier 0x06: all points of the group
    All,
    /// A count-of-items range
    Count(u32),
    /// A start/stop index range
    Span { start: u32, stop: u32 },
}

impl Range {
    /// Number of items covered, where derivable
    pub fn count(&self) -> Option<u32> {
        match *self {
            Range::All => None,
            Range::Count(n) => Some(n),
            // construction guarantees start <= stop; a full-width span
            // still must not wrap
            Range::Span { start, stop } => (stop - start).checked_add(1),
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Range::All => write!(f, "all"),
            Range::Count(n) => write!(f, "cnt={}", n),
            Range::Span { start, stop } => write!(f, "#{}..{}", start, stop),
        }
    }
}

/// One object header with its (possibly opaque) item data
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectHeader {
    pub group: u8,
    pub variation: u8,
    pub qualifier: u8,
    pub range: Range,
    pub data: Vec<u8>,
}

impl fmt::Display for ObjectHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "g{}v{} qc={:02x} {}",
            self.group, self.variation, self.qualifier, self.range
        )?;
        if !self.data.is_empty() {
            write!(f, " data[{}]", self.data.len())?;
        }
        Ok(())
    }
}

/// Object groups this decoder recognizes: binary and double-bit inputs,
/// binary/analog outputs, counters, analog inputs, times, classes, file
/// transfer, IIN bits, octet strings.
const KNOWN_GROUPS: &[u8] = &[
    1, 2, 3, 4, 10, 11, 12, 13, 20, 21, 22, 23, 30, 31, 32, 33, 34, 40, 41, 42, 43, 50, 51, 52,
    60, 70, 80, 81, 110, 111, 112, 113,
];

/// Total item-data octets for `count` items, where the variation implies
/// a width. `None` means the data is not sizeable here and stays opaque.
fn object_data_len(group: u8, variation: u8, count: u32) -> Option<usize> {
    let count = count as usize;
    match (group, variation) {
        // packed single-bit and double-bit states
        (1, 1) | (10, 1) | (80, 1) => Some((count + 7) / 8),
        (3, 1) => Some((count * 2 + 7) / 8),
        // octet strings encode the item length in the variation
        (110..=113, v) => Some(count * v as usize),
        _ => fixed_item_octets(group, variation).map(|octets| count * octets),
    }
}

/// Fixed per-item octet widths for the common variations.
fn fixed_item_octets(group: u8, variation: u8) -> Option<usize> {
    let octets = match (group, variation) {
        (1, 2) | (2, 1) | (3, 2) | (4, 1) | (10, 2) | (11, 1) | (13, 1) => 1,
        (2, 3) | (4, 3) => 3,
        (2, 2) | (4, 2) | (11, 2) | (13, 2) => 7,
        (12, 1) | (12, 2) => 11,
        (20, 2) | (21, 2) | (22, 2) | (23, 2) | (30, 2) | (32, 2) | (40, 2) | (41, 2)
        | (42, 2) => 3,
        (20, 1) | (21, 1) | (22, 1) | (23, 1) | (30, 1) | (30, 5) | (32, 1) | (32, 5)
        | (40, 1) | (40, 3) | (41, 1) | (41, 3) | (42, 1) | (42, 5) => 5,
        (20, 5) | (21, 9) | (30, 3) | (34, 2) | (34, 3) => 4,
        (20, 6) | (21, 10) | (30, 4) | (34, 1) | (52, 1) | (52, 2) => 2,
        (22, 5) | (23, 5) | (32, 3) | (32, 7) | (42, 3) | (42, 7) => 11,
        (22, 6) | (23, 6) | (32, 4) | (30, 6) | (40, 4) | (41, 4) | (42, 4) => 9,
        (32, 8) | (42, 8) => 15,
        (50, 1) | (50, 3) | (51, 1) | (51, 2) => 6,
        (50, 2) => 10,
        // class data objects carry no octets of their own
        (60, 1) | (60, 2) | (60, 3) | (60, 4) => 0,
        _ => return None,
    };
    Some(octets)
}

fn take<'a>(input: &mut &'a [u8], n: usize) -> Result<&'a [u8], AppError> {
    if input.len() < n {
        return Err(AppError::ParamError);
    }
    let (head, tail) = input.split_at(n);
    *input = tail;
    Ok(head)
}

fn read_index(input: &mut &[u8], width: usize) -> Result<u32, AppError> {
    let bytes = take(input, width)?;
    let mut value = 0u32;
    for (i, &b) in bytes.iter().enumerate() {
        value |= (b as u32) << (8 * i);
    }
    Ok(value)
}

/// Walk the object headers of a fragment body.
pub(super) fn walk_objects(input: &[u8]) -> Result<Vec<ObjectHeader>, AppError> {
    let mut input = input;
    let mut headers = Vec::new();

    while !input.is_empty() {
        let header = take(&mut input, 3)?;
        let (group, variation, qualifier) = (header[0], header[1], header[2]);
        if !KNOWN_GROUPS.contains(&group) {
            return Err(AppError::ObjUnknown);
        }

        let prefix = (qualifier >> 4) & 0x07;
        let range_code = qualifier & 0x0f;
        let range = match range_code {
            0x00 | 0x01 | 0x02 => {
                let width = 1 << range_code;
                let start = read_index(&mut input, width)?;
                let stop = read_index(&mut input, width)?;
                if start > stop {
                    return Err(AppError::ParamError);
                }
                Range::Span { start, stop }
            }
            0x06 => Range::All,
            0x07 | 0x08 | 0x09 => {
                let width = 1 << (range_code - 0x07);
                Range::Count(read_index(&mut input, width)?)
            }
            0x0b => Range::Count(read_index(&mut input, 1)?),
            _ => return Err(AppError::ParamError),
        };

        let mut object = ObjectHeader {
            group,
            variation,
            qualifier,
            range,
            data: Vec::new(),
        };

        if prefix != 0 || range_code == 0x0b {
            // prefixed or variable-format items: width is per-item, keep
            // the rest opaque
            object.data = input.to_vec();
            input = &[];
        } else if let Some(count) = range.count() {
            match object_data_len(group, variation, count) {
                Some(len) => {
                    object.data = take(&mut input, len)?.to_vec();
                }
                None => {
                    object.data = input.to_vec();
                    input = &[];
                }
            }
        }

        headers.push(object);
    }

    Ok(headers)
}
