//! The conditional-load (CDL) expression interpreter.
//!
//! A `cdl ` chunk holds a linear bytecode program over a stack of
//! 32-bit values. Banks use it to gate chunks on renderer
//! capabilities: the program queries capability GUIDs, combines the
//! answers, and the final stack value decides whether the gated chunk
//! is processed (nonzero) or skipped.

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};
use log::warn;

use sforzato_core::error::{LoadError, Result};
use sforzato_core::riff::Reader;

/// Capability identifier, the GUID layout of the format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DlsId {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl DlsId {
    fn read(reader: &mut Reader<'_>) -> Result<DlsId> {
        let data1 = reader.read_u32::<LittleEndian>()?;
        let data2 = reader.read_u16::<LittleEndian>()?;
        let data3 = reader.read_u16::<LittleEndian>()?;
        let mut data4 = [0u8; 8];
        reader.read_exact(&mut data4)?;
        Ok(DlsId {
            data1,
            data2,
            data3,
            data4,
        })
    }
}

const fn dlsid(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> DlsId {
    DlsId {
        data1,
        data2,
        data3,
        data4,
    }
}

// The queryable capability set, from the format's standard header.
const GM_IN_HARDWARE: DlsId = dlsid(0x178f2f24, 0xc364, 0x11d1, [0xa7, 0x60, 0, 0, 0xf8, 0x75, 0xac, 0x12]);
const GS_IN_HARDWARE: DlsId = dlsid(0x178f2f25, 0xc364, 0x11d1, [0xa7, 0x60, 0, 0, 0xf8, 0x75, 0xac, 0x12]);
const XG_IN_HARDWARE: DlsId = dlsid(0x178f2f26, 0xc364, 0x11d1, [0xa7, 0x60, 0, 0, 0xf8, 0x75, 0xac, 0x12]);
const SUPPORTS_DLS1: DlsId = dlsid(0x178f2f27, 0xc364, 0x11d1, [0xa7, 0x60, 0, 0, 0xf8, 0x75, 0xac, 0x12]);
const SUPPORTS_DLS2: DlsId = dlsid(0xf14599e5, 0x4689, 0x11d2, [0xaf, 0xa6, 0, 0xaa, 0, 0x24, 0xd8, 0xb6]);
const SAMPLE_MEMORY_SIZE: DlsId = dlsid(0x178f2f28, 0xc364, 0x11d1, [0xa7, 0x60, 0, 0, 0xf8, 0x75, 0xac, 0x12]);
const MANUFACTURERS_ID: DlsId = dlsid(0xb03e1181, 0x8095, 0x11d2, [0xa1, 0xef, 0, 0x60, 0x08, 0x33, 0xdb, 0xd8]);
const PRODUCT_ID: DlsId = dlsid(0xb03e1182, 0x8095, 0x11d2, [0xa1, 0xef, 0, 0x60, 0x08, 0x33, 0xdb, 0xd8]);
const SAMPLE_PLAYBACK_RATE: DlsId = dlsid(0x2a91f713, 0xa4bf, 0x11d2, [0xbb, 0xdf, 0, 0x60, 0x08, 0x33, 0xdb, 0xd8]);

/// Answer one capability query, or `None` for ids outside the table.
fn query(id: &DlsId, sample_rate: u32) -> Option<u32> {
    if *id == GM_IN_HARDWARE
        || *id == GS_IN_HARDWARE
        || *id == XG_IN_HARDWARE
        || *id == SUPPORTS_DLS1
        || *id == SUPPORTS_DLS2
    {
        return Some(1);
    }
    if *id == SAMPLE_MEMORY_SIZE {
        // ~1.5 GiB
        return Some(u32::MAX / 4 * 3);
    }
    if *id == MANUFACTURERS_ID {
        // an unassigned system id
        return Some(0x00004000);
    }
    if *id == PRODUCT_ID {
        return Some(0x0d000721);
    }
    if *id == SAMPLE_PLAYBACK_RATE {
        return Some(sample_rate);
    }
    warn!(
        "unknown capability query {{{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}}}",
        id.data1,
        id.data2,
        id.data3,
        id.data4[0],
        id.data4[1],
        id.data4[2],
        id.data4[3],
        id.data4[4],
        id.data4[5],
        id.data4[6],
        id.data4[7]
    );
    None
}

const STACK_CAP: usize = 64;

struct Stack {
    values: [u32; STACK_CAP],
    len: usize,
}

impl Stack {
    fn push(&mut self, value: u32) -> Result<()> {
        if self.len == STACK_CAP {
            return Err(LoadError::CdlStackOverflow);
        }
        self.values[self.len] = value;
        self.len += 1;
        Ok(())
    }

    fn pop(&mut self) -> Result<u32> {
        if self.len == 0 {
            return Err(LoadError::CdlStackUnderflow);
        }
        self.len -= 1;
        Ok(self.values[self.len])
    }
}

/// Execute one CDL program of `size` bytes starting at the reader's
/// current position. Binary operators apply top-of-stack OP
/// next-on-stack; all arithmetic is unsigned and wrapping.
pub fn execute(reader: &mut Reader<'_>, size: u32, sample_rate: u32) -> Result<bool> {
    let mut stack = Stack {
        values: [0; STACK_CAP],
        len: 0,
    };

    let mut pc = 0u32;
    while pc < size {
        let opcode = reader.read_u16::<LittleEndian>()?;
        match opcode {
            0x0010 => {
                // constant
                stack.push(reader.read_u32::<LittleEndian>()?)?;
                pc += 4;
            }
            0x000f => {
                // logical not
                let x = stack.pop()?;
                stack.push(u32::from(x == 0))?;
            }
            0x0001..=0x000e => {
                let x = stack.pop()?;
                let y = stack.pop()?;
                stack.push(match opcode {
                    0x0001 => x & y,
                    0x0002 => x | y,
                    0x0003 => x ^ y,
                    0x0004 => x.wrapping_add(y),
                    0x0005 => x.wrapping_sub(y),
                    0x0006 => x.wrapping_mul(y),
                    0x0007 => {
                        if y == 0 {
                            return Err(LoadError::Corrupt(
                                "conditional-load expression divides by zero".into(),
                            ));
                        }
                        x / y
                    }
                    0x0008 => u32::from(x != 0 && y != 0),
                    0x0009 => u32::from(x != 0 || y != 0),
                    0x000a => u32::from(x < y),
                    0x000b => u32::from(x <= y),
                    0x000c => u32::from(x > y),
                    0x000d => u32::from(x >= y),
                    _ => u32::from(x == y),
                })?;
            }
            0x0011 | 0x0012 => {
                let id = DlsId::read(reader)?;
                let answer = query(&id, sample_rate);
                if opcode == 0x0011 {
                    // the value query insists on an answer
                    match answer {
                        Some(value) => stack.push(value)?,
                        None => return Err(LoadError::CdlUnsupportedQuery),
                    }
                }
                stack.push(u32::from(answer.is_some()))?;
                pc += 16;
            }
            _ => return Err(LoadError::CdlBadOpcode(opcode)),
        }
        pc += 2;
    }

    if pc > size {
        return Err(LoadError::Corrupt(
            "conditional-load expression runs past its chunk".into(),
        ));
    }

    match stack.len {
        0 => Err(LoadError::CdlNoResult),
        _ => Ok(stack.pop()? != 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sforzato_core::io::{IoProvider, MemoryIo};
    use std::path::Path;

    fn op(code: u16) -> Vec<u8> {
        code.to_le_bytes().to_vec()
    }

    fn constant(value: u32) -> Vec<u8> {
        let mut v = op(0x0010);
        v.extend_from_slice(&value.to_le_bytes());
        v
    }

    fn guid_query(code: u16, id: &DlsId) -> Vec<u8> {
        let mut v = op(code);
        v.extend_from_slice(&id.data1.to_le_bytes());
        v.extend_from_slice(&id.data2.to_le_bytes());
        v.extend_from_slice(&id.data3.to_le_bytes());
        v.extend_from_slice(&id.data4);
        v
    }

    fn eval(program: &[Vec<u8>]) -> Result<bool> {
        let bytes: Vec<u8> = program.iter().flatten().copied().collect();
        let size = bytes.len() as u32;
        let mut io = MemoryIo::new();
        io.insert("/cdl", bytes);
        let mut file = io.open(Path::new("/cdl")).unwrap();
        execute(&mut Reader::new(&mut *file), size, 48000)
    }

    #[test]
    fn test_constant_result() {
        assert!(eval(&[constant(1)]).unwrap());
        assert!(!eval(&[constant(0)]).unwrap());
    }

    #[test]
    fn test_operand_order() {
        // stack holds [7, 3] with 3 on top: 3 - 7 wraps, 3 < 7 is true
        assert!(eval(&[constant(7), constant(3), op(0x0005)]).unwrap());
        assert!(eval(&[constant(7), constant(3), op(0x000a)]).unwrap());
        // 7 / 3 == 2
        assert!(eval(&[constant(3), constant(7), op(0x0007), constant(2), op(0x000e)]).unwrap());
    }

    #[test]
    fn test_logical_not() {
        assert!(eval(&[constant(0), op(0x000f)]).unwrap());
        assert!(!eval(&[constant(5), op(0x000f)]).unwrap());
    }

    #[test]
    fn test_divide_by_zero_is_fatal() {
        assert!(matches!(
            eval(&[constant(0), constant(4), op(0x0007)]),
            Err(LoadError::Corrupt(_))
        ));
    }

    #[test]
    fn test_stack_overflow() {
        let program: Vec<Vec<u8>> = (0..65).map(|_| constant(1)).collect();
        assert!(matches!(eval(&program), Err(LoadError::CdlStackOverflow)));
    }

    #[test]
    fn test_stack_underflow() {
        assert!(matches!(
            eval(&[constant(1), op(0x0004)]),
            Err(LoadError::CdlStackUnderflow)
        ));
    }

    #[test]
    fn test_empty_program_has_no_result() {
        assert!(matches!(eval(&[]), Err(LoadError::CdlNoResult)));
    }

    #[test]
    fn test_unknown_opcode() {
        assert!(matches!(eval(&[op(0x0042)]), Err(LoadError::CdlBadOpcode(0x0042))));
    }

    #[test]
    fn test_query_pushes_value_then_flag() {
        // the stack holds [rate, 1] with the flag on top; their sum
        // pins down both pushed values at once
        let program = [guid_query(0x0011, &SAMPLE_PLAYBACK_RATE), op(0x0004), constant(48001), op(0x000e)];
        assert!(eval(&program).unwrap());
    }

    #[test]
    fn test_query_unsupported_is_fatal() {
        let unknown = dlsid(0xdeadbeef, 0, 0, [0; 8]);
        assert!(matches!(
            eval(&[guid_query(0x0011, &unknown)]),
            Err(LoadError::CdlUnsupportedQuery)
        ));
    }

    #[test]
    fn test_query_supported_tolerates_unknown_id() {
        let unknown = dlsid(0xdeadbeef, 0, 0, [0; 8]);
        assert!(!eval(&[guid_query(0x0012, &unknown)]).unwrap());
        assert!(eval(&[guid_query(0x0012, &SUPPORTS_DLS2)]).unwrap());
    }
}
