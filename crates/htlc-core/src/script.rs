//! Script encoding: opcodes, minimal pushes, parsing and disassembly.
//!
//! Locks and key programs are byte programs in a small stack language whose
//! opcode byte values follow the widely deployed stack-script encoding. Only
//! the opcodes the HTLC shapes need are defined; every other byte value is
//! rejected by the parser.
//!
//! Pushes are always minimal: empty data is `OP_0`, small integers use
//! `OP_1`..`OP_16`, data up to 75 bytes uses a direct length prefix, larger
//! data uses `OP_PUSHDATA1`/`OP_PUSHDATA2`. The parser rejects non-minimal
//! pushes so one logical script has exactly one byte encoding.

use std::fmt;

use crate::error::ScriptError;

/// Opcodes understood by the parser and evaluator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Op0 = 0x00,
    PushData1 = 0x4c,
    PushData2 = 0x4d,
    Op1 = 0x51,
    Op2 = 0x52,
    Op3 = 0x53,
    Op4 = 0x54,
    Op5 = 0x55,
    Op6 = 0x56,
    Op7 = 0x57,
    Op8 = 0x58,
    Op9 = 0x59,
    Op10 = 0x5a,
    Op11 = 0x5b,
    Op12 = 0x5c,
    Op13 = 0x5d,
    Op14 = 0x5e,
    Op15 = 0x5f,
    Op16 = 0x60,
    If = 0x63,
    Else = 0x67,
    EndIf = 0x68,
    Verify = 0x69,
    TwoDrop = 0x6d,
    Depth = 0x74,
    Drop = 0x75,
    Roll = 0x7a,
    Swap = 0x7c,
    Equal = 0x87,
    EqualVerify = 0x88,
    GreaterThanOrEqual = 0xa2,
    Sha256 = 0xa8,
    CheckSig = 0xac,
    CheckSigVerify = 0xad,
    CheckSequenceVerify = 0xb2,
}

impl Opcode {
    /// Decode a non-push opcode byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        use Opcode::*;
        let op = match byte {
            0x51 => Op1,
            0x52 => Op2,
            0x53 => Op3,
            0x54 => Op4,
            0x55 => Op5,
            0x56 => Op6,
            0x57 => Op7,
            0x58 => Op8,
            0x59 => Op9,
            0x5a => Op10,
            0x5b => Op11,
            0x5c => Op12,
            0x5d => Op13,
            0x5e => Op14,
            0x5f => Op15,
            0x60 => Op16,
            0x63 => If,
            0x67 => Else,
            0x68 => EndIf,
            0x69 => Verify,
            0x6d => TwoDrop,
            0x74 => Depth,
            0x75 => Drop,
            0x7a => Roll,
            0x7c => Swap,
            0x87 => Equal,
            0x88 => EqualVerify,
            0xa2 => GreaterThanOrEqual,
            0xa8 => Sha256,
            0xac => CheckSig,
            0xad => CheckSigVerify,
            0xb2 => CheckSequenceVerify,
            _ => return None,
        };
        Some(op)
    }

    /// The small integer an `OP_1`..`OP_16` opcode pushes.
    pub fn small_int(self) -> Option<u8> {
        let b = self as u8;
        (0x51..=0x60).contains(&b).then(|| b - 0x50)
    }

    /// `OP_N` for `n` in 1..=16.
    pub fn from_small_int(n: u8) -> Option<Self> {
        if (1..=16).contains(&n) {
            Self::from_byte(0x50 + n)
        } else {
            None
        }
    }

    /// Mnemonic used in disassembly.
    pub fn name(self) -> &'static str {
        use Opcode::*;
        match self {
            Op0 => "OP_0",
            PushData1 => "OP_PUSHDATA1",
            PushData2 => "OP_PUSHDATA2",
            Op1 => "OP_1",
            Op2 => "OP_2",
            Op3 => "OP_3",
            Op4 => "OP_4",
            Op5 => "OP_5",
            Op6 => "OP_6",
            Op7 => "OP_7",
            Op8 => "OP_8",
            Op9 => "OP_9",
            Op10 => "OP_10",
            Op11 => "OP_11",
            Op12 => "OP_12",
            Op13 => "OP_13",
            Op14 => "OP_14",
            Op15 => "OP_15",
            Op16 => "OP_16",
            If => "OP_IF",
            Else => "OP_ELSE",
            EndIf => "OP_ENDIF",
            Verify => "OP_VERIFY",
            TwoDrop => "OP_2DROP",
            Depth => "OP_DEPTH",
            Drop => "OP_DROP",
            Roll => "OP_ROLL",
            Swap => "OP_SWAP",
            Equal => "OP_EQUAL",
            EqualVerify => "OP_EQUALVERIFY",
            GreaterThanOrEqual => "OP_GREATERTHANOREQUAL",
            Sha256 => "OP_SHA256",
            CheckSig => "OP_CHECKSIG",
            CheckSigVerify => "OP_CHECKSIGVERIFY",
            CheckSequenceVerify => "OP_CHECKSEQUENCEVERIFY",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One parsed script element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// Data push (including `OP_0` as the empty push).
    Push(Vec<u8>),
    /// Any other opcode, small-integer opcodes included.
    Op(Opcode),
}

impl Instruction {
    /// Numeric value of a small-integer opcode or minimally encoded push.
    pub fn as_num(&self, max_len: usize) -> Result<i64, ScriptError> {
        match self {
            Instruction::Push(data) => decode_num(data, max_len),
            Instruction::Op(op) => op
                .small_int()
                .map(i64::from)
                .ok_or(ScriptError::InvalidNumber),
        }
    }
}

/// Append-only builder producing minimally encoded scripts.
#[derive(Clone, Debug, Default)]
pub struct ScriptBuilder {
    bytes: Vec<u8>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push `data` with the shortest possible prefix.
    pub fn push_slice(mut self, data: &[u8]) -> Self {
        let len = data.len();
        if len == 0 {
            self.bytes.push(Opcode::Op0 as u8);
        } else if len < Opcode::PushData1 as usize {
            self.bytes.push(len as u8);
        } else if len <= u8::MAX as usize {
            self.bytes.push(Opcode::PushData1 as u8);
            self.bytes.push(len as u8);
        } else {
            self.bytes.push(Opcode::PushData2 as u8);
            self.bytes.extend_from_slice(&(len as u16).to_le_bytes());
        }
        self.bytes.extend_from_slice(data);
        self
    }

    /// Push an integer: `OP_0`, `OP_1`..`OP_16`, or a minimal number push.
    pub fn push_int(self, n: i64) -> Self {
        match n {
            0 => self.push_slice(&[]),
            1..=16 => match Opcode::from_small_int(n as u8) {
                Some(op) => self.push_opcode(op),
                None => self.push_slice(&encode_num(n)),
            },
            _ => self.push_slice(&encode_num(n)),
        }
    }

    pub fn push_opcode(mut self, op: Opcode) -> Self {
        self.bytes.push(op as u8);
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Parse `script` into instructions, rejecting unknown opcodes, truncated
/// pushes and non-minimal pushes.
pub fn parse(script: &[u8]) -> Result<Vec<Instruction>, ScriptError> {
    let mut out = Vec::new();
    let mut pos = 0usize;
    while pos < script.len() {
        let start = pos;
        let byte = script[pos];
        pos += 1;

        let len = match byte {
            0x00 => {
                out.push(Instruction::Push(Vec::new()));
                continue;
            }
            0x01..=0x4b => byte as usize,
            0x4c => {
                let l = *script.get(pos).ok_or(ScriptError::TruncatedPush(start))? as usize;
                pos += 1;
                if l < Opcode::PushData1 as usize {
                    return Err(ScriptError::NonMinimalPush(start));
                }
                l
            }
            0x4d => {
                let raw = script
                    .get(pos..pos + 2)
                    .ok_or(ScriptError::TruncatedPush(start))?;
                pos += 2;
                let l = u16::from_le_bytes([raw[0], raw[1]]) as usize;
                if l <= u8::MAX as usize {
                    return Err(ScriptError::NonMinimalPush(start));
                }
                l
            }
            other => {
                let op = Opcode::from_byte(other).ok_or(ScriptError::UnsupportedOpcode(other))?;
                out.push(Instruction::Op(op));
                continue;
            }
        };

        let data = script
            .get(pos..pos + len)
            .ok_or(ScriptError::TruncatedPush(start))?;
        pos += len;

        // A single byte 1..=16 must use OP_N.
        if len == 1 && (1..=16).contains(&data[0]) {
            return Err(ScriptError::NonMinimalPush(start));
        }
        out.push(Instruction::Push(data.to_vec()));
    }
    Ok(out)
}

/// Human-readable disassembly: opcodes by name, pushes as hex.
pub fn disassemble(script: &[u8]) -> Result<String, ScriptError> {
    let parts: Vec<String> = parse(script)?
        .into_iter()
        .map(|ins| match ins {
            Instruction::Push(data) if data.is_empty() => Opcode::Op0.name().to_string(),
            Instruction::Push(data) => hex::encode(data),
            Instruction::Op(op) => op.name().to_string(),
        })
        .collect();
    Ok(parts.join(" "))
}

/// Minimal little-endian sign-magnitude encoding of `n`.
pub fn encode_num(n: i64) -> Vec<u8> {
    if n == 0 {
        return Vec::new();
    }
    let negative = n < 0;
    let mut abs = n.unsigned_abs();
    let mut out = Vec::new();
    while abs > 0 {
        out.push((abs & 0xff) as u8);
        abs >>= 8;
    }
    // Reserve the top bit of the last byte for the sign.
    if out.last().is_some_and(|b| b & 0x80 != 0) {
        out.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        if let Some(last) = out.last_mut() {
            *last |= 0x80;
        }
    }
    out
}

/// Decode a minimally encoded number of at most `max_len` bytes.
pub fn decode_num(data: &[u8], max_len: usize) -> Result<i64, ScriptError> {
    if data.len() > max_len || data.len() > 8 {
        return Err(ScriptError::InvalidNumber);
    }
    let Some(&last) = data.last() else {
        return Ok(0);
    };
    // The top byte may only be 0x00/0x80 when it is needed for the sign bit.
    if last & 0x7f == 0 && (data.len() == 1 || data[data.len() - 2] & 0x80 == 0) {
        return Err(ScriptError::InvalidNumber);
    }
    let mut value: i64 = 0;
    for (i, byte) in data.iter().enumerate() {
        let b = if i == data.len() - 1 { byte & 0x7f } else { *byte };
        value |= (b as i64) << (8 * i);
    }
    Ok(if last & 0x80 != 0 { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_num_vectors() {
        assert_eq!(encode_num(0), Vec::<u8>::new());
        assert_eq!(encode_num(1), vec![0x01]);
        assert_eq!(encode_num(-1), vec![0x81]);
        assert_eq!(encode_num(127), vec![0x7f]);
        assert_eq!(encode_num(128), vec![0x80, 0x00]);
        assert_eq!(encode_num(1000), vec![0xe8, 0x03]);
        assert_eq!(encode_num(-128), vec![0x80, 0x80]);
        assert_eq!(encode_num(0xFFFF), vec![0xff, 0xff, 0x00]);
    }

    #[test]
    fn decode_num_inverts_encode() {
        for n in [0i64, 1, -1, 16, 17, 127, 128, 255, 1000, 65_535, 0x7FFF_FFFF, -0x7FFF_FFFF] {
            assert_eq!(decode_num(&encode_num(n), 5).unwrap(), n, "n = {n}");
        }
    }

    #[test]
    fn decode_num_rejects_padding() {
        assert_eq!(decode_num(&[0x01, 0x00], 4), Err(ScriptError::InvalidNumber));
        assert_eq!(decode_num(&[0x00], 4), Err(ScriptError::InvalidNumber));
        assert_eq!(decode_num(&[0x80], 4), Err(ScriptError::InvalidNumber));
    }

    #[test]
    fn decode_num_rejects_oversize() {
        assert_eq!(decode_num(&[1, 2, 3, 4, 5], 4), Err(ScriptError::InvalidNumber));
    }

    #[test]
    fn push_slice_prefixes() {
        assert_eq!(ScriptBuilder::new().push_slice(&[]).into_bytes(), vec![0x00]);
        assert_eq!(ScriptBuilder::new().push_slice(&[0xAA; 3]).into_bytes()[0], 3);
        let b = ScriptBuilder::new().push_slice(&[0u8; 80]).into_bytes();
        assert_eq!(&b[..2], &[0x4c, 80]);
        let b = ScriptBuilder::new().push_slice(&[0u8; 300]).into_bytes();
        assert_eq!(&b[..3], &[0x4d, 0x2c, 0x01]);
    }

    #[test]
    fn push_int_small_uses_opcode() {
        assert_eq!(ScriptBuilder::new().push_int(0).into_bytes(), vec![0x00]);
        assert_eq!(ScriptBuilder::new().push_int(6).into_bytes(), vec![0x56]);
        assert_eq!(ScriptBuilder::new().push_int(16).into_bytes(), vec![0x60]);
        assert_eq!(
            ScriptBuilder::new().push_int(1000).into_bytes(),
            vec![0x02, 0xe8, 0x03]
        );
    }

    #[test]
    fn parse_roundtrip() {
        let script = ScriptBuilder::new()
            .push_opcode(Opcode::If)
            .push_slice(&[0xAB; 33])
            .push_opcode(Opcode::CheckSig)
            .push_int(1000)
            .push_opcode(Opcode::EndIf)
            .into_bytes();
        let ins = parse(&script).unwrap();
        assert_eq!(ins.len(), 5);
        assert_eq!(ins[0], Instruction::Op(Opcode::If));
        assert_eq!(ins[1], Instruction::Push(vec![0xAB; 33]));
        assert_eq!(ins[3].as_num(5).unwrap(), 1000);
    }

    #[test]
    fn parse_rejects_unknown_opcode() {
        assert_eq!(parse(&[0x63, 0xff]), Err(ScriptError::UnsupportedOpcode(0xff)));
    }

    #[test]
    fn parse_rejects_truncated_push() {
        assert_eq!(parse(&[0x05, 1, 2]), Err(ScriptError::TruncatedPush(0)));
        assert_eq!(parse(&[0x4c]), Err(ScriptError::TruncatedPush(0)));
    }

    #[test]
    fn parse_rejects_non_minimal_push() {
        assert_eq!(parse(&[0x01, 0x05]), Err(ScriptError::NonMinimalPush(0)));
        let mut padded = vec![0x4c, 3];
        padded.extend_from_slice(&[9, 9, 9]);
        assert_eq!(parse(&padded), Err(ScriptError::NonMinimalPush(0)));
    }

    #[test]
    fn small_int_mapping() {
        assert_eq!(Opcode::Op1.small_int(), Some(1));
        assert_eq!(Opcode::Op16.small_int(), Some(16));
        assert_eq!(Opcode::If.small_int(), None);
        assert_eq!(Opcode::from_small_int(4), Some(Opcode::Op4));
        assert_eq!(Opcode::from_small_int(17), None);
    }

    #[test]
    fn disassemble_names_and_hex() {
        let script = ScriptBuilder::new()
            .push_opcode(Opcode::Sha256)
            .push_slice(&[0xde, 0xad, 0xbe, 0xef])
            .push_opcode(Opcode::Equal)
            .push_slice(&[])
            .into_bytes();
        assert_eq!(
            disassemble(&script).unwrap(),
            "OP_SHA256 deadbeef OP_EQUAL OP_0"
        );
    }

    // --- Properties ---

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn parse_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
            let _ = parse(&bytes);
        }

        #[test]
        fn pushed_data_parses_back(data in prop::collection::vec(any::<u8>(), 2..600)) {
            let script = ScriptBuilder::new().push_slice(&data).into_bytes();
            prop_assert_eq!(parse(&script).unwrap(), vec![Instruction::Push(data)]);
        }

        #[test]
        fn script_numbers_are_minimal(n in -(1i64 << 31) + 1..(1i64 << 31)) {
            let encoded = encode_num(n);
            prop_assert!(encoded.len() <= 4);
            prop_assert_eq!(decode_num(&encoded, 4).unwrap(), n);
        }
    }
}
