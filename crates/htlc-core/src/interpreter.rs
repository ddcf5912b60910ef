//! Minimal stack-machine evaluator for lock and key programs.
//!
//! Supports exactly the opcodes defined in [`crate::script::Opcode`]; anything
//! else fails at parse time. Signature and relative-lock checks are delegated
//! to a [`SignatureChecker`] so the evaluator stays independent of the
//! transaction being spent.
//!
//! Rules enforced:
//! - `OP_IF` selectors must be exactly empty (false) or `[0x01]` (true)
//! - numeric operands are minimally encoded, at most 4 bytes (5 for
//!   `OP_CHECKSEQUENCEVERIFY`)
//! - no stack element exceeds [`MAX_ELEMENT_SIZE`]
//! - [`verify`] additionally requires a clean stack holding a single true value

use crate::constants::MAX_ELEMENT_SIZE;
use crate::crypto::sha256;
use crate::error::ScriptError;
use crate::script::{Instruction, Opcode, decode_num, encode_num, parse};

/// Stack of byte-string elements, top at the end.
pub type Stack = Vec<Vec<u8>>;

const MAX_NUM_LEN: usize = 4;
const MAX_SEQUENCE_NUM_LEN: usize = 5;

/// Transaction-dependent checks used by `OP_CHECKSIG` and `OP_CHECKSEQUENCEVERIFY`.
pub trait SignatureChecker {
    /// Whether `signature` by `public_key` is valid for the spending input.
    fn check_sig(&self, signature: &[u8], public_key: &[u8]) -> bool;

    /// Whether the spending input commits to a relative lock of at least `required`.
    fn check_sequence(&self, required: i64) -> Result<(), ScriptError>;
}

/// Interpret a stack element as a boolean (any non-zero byte, ignoring negative zero).
pub fn cast_to_bool(data: &[u8]) -> bool {
    for (i, &b) in data.iter().enumerate() {
        if b != 0 {
            return !(i == data.len() - 1 && b == 0x80);
        }
    }
    false
}

fn bool_element(value: bool) -> Vec<u8> {
    if value { vec![1] } else { Vec::new() }
}

fn pop(stack: &mut Stack) -> Result<Vec<u8>, ScriptError> {
    stack.pop().ok_or(ScriptError::StackUnderflow)
}

fn pop_num(stack: &mut Stack) -> Result<i64, ScriptError> {
    decode_num(&pop(stack)?, MAX_NUM_LEN)
}

fn push(stack: &mut Stack, data: Vec<u8>) -> Result<(), ScriptError> {
    if data.len() > MAX_ELEMENT_SIZE {
        return Err(ScriptError::PushSize(data.len()));
    }
    stack.push(data);
    Ok(())
}

/// Run `script` over `stack`, returning the final stack.
pub fn execute(
    script: &[u8],
    mut stack: Stack,
    checker: &dyn SignatureChecker,
) -> Result<Stack, ScriptError> {
    if let Some(big) = stack.iter().find(|e| e.len() > MAX_ELEMENT_SIZE) {
        return Err(ScriptError::PushSize(big.len()));
    }

    // One entry per open IF: whether that branch is executing.
    let mut conds: Vec<bool> = Vec::new();

    for ins in parse(script)? {
        let executing = conds.iter().all(|&c| c);

        let op = match ins {
            Instruction::Push(data) => {
                if executing {
                    push(&mut stack, data)?;
                }
                continue;
            }
            Instruction::Op(op) => op,
        };

        match op {
            Opcode::If => {
                let branch = if executing {
                    let top = pop(&mut stack)?;
                    match top.as_slice() {
                        [] => false,
                        [1] => true,
                        _ => return Err(ScriptError::NonMinimalIf),
                    }
                } else {
                    false
                };
                conds.push(branch);
                continue;
            }
            Opcode::Else => {
                let top = conds.last_mut().ok_or(ScriptError::UnbalancedConditional)?;
                *top = !*top;
                continue;
            }
            Opcode::EndIf => {
                conds.pop().ok_or(ScriptError::UnbalancedConditional)?;
                continue;
            }
            _ if !executing => continue,
            _ => {}
        }

        if let Some(n) = op.small_int() {
            push(&mut stack, encode_num(i64::from(n)))?;
            continue;
        }

        match op {
            Opcode::Verify => {
                if !cast_to_bool(&pop(&mut stack)?) {
                    return Err(ScriptError::VerifyFailed);
                }
            }
            Opcode::TwoDrop => {
                pop(&mut stack)?;
                pop(&mut stack)?;
            }
            Opcode::Depth => {
                let depth = stack.len() as i64;
                push(&mut stack, encode_num(depth))?;
            }
            Opcode::Drop => {
                pop(&mut stack)?;
            }
            Opcode::Roll => {
                let n = pop_num(&mut stack)?;
                let n = usize::try_from(n).map_err(|_| ScriptError::InvalidNumber)?;
                if n >= stack.len() {
                    return Err(ScriptError::StackUnderflow);
                }
                let item = stack.remove(stack.len() - 1 - n);
                stack.push(item);
            }
            Opcode::Swap => {
                let len = stack.len();
                if len < 2 {
                    return Err(ScriptError::StackUnderflow);
                }
                stack.swap(len - 1, len - 2);
            }
            Opcode::Equal | Opcode::EqualVerify => {
                let b = pop(&mut stack)?;
                let a = pop(&mut stack)?;
                if op == Opcode::EqualVerify {
                    if a != b {
                        return Err(ScriptError::EqualVerifyFailed);
                    }
                } else {
                    stack.push(bool_element(a == b));
                }
            }
            Opcode::GreaterThanOrEqual => {
                let b = pop_num(&mut stack)?;
                let a = pop_num(&mut stack)?;
                stack.push(bool_element(a >= b));
            }
            Opcode::Sha256 => {
                let data = pop(&mut stack)?;
                stack.push(sha256(&data).as_bytes().to_vec());
            }
            Opcode::CheckSig | Opcode::CheckSigVerify => {
                let public_key = pop(&mut stack)?;
                let signature = pop(&mut stack)?;
                let ok = !signature.is_empty() && checker.check_sig(&signature, &public_key);
                if op == Opcode::CheckSigVerify {
                    if !ok {
                        return Err(ScriptError::CheckSigVerifyFailed);
                    }
                } else {
                    stack.push(bool_element(ok));
                }
            }
            Opcode::CheckSequenceVerify => {
                // Operand stays on the stack.
                let top = stack.last().ok_or(ScriptError::StackUnderflow)?;
                let required = decode_num(top, MAX_SEQUENCE_NUM_LEN)?;
                if required < 0 {
                    return Err(ScriptError::UnsatisfiedLocktime { required });
                }
                checker.check_sequence(required)?;
            }
            // Pushes and flow control never reach here.
            _ => return Err(ScriptError::UnsupportedOpcode(op as u8)),
        }
    }

    if !conds.is_empty() {
        return Err(ScriptError::UnbalancedConditional);
    }
    Ok(stack)
}

/// Run `script` and require a clean stack with a single true element.
pub fn verify(
    script: &[u8],
    stack: Stack,
    checker: &dyn SignatureChecker,
) -> Result<(), ScriptError> {
    let stack = execute(script, stack, checker)?;
    match stack.as_slice() {
        [top] if cast_to_bool(top) => Ok(()),
        [] | [_] => Err(ScriptError::EvalFalse),
        _ => Err(ScriptError::CleanStack(stack.len())),
    }
}
