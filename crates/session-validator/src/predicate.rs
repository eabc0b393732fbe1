//! Argument predicate trees and their byte-level evaluator.
//!
//! A session commits to an RLP-encoded *forest* of predicate nodes, one per
//! expected argument slot of the permitted call, plus a reserved leading slot
//! for the native value. At validation time the operator supplies an RLP list
//! of the ABI-encoded actual arguments, and [`is_allowed_calldata`] decides
//! whether every slot satisfies its predicate.
//!
//! Wire format of a node: an RLP list whose first element is a one-byte tag.
//! Comparison leaves carry a single ABI-encoded literal; `AND`/`OR` carry two
//! or more nested node lists. The encoding is canonical on both sides so that
//! byte-for-byte equality of `EQ`/`NE` literals is meaningful.

use alloy_primitives::{Address, Bytes, U256};
use alloy_rlp::Header;
use alloy_sol_types::SolValue;

use crate::{ValidationError, ValidationResult};

/// Tag byte of a node that matches any value.
const TAG_ANY: u8 = 0x00;
/// Tag byte of a not-equal comparison leaf.
const TAG_NE: u8 = 0x01;
/// Tag byte of an equality comparison leaf.
const TAG_EQ: u8 = 0x02;
/// Tag byte of a strict greater-than comparison leaf.
const TAG_GT: u8 = 0x03;
/// Tag byte of a strict less-than comparison leaf.
const TAG_LT: u8 = 0x04;
/// Tag byte of a conjunction over child nodes.
const TAG_AND: u8 = 0x05;
/// Tag byte of a disjunction over child nodes.
const TAG_OR: u8 = 0x06;

/// One node of an argument constraint tree.
///
/// Predicate trees are pure data: they are built off-chain, committed inside
/// a session leaf, and only transiently decoded during evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Accepts any value in this slot.
    Any,
    /// Accepts values byte-equal to the literal.
    Eq(Bytes),
    /// Accepts values not byte-equal to the literal.
    Ne(Bytes),
    /// Accepts values numerically greater than the literal (strict).
    Gt(Bytes),
    /// Accepts values numerically less than the literal (strict).
    Lt(Bytes),
    /// Accepts values satisfying every child predicate.
    And(Vec<Predicate>),
    /// Accepts values satisfying at least one child predicate.
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Equality against an ABI `uint256` word.
    pub fn eq_u256(value: U256) -> Self {
        Self::Eq(value.abi_encode().into())
    }

    /// Equality against an ABI-encoded address (left-padded to 32 bytes).
    pub fn eq_address(addr: Address) -> Self {
        Self::Eq(addr.abi_encode().into())
    }

    /// Inequality against an ABI `uint256` word.
    pub fn ne_u256(value: U256) -> Self {
        Self::Ne(value.abi_encode().into())
    }

    /// Strictly-greater-than bound over an ABI `uint256` word.
    pub fn gt_u256(value: U256) -> Self {
        Self::Gt(value.abi_encode().into())
    }

    /// Strictly-less-than bound over an ABI `uint256` word.
    pub fn lt_u256(value: U256) -> Self {
        Self::Lt(value.abi_encode().into())
    }

    fn tag(&self) -> u8 {
        match self {
            Self::Any => TAG_ANY,
            Self::Ne(_) => TAG_NE,
            Self::Eq(_) => TAG_EQ,
            Self::Gt(_) => TAG_GT,
            Self::Lt(_) => TAG_LT,
            Self::And(_) => TAG_AND,
            Self::Or(_) => TAG_OR,
        }
    }

    /// Evaluates the predicate against one ABI-encoded actual value.
    pub fn evaluate(&self, actual: &[u8]) -> ValidationResult<bool> {
        Ok(match self {
            Self::Any => true,
            Self::Eq(literal) => literal.as_ref() == actual,
            Self::Ne(literal) => literal.as_ref() != actual,
            Self::Gt(literal) => abi_word(actual)? > abi_word(literal)?,
            Self::Lt(literal) => abi_word(actual)? < abi_word(literal)?,
            Self::And(children) => {
                for child in children {
                    if !child.evaluate(actual)? {
                        return Ok(false);
                    }
                }
                true
            }
            Self::Or(children) => {
                for child in children {
                    if child.evaluate(actual)? {
                        return Ok(true);
                    }
                }
                false
            }
        })
    }

    fn payload_length(&self) -> usize {
        // a tag always encodes as exactly one byte (all tags are < 0x80)
        1 + match self {
            Self::Any => 0,
            Self::Eq(lit) | Self::Ne(lit) | Self::Gt(lit) | Self::Lt(lit) => {
                alloy_rlp::Encodable::length(lit)
            }
            Self::And(children) | Self::Or(children) => {
                children.iter().map(Self::encoded_length).sum()
            }
        }
    }

    fn encoded_length(&self) -> usize {
        let payload = self.payload_length();
        Header { list: true, payload_length: payload }.length() + payload
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        Header { list: true, payload_length: self.payload_length() }.encode(out);
        out.push(self.tag());
        match self {
            Self::Any => {}
            Self::Eq(lit) | Self::Ne(lit) | Self::Gt(lit) | Self::Lt(lit) => {
                alloy_rlp::Encodable::encode(lit, out);
            }
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.encode_into(out);
                }
            }
        }
    }
}

/// Encodes an ordered forest of predicates as the canonical RLP list a
/// session commits to.
pub fn encode_forest(predicates: &[Predicate]) -> Bytes {
    let payload: usize = predicates.iter().map(Predicate::encoded_length).sum();
    let mut out = Vec::with_capacity(payload + 9);
    Header { list: true, payload_length: payload }.encode(&mut out);
    for predicate in predicates {
        predicate.encode_into(&mut out);
    }
    out.into()
}

/// Decodes the RLP list of predicate nodes committed by a session.
pub fn decode_forest(data: &[u8]) -> ValidationResult<Vec<Predicate>> {
    let mut buf = data;
    let header = Header::decode(&mut buf).map_err(|_| ValidationError::MalformedArguments)?;
    if !header.list || buf.len() != header.payload_length {
        return Err(ValidationError::MalformedArguments);
    }

    let mut predicates = Vec::new();
    while !buf.is_empty() {
        predicates.push(decode_node(&mut buf)?);
    }
    Ok(predicates)
}

/// Decodes a single predicate node, advancing `buf` past it.
fn decode_node(buf: &mut &[u8]) -> ValidationResult<Predicate> {
    let header = Header::decode(buf).map_err(|_| ValidationError::MalformedArguments)?;
    if !header.list || buf.len() < header.payload_length {
        return Err(ValidationError::MalformedArguments);
    }
    let (mut payload, rest) = buf.split_at(header.payload_length);
    *buf = rest;

    let tag_bytes: Bytes =
        alloy_rlp::Decodable::decode(&mut payload).map_err(|_| ValidationError::MalformedArguments)?;
    let [tag] = tag_bytes.as_ref() else {
        return Err(ValidationError::MalformedArguments);
    };

    let node = match *tag {
        TAG_ANY => {
            if !payload.is_empty() {
                return Err(ValidationError::MalformedArguments);
            }
            Predicate::Any
        }
        TAG_NE | TAG_EQ | TAG_GT | TAG_LT => {
            let literal: Bytes = alloy_rlp::Decodable::decode(&mut payload)
                .map_err(|_| ValidationError::MalformedArguments)?;
            if !payload.is_empty() {
                return Err(ValidationError::MalformedArguments);
            }
            match *tag {
                TAG_NE => Predicate::Ne(literal),
                TAG_EQ => Predicate::Eq(literal),
                TAG_GT => Predicate::Gt(literal),
                _ => Predicate::Lt(literal),
            }
        }
        TAG_AND | TAG_OR => {
            let mut children = Vec::new();
            while !payload.is_empty() {
                children.push(decode_node(&mut payload)?);
            }
            if children.len() < 2 {
                return Err(ValidationError::MalformedArguments);
            }
            if *tag == TAG_AND {
                Predicate::And(children)
            } else {
                Predicate::Or(children)
            }
        }
        other => return Err(ValidationError::InvalidPredicateTag(other)),
    };
    Ok(node)
}

/// Encodes a list of ABI-encoded actual arguments as the RLP blob an
/// operator attaches to a call. Slot 0 must be the 32-byte encoding of the
/// native value; [`encode_actual_arguments`] prepends it.
pub fn encode_actual_arguments(native_value: U256, args: &[Bytes]) -> Bytes {
    let value_word: Bytes = native_value.abi_encode().into();
    let payload: usize = alloy_rlp::Encodable::length(&value_word) +
        args.iter().map(alloy_rlp::Encodable::length).sum::<usize>();
    let mut out = Vec::with_capacity(payload + 9);
    Header { list: true, payload_length: payload }.encode(&mut out);
    alloy_rlp::Encodable::encode(&value_word, &mut out);
    for arg in args {
        alloy_rlp::Encodable::encode(arg, &mut out);
    }
    out.into()
}

/// Decodes the flat RLP list of actual argument byte strings.
pub fn decode_actual_arguments(data: &[u8]) -> ValidationResult<Vec<Bytes>> {
    let mut buf = data;
    let header = Header::decode(&mut buf).map_err(|_| ValidationError::MalformedArguments)?;
    if !header.list || buf.len() != header.payload_length {
        return Err(ValidationError::MalformedArguments);
    }

    let mut args = Vec::new();
    while !buf.is_empty() {
        let arg: Bytes =
            alloy_rlp::Decodable::decode(&mut buf).map_err(|_| ValidationError::MalformedArguments)?;
        args.push(arg);
    }
    Ok(args)
}

/// Checks RLP-encoded actual call arguments against a session's committed
/// predicate forest.
///
/// Both lists must have the same length, including the reserved leading slot
/// whose actual value must ABI-decode to exactly `native_value`. Denials are
/// `Ok(false)`; structural problems (bad RLP, unknown tag, length mismatch)
/// are hard errors.
pub fn is_allowed_calldata(
    allowed: &[u8],
    actual: &[u8],
    native_value: U256,
) -> ValidationResult<bool> {
    let predicates = decode_forest(allowed)?;
    let args = decode_actual_arguments(actual)?;

    if predicates.len() != args.len() {
        return Err(ValidationError::ArgumentLengthMismatch {
            allowed: predicates.len(),
            actual: args.len(),
        });
    }
    // a non-empty forest always declares the reserved value slot
    let Some(value_slot) = args.first() else {
        return Ok(true);
    };

    // the value slot is a correspondence check, distinct from the slot's
    // own predicate which is evaluated as well
    if value_slot.as_ref() != native_value.abi_encode() {
        return Ok(false);
    }

    for (predicate, arg) in predicates.iter().zip(&args) {
        if !predicate.evaluate(arg)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Interprets an ABI-encoded value as a `uint256`-comparable word.
fn abi_word(bytes: &[u8]) -> ValidationResult<U256> {
    if bytes.len() != 32 {
        return Err(ValidationError::InvalidOperandWidth(bytes.len()));
    }
    Ok(U256::from_be_slice(bytes))
}
