//! # Raw Data Validator
//!
//! Translates node-native JSON-RPC records (`eth_getLogs` entries, `eth_getTransactionByHash`
//! results) into the normalized [`messages`](crate::messages) types.
//!
//! Each message type has an explicit field schema: the normalized field name, the key it is
//! read from, whether it is required, and the rule used to decode it. [`validate_record`] applies
//! a schema to a raw object and the typed constructors below assemble the message from the
//! decoded fields. Keys not named by a schema are ignored. Everything here is pure.

use ethers::types::Address;
use ethers::utils::to_checksum;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;

use crate::messages::{Transaction, TransactionEvent};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("validation failed on `{field}`: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { field: field.into(), reason: reason.into() }
    }

    fn nested(self, prefix: &str) -> Self {
        Self { field: format!("{}.{}", prefix, self.field), reason: self.reason }
    }
}

/// How a raw JSON value is turned into a normalized field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeRule {
    /// `0x`-prefixed hex string, lower-cased. `0x` alone is an empty byte string.
    HexBytes,
    /// Array of [`DecodeRule::HexBytes`] strings.
    HexList,
    /// 20-byte address, rendered EIP-55 checksummed.
    Address,
    /// Unsigned integer, either a hex quantity string or a JSON number.
    Quantity,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub source_key: &'static str,
    pub required: bool,
    pub rule: DecodeRule,
}

const fn required(name: &'static str, source_key: &'static str, rule: DecodeRule) -> FieldSpec {
    FieldSpec { name, source_key, required: true, rule }
}

const fn optional(name: &'static str, source_key: &'static str, rule: DecodeRule) -> FieldSpec {
    FieldSpec { name, source_key, required: false, rule }
}

pub const TRANSACTION_EVENT_SCHEMA: &[FieldSpec] = &[
    required("contract_address", "address", DecodeRule::Address),
    required("topics", "topics", DecodeRule::HexList),
    required("data", "data", DecodeRule::HexBytes),
    required("transaction_hash", "transactionHash", DecodeRule::HexBytes),
    required("log_index", "logIndex", DecodeRule::Quantity),
];

pub const TRANSACTION_SCHEMA: &[FieldSpec] = &[
    required("transaction_index", "transactionIndex", DecodeRule::Quantity),
    required("transaction_hash", "hash", DecodeRule::HexBytes),
    required("block_number", "blockNumber", DecodeRule::Quantity),
    required("block_hash", "blockHash", DecodeRule::HexBytes),
    required("from_address", "from", DecodeRule::Address),
    optional("to_address", "to", DecodeRule::Address),
    required("gas", "gas", DecodeRule::Quantity),
    required("gas_price", "gasPrice", DecodeRule::Quantity),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
    Number(u128),
    Null,
}

/// Fields decoded from one raw object, keyed by normalized name.
#[derive(Debug, Clone, Default)]
pub struct ValidatedRecord {
    fields: HashMap<&'static str, FieldValue>,
}

impl ValidatedRecord {
    fn text(&self, name: &str) -> Result<String, ValidationError> {
        match self.fields.get(name) {
            Some(FieldValue::Text(s)) => Ok(s.clone()),
            _ => Err(ValidationError::new(name, "expected a string value")),
        }
    }

    fn optional_text(&self, name: &str) -> Result<Option<String>, ValidationError> {
        match self.fields.get(name) {
            Some(FieldValue::Text(s)) => Ok(Some(s.clone())),
            Some(FieldValue::Null) | None => Ok(None),
            _ => Err(ValidationError::new(name, "expected a string value")),
        }
    }

    fn list(&self, name: &str) -> Result<Vec<String>, ValidationError> {
        match self.fields.get(name) {
            Some(FieldValue::List(items)) => Ok(items.clone()),
            _ => Err(ValidationError::new(name, "expected a list value")),
        }
    }

    fn number(&self, name: &str) -> Result<u128, ValidationError> {
        match self.fields.get(name) {
            Some(FieldValue::Number(n)) => Ok(*n),
            _ => Err(ValidationError::new(name, "expected an integer value")),
        }
    }

    fn number_as<T: TryFrom<u128>>(&self, name: &str) -> Result<T, ValidationError> {
        T::try_from(self.number(name)?)
            .map_err(|_| ValidationError::new(name, "integer out of range"))
    }
}

/// Applies `schema` to a raw JSON object.
pub fn validate_record(raw: &Value, schema: &[FieldSpec]) -> Result<ValidatedRecord, ValidationError> {
    let object = raw
        .as_object()
        .ok_or_else(|| ValidationError::new("<root>", "expected a JSON object"))?;

    let mut record = ValidatedRecord::default();
    for spec in schema {
        let value = match object.get(spec.source_key) {
            None | Some(Value::Null) => {
                if spec.required {
                    return Err(ValidationError::new(spec.source_key, "missing required field"));
                }
                FieldValue::Null
            }
            Some(value) => decode(spec.rule, value).map_err(|reason| ValidationError::new(spec.source_key, reason))?,
        };
        record.fields.insert(spec.name, value);
    }
    Ok(record)
}

fn decode(rule: DecodeRule, value: &Value) -> Result<FieldValue, String> {
    match rule {
        DecodeRule::HexBytes => decode_hex(value).map(FieldValue::Text),
        DecodeRule::HexList => {
            let items = value.as_array().ok_or("expected an array of hex strings")?;
            items
                .iter()
                .map(decode_hex)
                .collect::<Result<Vec<_>, _>>()
                .map(FieldValue::List)
        }
        DecodeRule::Address => {
            let raw = value.as_str().ok_or("expected an address string")?;
            let address = Address::from_str(raw).map_err(|e| format!("invalid address `{}`: {}", raw, e))?;
            Ok(FieldValue::Text(to_checksum(&address, None)))
        }
        DecodeRule::Quantity => decode_quantity(value).map(FieldValue::Number),
    }
}

fn decode_hex(value: &Value) -> Result<String, String> {
    let raw = value.as_str().ok_or("expected a hex string")?;
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .ok_or_else(|| format!("hex string `{}` lacks 0x prefix", raw))?;
    hex::decode(digits).map_err(|e| format!("invalid hex `{}`: {}", raw, e))?;
    Ok(format!("0x{}", digits.to_ascii_lowercase()))
}

fn decode_quantity(value: &Value) -> Result<u128, String> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| format!("expected a non-negative integer, got {}", n)),
        Value::String(s) => {
            let digits = s
                .strip_prefix("0x")
                .or_else(|| s.strip_prefix("0X"))
                .ok_or_else(|| format!("quantity `{}` lacks 0x prefix", s))?;
            if digits.is_empty() {
                return Err(format!("empty quantity `{}`", s));
            }
            u128::from_str_radix(digits, 16).map_err(|e| format!("invalid quantity `{}`: {}", s, e))
        }
        _ => Err("expected a hex quantity or integer".to_string()),
    }
}

/// Fixed mapping from an event's leading topic to its name.
#[derive(Debug, Clone, Copy)]
pub struct EventSignatures {
    entries: &'static [(&'static str, &'static str)],
}

impl EventSignatures {
    /// `entries` are `(name, topic0)` pairs.
    pub const fn new(entries: &'static [(&'static str, &'static str)]) -> Self {
        Self { entries }
    }

    pub fn resolve(&self, topic: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(_, signature)| signature.eq_ignore_ascii_case(topic))
            .map(|(name, _)| *name)
    }

    pub fn signature_of(&self, name: &str) -> Option<&'static str> {
        self.entries.iter().find(|(n, _)| *n == name).map(|(_, signature)| *signature)
    }
}

pub fn validate_transaction_event(
    raw: &Value,
    signatures: &EventSignatures,
) -> Result<TransactionEvent, ValidationError> {
    let record = validate_record(raw, TRANSACTION_EVENT_SCHEMA)?;
    let topics = record.list("topics")?;
    let leading = topics
        .first()
        .ok_or_else(|| ValidationError::new("topics", "event has no signature topic"))?;
    let name = signatures
        .resolve(leading)
        .ok_or_else(|| ValidationError::new("topics", format!("unknown event signature {}", leading)))?;

    Ok(TransactionEvent {
        name: name.to_string(),
        contract_address: record.text("contract_address")?,
        topics,
        data: record.text("data")?,
        transaction_hash: record.text("transaction_hash")?,
        log_index: record.number_as("log_index")?,
    })
}

/// Validates a whole `eth_getLogs` response. One bad entry fails the batch.
pub fn validate_transaction_events(
    raw: &[Value],
    signatures: &EventSignatures,
) -> Result<Vec<TransactionEvent>, ValidationError> {
    raw.iter()
        .enumerate()
        .map(|(i, item)| {
            validate_transaction_event(item, signatures)
                .map_err(|e| e.nested(&format!("transaction_events[{}]", i)))
        })
        .collect()
}

pub fn validate_transaction(raw: &Value) -> Result<Transaction, ValidationError> {
    let record = validate_record(raw, TRANSACTION_SCHEMA)?;
    Ok(Transaction {
        transaction_hash: record.text("transaction_hash")?,
        transaction_index: record.number_as("transaction_index")?,
        block_number: record.number_as("block_number")?,
        block_hash: record.text("block_hash")?,
        from_address: record.text("from_address")?,
        to_address: record.optional_text("to_address")?,
        gas: record.number("gas")?,
        gas_price: record.number("gas_price")?,
    })
}
