//! Contract ABI codec
//!
//! Static-type subset of the Solidity ABI: every parameter occupies one
//! 32-byte big-endian word, and calls are prefixed with the 4-byte selector
//! (first four bytes of the Keccak-256 of the canonical signature).
//!
//! ```rust,ignore
//! let store = Function::new("store", vec![ParamType::Uint256], vec![], StateMutability::Nonpayable);
//! assert_eq!(store.signature(), "store(uint256)");
//! let data = store.encode_input(&[Token::Uint(U256::from(10u64))])?;
//! ```

use crate::primitives::{keccak256, u256_to_word, Address, U256};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Size of an ABI word in bytes
pub const WORD_SIZE: usize = 32;

/// Size of a function selector in bytes
pub const SELECTOR_SIZE: usize = 4;

/// Function selector
pub type Selector = [u8; SELECTOR_SIZE];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbiError {
    #[error("Function '{0}' not found in contract ABI")]
    UnknownFunction(String),

    #[error("No function with selector 0x{0}")]
    UnknownSelector(String),

    #[error("Unsupported ABI type '{0}'")]
    UnsupportedType(String),

    #[error("Function '{function}' expects {expected} arguments, got {actual}")]
    ArityMismatch {
        function: String,
        expected: usize,
        actual: usize,
    },

    #[error("Argument {index} of '{function}' must be {expected}, got {actual}")]
    TypeMismatch {
        function: String,
        index: usize,
        expected: ParamType,
        actual: ParamType,
    },

    #[error("ABI data truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("Invalid bool word")]
    InvalidBool,

    #[error("Invalid address word (high bytes not zero)")]
    InvalidAddress,

    #[error("Function '{function}' returned ({actual}), expected ({expected})")]
    OutputMismatch {
        function: String,
        expected: String,
        actual: String,
    },

    #[error("Function '{function}' is {mutability}, cannot be used as a {usage}")]
    WrongMutability {
        function: String,
        mutability: StateMutability,
        usage: &'static str,
    },
}

/// Supported ABI parameter types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Uint256,
    Bool,
    Address,
}

impl ParamType {
    /// Parse a Solidity type name (`uint` is an alias of `uint256`)
    pub fn parse(name: &str) -> Result<Self, AbiError> {
        match name {
            "uint256" | "uint" => Ok(ParamType::Uint256),
            "bool" => Ok(ParamType::Bool),
            "address" => Ok(ParamType::Address),
            other => Err(AbiError::UnsupportedType(other.to_string())),
        }
    }

    pub fn canonical_name(&self) -> &'static str {
        match self {
            ParamType::Uint256 => "uint256",
            ParamType::Bool => "bool",
            ParamType::Address => "address",
        }
    }
}

impl Display for ParamType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// Decoded ABI value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Uint(U256),
    Bool(bool),
    Address(Address),
}

impl Token {
    pub fn param_type(&self) -> ParamType {
        match self {
            Token::Uint(_) => ParamType::Uint256,
            Token::Bool(_) => ParamType::Bool,
            Token::Address(_) => ParamType::Address,
        }
    }

    pub fn into_uint(self) -> Option<U256> {
        match self {
            Token::Uint(value) => Some(value),
            _ => None,
        }
    }

    fn to_word(&self) -> [u8; WORD_SIZE] {
        match self {
            Token::Uint(value) => u256_to_word(value),
            Token::Bool(flag) => {
                let mut word = [0u8; WORD_SIZE];
                word[WORD_SIZE - 1] = u8::from(*flag);
                word
            }
            Token::Address(addr) => {
                let mut word = [0u8; WORD_SIZE];
                word[WORD_SIZE - 20..].copy_from_slice(addr.as_bytes());
                word
            }
        }
    }

    fn from_word(kind: ParamType, word: &[u8]) -> Result<Self, AbiError> {
        match kind {
            ParamType::Uint256 => Ok(Token::Uint(U256::from_big_endian(word))),
            ParamType::Bool => {
                if word[..WORD_SIZE - 1].iter().any(|b| *b != 0) || word[WORD_SIZE - 1] > 1 {
                    return Err(AbiError::InvalidBool);
                }
                Ok(Token::Bool(word[WORD_SIZE - 1] == 1))
            }
            ParamType::Address => {
                if word[..WORD_SIZE - 20].iter().any(|b| *b != 0) {
                    return Err(AbiError::InvalidAddress);
                }
                let mut bytes = [0u8; 20];
                bytes.copy_from_slice(&word[WORD_SIZE - 20..]);
                Ok(Token::Address(Address::new(bytes)))
            }
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Uint(value) => write!(f, "{}", value),
            Token::Bool(flag) => write!(f, "{}", flag),
            Token::Address(addr) => write!(f, "{}", addr),
        }
    }
}

/// Encode tokens as consecutive words
pub fn encode_tokens(tokens: &[Token]) -> Vec<u8> {
    let mut out = Vec::with_capacity(tokens.len() * WORD_SIZE);
    for token in tokens {
        out.extend_from_slice(&token.to_word());
    }
    out
}

/// Decode consecutive words into tokens of the given types
pub fn decode_tokens(types: &[ParamType], data: &[u8]) -> Result<Vec<Token>, AbiError> {
    let needed = types.len() * WORD_SIZE;
    if data.len() < needed {
        return Err(AbiError::Truncated {
            needed,
            available: data.len(),
        });
    }
    types
        .iter()
        .zip(data.chunks_exact(WORD_SIZE))
        .map(|(kind, word)| Token::from_word(*kind, word))
        .collect()
}

/// Solidity state mutability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StateMutability {
    Pure,
    View,
    Nonpayable,
    Payable,
}

impl StateMutability {
    /// Whether calls to the function leave contract state untouched
    pub fn is_read_only(&self) -> bool {
        matches!(self, StateMutability::Pure | StateMutability::View)
    }
}

/// A contract function description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub inputs: Vec<ParamType>,
    pub outputs: Vec<ParamType>,
    pub state_mutability: StateMutability,
}

impl Function {
    pub fn new(
        name: impl Into<String>,
        inputs: Vec<ParamType>,
        outputs: Vec<ParamType>,
        state_mutability: StateMutability,
    ) -> Self {
        Self {
            name: name.into(),
            inputs,
            outputs,
            state_mutability,
        }
    }

    /// Canonical signature, e.g. `store(uint256)`
    pub fn signature(&self) -> String {
        let params: Vec<&str> = self.inputs.iter().map(|p| p.canonical_name()).collect();
        format!("{}({})", self.name, params.join(","))
    }

    pub fn selector(&self) -> Selector {
        selector_of(&self.signature())
    }

    /// Selector followed by the encoded arguments
    pub fn encode_input(&self, args: &[Token]) -> Result<Vec<u8>, AbiError> {
        if args.len() != self.inputs.len() {
            return Err(AbiError::ArityMismatch {
                function: self.name.clone(),
                expected: self.inputs.len(),
                actual: args.len(),
            });
        }
        for (index, (expected, arg)) in self.inputs.iter().zip(args).enumerate() {
            if *expected != arg.param_type() {
                return Err(AbiError::TypeMismatch {
                    function: self.name.clone(),
                    index,
                    expected: *expected,
                    actual: arg.param_type(),
                });
            }
        }

        let mut data = self.selector().to_vec();
        data.extend(encode_tokens(args));
        Ok(data)
    }

    /// Decode call arguments (selector already stripped)
    pub fn decode_input(&self, data: &[u8]) -> Result<Vec<Token>, AbiError> {
        decode_tokens(&self.inputs, data)
    }

    pub fn decode_output(&self, data: &[u8]) -> Result<Vec<Token>, AbiError> {
        decode_tokens(&self.outputs, data)
    }
}

/// Selector of a canonical signature
pub fn selector_of(signature: &str) -> Selector {
    let hash = keccak256(signature.as_bytes());
    let mut selector = [0u8; SELECTOR_SIZE];
    selector.copy_from_slice(&hash.as_bytes()[..SELECTOR_SIZE]);
    selector
}

/// The single `uint256` a function returned
pub fn single_uint(function: &str, tokens: Vec<Token>) -> Result<U256, AbiError> {
    match tokens.as_slice() {
        [Token::Uint(value)] => Ok(*value),
        other => Err(AbiError::OutputMismatch {
            function: function.to_string(),
            expected: ParamType::Uint256.to_string(),
            actual: other
                .iter()
                .map(|t| t.param_type().to_string())
                .collect::<Vec<_>>()
                .join(","),
        }),
    }
}

/// Split call data into its selector and argument words
pub fn split_selector(data: &[u8]) -> Result<(Selector, &[u8]), AbiError> {
    if data.len() < SELECTOR_SIZE {
        return Err(AbiError::Truncated {
            needed: SELECTOR_SIZE,
            available: data.len(),
        });
    }
    let mut selector = [0u8; SELECTOR_SIZE];
    selector.copy_from_slice(&data[..SELECTOR_SIZE]);
    Ok((selector, &data[SELECTOR_SIZE..]))
}

/// Function table of a contract, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<AbiEntry>", into = "Vec<AbiEntry>")]
pub struct ContractAbi {
    functions: IndexMap<String, Function>,
}

impl ContractAbi {
    pub fn new(functions: impl IntoIterator<Item = Function>) -> Self {
        Self {
            functions: functions
                .into_iter()
                .map(|f| (f.name.clone(), f))
                .collect(),
        }
    }

    pub fn function(&self, name: &str) -> Result<&Function, AbiError> {
        self.functions
            .get(name)
            .ok_or_else(|| AbiError::UnknownFunction(name.to_string()))
    }

    pub fn function_by_selector(&self, selector: &Selector) -> Result<&Function, AbiError> {
        self.functions
            .values()
            .find(|f| &f.selector() == selector)
            .ok_or_else(|| AbiError::UnknownSelector(hex::encode(selector)))
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.values()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// One entry of a JSON ABI array as emitted by Solidity toolchains
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbiEntry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    #[serde(default)]
    pub outputs: Vec<AbiParam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_mutability: Option<StateMutability>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbiParam {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl TryFrom<Vec<AbiEntry>> for ContractAbi {
    type Error = AbiError;

    fn try_from(entries: Vec<AbiEntry>) -> Result<Self, Self::Error> {
        let mut functions = Vec::new();
        // constructors, events and errors carry no callable surface here
        for entry in entries.into_iter().filter(|e| e.kind == "function") {
            let name = entry
                .name
                .ok_or_else(|| AbiError::UnknownFunction("<unnamed>".to_string()))?;
            let inputs = entry
                .inputs
                .iter()
                .map(|p| ParamType::parse(&p.kind))
                .collect::<Result<Vec<_>, _>>()?;
            let outputs = entry
                .outputs
                .iter()
                .map(|p| ParamType::parse(&p.kind))
                .collect::<Result<Vec<_>, _>>()?;
            functions.push(Function::new(
                name,
                inputs,
                outputs,
                entry.state_mutability.unwrap_or(StateMutability::Nonpayable),
            ));
        }
        Ok(ContractAbi::new(functions))
    }
}

impl From<ContractAbi> for Vec<AbiEntry> {
    fn from(abi: ContractAbi) -> Self {
        let to_params = |types: &[ParamType]| -> Vec<AbiParam> {
            types
                .iter()
                .map(|t| AbiParam {
                    name: String::new(),
                    kind: t.canonical_name().to_string(),
                })
                .collect()
        };
        abi.functions
            .into_values()
            .map(|f| AbiEntry {
                kind: "function".to_string(),
                inputs: to_params(&f.inputs),
                outputs: to_params(&f.outputs),
                name: Some(f.name),
                state_mutability: Some(f.state_mutability),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_fn() -> Function {
        Function::new(
            "store",
            vec![ParamType::Uint256],
            vec![],
            StateMutability::Nonpayable,
        )
    }

    fn retrieve_fn() -> Function {
        Function::new(
            "retrieve",
            vec![],
            vec![ParamType::Uint256],
            StateMutability::View,
        )
    }

    #[test]
    fn test_known_selectors() {
        assert_eq!(store_fn().signature(), "store(uint256)");
        assert_eq!(store_fn().selector(), [0x60, 0x57, 0x36, 0x1d]);
        assert_eq!(retrieve_fn().signature(), "retrieve()");
        assert_eq!(retrieve_fn().selector(), [0x2e, 0x64, 0xce, 0xc1]);
    }

    #[test]
    fn test_encode_store_call() {
        let data = store_fn()
            .encode_input(&[Token::Uint(U256::from(10u64))])
            .unwrap();
        assert_eq!(data.len(), SELECTOR_SIZE + WORD_SIZE);
        assert_eq!(&data[..4], &[0x60, 0x57, 0x36, 0x1d]);
        assert_eq!(data[data.len() - 1], 10);

        let (selector, args) = split_selector(&data).unwrap();
        assert_eq!(selector, store_fn().selector());
        assert_eq!(
            store_fn().decode_input(args).unwrap(),
            vec![Token::Uint(U256::from(10u64))]
        );
    }

    #[test]
    fn test_encode_rejects_bad_arguments() {
        let err = store_fn().encode_input(&[]).unwrap_err();
        assert!(matches!(err, AbiError::ArityMismatch { expected: 1, actual: 0, .. }));

        let err = store_fn().encode_input(&[Token::Bool(true)]).unwrap_err();
        assert!(matches!(err, AbiError::TypeMismatch { index: 0, .. }));
    }

    #[test]
    fn test_single_uint() {
        assert_eq!(
            single_uint("retrieve", vec![Token::Uint(U256::from(7u64))]).unwrap(),
            U256::from(7u64)
        );

        let err = single_uint("retrieve", vec![Token::Bool(true)]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Function 'retrieve' returned (bool), expected (uint256)"
        );
        assert!(matches!(
            single_uint("retrieve", vec![]).unwrap_err(),
            AbiError::OutputMismatch { .. }
        ));
    }

    #[test]
    fn test_decode_truncated_output() {
        let err = retrieve_fn().decode_output(&[0u8; 31]).unwrap_err();
        assert_eq!(
            err,
            AbiError::Truncated {
                needed: 32,
                available: 31
            }
        );
    }

    #[test]
    fn test_decode_bool_and_address_validation() {
        let mut word = [0u8; WORD_SIZE];
        word[WORD_SIZE - 1] = 2;
        assert_eq!(
            decode_tokens(&[ParamType::Bool], &word).unwrap_err(),
            AbiError::InvalidBool
        );

        let mut word = [0u8; WORD_SIZE];
        word[0] = 1;
        assert_eq!(
            decode_tokens(&[ParamType::Address], &word).unwrap_err(),
            AbiError::InvalidAddress
        );

        let addr = Address::test_account(3);
        let encoded = encode_tokens(&[Token::Address(addr), Token::Bool(true)]);
        let decoded = decode_tokens(&[ParamType::Address, ParamType::Bool], &encoded).unwrap();
        assert_eq!(decoded, vec![Token::Address(addr), Token::Bool(true)]);
    }

    #[test]
    fn test_parse_json_abi() {
        let json = r#"[
            {"inputs": [], "stateMutability": "nonpayable", "type": "constructor"},
            {"inputs": [], "name": "retrieve",
             "outputs": [{"internalType": "uint256", "name": "", "type": "uint256"}],
             "stateMutability": "view", "type": "function"},
            {"inputs": [{"internalType": "uint256", "name": "num", "type": "uint256"}],
             "name": "store", "outputs": [], "stateMutability": "nonpayable", "type": "function"}
        ]"#;

        let abi: ContractAbi = serde_json::from_str(json).unwrap();
        assert_eq!(abi.len(), 2);
        assert_eq!(abi.function("store").unwrap(), &store_fn());
        assert_eq!(abi.function("retrieve").unwrap(), &retrieve_fn());
        assert_eq!(
            abi.function_by_selector(&[0x2e, 0x64, 0xce, 0xc1])
                .unwrap()
                .name,
            "retrieve"
        );
        assert!(matches!(
            abi.function("missing"),
            Err(AbiError::UnknownFunction(_))
        ));
    }

    #[test]
    fn test_json_abi_rejects_dynamic_types() {
        let json = r#"[{"inputs": [{"name": "s", "type": "string"}], "name": "set",
                        "outputs": [], "stateMutability": "nonpayable", "type": "function"}]"#;
        let err = serde_json::from_str::<ContractAbi>(json).unwrap_err();
        assert!(err.to_string().contains("Unsupported ABI type 'string'"));
    }

    #[test]
    fn test_abi_serializes_back_to_json_entries() {
        let abi = ContractAbi::new(vec![store_fn(), retrieve_fn()]);
        let json = serde_json::to_string(&abi).unwrap();
        let back: ContractAbi = serde_json::from_str(&json).unwrap();
        assert_eq!(back, abi);
    }
}
