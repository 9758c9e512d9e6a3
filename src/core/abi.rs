//! Contract ABI, event filters and decoded log events.

use ethers::abi::{parse_abi, Abi, Event, Function, RawLog, Token};
use ethers::types::{Address, Log, H256, U256};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::errors::DappError;

/// Human-readable ABI of the MotivateMe contract plus the Counter functions.
pub const DEFAULT_ABI: &[&str] = &[
    "event InstantMotivation(address indexed sender, address indexed recipient, uint256 amount, string message)",
    "event TimelockedMotivationCreated(address indexed sender, address indexed recipient, uint256 index, uint256 amount, uint256 unlockTimestamp, string message)",
    "event TimelockedMotivationClaimed(address indexed recipient, address indexed sender, uint256 index, uint256 amount)",
    "event ProofOfActionMotivationCreated(address indexed sender, address indexed recipient, uint256 index, uint256 amount, string actionRequired, string message)",
    "event ProofOfActionClaimed(address indexed recipient, address indexed sender, uint256 index, uint256 amount, string proofDescription)",
    "function instantMotivation(address recipient, string message) payable",
    "function timelockedMotivation(address recipient, uint256 unlockTimestamp, string message) payable",
    "function proofOfActionMotivation(address recipient, string actionRequired, string message) payable",
    "function claimTimelockedMotivation(address sender, uint256 index)",
    "function claimProofOfAction(address sender, uint256 index, string proofDescription)",
    "function timeLocks(address recipient, address sender, uint256 index) view returns (uint256 amount, uint256 unlockTimestamp, bool claimed)",
    "function proofOfActions(address recipient, address sender, uint256 index) view returns (uint256 amount, string actionRequired, bool claimed)",
    "function number() view returns (uint256)",
    "function setNumber(uint256 newNumber)",
    "function increment()",
];

/// Events emitted by the MotivateMe contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MotivationEvent {
    InstantMotivation,
    TimelockedMotivationCreated,
    TimelockedMotivationClaimed,
    ProofOfActionMotivationCreated,
    ProofOfActionClaimed,
}

impl MotivationEvent {
    pub const ALL: [MotivationEvent; 5] = [
        MotivationEvent::InstantMotivation,
        MotivationEvent::TimelockedMotivationCreated,
        MotivationEvent::TimelockedMotivationClaimed,
        MotivationEvent::ProofOfActionMotivationCreated,
        MotivationEvent::ProofOfActionClaimed,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MotivationEvent::InstantMotivation => "InstantMotivation",
            MotivationEvent::TimelockedMotivationCreated => "TimelockedMotivationCreated",
            MotivationEvent::TimelockedMotivationClaimed => "TimelockedMotivationClaimed",
            MotivationEvent::ProofOfActionMotivationCreated => "ProofOfActionMotivationCreated",
            MotivationEvent::ProofOfActionClaimed => "ProofOfActionClaimed",
        }
    }

    /// Claim events index the recipient first, everything else indexes the sender first.
    pub fn recipient_indexed_first(&self) -> bool {
        matches!(
            self,
            MotivationEvent::TimelockedMotivationClaimed | MotivationEvent::ProofOfActionClaimed
        )
    }
}

/// Event type plus indexed-argument filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    pub event: MotivationEvent,
    pub sender: Option<Address>,
    pub recipient: Option<Address>,
}

impl EventFilter {
    pub fn new(event: MotivationEvent) -> Self {
        Self { event, sender: None, recipient: None }
    }

    pub fn sender(mut self, sender: Address) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn recipient(mut self, recipient: Address) -> Self {
        self.recipient = Some(recipient);
        self
    }

    /// Indexed topics 1 and 2 in contract order.
    pub fn topics(&self) -> [Option<H256>; 2] {
        let sender = self.sender.map(H256::from);
        let recipient = self.recipient.map(H256::from);
        if self.event.recipient_indexed_first() {
            [recipient, sender]
        } else {
            [sender, recipient]
        }
    }

    pub fn matches(&self, log: &LogEvent) -> bool {
        log.event == self.event
            && self.sender.map_or(true, |s| s == log.sender)
            && self.recipient.map_or(true, |r| r == log.recipient)
    }
}

/// A decoded contract event, identified by `(block_number, log_index)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub event: MotivationEvent,
    pub block_number: u64,
    pub log_index: u64,
    pub tx_hash: Option<H256>,
    pub sender: Address,
    pub recipient: Address,
    pub amount: U256,
    pub index: Option<U256>,
    pub message: Option<String>,
    pub action_required: Option<String>,
    pub proof_description: Option<String>,
    pub unlock_timestamp: Option<u64>,
}

impl LogEvent {
    pub fn id(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}

/// Parsed contract ABI with lookups for the functions and events this client uses.
#[derive(Debug, Clone)]
pub struct ContractAbi {
    abi: Abi,
}

impl ContractAbi {
    pub fn motivate_me() -> Result<Self, DappError> {
        let abi = parse_abi(DEFAULT_ABI).map_err(|e| DappError::AbiError(e.to_string()))?;
        Ok(Self { abi })
    }

    /// Accepts either a bare JSON ABI array or a build artifact with an `abi` field.
    pub fn from_json(raw: &str) -> Result<Self, DappError> {
        #[derive(Deserialize)]
        struct Artifact {
            abi: Abi,
        }

        if let Ok(abi) = serde_json::from_str::<Abi>(raw) {
            return Ok(Self { abi });
        }
        let artifact: Artifact = serde_json::from_str(raw)?;
        Ok(Self { abi: artifact.abi })
    }

    pub fn from_file(path: &Path) -> Result<Self, DappError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DappError::ConfigError(format!("Failed to read ABI {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn load(path: Option<&Path>) -> Result<Self, DappError> {
        match path {
            Some(p) => Self::from_file(p),
            None => Self::motivate_me(),
        }
    }

    pub fn function(&self, name: &str) -> Result<&Function, DappError> {
        Ok(self.abi.function(name)?)
    }

    pub fn event(&self, event: MotivationEvent) -> Result<&Event, DappError> {
        Ok(self.abi.event(event.name())?)
    }

    /// Whether the loaded ABI declares the MotivateMe events (a Counter-only ABI does not).
    pub fn has_motivation_events(&self) -> bool {
        self.abi.event(MotivationEvent::InstantMotivation.name()).is_ok()
    }

    pub fn encode_call(&self, name: &str, args: &[Token]) -> Result<Vec<u8>, DappError> {
        Ok(self.function(name)?.encode_input(args)?)
    }

    pub fn decode_output(&self, name: &str, data: &[u8]) -> Result<Vec<Token>, DappError> {
        Ok(self.function(name)?.decode_output(data)?)
    }

    pub fn event_signature(&self, event: MotivationEvent) -> Result<H256, DappError> {
        Ok(self.event(event)?.signature())
    }

    /// Decodes a raw log emitted by the contract. Logs of unknown events are rejected.
    pub fn decode_log(&self, log: &Log) -> Result<LogEvent, DappError> {
        let topic0 = log
            .topics
            .first()
            .copied()
            .ok_or_else(|| DappError::AbiError("log without topics".to_string()))?;
        let kind = MotivationEvent::ALL
            .into_iter()
            .find(|k| self.event_signature(*k).map_or(false, |sig| sig == topic0))
            .ok_or_else(|| DappError::AbiError(format!("unknown event topic {:?}", topic0)))?;

        let parsed = self.event(kind)?.parse_log(RawLog {
            topics: log.topics.clone(),
            data: log.data.to_vec(),
        })?;

        let mut event = LogEvent {
            event: kind,
            block_number: log.block_number.map(|b| b.as_u64()).unwrap_or_default(),
            log_index: log.log_index.map(|i| i.as_u64()).unwrap_or_default(),
            tx_hash: log.transaction_hash,
            sender: Address::zero(),
            recipient: Address::zero(),
            amount: U256::zero(),
            index: None,
            message: None,
            action_required: None,
            proof_description: None,
            unlock_timestamp: None,
        };

        for param in parsed.params {
            match (param.name.as_str(), param.value) {
                ("sender", Token::Address(a)) => event.sender = a,
                ("recipient", Token::Address(a)) => event.recipient = a,
                ("amount", Token::Uint(v)) => event.amount = v,
                ("index", Token::Uint(v)) => event.index = Some(v),
                ("unlockTimestamp", Token::Uint(v)) => event.unlock_timestamp = Some(v.low_u64()),
                ("message", Token::String(s)) => event.message = non_empty(s),
                ("actionRequired", Token::String(s)) => event.action_required = non_empty(s),
                ("proofDescription", Token::String(s)) => event.proof_description = non_empty(s),
                _ => {}
            }
        }
        Ok(event)
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::abi::encode;
    use ethers::types::{Bytes, U64};

    fn addr(b: u8) -> Address {
        Address::repeat_byte(b)
    }

    #[test]
    fn default_abi_has_every_event_and_function() {
        let abi = ContractAbi::motivate_me().unwrap();
        for kind in MotivationEvent::ALL {
            assert!(abi.event(kind).is_ok(), "missing {}", kind.name());
        }
        for f in ["instantMotivation", "claimProofOfAction", "timeLocks", "number", "increment"] {
            assert!(abi.function(f).is_ok(), "missing {}", f);
        }
        assert!(abi.has_motivation_events());
    }

    #[test]
    fn filter_topics_follow_contract_order() {
        let created = EventFilter::new(MotivationEvent::TimelockedMotivationCreated).sender(addr(1));
        assert_eq!(created.topics(), [Some(H256::from(addr(1))), None]);

        let claimed = EventFilter::new(MotivationEvent::TimelockedMotivationClaimed)
            .recipient(addr(2))
            .sender(addr(1));
        assert_eq!(claimed.topics(), [Some(H256::from(addr(2))), Some(H256::from(addr(1)))]);
    }

    #[test]
    fn decodes_instant_motivation_log() {
        let abi = ContractAbi::motivate_me().unwrap();
        let sig = abi.event_signature(MotivationEvent::InstantMotivation).unwrap();
        let data = encode(&[Token::Uint(U256::from(42u64)), Token::String("keep going".into())]);
        let log = Log {
            topics: vec![sig, H256::from(addr(1)), H256::from(addr(2))],
            data: Bytes::from(data),
            block_number: Some(U64::from(103u64)),
            log_index: Some(U256::from(4u64)),
            ..Default::default()
        };

        let event = abi.decode_log(&log).unwrap();
        assert_eq!(event.event, MotivationEvent::InstantMotivation);
        assert_eq!(event.id(), (103, 4));
        assert_eq!(event.sender, addr(1));
        assert_eq!(event.recipient, addr(2));
        assert_eq!(event.amount, U256::from(42u64));
        assert_eq!(event.message.as_deref(), Some("keep going"));
        assert!(EventFilter::new(MotivationEvent::InstantMotivation).sender(addr(1)).matches(&event));
        assert!(!EventFilter::new(MotivationEvent::InstantMotivation).sender(addr(2)).matches(&event));
    }

    #[test]
    fn rejects_foreign_logs() {
        let abi = ContractAbi::motivate_me().unwrap();
        let log = Log { topics: vec![H256::repeat_byte(9)], ..Default::default() };
        assert!(matches!(abi.decode_log(&log), Err(DappError::AbiError(_))));
    }

    #[test]
    fn loads_artifact_json() {
        let raw = r#"{"abi":[{"type":"function","name":"number","inputs":[],"outputs":[{"name":"","type":"uint256","internalType":"uint256"}],"stateMutability":"view"}]}"#;
        let abi = ContractAbi::from_json(raw).unwrap();
        assert!(abi.function("number").is_ok());
        assert!(!abi.has_motivation_events());
    }
}
