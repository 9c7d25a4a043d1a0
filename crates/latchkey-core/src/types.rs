use crate::{
    Result,
    constants::{
        MAX_CODE_SLOT, MAX_NODE_ID, MAX_PIN_LENGTH, MIN_CODE_SLOT, MIN_NODE_ID, MIN_PIN_LENGTH,
    },
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;

/// Z-Wave node identifier (1-232).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u8);

impl NodeId {
    /// Create a new node ID with validation.
    ///
    /// # Errors
    /// Returns `Error::NotFound` if the ID is outside the valid range (1-232).
    pub fn new(id: u8) -> Result<Self> {
        if !(MIN_NODE_ID..=MAX_NODE_ID).contains(&id) {
            return Err(Error::not_found(format!(
                "node ID must be {MIN_NODE_ID}-{MAX_NODE_ID}, got {id}"
            )));
        }
        Ok(NodeId(id))
    }

    /// Get the raw node ID as u8.
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for NodeId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let id: u8 = s
            .parse()
            .map_err(|_| Error::not_found(format!("invalid node ID: {s}")))?;
        NodeId::new(id)
    }
}

/// User-code slot number on a lock (1-30).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CodeSlot(u8);

impl CodeSlot {
    /// Create a new code slot with validation.
    ///
    /// # Errors
    /// Returns `Error::NotFound` if the slot is outside the valid range (1-30).
    pub fn new(slot: u8) -> Result<Self> {
        if !(MIN_CODE_SLOT..=MAX_CODE_SLOT).contains(&slot) {
            return Err(Error::not_found(format!(
                "code slot must be {MIN_CODE_SLOT}-{MAX_CODE_SLOT}, got {slot}"
            )));
        }
        Ok(CodeSlot(slot))
    }

    /// Get the raw slot number as u8.
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for CodeSlot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CodeSlot {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let slot: u8 = s
            .parse()
            .map_err(|_| Error::not_found(format!("invalid code slot: {s}")))?;
        CodeSlot::new(slot)
    }
}

/// User PIN code (4-8 ASCII digits).
///
/// # Security
/// This type implements constant-time comparison to prevent timing attacks
/// when the workflow compares a candidate PIN against cached codes for
/// duplicate diagnosis. `Debug` and `Display` redact the digits, and the
/// type deliberately does not implement serde: plaintext PINs never leave
/// the process through serialization.
#[derive(Clone, Eq)]
pub struct PinCode(String);

impl PinCode {
    /// Create a new PIN with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidFormat` if the PIN is not 4-8 ASCII digits.
    ///
    /// # Examples
    ///
    /// ```
    /// use latchkey_core::PinCode;
    ///
    /// let pin = PinCode::new("4321").unwrap();
    /// assert_eq!(pin.as_str(), "4321");
    ///
    /// assert!(PinCode::new("123").is_err());
    /// assert!(PinCode::new("123456789").is_err());
    /// assert!(PinCode::new("12a4").is_err());
    /// ```
    pub fn new(pin: &str) -> Result<Self> {
        let len = pin.len();
        if !(MIN_PIN_LENGTH..=MAX_PIN_LENGTH).contains(&len) {
            return Err(Error::invalid_format(format!(
                "PIN must be {MIN_PIN_LENGTH}-{MAX_PIN_LENGTH} digits, got {len} characters"
            )));
        }

        if !pin.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::invalid_format(
                "PIN must contain only digits 0-9".to_string(),
            ));
        }

        Ok(PinCode(pin.to_string()))
    }

    /// Get the PIN digits as a string slice.
    ///
    /// Callers are responsible for keeping the plaintext out of logs.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of digits in the PIN.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Constant-time comparison implementation for PinCode.
impl PartialEq for PinCode {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl fmt::Debug for PinCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PinCode(<{} digits>)", self.0.len())
    }
}

impl fmt::Display for PinCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<{} digits>", self.0.len())
    }
}

impl std::str::FromStr for PinCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        PinCode::new(s)
    }
}

/// Door lock operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorMode {
    /// Door bolt retracted.
    Unsecured,

    /// Door bolt extended.
    Secured,
}

impl fmt::Display for DoorMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DoorMode::Unsecured => write!(f, "unsecured"),
            DoorMode::Secured => write!(f, "secured"),
        }
    }
}

/// Reported state of a user-code slot.
///
/// Codes cannot be read back in plaintext from the device, so status is the
/// only verification signal the workflow has after a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    /// Slot holds no code.
    Available,

    /// Slot holds a code.
    Occupied,

    /// Device did not report a usable status.
    Unknown,
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SlotStatus::Available => write!(f, "available"),
            SlotStatus::Occupied => write!(f, "occupied"),
            SlotStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Verified outcome of a set-code attempt.
///
/// The device silently ignores duplicate or policy-violating codes without
/// an error response, so the workflow re-reads the slot status after the
/// settle delay and classifies what it finds. `Confirmed` is only ever
/// produced by an observed occupied status, never by command acknowledgment
/// alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum SetCodeOutcome {
    /// Verification read observed the slot occupied.
    Confirmed,

    /// Slot stayed available and no cached code explains why.
    RejectedUnknownReason,

    /// Slot stayed available and the local store holds the same PIN in
    /// another slot. Soft diagnosis: the store is a cache of intent, not a
    /// mirror of lock state, so false negatives are possible.
    RejectedLikelyDuplicate {
        /// Slot in the local store already holding this PIN.
        occupied_slot: CodeSlot,
    },

    /// Transport failure on the verification read. Does not imply the set
    /// failed; the caller should retry verification later.
    DeviceUnreachable,
}

impl SetCodeOutcome {
    /// Returns `true` only for a verified success.
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        matches!(self, SetCodeOutcome::Confirmed)
    }

    /// Returns `true` for both rejection classifications.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(
            self,
            SetCodeOutcome::RejectedUnknownReason
                | SetCodeOutcome::RejectedLikelyDuplicate { .. }
        )
    }
}

impl fmt::Display for SetCodeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SetCodeOutcome::Confirmed => write!(f, "confirmed"),
            SetCodeOutcome::RejectedUnknownReason => write!(f, "rejected (unknown reason)"),
            SetCodeOutcome::RejectedLikelyDuplicate { occupied_slot } => {
                write!(f, "rejected (likely duplicate of slot {occupied_slot})")
            }
            SetCodeOutcome::DeviceUnreachable => write!(f, "device unreachable"),
        }
    }
}

/// Per-device policy for clearing a slot before writing a new code.
///
/// Some lock firmwares require a clear before accepting a new code in an
/// occupied slot; others reject the clear+set sequence outright. Neither
/// behavior is universal, so the policy is configurable per device rather
/// than hardcoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearBeforeSet {
    /// Write directly over the slot.
    #[default]
    Never,

    /// Issue a clear command before every write.
    Always,
}

/// Sub-steps of the verified set-code workflow, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    /// PIN format validation.
    ValidatePin,

    /// Target node existence check.
    ResolveNode,

    /// Optional clear command per the `ClearBeforeSet` policy.
    ClearFirst,

    /// Best-effort read of the slot status before writing.
    PreRead,

    /// The set command itself.
    Write,

    /// Fixed wait for the non-volatile write to commit.
    Settle,

    /// Verification read after the settle delay.
    VerifyRead,

    /// Persisting the confirmed code to the local store.
    Persist,
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            WorkflowStep::ValidatePin => "validate-pin",
            WorkflowStep::ResolveNode => "resolve-node",
            WorkflowStep::ClearFirst => "clear-first",
            WorkflowStep::PreRead => "pre-read",
            WorkflowStep::Write => "write",
            WorkflowStep::Settle => "settle",
            WorkflowStep::VerifyRead => "verify-read",
            WorkflowStep::Persist => "persist",
        };
        write!(f, "{name}")
    }
}

/// Outcome of a single workflow sub-step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// Step ran and succeeded. Detail is free-form (e.g. the observed slot
    /// status).
    Completed { detail: Option<String> },

    /// Step was skipped (disabled policy, missing capability).
    Skipped { reason: String },

    /// Step failed. For best-effort steps this does not abort the workflow.
    Failed { error: String },
}

impl StepOutcome {
    /// A completed outcome without detail.
    #[must_use]
    pub fn completed() -> Self {
        Self::Completed { detail: None }
    }

    /// A completed outcome with detail text.
    pub fn completed_with(detail: impl Into<String>) -> Self {
        Self::Completed {
            detail: Some(detail.into()),
        }
    }

    /// A skipped outcome.
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    /// A failed outcome.
    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }
}

/// One recorded sub-step of a workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: WorkflowStep,
    pub outcome: StepOutcome,
}

/// Ordered trace of workflow sub-steps.
///
/// The core records what happened at each step; presentation adapters decide
/// whether to render the trace verbosely or discard it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepTrace(Vec<StepRecord>);

impl StepTrace {
    /// Create an empty trace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step outcome.
    pub fn record(&mut self, step: WorkflowStep, outcome: StepOutcome) {
        self.0.push(StepRecord { step, outcome });
    }

    /// Steps in execution order.
    #[must_use]
    pub fn steps(&self) -> &[StepRecord] {
        &self.0
    }

    /// Look up the outcome of a step, if it was recorded.
    #[must_use]
    pub fn outcome_of(&self, step: WorkflowStep) -> Option<&StepOutcome> {
        self.0.iter().find(|r| r.step == step).map(|r| &r.outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1", 1)]
    #[case("8", 8)]
    #[case("232", 232)]
    fn test_node_id_valid(#[case] input: &str, #[case] expected: u8) {
        let id: NodeId = input.parse().unwrap();
        assert_eq!(id.as_u8(), expected);
    }

    #[rstest]
    #[case("0")] // below range
    #[case("233")] // above range
    #[case("abc")] // non-numeric
    fn test_node_id_invalid(#[case] input: &str) {
        let result: Result<NodeId> = input.parse();
        assert!(result.is_err());
    }

    #[rstest]
    #[case(1)]
    #[case(15)]
    #[case(30)]
    fn test_code_slot_valid(#[case] slot: u8) {
        assert_eq!(CodeSlot::new(slot).unwrap().as_u8(), slot);
    }

    #[rstest]
    #[case(0)]
    #[case(31)]
    fn test_code_slot_invalid(#[case] slot: u8) {
        assert!(CodeSlot::new(slot).is_err());
    }

    #[rstest]
    #[case("1234")]
    #[case("00000000")]
    #[case("4321")]
    fn test_pin_valid(#[case] input: &str) {
        let pin = PinCode::new(input).unwrap();
        assert_eq!(pin.as_str(), input);
        assert_eq!(pin.len(), input.len());
    }

    #[rstest]
    #[case("123")] // too short
    #[case("123456789")] // too long
    #[case("12a4")] // non-digit
    #[case("12 4")] // whitespace
    #[case("")] // empty
    fn test_pin_invalid(#[case] input: &str) {
        assert!(PinCode::new(input).is_err());
    }

    #[test]
    fn test_pin_constant_time_eq() {
        let a = PinCode::new("1234").unwrap();
        let b = PinCode::new("1234").unwrap();
        let c = PinCode::new("12345").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_pin_debug_redacts() {
        let pin = PinCode::new("987654").unwrap();
        let debug = format!("{pin:?}");
        assert!(!debug.contains("987654"));
        assert!(debug.contains("6 digits"));

        let display = format!("{pin}");
        assert!(!display.contains("987654"));
    }

    #[test]
    fn test_set_code_outcome_classification() {
        assert!(SetCodeOutcome::Confirmed.is_confirmed());
        assert!(!SetCodeOutcome::Confirmed.is_rejected());

        let dup = SetCodeOutcome::RejectedLikelyDuplicate {
            occupied_slot: CodeSlot::new(5).unwrap(),
        };
        assert!(dup.is_rejected());
        assert!(!dup.is_confirmed());

        assert!(SetCodeOutcome::RejectedUnknownReason.is_rejected());
        assert!(!SetCodeOutcome::DeviceUnreachable.is_rejected());
        assert!(!SetCodeOutcome::DeviceUnreachable.is_confirmed());
    }

    #[test]
    fn test_outcome_display() {
        let dup = SetCodeOutcome::RejectedLikelyDuplicate {
            occupied_slot: CodeSlot::new(5).unwrap(),
        };
        assert_eq!(dup.to_string(), "rejected (likely duplicate of slot 5)");
    }

    #[test]
    fn test_clear_before_set_default() {
        assert_eq!(ClearBeforeSet::default(), ClearBeforeSet::Never);
    }

    #[test]
    fn test_step_trace_ordering() {
        let mut trace = StepTrace::new();
        trace.record(WorkflowStep::ValidatePin, StepOutcome::completed());
        trace.record(WorkflowStep::Write, StepOutcome::completed());
        trace.record(
            WorkflowStep::VerifyRead,
            StepOutcome::completed_with("occupied"),
        );

        let steps: Vec<_> = trace.steps().iter().map(|r| r.step).collect();
        assert_eq!(
            steps,
            vec![
                WorkflowStep::ValidatePin,
                WorkflowStep::Write,
                WorkflowStep::VerifyRead
            ]
        );

        assert_eq!(
            trace.outcome_of(WorkflowStep::VerifyRead),
            Some(&StepOutcome::completed_with("occupied"))
        );
        assert_eq!(trace.outcome_of(WorkflowStep::Settle), None);
    }

    #[test]
    fn test_slot_status_serde() {
        let json = serde_json::to_string(&SlotStatus::Occupied).unwrap();
        assert_eq!(json, "\"occupied\"");
        let back: SlotStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SlotStatus::Occupied);
    }
}
