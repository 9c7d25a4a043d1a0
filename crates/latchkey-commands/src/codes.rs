//! User-code management: the verified set-code workflow, deletion, and
//! slot enumeration.
//!
//! The lock acknowledges user-code writes at the transport level even when
//! it silently discards the code (duplicate PIN, policy violation), so a
//! write acknowledgment proves nothing. The set-code workflow therefore
//! writes, waits out a settle delay for the non-volatile commit, re-reads
//! the slot status, and classifies what it finds. Success is only ever
//! declared from an observed occupied slot.

use crate::{LockCommands, driver_error};
use latchkey_core::{
    ClearBeforeSet, CodeSlot, Error, NodeId, PinCode, Result, SetCodeOutcome, SlotStatus,
    StepOutcome, StepTrace, WorkflowStep, constants::MIN_CODE_SLOT,
};
use latchkey_driver::LockDriver;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Result of a verified set-code attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetCodeReport {
    /// Classification of the verification read.
    pub outcome: SetCodeOutcome,

    /// Ordered record of every workflow sub-step.
    pub trace: StepTrace,
}

/// Result of a code deletion.
///
/// Failing to clear on the device is tolerated: a code that should be gone
/// but still opens the door is found on the next verification, while the
/// store removal below is unconditional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteCodeReport {
    /// Whether the device acknowledged the clear command.
    pub cleared_on_device: bool,

    /// Whether a record for the slot existed in the store before removal.
    pub removed_from_store: bool,
}

/// One occupied (or unreadable) slot from an enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotEntry {
    pub slot: CodeSlot,
    pub status: SlotStatus,

    /// Label cached in the local store, when the slot is known there.
    pub label: Option<String>,
}

impl LockCommands {
    /// Set a user code and verify the lock actually kept it.
    ///
    /// Steps: validate the PIN, resolve the node, optionally clear the slot
    /// first, best-effort pre-read, write, settle, verification read,
    /// persist on confirmation. The returned trace records every step.
    ///
    /// The store is only touched on a `Confirmed` outcome. A transport
    /// failure during verification yields `DeviceUnreachable`: the write may
    /// still have landed, and the caller re-verifies later.
    ///
    /// # Errors
    ///
    /// Fail-fast conditions are errors rather than outcomes:
    /// `InvalidFormat` for a malformed PIN, `NotFound` for an unknown node,
    /// plus session-level failures from `acquire()`.
    pub async fn set_code(
        &mut self,
        node_id: NodeId,
        slot: CodeSlot,
        pin: &str,
        label: &str,
    ) -> Result<SetCodeReport> {
        let mut trace = StepTrace::new();

        let pin = PinCode::new(pin)?;
        trace.record(WorkflowStep::ValidatePin, StepOutcome::completed());

        let session = self.session.acquire().await?;
        let mut driver = session.driver().await;

        match driver.node_exists(node_id).await {
            Ok(true) => trace.record(WorkflowStep::ResolveNode, StepOutcome::completed()),
            Ok(false) => return Err(Error::not_found(format!("node {node_id}"))),
            Err(err) if err.is_transport() => {
                trace.record(WorkflowStep::ResolveNode, StepOutcome::failed(err.to_string()));
                return Ok(SetCodeReport {
                    outcome: SetCodeOutcome::DeviceUnreachable,
                    trace,
                });
            }
            Err(err) => return Err(driver_error(err)),
        }

        match self.opts.clear_policy(node_id) {
            ClearBeforeSet::Always => match driver.user_code_clear(node_id, slot).await {
                Ok(()) => trace.record(WorkflowStep::ClearFirst, StepOutcome::completed()),
                Err(err) if err.is_transport() => {
                    trace
                        .record(WorkflowStep::ClearFirst, StepOutcome::failed(err.to_string()));
                    return Ok(SetCodeReport {
                        outcome: SetCodeOutcome::DeviceUnreachable,
                        trace,
                    });
                }
                Err(err) => return Err(driver_error(err)),
            },
            ClearBeforeSet::Never => {
                trace.record(WorkflowStep::ClearFirst, StepOutcome::skipped("policy is never"));
            }
        }

        // Best effort: knowing the prior status helps diagnosis but its
        // absence does not block the write.
        match driver.user_code_status(node_id, slot).await {
            Ok(status) => {
                trace.record(WorkflowStep::PreRead, StepOutcome::completed_with(status.to_string()));
            }
            Err(err) => {
                warn!(%node_id, %slot, %err, "pre-read failed, continuing");
                trace.record(WorkflowStep::PreRead, StepOutcome::failed(err.to_string()));
            }
        }

        match driver.user_code_set(node_id, slot, &pin).await {
            Ok(()) => trace.record(WorkflowStep::Write, StepOutcome::completed()),
            Err(err) if err.is_transport() => {
                trace.record(WorkflowStep::Write, StepOutcome::failed(err.to_string()));
                return Ok(SetCodeReport {
                    outcome: SetCodeOutcome::DeviceUnreachable,
                    trace,
                });
            }
            Err(err) => return Err(driver_error(err)),
        }

        // Release the transport during the settle wait so other commands
        // are not blocked behind it.
        drop(driver);
        tokio::time::sleep(self.opts.settle_delay).await;
        trace.record(
            WorkflowStep::Settle,
            StepOutcome::completed_with(format!("{}ms", self.opts.settle_delay.as_millis())),
        );
        let mut driver = session.driver().await;

        let outcome = match driver.user_code_status(node_id, slot).await {
            Ok(SlotStatus::Occupied) => {
                trace.record(WorkflowStep::VerifyRead, StepOutcome::completed_with("occupied"));
                SetCodeOutcome::Confirmed
            }
            Ok(status) => {
                trace.record(
                    WorkflowStep::VerifyRead,
                    StepOutcome::completed_with(status.to_string()),
                );
                match self.store.find_slot_with_pin(&pin, slot) {
                    Some(occupied_slot) => SetCodeOutcome::RejectedLikelyDuplicate { occupied_slot },
                    None => SetCodeOutcome::RejectedUnknownReason,
                }
            }
            Err(err) if err.is_transport() => {
                trace.record(WorkflowStep::VerifyRead, StepOutcome::failed(err.to_string()));
                SetCodeOutcome::DeviceUnreachable
            }
            Err(err) => return Err(driver_error(err)),
        };
        drop(driver);

        if outcome.is_confirmed() {
            self.store
                .save(slot, label, &pin)
                .map_err(|e| Error::store(e.to_string()))?;
            trace.record(WorkflowStep::Persist, StepOutcome::completed());
            info!(%node_id, %slot, label, "user code set and verified");
        } else {
            trace.record(
                WorkflowStep::Persist,
                StepOutcome::skipped(format!("outcome: {outcome}")),
            );
            warn!(%node_id, %slot, %outcome, "user code not confirmed");
        }

        Ok(SetCodeReport { outcome, trace })
    }

    /// Clear a user-code slot and forget it locally.
    ///
    /// The device clear is best-effort; the store removal is unconditional.
    /// Idempotent: clearing an empty slot succeeds.
    ///
    /// # Errors
    /// `NotFound` for an unknown node, plus session-level failures.
    pub async fn delete_code(&mut self, node_id: NodeId, slot: CodeSlot) -> Result<DeleteCodeReport> {
        let session = self.session.acquire().await?;
        let mut driver = session.driver().await;

        let cleared_on_device = match driver.node_exists(node_id).await {
            Ok(true) => match driver.user_code_clear(node_id, slot).await {
                Ok(()) => true,
                Err(err) if err.is_transport() => {
                    warn!(%node_id, %slot, %err, "device clear failed, removing from store anyway");
                    false
                }
                Err(err) => return Err(driver_error(err)),
            },
            Ok(false) => return Err(Error::not_found(format!("node {node_id}"))),
            Err(err) if err.is_transport() => {
                warn!(%node_id, %slot, %err, "node lookup failed, removing from store anyway");
                false
            }
            Err(err) => return Err(driver_error(err)),
        };
        drop(driver);

        let removed_from_store = self.store.label_of(slot).is_some();
        self.store
            .delete(slot)
            .map_err(|e| Error::store(e.to_string()))?;
        info!(%node_id, %slot, cleared_on_device, "user code deleted");

        Ok(DeleteCodeReport {
            cleared_on_device,
            removed_from_store,
        })
    }

    /// Enumerate occupied user-code slots.
    ///
    /// Enumerates up to the device-reported slot count, falling back to the
    /// configured ceiling. Each per-slot query is independently
    /// fault-tolerant: an unreadable slot is reported with `Unknown` status
    /// rather than failing the listing.
    ///
    /// # Errors
    /// `NotFound` for an unknown node, plus session-level failures.
    pub async fn list_codes(&self, node_id: NodeId) -> Result<Vec<SlotEntry>> {
        let session = self.session.acquire().await?;
        let mut driver = session.driver().await;

        if !driver.node_exists(node_id).await.map_err(driver_error)? {
            return Err(Error::not_found(format!("node {node_id}")));
        }

        let ceiling = match driver.user_code_slot_count(node_id).await {
            Ok(Some(count)) => count.min(self.opts.slot_ceiling),
            Ok(None) => self.opts.slot_ceiling,
            Err(err) => {
                warn!(%node_id, %err, "slot count query failed, using configured ceiling");
                self.opts.slot_ceiling
            }
        };

        let mut entries = Vec::new();
        for raw in MIN_CODE_SLOT..=ceiling {
            let Ok(slot) = CodeSlot::new(raw) else { break };
            let status = match driver.user_code_status(node_id, slot).await {
                Ok(status) => status,
                Err(err) => {
                    warn!(%node_id, %slot, %err, "slot status query failed");
                    SlotStatus::Unknown
                }
            };
            if status == SlotStatus::Available {
                continue;
            }
            entries.push(SlotEntry {
                slot,
                status,
                label: self.store.label_of(slot).map(str::to_string),
            });
        }
        Ok(entries)
    }
}
