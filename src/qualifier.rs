//! Call qualification.
//!
//! Decides whether a retrieved call counts as "accepted" (a human picked up)
//! or "missed" for lead purposes, using only call-leg metadata. Pure and
//! deterministic, no I/O, so the leg matrix can be exhaustively unit tested.

use crate::models::CallRecord;

/// Connection states that count as an answered leg.
pub const CONNECTED_STATUSES: [&str; 4] = ["CallConnected", "Answered", "HoldOn", "HoldOff"];

/// Outcome of qualification in the accepted sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qualification {
    Accepted,
    NotAccepted,
}

/// Qualify a call as accepted.
///
/// Rules, evaluated in order, short-circuiting:
/// 1. spam → NotAccepted
/// 2. blocked → NotAccepted
/// 3. no legs → NotAccepted (insufficient data)
/// 4. first leg with `result == "Accepted"` and a connected telephony status
///    → Accepted
/// 5. otherwise NotAccepted
pub fn qualify(call: &CallRecord) -> Qualification {
    if call.spam {
        return Qualification::NotAccepted;
    }
    if call.blocked {
        return Qualification::NotAccepted;
    }
    if call.legs.is_empty() {
        return Qualification::NotAccepted;
    }

    for leg in &call.legs {
        if leg.result == "Accepted" && CONNECTED_STATUSES.contains(&leg.telephony_status.as_str())
        {
            return Qualification::Accepted;
        }
    }

    Qualification::NotAccepted
}

/// Qualify a call as missed: real call data (not spam, not blocked, at least
/// one leg) that no one answered. Spam, blocked, and legless calls qualify
/// for neither pipeline.
pub fn is_missed(call: &CallRecord) -> bool {
    !call.spam && !call.blocked && !call.legs.is_empty() && qualify(call) == Qualification::NotAccepted
}
