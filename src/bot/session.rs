// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::bot::state::State;
use crate::models::{InvestmentType, PaymentMethod, TransactionType};

/// `(chat id, user id)`.
pub type SessionKey = (i64, i64);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionDraft {
    pub kind: Option<TransactionType>,
    pub amount: Option<Decimal>,
    pub description: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuyDraft {
    pub kind: Option<InvestmentType>,
    pub ticker: Option<String>,
    pub quantity: Option<Decimal>,
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SellDraft {
    pub investment_id: Option<i64>,
    pub ticker: Option<String>,
    pub available: Option<Decimal>,
    pub quantity: Option<Decimal>,
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryDraft {
    pub kind: Option<TransactionType>,
}

/// Values collected by the wizard in progress.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Draft {
    pub transaction: TransactionDraft,
    pub buy: BuyDraft,
    pub sell: SellDraft,
    pub category: CategoryDraft,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub state: State,
    pub draft: Draft,
    pub last_seen: DateTime<Utc>,
}

impl Session {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            state: State::MainMenu,
            draft: Draft::default(),
            last_seen: now,
        }
    }

    /// Jump to `state` and forget any half-filled wizard.
    pub fn reset(&mut self, state: State) {
        self.state = state;
        self.draft = Draft::default();
    }
}

#[derive(Default)]
struct Slots {
    live: HashMap<SessionKey, Session>,
    /// Keys whose session was swept; their next load still reports expiry.
    swept: HashSet<SessionKey>,
}

/// In-memory sessions. The lock is only held while copying a session in or
/// out, never while a handler runs.
pub struct SessionStore {
    sessions: Mutex<Slots>,
    timeout: Duration,
}

impl SessionStore {
    pub fn new(timeout: std::time::Duration) -> Self {
        Self {
            sessions: Mutex::new(Slots::default()),
            timeout: Duration::from_std(timeout).unwrap_or_else(|_| Duration::minutes(30)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        // A panicking handler never leaves a half-written entry behind, so the
        // map is still usable after poisoning.
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_expired(&self, session: &Session, now: DateTime<Utc>) -> bool {
        now - session.last_seen > self.timeout
    }

    /// The stored session, or a fresh one. The flag is true when an existing
    /// session had gone idle past the timeout and was discarded.
    pub fn load(&self, key: SessionKey, now: DateTime<Utc>) -> (Session, bool) {
        let mut slots = self.lock();
        let swept = slots.swept.remove(&key);
        match slots.live.remove(&key) {
            Some(existing) if self.is_expired(&existing, now) => {
                debug!(chat_id = key.0, user_id = key.1, "session expired");
                (Session::new(now), true)
            }
            Some(existing) => (existing, false),
            None => (Session::new(now), swept),
        }
    }

    pub fn store(&self, key: SessionKey, session: Session) {
        let mut slots = self.lock();
        slots.swept.remove(&key);
        slots.live.insert(key, session);
    }

    pub fn clear(&self, key: SessionKey) {
        let mut slots = self.lock();
        slots.swept.remove(&key);
        slots.live.remove(&key);
    }

    pub fn get(&self, key: SessionKey) -> Option<Session> {
        self.lock().live.get(&key).cloned()
    }

    /// Drop every idle session, remembering its key so the next message
    /// still gets the expiry notice. Returns how many went.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut slots = self.lock();
        let idle: Vec<SessionKey> = slots
            .live
            .iter()
            .filter(|(_, s)| self.is_expired(s, now))
            .map(|(key, _)| *key)
            .collect();
        for key in &idle {
            slots.live.remove(key);
            slots.swept.insert(*key);
        }
        idle.len()
    }

    /// Live sessions only.
    pub fn len(&self) -> usize {
        self.lock().live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, minute, 0).unwrap()
    }

    fn store() -> SessionStore {
        SessionStore::new(std::time::Duration::from_secs(30 * 60))
    }

    #[test]
    fn load_returns_what_was_stored() {
        let sessions = store();
        let mut s = Session::new(at(0));
        s.state = State::TransactionAmount;
        s.draft.transaction.kind = Some(TransactionType::Expense);
        sessions.store((1, 1), s.clone());

        let (loaded, expired) = sessions.load((1, 1), at(10));
        assert!(!expired);
        assert_eq!(loaded, s);
        // Unrelated key starts fresh.
        let (other, expired) = sessions.load((1, 2), at(10));
        assert!(!expired);
        assert_eq!(other.state, State::MainMenu);
    }

    #[test]
    fn idle_session_expires() {
        let sessions = store();
        let mut s = Session::new(at(0));
        s.state = State::BuyPrice;
        sessions.store((7, 7), s);

        let (loaded, expired) = sessions.load((7, 7), at(31));
        assert!(expired);
        assert_eq!(loaded.state, State::MainMenu);
        assert_eq!(loaded.draft, Draft::default());
    }

    #[test]
    fn sweep_drops_only_idle_sessions() {
        let sessions = store();
        sessions.store((1, 1), Session::new(at(0)));
        sessions.store((2, 2), Session::new(at(20)));
        assert_eq!(sessions.sweep(at(45)), 1);
        assert_eq!(sessions.len(), 1);
        assert!(sessions.get((2, 2)).is_some());
        sessions.clear((2, 2));
        assert!(sessions.is_empty());
    }

    #[test]
    fn swept_session_still_reports_expiry_once() {
        let sessions = store();
        let mut s = Session::new(at(0));
        s.state = State::TransactionAmount;
        sessions.store((3, 3), s);
        assert_eq!(sessions.sweep(at(40)), 1);
        assert!(sessions.get((3, 3)).is_none());

        let (fresh, expired) = sessions.load((3, 3), at(41));
        assert!(expired);
        assert_eq!(fresh.state, State::MainMenu);
        sessions.store((3, 3), fresh);
        let (_, expired) = sessions.load((3, 3), at(42));
        assert!(!expired);
    }

    #[test]
    fn reset_forgets_draft() {
        let mut s = Session::new(at(0));
        s.state = State::SellQuantity;
        s.draft.sell.ticker = Some("PETR4".into());
        s.reset(State::InvestmentMenu);
        assert_eq!(s.state, State::InvestmentMenu);
        assert_eq!(s.draft, Draft::default());
    }
}
