use serde::{Deserialize, Serialize};

use crate::{
    error::BalanceError,
    serializer::{Reader, ReaderError, Serializer, Writer},
};

/// Balance of an account as derived from its entries.
///
/// `confirmed` is the only spendable amount. `pending` is the sum of the
/// pending earn entries, shown separately and never redeemable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub confirmed: u64,
    pub pending: u64,
}

impl Balance {
    pub fn new(confirmed: u64, pending: u64) -> Self {
        Self { confirmed, pending }
    }

    pub fn redeemable(&self) -> u64 {
        self.confirmed
    }

    pub fn add_pending(&mut self, amount: u64) -> Result<(), BalanceError> {
        self.pending = self
            .pending
            .checked_add(amount)
            .ok_or(BalanceError::Overflow)?;
        Ok(())
    }

    // Pending points leave the pending bucket without reaching the balance
    pub fn release_pending(&mut self, amount: u64) -> Result<(), BalanceError> {
        self.pending = self
            .pending
            .checked_sub(amount)
            .ok_or(BalanceError::PendingUnderflow {
                amount,
                pending: self.pending,
            })?;
        Ok(())
    }

    // Pending points move into the confirmed balance
    pub fn confirm_pending(&mut self, amount: u64) -> Result<(), BalanceError> {
        let confirmed = self
            .confirmed
            .checked_add(amount)
            .ok_or(BalanceError::Overflow)?;
        self.release_pending(amount)?;
        self.confirmed = confirmed;
        Ok(())
    }

    pub fn credit(&mut self, amount: u64) -> Result<(), BalanceError> {
        self.confirmed = self
            .confirmed
            .checked_add(amount)
            .ok_or(BalanceError::Overflow)?;
        Ok(())
    }

    // Never lets the confirmed balance go below zero
    pub fn debit(&mut self, amount: u64) -> Result<(), BalanceError> {
        self.confirmed = self
            .confirmed
            .checked_sub(amount)
            .ok_or(BalanceError::Insufficient {
                need: amount,
                have: self.confirmed,
            })?;
        Ok(())
    }

    // Apply a signed delta to the confirmed balance
    pub fn apply_confirmed(&mut self, delta: i64) -> Result<(), BalanceError> {
        if delta >= 0 {
            self.credit(delta.unsigned_abs())
        } else {
            self.debit(delta.unsigned_abs())
        }
    }
}

impl Serializer for Balance {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Self {
            confirmed: reader.read_u64()?,
            pending: reader.read_u64()?,
        })
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u64(self.confirmed);
        writer.write_u64(self.pending);
    }

    fn size(&self) -> usize {
        16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_is_not_redeemable() {
        let mut balance = Balance::default();
        balance.add_pending(42).unwrap();
        assert_eq!(balance.redeemable(), 0);
        assert_eq!(
            balance.debit(10),
            Err(BalanceError::Insufficient { need: 10, have: 0 })
        );
    }

    #[test]
    fn test_confirm_moves_points() {
        let mut balance = Balance::new(100, 42);
        balance.confirm_pending(42).unwrap();
        assert_eq!(balance, Balance::new(142, 0));
    }

    #[test]
    fn test_release_does_not_touch_confirmed() {
        let mut balance = Balance::new(100, 42);
        balance.release_pending(42).unwrap();
        assert_eq!(balance, Balance::new(100, 0));
    }

    #[test]
    fn test_failed_confirm_leaves_balance_untouched() {
        let mut balance = Balance::new(5, 1);
        assert!(balance.confirm_pending(2).is_err());
        assert_eq!(balance, Balance::new(5, 1));
    }

    #[test]
    fn test_signed_delta() {
        let mut balance = Balance::new(100, 0);
        balance.apply_confirmed(-40).unwrap();
        balance.apply_confirmed(15).unwrap();
        assert_eq!(balance.confirmed, 75);
        assert!(balance.apply_confirmed(-76).is_err());
        assert_eq!(balance.confirmed, 75);
    }
}
