use std::fmt::{Display, Error, Formatter};

use serde::{Deserialize, Serialize};

use crate::serializer::{Reader, ReaderError, Serializer, Writer};

// Numeric identifiers of the collaborating subsystems.
// Each one is a distinct type so a booking id can never be passed where
// an account id is expected.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            pub const fn value(&self) -> u64 {
                self.0
            }

            pub const fn to_be_bytes(&self) -> [u8; 8] {
                self.0.to_be_bytes()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl Serializer for $name {
            fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
                Ok(Self(reader.read_u64()?))
            }

            fn write(&self, writer: &mut Writer) {
                writer.write_u64(self.0);
            }

            fn size(&self) -> usize {
                8
            }
        }
    };
}

define_id!(
    /// User account owning a points balance
    AccountId
);
define_id!(
    /// Booking in the marketplace booking subsystem
    BookingId
);
define_id!(
    /// Review in the review subsystem
    ReviewId
);
define_id!(
    /// Ledger entry, allocated sequentially by the ledger store
    EntryId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_serde() {
        let id = BookingId::new(500);
        assert_eq!(id.to_string(), "500");
        assert_eq!(serde_json::to_string(&id).unwrap(), "500");
        assert_eq!(BookingId::from_bytes(&id.to_bytes()).unwrap(), id);
    }
}
