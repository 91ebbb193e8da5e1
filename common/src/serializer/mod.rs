mod defaults;
mod reader;
mod writer;

pub use reader::{Reader, ReaderError};
pub use writer::Writer;

// Binary encoding used for every value persisted by the storage layer
pub trait Serializer {
    fn write(&self, writer: &mut Writer);

    fn read(reader: &mut Reader) -> Result<Self, ReaderError>
    where
        Self: Sized;

    fn size(&self) -> usize {
        self.to_bytes().len()
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        let mut writer = Writer::new(&mut buffer);
        self.write(&mut writer);
        buffer
    }

    fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    // Decode the whole slice, trailing bytes are rejected
    fn from_bytes(bytes: &[u8]) -> Result<Self, ReaderError>
    where
        Self: Sized,
    {
        let mut reader = Reader::new(bytes);
        let value = Self::read(&mut reader)?;
        if reader.size() != 0 {
            return Err(ReaderError::TrailingBytes(reader.size()));
        }
        Ok(value)
    }

    fn from_hex(hex: &str) -> Result<Self, ReaderError>
    where
        Self: Sized,
    {
        let bytes = hex::decode(hex).map_err(|_| ReaderError::InvalidHex)?;
        Self::from_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = 42u64.to_bytes();
        bytes.push(0);
        assert_eq!(u64::from_bytes(&bytes), Err(ReaderError::TrailingBytes(1)));
    }

    #[test]
    fn test_big_endian_keeps_ordering() {
        let low = 5u64.to_bytes();
        let high = 256u64.to_bytes();
        assert!(low < high);
    }

    #[test]
    fn test_option_string() {
        let value = Some("07700 900123".to_string());
        let decoded = Option::<String>::from_bytes(&value.to_bytes()).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(value.size(), value.to_bytes().len());
    }

    #[test]
    fn test_invalid_bool() {
        assert_eq!(bool::from_bytes(&[2]), Err(ReaderError::InvalidValue));
    }
}
