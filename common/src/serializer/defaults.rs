use super::{Reader, ReaderError, Serializer, Writer};

// Maximum elements accepted when reading a Vec from disk
const MAX_ITEMS: usize = u16::MAX as usize;

impl Serializer for u8 {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_u8()
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u8(*self);
    }

    fn size(&self) -> usize {
        1
    }
}

impl Serializer for u16 {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_u16()
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u16(*self);
    }

    fn size(&self) -> usize {
        2
    }
}

impl Serializer for u32 {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_u32()
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u32(*self);
    }

    fn size(&self) -> usize {
        4
    }
}

impl Serializer for u64 {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_u64()
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u64(*self);
    }

    fn size(&self) -> usize {
        8
    }
}

impl Serializer for i64 {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_i64()
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_i64(*self);
    }

    fn size(&self) -> usize {
        8
    }
}

impl Serializer for bool {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_bool()
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_bool(*self);
    }

    fn size(&self) -> usize {
        1
    }
}

impl Serializer for String {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_string()
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_string(self);
    }

    fn size(&self) -> usize {
        2 + self.len().min(u16::MAX as usize)
    }
}

// Used for index columns where only the key matters
impl Serializer for () {
    fn read(_: &mut Reader) -> Result<Self, ReaderError> {
        Ok(())
    }

    fn write(&self, _: &mut Writer) {}

    fn size(&self) -> usize {
        0
    }
}

impl<T: Serializer> Serializer for Option<T> {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        if reader.read_bool()? {
            Ok(Some(T::read(reader)?))
        } else {
            Ok(None)
        }
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_bool(self.is_some());
        if let Some(value) = self {
            value.write(writer);
        }
    }

    fn size(&self) -> usize {
        1 + self.as_ref().map_or(0, |v| v.size())
    }
}

impl<T: Serializer> Serializer for Vec<T> {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let count = reader.read_u16()? as usize;
        if count > MAX_ITEMS {
            return Err(ReaderError::InvalidSize);
        }

        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(T::read(reader)?);
        }
        Ok(values)
    }

    fn write(&self, writer: &mut Writer) {
        let count = self.len().min(MAX_ITEMS);
        writer.write_u16(count as u16);
        for value in self.iter().take(count) {
            value.write(writer);
        }
    }

    fn size(&self) -> usize {
        2 + self.iter().take(MAX_ITEMS).map(|v| v.size()).sum::<usize>()
    }
}
