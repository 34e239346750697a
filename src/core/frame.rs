// Record framing inside table files: header layout, alignment, and bounds checks.
use crate::core::error::{Error, ErrorKind};

pub const RECORD_MAGIC: [u8; 4] = *b"REC1";
pub const RECORD_HEADER_LEN: usize = 16;
pub const MAX_KEY_LEN: usize = 64 * 1024;
pub const MAX_VALUE_ABS: usize = 256 * 1024 * 1024;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RecordHeader {
    pub key_len: u32,
    pub value_len: u32,
    pub value_len_xor: u32,
}

impl RecordHeader {
    pub fn new(key_len: u32, value_len: u32) -> Self {
        Self {
            key_len,
            value_len,
            value_len_xor: value_len ^ 0xFFFF_FFFF,
        }
    }

    pub fn encode(&self) -> [u8; RECORD_HEADER_LEN] {
        let mut buf = [0u8; RECORD_HEADER_LEN];
        buf[0..4].copy_from_slice(&RECORD_MAGIC);
        write_u32(&mut buf, 4, self.key_len);
        write_u32(&mut buf, 8, self.value_len);
        write_u32(&mut buf, 12, self.value_len_xor);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < RECORD_HEADER_LEN {
            return Err(Error::new(ErrorKind::Decode).with_message("record header too small"));
        }
        if buf[0..4] != RECORD_MAGIC {
            return Err(Error::new(ErrorKind::Decode).with_message("bad record magic"));
        }
        Ok(Self {
            key_len: read_u32(buf, 4),
            value_len: read_u32(buf, 8),
            value_len_xor: read_u32(buf, 12),
        })
    }

    /// Checks the header against the bytes left in the record region.
    pub fn validate(&self, remaining: usize) -> Result<(), Error> {
        if self.value_len ^ self.value_len_xor != 0xFFFF_FFFF {
            return Err(Error::new(ErrorKind::Decode).with_message("value length xor mismatch"));
        }
        if self.key_len as usize > MAX_KEY_LEN {
            return Err(Error::new(ErrorKind::Decode).with_message("key length exceeds max"));
        }
        if self.value_len as usize > MAX_VALUE_ABS {
            return Err(Error::new(ErrorKind::Decode).with_message("value length exceeds max"));
        }
        let total = record_total_len(self.key_len as usize, self.value_len as usize)
            .ok_or_else(|| Error::new(ErrorKind::Decode).with_message("record length overflow"))?;
        if total > remaining {
            return Err(Error::new(ErrorKind::Decode).with_message("record exceeds table"));
        }
        Ok(())
    }
}

pub fn align8(value: usize) -> usize {
    (value + 7) & !7
}

pub fn record_total_len(key_len: usize, value_len: usize) -> Option<usize> {
    let raw = RECORD_HEADER_LEN
        .checked_add(key_len)?
        .checked_add(value_len)?;
    raw.checked_add(7)?;
    Some(align8(raw))
}

pub fn encode_record(key: &[u8], value: &[u8]) -> Result<Vec<u8>, Error> {
    if key.len() > MAX_KEY_LEN {
        return Err(Error::new(ErrorKind::Usage).with_message("key length exceeds max"));
    }
    if value.len() > MAX_VALUE_ABS {
        return Err(Error::new(ErrorKind::Usage).with_message("value length exceeds max"));
    }
    let total = record_total_len(key.len(), value.len())
        .ok_or_else(|| Error::new(ErrorKind::Usage).with_message("record length overflow"))?;
    let header = RecordHeader::new(key.len() as u32, value.len() as u32);
    let mut buf = Vec::with_capacity(total);
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(key);
    buf.extend_from_slice(value);
    buf.resize(total, 0);
    Ok(buf)
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    let mut out = [0u8; 4];
    out.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_le_bytes(out)
}

fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::{
        RECORD_HEADER_LEN, RecordHeader, align8, encode_record, record_total_len,
    };
    use crate::core::error::ErrorKind;

    #[test]
    fn alignment_is_8_bytes() {
        assert_eq!(align8(0), 0);
        assert_eq!(align8(1), 8);
        assert_eq!(align8(8), 8);
        assert_eq!(align8(9), 16);
    }

    #[test]
    fn record_total_len_is_aligned() {
        assert_eq!(record_total_len(4, 1), Some(24));
        assert_eq!(record_total_len(0, 0), Some(RECORD_HEADER_LEN));
        assert_eq!(record_total_len(usize::MAX, 1), None);
    }

    #[test]
    fn header_round_trip() {
        let header = RecordHeader::new(4, 12);
        let decoded = RecordHeader::decode(&header.encode()).expect("decode");
        assert_eq!(header, decoded);
    }

    #[test]
    fn header_rejects_torn_value_len() {
        let mut header = RecordHeader::new(4, 8);
        header.value_len_xor = 0;
        let err = header.validate(1024).expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn header_rejects_record_past_region_end() {
        let header = RecordHeader::new(4, 100);
        let err = header.validate(64).expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert_eq!(err.message(), Some("record exceeds table"));
    }

    #[test]
    fn encoded_record_is_padded() {
        let buf = encode_record(b"key0", b"abc").expect("encode");
        assert_eq!(buf.len(), 24);
        let header = RecordHeader::decode(&buf).expect("header");
        assert_eq!(header.key_len, 4);
        assert_eq!(header.value_len, 3);
        assert_eq!(&buf[RECORD_HEADER_LEN..RECORD_HEADER_LEN + 4], b"key0");
    }
}
