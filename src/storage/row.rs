//! Fixed-width row codec.
//!
//! A row is `id: u32` followed by a 33-byte username zone and a 256-byte
//! email zone, copied bit-exact into/out of a leaf cell's value region.

/// Max payload length of `username`, not counting the terminator byte.
pub const COLUMN_USERNAME_SIZE: usize = 32;
/// Max payload length of `email`, not counting the terminator byte.
pub const COLUMN_EMAIL_SIZE: usize = 255;

const ID_SIZE: usize = 4;
const USERNAME_SIZE: usize = COLUMN_USERNAME_SIZE + 1;
const EMAIL_SIZE: usize = COLUMN_EMAIL_SIZE + 1;

const ID_OFFSET: usize = 0;
const USERNAME_OFFSET: usize = ID_OFFSET + ID_SIZE;
const EMAIL_OFFSET: usize = USERNAME_OFFSET + USERNAME_SIZE;

/// Total size of a serialized row, in bytes.
pub const ROW_SIZE: usize = ID_SIZE + USERNAME_SIZE + EMAIL_SIZE;

/// A single table row, fields decoded to owned `String`s for display and
/// construction convenience. On disk it is always exactly `ROW_SIZE` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: u32,
    pub username: String,
    pub email: String,
}

impl Row {
    pub fn new(id: u32, username: impl Into<String>, email: impl Into<String>) -> Row {
        Row {
            id,
            username: username.into(),
            email: email.into(),
        }
    }

    /// Serializes into the fixed `ROW_SIZE`-byte region at `dst`.
    ///
    /// `dst` must be exactly `ROW_SIZE` bytes. Short strings are
    /// zero-padded so repeated serializations of equal rows are byte-identical.
    pub fn serialize(&self, dst: &mut [u8]) {
        debug_assert_eq!(dst.len(), ROW_SIZE);
        dst[ID_OFFSET..ID_OFFSET + ID_SIZE].copy_from_slice(&self.id.to_le_bytes());
        write_fixed_str(&mut dst[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_SIZE], &self.username);
        write_fixed_str(&mut dst[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_SIZE], &self.email);
    }

    /// Inverse of `serialize`. `src` must be exactly `ROW_SIZE` bytes.
    pub fn deserialize(src: &[u8]) -> Row {
        debug_assert_eq!(src.len(), ROW_SIZE);
        let id = u32::from_le_bytes(src[ID_OFFSET..ID_OFFSET + ID_SIZE].try_into().unwrap());
        let username = read_fixed_str(&src[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_SIZE]);
        let email = read_fixed_str(&src[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_SIZE]);
        Row { id, username, email }
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {} )", self.id, self.username, self.email)
    }
}

use std::fmt;

fn write_fixed_str(dst: &mut [u8], s: &str) {
    let bytes = s.as_bytes();
    dst.fill(0);
    dst[..bytes.len()].copy_from_slice(bytes);
}

fn read_fixed_str(src: &[u8]) -> String {
    let end = src.iter().position(|&b| b == 0).unwrap_or(src.len());
    String::from_utf8_lossy(&src[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let row = Row::new(7, "alice", "alice@example.com");
        let mut buf = [0u8; ROW_SIZE];
        row.serialize(&mut buf);
        assert_eq!(Row::deserialize(&buf), row);
    }

    #[test]
    fn short_strings_are_zero_padded() {
        let row = Row::new(1, "a", "b");
        let mut buf = [0xAAu8; ROW_SIZE];
        row.serialize(&mut buf);
        assert!(buf[USERNAME_OFFSET + 1..USERNAME_OFFSET + USERNAME_SIZE]
            .iter()
            .all(|&b| b == 0));
        assert!(buf[EMAIL_OFFSET + 1..EMAIL_OFFSET + EMAIL_SIZE]
            .iter()
            .all(|&b| b == 0));
    }

    #[test]
    fn repeated_serialize_is_byte_identical() {
        let row = Row::new(42, "bob", "bob@example.com");
        let mut a = [0u8; ROW_SIZE];
        let mut b = [1u8; ROW_SIZE];
        row.serialize(&mut a);
        row.serialize(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn max_length_fields_round_trip() {
        let username = "u".repeat(COLUMN_USERNAME_SIZE);
        let email = "e".repeat(COLUMN_EMAIL_SIZE);
        let row = Row::new(9, username, email);
        let mut buf = [0u8; ROW_SIZE];
        row.serialize(&mut buf);
        assert_eq!(Row::deserialize(&buf), row);
    }

    #[test]
    fn row_size_is_291_bytes() {
        assert_eq!(ROW_SIZE, 291);
    }
}
