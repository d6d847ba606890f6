//! Binary credential file.
//!
//! Layout (big-endian):
//!
//! ```text
//! u8  token_len
//! i32 cookie_blob_len
//! [token_len] ASCII token bytes
//! [cookie_blob_len] opaque cookie jar blob
//! ```
//!
//! A zero `token_len` means no token is held.

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use tracing::debug;

use super::token::{MAX_TOKEN_LEN, Token};
use crate::{Error, Result};

const HEADER_LEN: usize = 5;

/// Content of the credential file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialRecord {
    pub token: Option<Token>,
    /// Serialized cookie jar, opaque to the store.
    pub cookie_blob: Vec<u8>,
}

/// Reads and writes the credential file at a fixed path.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the record; a missing file is `Ok(None)`.
    pub async fn load(&self) -> Result<Option<CredentialRecord>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record = decode(&bytes).map_err(|reason| Error::corrupt(&self.path, reason))?;
        debug!(path = %self.path.display(), has_token = record.token.is_some(), "Loaded credentials");
        Ok(Some(record))
    }

    /// Overwrite the file with `record` in a single write.
    pub async fn save(&self, record: &CredentialRecord) -> Result<()> {
        let bytes = encode(record)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, bytes).await?;
        debug!(path = %self.path.display(), "Saved credentials");
        Ok(())
    }

    /// Delete the file if present.
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "Removed credentials");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

pub(crate) fn encode(record: &CredentialRecord) -> Result<Vec<u8>> {
    let token = record.token.as_ref().map(Token::as_str).unwrap_or_default();
    if !token.is_ascii() {
        return Err(Error::invalid_input("token contains non-ASCII characters"));
    }
    let token_len = u8::try_from(token.len())
        .map_err(|_| Error::invalid_input(format!("token is {} bytes, limit is {MAX_TOKEN_LEN}", token.len())))?;
    let blob_len = i32::try_from(record.cookie_blob.len())
        .map_err(|_| Error::invalid_input("cookie blob does not fit a 32-bit length"))?;

    let mut out = Vec::with_capacity(HEADER_LEN + token.len() + record.cookie_blob.len());
    out.write_u8(token_len)?;
    out.write_i32::<BigEndian>(blob_len)?;
    out.extend_from_slice(token.as_bytes());
    out.extend_from_slice(&record.cookie_blob);
    Ok(out)
}

pub(crate) fn decode(bytes: &[u8]) -> std::result::Result<CredentialRecord, String> {
    if bytes.len() < HEADER_LEN {
        return Err(format!(
            "truncated header: {} bytes, expected at least {HEADER_LEN}",
            bytes.len()
        ));
    }

    let mut cursor = Cursor::new(bytes);
    let token_len = cursor.read_u8().map_err(|e| e.to_string())? as usize;
    let blob_len = cursor.read_i32::<BigEndian>().map_err(|e| e.to_string())?;
    let blob_len =
        usize::try_from(blob_len).map_err(|_| format!("negative cookie blob length {blob_len}"))?;

    let expected = HEADER_LEN + token_len + blob_len;
    if bytes.len() != expected {
        return Err(format!(
            "length mismatch: header declares {expected} bytes, file has {}",
            bytes.len()
        ));
    }

    let mut token = vec![0u8; token_len];
    cursor.read_exact(&mut token).map_err(|e| e.to_string())?;
    let mut cookie_blob = vec![0u8; blob_len];
    cursor.read_exact(&mut cookie_blob).map_err(|e| e.to_string())?;

    let token = if token.is_empty() {
        None
    } else {
        let token = String::from_utf8(token).map_err(|_| "token is not ASCII".to_string())?;
        Some(Token::new(token).map_err(|e| e.to_string())?)
    };

    Ok(CredentialRecord { token, cookie_blob })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(token: &str, blob: &[u8]) -> CredentialRecord {
        CredentialRecord {
            token: (!token.is_empty()).then(|| Token::new(token).unwrap()),
            cookie_blob: blob.to_vec(),
        }
    }

    #[test]
    fn encodes_documented_layout() {
        let bytes = encode(&record("abc", &[0xde, 0xad])).unwrap();
        assert_eq!(bytes, vec![3, 0, 0, 0, 2, b'a', b'b', b'c', 0xde, 0xad]);
    }

    #[test]
    fn roundtrips_boundary_lengths() {
        let long = "t".repeat(255);
        let blob: Vec<u8> = (0..=255u8).collect();
        for rec in [
            record("", &[]),
            record("x", &[]),
            record(&long, &blob),
            record("a.b.c", &[0, 0, 0, 0, 0]),
        ] {
            let bytes = encode(&rec).unwrap();
            assert_eq!(decode(&bytes).unwrap(), rec);
        }
    }

    #[test]
    fn oversized_token_never_reaches_the_file() {
        assert!(matches!(
            Token::new("t".repeat(256)),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn rejects_malformed_files() {
        assert!(decode(&[]).is_err());
        assert!(decode(&[1, 0, 0]).is_err());
        // declares a 3 byte token but carries only 2
        assert!(decode(&[3, 0, 0, 0, 0, b'a', b'b']).is_err());
        // trailing garbage
        assert!(decode(&[1, 0, 0, 0, 0, b'a', b'z']).is_err());
        // negative blob length
        assert!(decode(&[0, 0xff, 0xff, 0xff, 0xff]).is_err());
        // non-ASCII token bytes
        assert!(decode(&[1, 0, 0, 0, 0, 0xc3]).is_err());
    }

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let temp = TempDir::new().unwrap();
        let store = CredentialStore::new(temp.path().join("missing.bin"));
        assert!(store.load().await.unwrap().is_none());
        // clearing a missing file is fine
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn save_load_clear() {
        let temp = TempDir::new().unwrap();
        let store = CredentialStore::new(temp.path().join("nested").join("creds.bin"));
        let rec = record("header.payload.sig", b"[]");

        store.save(&rec).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(rec));

        store.clear().await.unwrap();
        assert!(!store.path().exists());
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_is_fatal() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("creds.bin");
        tokio::fs::write(&path, [9, 0, 0, 0, 1, b'x']).await.unwrap();

        let err = CredentialStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, Error::CorruptCredentials { .. }));
    }
}
