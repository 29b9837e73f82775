//! # Digest Subcommand
//!
//! Computes the digest the anchor log would hold for a record: SHA-256 over
//! its canonical bytes. With `--expect`, compares against a known anchor.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use prov_core::{sha256_digest, CanonicalBytes, ContentDigest};

/// Arguments for the `prov digest` subcommand.
#[derive(Args, Debug)]
pub struct DigestArgs {
    /// JSON or YAML file holding one record.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Expected `sha256:<hex>` digest; exit status 1 on mismatch.
    #[arg(long)]
    pub expect: Option<String>,

    /// Also print the canonical bytes.
    #[arg(long)]
    pub show_canonical: bool,
}

/// Execute the digest subcommand.
pub fn run_digest(args: &DigestArgs) -> Result<u8> {
    let value = crate::read_document(&args.file)?;
    let canonical = CanonicalBytes::new(&value).context("canonicalization failed")?;
    let digest = sha256_digest(&canonical);

    if args.show_canonical {
        println!("{}", String::from_utf8_lossy(canonical.as_bytes()));
    }

    match &args.expect {
        None => {
            println!("{digest}");
            Ok(0)
        }
        Some(expected) => {
            let expected = ContentDigest::parse(expected)
                .with_context(|| format!("invalid expected digest {expected:?}"))?;
            if expected == digest {
                println!("MATCH: {digest}");
                Ok(0)
            } else {
                println!("MISMATCH: computed {digest}, expected {expected}");
                Ok(1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    fn args(file: PathBuf, expect: Option<String>) -> DigestArgs {
        DigestArgs {
            file,
            expect,
            show_canonical: false,
        }
    }

    #[test]
    fn key_order_does_not_change_the_digest() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(&dir, "a.json", r#"{"id": "B1", "quantity": 700}"#);
        let b = write(&dir, "b.json", r#"{"quantity": 700, "id": "B1"}"#);
        let da = sha256_digest(&CanonicalBytes::new(&crate::read_document(&a).unwrap()).unwrap());
        let db = sha256_digest(&CanonicalBytes::new(&crate::read_document(&b).unwrap()).unwrap());
        assert_eq!(da, db);
    }

    #[test]
    fn expected_digest_match_and_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(&dir, "r.json", r#"{"id": "B1"}"#);
        let value = crate::read_document(&file).unwrap();
        let digest = sha256_digest(&CanonicalBytes::new(&value).unwrap());

        assert_eq!(run_digest(&args(file.clone(), Some(digest.to_string()))).unwrap(), 0);

        let other = write(&dir, "s.json", r#"{"id": "B2"}"#);
        assert_eq!(run_digest(&args(other, Some(digest.to_string()))).unwrap(), 1);
    }

    #[test]
    fn malformed_expectation_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(&dir, "r.json", "{}");
        assert!(run_digest(&args(file, Some("md5:abc".into()))).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = run_digest(&args(PathBuf::from("/nonexistent/r.json"), None)).unwrap_err();
        assert!(err.to_string().contains("failed to read file"));
    }
}
