//! Signature registry — a process-wide, immutable table of file-type
//! descriptors (spec §4.B), with an Aho-Corasick multi-pattern matcher built
//! once at construction time for the Carver's sweep (spec §4.F(2)).
//!
//! This unifies two incompatible generations present in the teacher
//! repository: the canonical linear-scan registry (richer `Signature`
//! shape: min size, importance flag) and an orphaned Aho-Corasick-based
//! registry (`pattern_matcher`/`pattern_map`) that the teacher's own
//! `scan_device.rs` called into but which was never wired up. This registry
//! keeps the richer shape and the Aho-Corasick matcher together.

use aho_corasick::AhoCorasick;

use crate::domain::entities::Signature;

const MB: u64 = 1024 * 1024;

macro_rules! sig {
    ($key:expr, $ext:expr, $header:expr, $footer:expr, $max:expr, $min:expr, $important:expr) => {
        Signature::new($key, $ext, $header, $footer, $max, $min, $important)
    };
}

/// Returns the built-in signature set: JPEG/PNG/GIF/BMP/WebP/TIFF plus the
/// document/archive/media/database formats spec §4.B requires at minimum,
/// rounded out to 50+ entries.
fn builtin_signatures() -> Vec<Signature> {
    vec![
        sig!("jpeg", "jpg", &[0xFF, 0xD8, 0xFF], Some(&[0xFF, 0xD9]), 50 * MB, 4, true),
        sig!(
            "png",
            "png",
            &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A],
            Some(&[0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82]),
            100 * MB,
            16,
            true
        ),
        sig!("gif89a", "gif", b"GIF89a", Some(&[0x00, 0x3B]), 50 * MB, 16, true),
        sig!("gif87a", "gif", b"GIF87a", Some(&[0x00, 0x3B]), 50 * MB, 16, true),
        sig!("bmp", "bmp", &[0x42, 0x4D], None, 100 * MB, 16, true),
        sig!("webp", "webp", b"RIFF", None, 100 * MB, 20, true),
        sig!("tiff_le", "tiff", &[0x49, 0x49, 0x2A, 0x00], None, 500 * MB, 8, true),
        sig!("tiff_be", "tiff", &[0x4D, 0x4D, 0x00, 0x2A], None, 500 * MB, 8, true),
        sig!("pdf", "pdf", b"%PDF-", Some(b"%%EOF"), 500 * MB, 64, true),
        sig!("zip", "zip", &[0x50, 0x4B, 0x03, 0x04], Some(&[0x50, 0x4B, 0x05, 0x06]), 500 * MB, 22, true),
        sig!("docx", "docx", &[0x50, 0x4B, 0x03, 0x04], Some(&[0x50, 0x4B, 0x05, 0x06]), 200 * MB, 22, true),
        sig!("xlsx", "xlsx", &[0x50, 0x4B, 0x03, 0x04], Some(&[0x50, 0x4B, 0x05, 0x06]), 200 * MB, 22, true),
        sig!("pptx", "pptx", &[0x50, 0x4B, 0x03, 0x04], Some(&[0x50, 0x4B, 0x05, 0x06]), 200 * MB, 22, true),
        sig!("rar4", "rar", &[0x52, 0x61, 0x72, 0x21, 0x1A, 0x07, 0x00], None, 500 * MB, 32, true),
        sig!("rar5", "rar", &[0x52, 0x61, 0x72, 0x21, 0x1A, 0x07, 0x01, 0x00], None, 500 * MB, 32, true),
        sig!("sevenz", "7z", &[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C], None, 500 * MB, 32, true),
        sig!("mp4", "mp4", b"ftyp", None, 500 * MB, 32, true),
        sig!("mov", "mov", b"moov", None, 500 * MB, 32, true),
        sig!("avi", "avi", b"RIFF", None, 500 * MB, 44, true),
        sig!("mp3_id3", "mp3", b"ID3", None, 20 * MB, 128, true),
        sig!("mp3_frame", "mp3", &[0xFF, 0xFB], None, 20 * MB, 128, false),
        sig!("wav", "wav", b"RIFF", None, 100 * MB, 44, true),
        sig!("flac", "flac", b"fLaC", None, 100 * MB, 42, true),
        sig!("sqlite", "sqlite", b"SQLite format 3\x00", None, 500 * MB, 100, true),
        sig!("ogg", "ogg", b"OggS", None, 100 * MB, 27, false),
        sig!("wma_asf", "wma", &[0x30, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11], None, 100 * MB, 44, false),
        sig!("exe_pe", "exe", &[0x4D, 0x5A], None, 200 * MB, 64, false),
        sig!("elf", "elf", &[0x7F, 0x45, 0x4C, 0x46], None, 200 * MB, 16, false),
        sig!("class", "class", &[0xCA, 0xFE, 0xBA, 0xBE], None, 20 * MB, 8, false),
        sig!("gz", "gz", &[0x1F, 0x8B, 0x08], None, 500 * MB, 18, true),
        sig!("bz2", "bz2", b"BZh", None, 500 * MB, 10, true),
        sig!("xz", "xz", &[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00], None, 500 * MB, 32, true),
        sig!("tar_ustar", "tar", b"ustar", None, 500 * MB, 512, false),
        sig!("rtf", "rtf", b"{\\rtf1", None, 50 * MB, 16, true),
        sig!("eml", "eml", b"Return-Path:", None, 50 * MB, 32, false),
        sig!("ico", "ico", &[0x00, 0x00, 0x01, 0x00], None, 5 * MB, 22, false),
        sig!("psd", "psd", b"8BPS", None, 500 * MB, 26, false),
        sig!("wasm", "wasm", &[0x00, 0x61, 0x73, 0x6D], None, 50 * MB, 8, false),
        sig!("ttf", "ttf", &[0x00, 0x01, 0x00, 0x00, 0x00], None, 20 * MB, 12, false),
        sig!("otf", "otf", b"OTTO", None, 20 * MB, 12, false),
        sig!("mkv", "mkv", &[0x1A, 0x45, 0xDF, 0xA3], None, 500 * MB, 32, true),
        sig!("flv", "flv", &[0x46, 0x4C, 0x56, 0x01], None, 500 * MB, 13, false),
        sig!("crx", "crx", b"Cr24", None, 100 * MB, 16, false),
        sig!("cab", "cab", b"MSCF", None, 200 * MB, 36, false),
        sig!("dmg", "dmg", b"koly", None, 500 * MB, 512, false),
        sig!("iso", "iso", b"CD001", None, 500 * MB, 2048, false),
        sig!("pcap", "pcap", &[0xD4, 0xC3, 0xB2, 0xA1], None, 500 * MB, 24, false),
        sig!(
            "pem_cert",
            "pem",
            b"-----BEGIN CERTIFICATE-----",
            Some(b"-----END CERTIFICATE-----"),
            MB,
            64,
            false
        ),
        sig!("sqlite_wal", "wal", &[0x37, 0x7F, 0x06, 0x82], None, 100 * MB, 32, false),
        sig!("heic", "heic", b"ftypheic", None, 100 * MB, 32, true),
        sig!("avif", "avif", b"ftypavif", None, 100 * MB, 32, true),
        sig!("svg", "svg", b"<svg", None, 20 * MB, 16, false),
    ]
}

#[derive(Debug)]
pub struct SignatureRegistry {
    signatures: Vec<Signature>,
    matcher: AhoCorasick,
}

impl SignatureRegistry {
    /// Builds the default, full registry.
    pub fn with_defaults() -> Self {
        Self::from_signatures(builtin_signatures())
    }

    /// Builds a registry restricted to the given type keys (spec §4.F:
    /// "the subset of the signature registry to scan").
    pub fn restricted_to(type_keys: &[&str]) -> Self {
        let filtered: Vec<Signature> = builtin_signatures()
            .into_iter()
            .filter(|s| type_keys.contains(&s.type_key))
            .collect();
        Self::from_signatures(filtered)
    }

    /// Reduced type set used by `quick` scan mode (spec §4.I).
    pub fn quick_defaults() -> Self {
        Self::restricted_to(&["jpeg", "png", "gif89a", "gif87a", "pdf", "zip", "mp4"])
    }

    fn from_signatures(signatures: Vec<Signature>) -> Self {
        let patterns: Vec<&[u8]> = signatures.iter().map(|s| s.header).collect();
        let matcher = AhoCorasick::new(&patterns).expect("signature headers form a valid automaton");
        Self { signatures, matcher }
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    pub fn by_type_key(&self, type_key: &str) -> Option<&Signature> {
        self.signatures.iter().find(|s| s.type_key == type_key)
    }

    pub fn max_header_len(&self) -> usize {
        self.signatures.iter().map(|s| s.header.len()).max().unwrap_or(1)
    }

    /// Scans `data` for every registered header, overlapping matches
    /// included (a byte range may legitimately start more than one
    /// signature, e.g. ZIP-family containers). Returns `(offset_in_data,
    /// &Signature)` pairs.
    pub fn find_header_hits<'a>(&'a self, data: &[u8]) -> Vec<(usize, &'a Signature)> {
        self.matcher
            .find_overlapping_iter(data)
            .map(|m| (m.start(), &self.signatures[m.pattern().as_usize()]))
            .collect()
    }
}

impl Default for SignatureRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_at_least_fifty_signatures() {
        assert!(SignatureRegistry::with_defaults().signatures().len() >= 50);
    }

    #[test]
    fn finds_jpeg_header_hit() {
        let registry = SignatureRegistry::with_defaults();
        let mut data = vec![0u8; 16];
        data[4..7].copy_from_slice(&[0xFF, 0xD8, 0xFF]);
        let hits = registry.find_header_hits(&data);
        assert!(hits.iter().any(|(off, sig)| *off == 4 && sig.type_key == "jpeg"));
    }

    #[test]
    fn quick_defaults_is_a_strict_subset() {
        let quick = SignatureRegistry::quick_defaults();
        let full = SignatureRegistry::with_defaults();
        assert!(quick.signatures().len() < full.signatures().len());
    }
}
