//! Validator/scorer (spec §4.G) — per-candidate structural checks, a 0-100
//! quality score, and the partial flag.
//!
//! Per the design notes, per-type behavior is a `match` dispatch on the
//! signature's `type_key` (an enumerated tag), not a stored callable.

use crate::domain::entities::{Candidate, Signature};

/// Outcome of running the Validator pipeline over one candidate's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept { score: u8, is_partial: bool },
    Reject,
}

/// Runs the structural + scoring pipeline over `data` (the candidate's full
/// declared byte range, already read from the source) for carved candidates.
/// `data.len()` is assumed to equal the candidate's declared size.
pub fn validate_carved(signature: &Signature, data: &[u8]) -> Verdict {
    if (data.len() as u64) < signature.min_size {
        return Verdict::Reject;
    }
    if is_all_zero(data) {
        return Verdict::Reject;
    }

    let mut score: i32 = 100;
    let mut is_partial = false;

    match structural_check(signature.type_key, data, signature.footer.is_some()) {
        StructuralOutcome::Complete => {}
        StructuralOutcome::Partial => {
            score -= 25;
            is_partial = true;
        }
        StructuralOutcome::Invalid => return Verdict::Reject,
        StructuralOutcome::Unknown => {
            // No structural rule for this type; fall through to footer-less scoring below.
        }
    }

    // Footer-less formats rely entirely on heuristics (spec §9): cap the
    // achievable score to reflect the accuracy ceiling.
    if signature.footer.is_none() {
        score = score.min(60);
    }

    // Deep validation (spec §4.G(3)): a structurally-incomplete image
    // cannot be confirmed renderable, so a missing terminator counts as a
    // parse failure here rather than being skipped.
    if is_image_type(signature.type_key) {
        score += if is_partial { -10 } else { deep_image_validation_bonus(signature.type_key, data) };
    }

    let score = score.clamp(0, 100) as u8;
    Verdict::Accept { score, is_partial }
}

/// Validates a metadata-provenance candidate (NTFS/FAT) whose bytes have
/// already been read. Metadata candidates have no header/footer signature
/// to check against; they are rejected only if entirely zero-filled (spec
/// §4.E: "if all recovered bytes are zero, discard").
pub fn validate_metadata(data: &[u8]) -> Verdict {
    if data.is_empty() || is_all_zero(data) {
        return Verdict::Reject;
    }
    Verdict::Accept { score: 100, is_partial: false }
}

pub fn apply_verdict(candidate: &mut Candidate, verdict: Verdict) -> bool {
    match verdict {
        Verdict::Accept { score, is_partial } => {
            candidate.validation_score = score;
            candidate.is_partial = is_partial;
            true
        }
        Verdict::Reject => false,
    }
}

fn is_image_type(type_key: &str) -> bool {
    matches!(type_key, "jpeg" | "png" | "gif89a" | "gif87a" | "bmp" | "tiff_le" | "tiff_be" | "webp")
}

fn is_all_zero(data: &[u8]) -> bool {
    !data.is_empty() && data.iter().all(|b| *b == 0)
}

enum StructuralOutcome {
    Complete,
    Partial,
    Invalid,
    Unknown,
}

fn structural_check(type_key: &str, data: &[u8], has_footer_signature: bool) -> StructuralOutcome {
    match type_key {
        "jpeg" => {
            if !data.starts_with(&[0xFF, 0xD8, 0xFF]) {
                return StructuralOutcome::Invalid;
            }
            if data.ends_with(&[0xFF, 0xD9]) {
                StructuralOutcome::Complete
            } else {
                StructuralOutcome::Partial
            }
        }
        "png" => {
            const PNG_SIG: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
            if !data.starts_with(&PNG_SIG) {
                return StructuralOutcome::Invalid;
            }
            const IEND: [u8; 8] = [0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82];
            if data.len() >= 12 && data[data.len() - 8..] == IEND {
                StructuralOutcome::Complete
            } else {
                StructuralOutcome::Partial
            }
        }
        "pdf" => {
            if !data.starts_with(b"%PDF-") {
                return StructuralOutcome::Invalid;
            }
            let tail_start = data.len().saturating_sub(1024);
            if contains(&data[tail_start..], b"%%EOF") {
                StructuralOutcome::Complete
            } else {
                StructuralOutcome::Partial
            }
        }
        "zip" | "docx" | "xlsx" | "pptx" => {
            if !data.starts_with(&[0x50, 0x4B, 0x03, 0x04]) {
                return StructuralOutcome::Invalid;
            }
            let tail_start = data.len().saturating_sub(22);
            if contains(&data[tail_start..], &[0x50, 0x4B, 0x05, 0x06]) {
                StructuralOutcome::Complete
            } else {
                StructuralOutcome::Partial
            }
        }
        "mp4" | "mov" => {
            // First box type is "ftyp"/"moov"; box-size chaining to EOF is
            // not verified here (would require a full box walk) — treat
            // header presence as complete, matching the teacher's
            // equivalent shallow container check.
            if has_footer_signature {
                StructuralOutcome::Complete
            } else {
                StructuralOutcome::Partial
            }
        }
        "wav" => {
            if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WAVE" {
                StructuralOutcome::Complete
            } else {
                StructuralOutcome::Invalid
            }
        }
        "avi" => {
            if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"AVI " {
                StructuralOutcome::Complete
            } else {
                StructuralOutcome::Invalid
            }
        }
        "webp" => {
            if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
                StructuralOutcome::Complete
            } else {
                StructuralOutcome::Invalid
            }
        }
        "flac" => {
            if data.starts_with(b"fLaC") {
                StructuralOutcome::Complete
            } else {
                StructuralOutcome::Invalid
            }
        }
        "gif89a" | "gif87a" => {
            if data.ends_with(&[0x00, 0x3B]) {
                StructuralOutcome::Complete
            } else {
                StructuralOutcome::Partial
            }
        }
        "bmp" => {
            if data.starts_with(&[0x42, 0x4D]) {
                StructuralOutcome::Complete
            } else {
                StructuralOutcome::Invalid
            }
        }
        "tiff_le" | "tiff_be" => StructuralOutcome::Complete,
        _ => StructuralOutcome::Unknown,
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len().max(1)).any(|w| w == needle)
}

/// Deep validation (spec §4.G(3)): attempt to confirm renderability.
/// A full image decode is out of scope for this pass (the `image` crate was
/// dropped along with PNG-conversion, per `DESIGN.md`); this applies the
/// same bounded structural re-check the teacher's `ImageCarver::validate`
/// used as its own confidence signal, and scores it the same way the spec's
/// deep-validation step does (+5 on pass, -10 on failure).
fn deep_image_validation_bonus(type_key: &str, data: &[u8]) -> i32 {
    let plausible = match type_key {
        "jpeg" => data.len() > 4 && data[3] != 0x00,
        "png" => data.len() > 24,
        _ => true,
    };
    if plausible { 5 } else { -10 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_jpeg_scores_at_least_95() {
        let mut data = vec![0xFFu8, 0xD8, 0xFF];
        data.extend(std::iter::repeat(0x42).take(100));
        data.extend_from_slice(&[0xFF, 0xD9]);
        match validate_carved(
            &Signature::new("jpeg", "jpg", &[0xFF, 0xD8, 0xFF], Some(&[0xFF, 0xD9]), 50_000_000, 4, true),
            &data,
        ) {
            Verdict::Accept { score, is_partial } => {
                assert!(score >= 95, "score was {score}");
                assert!(!is_partial);
            }
            Verdict::Reject => panic!("expected accept"),
        }
    }

    #[test]
    fn truncated_png_is_partial_with_midrange_score() {
        let mut data = vec![0x89u8, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        data.extend(std::iter::repeat(0x11).take(200));
        match validate_carved(
            &Signature::new(
                "png",
                "png",
                &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A],
                Some(&[0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82]),
                100_000_000,
                16,
                true,
            ),
            &data,
        ) {
            Verdict::Accept { score, is_partial } => {
                assert!(is_partial);
                assert!((30..=69).contains(&score), "score was {score}");
            }
            Verdict::Reject => panic!("expected accept"),
        }
    }

    #[test]
    fn all_zero_body_is_rejected() {
        let data = vec![0u8; 64];
        assert_eq!(validate_metadata(&data), Verdict::Reject);
    }
}
