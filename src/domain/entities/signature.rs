//! Signature registry entities — static, process-wide, immutable descriptors.

/// One registered file-type descriptor.
///
/// `header` must be nonempty for any signature eligible for carving;
/// metadata-only entries (none in this registry today, but the shape
/// supports them) may carry an empty header and are skipped by the Carver.
///
/// The validator is not a stored callable on this struct (see design notes:
/// dynamic dictionaries of per-type callbacks are re-architected as a
/// dispatch on `type_key` in `domain::services::validator` instead).
#[derive(Clone)]
pub struct Signature {
    pub type_key: &'static str,
    pub extension: &'static str,
    pub header: &'static [u8],
    pub footer: Option<&'static [u8]>,
    pub max_size: u64,
    pub min_size: u64,
    pub importance: bool,
}

impl Signature {
    pub const fn new(
        type_key: &'static str,
        extension: &'static str,
        header: &'static [u8],
        footer: Option<&'static [u8]>,
        max_size: u64,
        min_size: u64,
        importance: bool,
    ) -> Self {
        Self {
            type_key,
            extension,
            header,
            footer,
            max_size,
            min_size,
            importance,
        }
    }

    pub fn find_footer(&self, data: &[u8]) -> Option<usize> {
        let footer = self.footer?;
        data.windows(footer.len())
            .position(|w| w == footer)
            .map(|pos| pos + footer.len())
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signature")
            .field("type_key", &self.type_key)
            .field("extension", &self.extension)
            .field("max_size", &self.max_size)
            .field("importance", &self.importance)
            .finish()
    }
}
