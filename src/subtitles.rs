use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;

// @module: Subtitle domain types shared by the pipeline stages

// @struct: Time-coded text unit produced by transcription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    // @field: Sequence number, 1-based
    pub index: usize,

    // @field: Start time in ms
    pub start_ms: u64,

    // @field: End time in ms
    pub end_ms: u64,

    // @field: Segment text
    pub text: String,
}

impl Segment {
    /// Creates a new segment without validation - used by tests and adapters
    pub fn new(index: usize, start_ms: u64, end_ms: u64, text: String) -> Self {
        Segment {
            index,
            start_ms,
            end_ms,
            text,
        }
    }

    // @creates: Validated segment
    // @validates: Time range and non-empty text
    pub fn new_validated(index: usize, start_ms: u64, end_ms: u64, text: String) -> Result<Self> {
        if end_ms <= start_ms {
            return Err(anyhow!(
                "Invalid time range: end time {} <= start time {}",
                end_ms,
                start_ms
            ));
        }

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(anyhow!("Empty segment text for index {}", index));
        }

        Ok(Segment {
            index,
            start_ms,
            end_ms,
            text: trimmed.to_string(),
        })
    }
}

// @struct: One bilingual subtitle line held in a job record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BilingualEntry {
    // @field: Sequence number, 1-based, contiguous within a job
    pub index: usize,

    // @field: Start time in ms
    pub start_ms: u64,

    // @field: End time in ms
    pub end_ms: u64,

    // @field: Translated text (primary, editable)
    pub translated_text: String,

    // @field: Original text (secondary, may be empty)
    pub original_text: String,
}

impl BilingualEntry {
    /// Creates a new entry without validation - used by tests and the merge stage
    pub fn new(
        index: usize,
        start_ms: u64,
        end_ms: u64,
        translated_text: String,
        original_text: String,
    ) -> Self {
        BilingualEntry {
            index,
            start_ms,
            end_ms,
            translated_text,
            original_text,
        }
    }

    // @creates: Validated entry
    // @validates: Time range and non-empty translated text
    pub fn new_validated(
        index: usize,
        start_ms: u64,
        end_ms: u64,
        translated_text: String,
        original_text: String,
    ) -> Result<Self> {
        if end_ms <= start_ms {
            return Err(anyhow!(
                "Invalid time range: end time {} <= start time {}",
                end_ms,
                start_ms
            ));
        }

        let translated = translated_text.trim();
        if translated.is_empty() {
            return Err(anyhow!("Empty translated text for entry {}", index));
        }

        Ok(BilingualEntry {
            index,
            start_ms,
            end_ms,
            translated_text: translated.to_string(),
            original_text: original_text.trim().to_string(),
        })
    }

    /// Convert start time to formatted SRT timestamp
    pub fn format_start_time(&self) -> String {
        format_timestamp(self.start_ms)
    }

    /// Convert end time to formatted SRT timestamp
    pub fn format_end_time(&self) -> String {
        format_timestamp(self.end_ms)
    }
}

impl fmt::Display for BilingualEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.index)?;
        writeln!(f, "{} --> {}", self.format_start_time(), self.format_end_time())?;
        writeln!(f, "{}", self.translated_text)?;
        if !self.original_text.is_empty() {
            writeln!(f, "{}", self.original_text)?;
        }
        writeln!(f)
    }
}

/// Merge transcription segments with their translations into bilingual entries.
///
/// Timing comes from the original segments since transcription timing is the
/// accurate side. Entries are renumbered contiguously from 1.
pub fn merge_bilingual(
    segments: &[Segment],
    translations: &[String],
) -> std::result::Result<Vec<BilingualEntry>, crate::errors::MergeError> {
    if segments.len() != translations.len() {
        return Err(crate::errors::MergeError::CountMismatch {
            original: segments.len(),
            translated: translations.len(),
        });
    }

    let entries = segments
        .iter()
        .zip(translations.iter())
        .enumerate()
        .map(|(i, (seg, translated))| BilingualEntry {
            index: i + 1,
            start_ms: seg.start_ms,
            end_ms: seg.end_ms,
            translated_text: translated.clone(),
            original_text: seg.text.clone(),
        })
        .collect();

    Ok(entries)
}

/// Format a timestamp in milliseconds to SRT format (HH:MM:SS,mmm)
pub fn format_timestamp(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1_000;
    let millis = ms % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
}

/// Parse an SRT timestamp (HH:MM:SS,mmm) to milliseconds
pub fn parse_timestamp(timestamp: &str) -> Result<u64> {
    let parts: Vec<&str> = timestamp.split(&[':', ',', '.'][..]).collect();

    if parts.len() != 4 {
        return Err(anyhow!("Invalid timestamp format: {}", timestamp));
    }

    let hours: u64 = parts[0].trim().parse().context("Failed to parse hours")?;
    let minutes: u64 = parts[1].trim().parse().context("Failed to parse minutes")?;
    let seconds: u64 = parts[2].trim().parse().context("Failed to parse seconds")?;
    let millis: u64 = parts[3].trim().parse().context("Failed to parse milliseconds")?;

    if minutes >= 60 || seconds >= 60 || millis >= 1000 {
        return Err(anyhow!("Invalid time components in timestamp: {}", timestamp));
    }

    Ok(hours * 3_600_000 + minutes * 60_000 + seconds * 1_000 + millis)
}
