use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::MergeError;
use crate::subtitles::{BilingualEntry, format_timestamp};

// @module: Bilingual SRT serializer and parser

// @const: SRT timing line regex
static TIMING_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{2}):(\d{2}):(\d{2}),(\d{3})\s*-->\s*(\d{2}):(\d{2}):(\d{2}),(\d{3})")
        .expect("timing regex is valid")
});

/// Serialize bilingual entries to an SRT document.
///
/// Each block carries the translated text on the first line and the original
/// text below it; the original line is omitted when empty.
pub fn serialize(entries: &[BilingualEntry]) -> String {
    let mut blocks = Vec::with_capacity(entries.len());

    for entry in entries {
        let timing = format!(
            "{} --> {}",
            format_timestamp(entry.start_ms),
            format_timestamp(entry.end_ms)
        );
        let block = if entry.original_text.is_empty() {
            format!("{}\n{}\n{}", entry.index, timing, entry.translated_text)
        } else {
            format!(
                "{}\n{}\n{}\n{}",
                entry.index, timing, entry.translated_text, entry.original_text
            )
        };
        blocks.push(block);
    }

    blocks.join("\n\n") + "\n"
}

/// Parse an SRT document into bilingual entries.
///
/// The first text line of each block is taken as the translation, remaining
/// lines as the original. Indices must be contiguous starting from 1 and
/// every timing range must be ordered.
pub fn parse(content: &str) -> Result<Vec<BilingualEntry>, MergeError> {
    if content.trim().is_empty() {
        return Err(MergeError::MalformedInput("content cannot be empty".to_string()));
    }

    static BLOCK_SPLIT: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\n\s*\n").expect("block split regex is valid"));

    let mut entries = Vec::new();

    for (block_num, block) in BLOCK_SPLIT.split(content.trim()).enumerate() {
        let lines: Vec<&str> = block.trim().lines().collect();
        if lines.len() < 3 {
            return Err(MergeError::MalformedInput(format!(
                "block {}: expected at least 3 lines (index, timing, text), got {}",
                block_num + 1,
                lines.len()
            )));
        }

        let index: usize = lines[0].trim().parse().map_err(|_| {
            MergeError::MalformedInput(format!(
                "block {}: invalid index '{}'",
                block_num + 1,
                lines[0].trim()
            ))
        })?;

        let caps = TIMING_REGEX.captures(lines[1].trim()).ok_or_else(|| {
            MergeError::MalformedInput(format!(
                "block {}: invalid timing line '{}'",
                block_num + 1,
                lines[1].trim()
            ))
        })?;
        let start_ms = timing_to_ms(&caps, 1);
        let end_ms = timing_to_ms(&caps, 5);
        if start_ms >= end_ms {
            return Err(MergeError::MalformedInput(format!(
                "block {}: start time must be before end time",
                block_num + 1
            )));
        }

        let translated_text = lines[2].to_string();
        let original_text = lines[3..].join("\n");

        entries.push(BilingualEntry {
            index,
            start_ms,
            end_ms,
            translated_text,
            original_text,
        });
    }

    // Indices are contiguous from 1; a gap means the document was mangled
    for (i, entry) in entries.iter().enumerate() {
        if entry.index != i + 1 {
            return Err(MergeError::MalformedInput(format!(
                "entry indices must be sequential starting from 1, expected {} but got {}",
                i + 1,
                entry.index
            )));
        }
    }

    Ok(entries)
}

fn timing_to_ms(caps: &regex::Captures, start_idx: usize) -> u64 {
    let group = |i: usize| -> u64 {
        caps.get(start_idx + i)
            .map_or(0, |m| m.as_str().parse().unwrap_or(0))
    };
    (group(0) * 3600 + group(1) * 60 + group(2)) * 1000 + group(3)
}
