/*!
 * Tests for subtitle serialization
 */

use bisub::formats::{ass, srt};
use bisub::subtitles::{BilingualEntry, format_timestamp, parse_timestamp};

fn entries() -> Vec<BilingualEntry> {
    vec![
        BilingualEntry::new(1, 0, 2000, "Bonjour à tous".to_string(), "Hello everyone".to_string()),
        BilingualEntry::new(2, 2500, 4200, "Comment ça va ?".to_string(), "How are you?".to_string()),
        BilingualEntry::new(3, 5000, 7999, "Au revoir".to_string(), "Goodbye".to_string()),
    ]
}

/// Test timestamp parsing and formatting
#[test]
fn test_timestamp_parsing_withValidTimestamp_shouldParseAndFormat() {
    let ts = "01:23:45,678";
    let ms = parse_timestamp(ts).unwrap();
    assert_eq!(ms, 5_025_678);

    let formatted = format_timestamp(ms);
    assert_eq!(formatted, ts);
}

/// Test timestamp parsing with invalid components
#[test]
fn test_timestamp_parsing_withInvalidComponents_shouldFail() {
    assert!(parse_timestamp("00:61:00,000").is_err());
    assert!(parse_timestamp("00:00:75,000").is_err());
    assert!(parse_timestamp("not a timestamp").is_err());
}

/// The round-trip law: serializing a well-formed entry sequence and parsing
/// the result yields an equal sequence, for texts with no blank lines
#[test]
fn test_srt_round_trip_withWellFormedEntries_shouldBeLossless() {
    let original = entries();
    let serialized = srt::serialize(&original);
    let parsed = srt::parse(&serialized).unwrap();
    assert_eq!(parsed, original);
}

/// Round trip holds for entries with an empty original side
#[test]
fn test_srt_round_trip_withEmptyOriginal_shouldBeLossless() {
    let original = vec![
        BilingualEntry::new(1, 100, 900, "Juste ça".to_string(), String::new()),
        BilingualEntry::new(2, 1000, 1800, "Et ça".to_string(), "And this".to_string()),
    ];
    let serialized = srt::serialize(&original);
    let parsed = srt::parse(&serialized).unwrap();
    assert_eq!(parsed, original);
}

/// A multi-line original survives the round trip as well: the parser takes
/// everything after the first text line as the original side
#[test]
fn test_srt_round_trip_withMultilineOriginal_shouldBeLossless() {
    let original = vec![BilingualEntry::new(
        1,
        0,
        1000,
        "Une ligne".to_string(),
        "line one\nline two".to_string(),
    )];
    let serialized = srt::serialize(&original);
    let parsed = srt::parse(&serialized).unwrap();
    assert_eq!(parsed, original);
}

/// Test SRT block structure
#[test]
fn test_srt_serialize_blockLayout_shouldMatchSubRip() {
    let output = srt::serialize(&entries());
    let blocks: Vec<&str> = output.trim_end().split("\n\n").collect();
    assert_eq!(blocks.len(), 3);

    let lines: Vec<&str> = blocks[1].lines().collect();
    assert_eq!(lines[0], "2");
    assert_eq!(lines[1], "00:00:02,500 --> 00:00:04,200");
    assert_eq!(lines[2], "Comment ça va ?");
    assert_eq!(lines[3], "How are you?");
}

/// Test ASS output structure for bilingual entries
#[test]
fn test_ass_serialize_shouldEmitBothStylesPerEntry() {
    let output = ass::serialize_bilingual(&entries());

    assert!(output.contains("[Script Info]"));
    assert!(output.contains("Style: Translated,"));
    assert!(output.contains("Style: Original,"));

    let translated_lines = output.matches(",Translated,").count();
    let original_lines = output.matches(",Original,").count();
    // One style line plus one dialogue line per entry on each side
    assert_eq!(translated_lines, entries().len());
    assert_eq!(original_lines, entries().len());
}

/// Test ASS newline conversion in dialogue text
#[test]
fn test_ass_serialize_withMultilineText_shouldUseAssLineBreaks() {
    let multiline = vec![BilingualEntry::new(
        1,
        0,
        1000,
        "ligne un\nligne deux".to_string(),
        "line one".to_string(),
    )];
    let output = ass::serialize_bilingual(&multiline);
    assert!(output.contains("ligne un\\Nligne deux"));
}
