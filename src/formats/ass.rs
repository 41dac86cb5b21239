use crate::subtitles::BilingualEntry;

// @module: Bilingual ASS (Advanced SubStation Alpha) serializer

// PlayRes is fixed at 1920x1080 for consistent rendering across source
// resolutions; the renderer scales the script to the actual frame.
const PLAY_RES_X: u32 = 1920;
const PLAY_RES_Y: u32 = 1080;

/// Serialize bilingual entries to an ASS document.
///
/// Two styles are emitted: `Translated` (larger, higher on screen) and
/// `Original` (smaller, close to the bottom edge). Each entry produces one
/// dialogue line per style sharing the entry's timing.
pub fn serialize_bilingual(entries: &[BilingualEntry]) -> String {
    let style_format = "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, \
         OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, \
         ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, \
         Alignment, MarginL, MarginR, MarginV, Encoding";
    // Yellow text with black outline
    let style_params = "&H0000FFFF,&H0000FFFF,&H00000000,&H00000000,0,0,0,0,100,100,0,0";
    let trans_style = format!("Style: Translated,Arial,20,{},1,2,0,2,30,30,60,1", style_params);
    let orig_style = format!("Style: Original,Arial,14,{},1,2,0,2,30,30,20,1", style_params);
    let event_format =
        "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text";

    let header = format!(
        "[Script Info]\n\
         Title: Bilingual Subtitle\n\
         ScriptType: v4.00+\n\
         PlayResX: {}\n\
         PlayResY: {}\n\
         \n\
         [V4+ Styles]\n\
         {}\n\
         {}\n\
         {}\n\
         \n\
         [Events]\n\
         {}\n",
        PLAY_RES_X, PLAY_RES_Y, style_format, trans_style, orig_style, event_format
    );

    let mut dialogue_lines = Vec::with_capacity(entries.len() * 2);
    for entry in entries {
        let start = format_ass_time(entry.start_ms);
        let end = format_ass_time(entry.end_ms);

        dialogue_lines.push(format!(
            "Dialogue: 0,{},{},Translated,,0,0,0,,{}",
            start,
            end,
            escape_ass_text(&entry.translated_text)
        ));
        dialogue_lines.push(format!(
            "Dialogue: 0,{},{},Original,,0,0,0,,{}",
            start,
            end,
            escape_ass_text(&entry.original_text)
        ));
    }

    header + &dialogue_lines.join("\n") + "\n"
}

/// Escape special characters for ASS dialogue text.
///
/// Backslash first so later escapes are not doubled; braces would otherwise
/// open override blocks.
fn escape_ass_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('{', "\\{")
        .replace('}', "\\}")
        .replace('\n', "\\N")
}

/// Format milliseconds to ASS time format H:MM:SS.cc (centiseconds)
fn format_ass_time(ms: u64) -> String {
    let total_seconds = ms / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    let centiseconds = (ms % 1000) / 10;

    format!("{}:{:02}:{:02}.{:02}", hours, minutes, seconds, centiseconds)
}
