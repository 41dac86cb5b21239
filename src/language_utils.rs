use anyhow::{Result, anyhow};
use isolang::Language;

/// Language utilities for ISO language code handling
///
/// Collaborator language hints arrive as ISO 639-1/639-2 codes, optionally
/// carrying a region subtag ("zh-TW", "pt-BR"). The transcription API only
/// understands the primary subtag, while translation prompts want the
/// English language name, so both views live here.
/// Strip a region subtag, keeping the primary language subtag
///
/// "zh-TW" -> "zh", "en" -> "en". The input is lowercased and trimmed.
pub fn primary_subtag(code: &str) -> String {
    code.trim()
        .to_lowercase()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Normalize a language code to ISO 639-2/T (3-letter) format
///
/// Region subtags are ignored: "zh-TW" normalizes as "zh".
pub fn normalize_to_part2t(code: &str) -> Result<String> {
    let primary = primary_subtag(code);

    // 2-letter codes convert through ISO 639-1
    if primary.len() == 2 {
        if let Some(lang) = Language::from_639_1(&primary) {
            return Ok(lang.to_639_3().to_string());
        }
    }
    // 3-letter codes are accepted as ISO 639-2/T directly, with the handful
    // of ISO 639-2/B spellings mapped over
    else if primary.len() == 3 {
        if Language::from_639_3(&primary).is_some() {
            return Ok(primary);
        }
        let part2t = match primary.as_str() {
            "fre" => "fra",
            "ger" => "deu",
            "dut" => "nld",
            "gre" => "ell",
            "chi" => "zho",
            "cze" => "ces",
            "per" => "fas",
            "rum" => "ron",
            "slo" => "slk",
            _ => return Err(anyhow!("Cannot normalize invalid language code: {}", code)),
        };
        return Ok(part2t.to_string());
    }

    Err(anyhow!("Cannot normalize invalid language code: {}", code))
}

/// Check if two language codes refer to the same language
pub fn language_codes_match(code1: &str, code2: &str) -> bool {
    match (normalize_to_part2t(code1), normalize_to_part2t(code2)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Get the English language name from a code
pub fn get_language_name(code: &str) -> Result<String> {
    let normalized = normalize_to_part2t(code)?;
    let lang = Language::from_639_3(&normalized)
        .ok_or_else(|| anyhow!("Failed to get language from code: {}", normalized))?;

    Ok(lang.to_name().to_string())
}
