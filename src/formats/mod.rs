/*!
 * Subtitle artifact serialization.
 *
 * Two textual output formats are produced from the same bilingual entry
 * sequence:
 *
 * - `srt`: plain SubRip, translation line first, original line below it
 * - `ass`: Advanced SubStation Alpha with separate styles for the two
 *   languages, suitable for burn-in
 *
 * Serialization is pure and deterministic; parsing exists for SRT only and
 * inverts `srt::serialize` for entries whose translated text is a single
 * line and whose texts contain no blank-line sequences.
 */

pub mod ass;
pub mod srt;
