use crate::script::GeneratedScript;
use crate::sections::SectionKind;
use crate::srt::SubtitleCue;
use crate::voice::VoiceTrack;

const WORDS_PER_SECOND: f64 = 3.0;

/// Sentences keep their closing punctuation.
fn split_sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            while let Some(&next) = chars.peek() {
                if matches!(next, '.' | '!' | '?') {
                    current.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            let sentence = current.split_whitespace().collect::<Vec<_>>().join(" ");
            if sentence.chars().any(char::is_alphanumeric) {
                out.push(sentence);
            }
            current.clear();
        }
    }
    let rest = current.split_whitespace().collect::<Vec<_>>().join(" ");
    if rest.chars().any(char::is_alphanumeric) {
        out.push(rest);
    }
    out
}

/// Packs whole sentences into lines of at most `(duration/sentences)*3` words.
pub fn split_text_for_subtitles(text: &str, duration: f64) -> Vec<String> {
    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return Vec::new();
    }

    let per_sentence = duration.max(0.0) / sentences.len() as f64;
    let max_words = ((per_sentence * WORDS_PER_SECOND) as usize).max(1);

    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_words = 0usize;

    for sentence in sentences {
        let words = sentence.split_whitespace().count();
        if current.is_empty() {
            current = sentence;
            current_words = words;
        } else if current_words + words <= max_words {
            current.push(' ');
            current.push_str(&sentence);
            current_words += words;
        } else {
            lines.push(std::mem::take(&mut current));
            current = sentence;
            current_words = words;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

pub fn cues_for_segment(kind: SectionKind, text: &str, start: f64, duration: f64) -> Vec<SubtitleCue> {
    let lines = split_text_for_subtitles(text, duration);
    if lines.is_empty() {
        return Vec::new();
    }

    let line_duration = duration / lines.len() as f64;
    lines
        .into_iter()
        .enumerate()
        .map(|(i, line)| {
            let cue_start = start + i as f64 * line_duration;
            SubtitleCue {
                start: cue_start,
                end: cue_start + line_duration,
                text: line,
                style: kind.subtitle_style(),
            }
        })
        .collect()
}

/// Cues for every voiced segment; sections without a segment are timed
/// back to back from their scripted durations.
pub fn align(script: &GeneratedScript, track: &VoiceTrack) -> Vec<SubtitleCue> {
    let mut cues = Vec::new();

    if track.segments.is_empty() {
        let mut cursor = 0.0;
        for section in &script.sections {
            let duration = section.duration_seconds as f64;
            cues.extend(cues_for_segment(section.kind, &section.content, cursor, duration));
            cursor += duration;
        }
    } else {
        for segment in &track.segments {
            cues.extend(cues_for_segment(
                segment.kind,
                &segment.text,
                segment.start,
                segment.duration,
            ));
        }
    }

    cues.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(std::cmp::Ordering::Equal));
    cues
}
