//! Text Analyzer (C1): tokenize → lowercase → strip stopwords → stem,
//! plus text chunking. See spec §4.2.

/// Closed stopword list (~120 entries): determiners, auxiliaries,
/// pronouns, common prepositions and conjunctions.
const STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "nor", "so", "yet", "for",
    "of", "in", "on", "at", "by", "to", "from", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above",
    "below", "up", "down", "out", "off", "over", "under", "again",
    "further", "then", "once", "here", "there", "when", "where", "why",
    "how", "all", "any", "both", "each", "few", "more", "most", "other",
    "some", "such", "no", "not", "only", "own", "same", "than", "too",
    "very", "is", "are", "was", "were", "be", "been", "being", "have",
    "has", "had", "having", "do", "does", "did", "doing", "will", "would",
    "shall", "should", "can", "could", "may", "might", "must", "i", "me",
    "my", "myself", "we", "our", "ours", "ourselves", "you", "your",
    "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "her", "hers", "herself", "it", "its", "itself", "they",
    "them", "their", "theirs", "themselves", "what", "which", "who",
    "whom", "this", "that", "these", "those", "am", "as", "if", "because",
    "until", "while", "above",
];

fn is_stopword(term: &str) -> bool {
    STOPWORDS.contains(&term)
}

struct SuffixRule {
    suffix: &'static str,
    min_len_after: usize,
    replace_with: Option<&'static str>,
}

/// Order-sensitive; this is a stable contract (spec §9 design notes).
const SUFFIX_RULES: &[SuffixRule] = &[
    SuffixRule { suffix: "ies", min_len_after: 4, replace_with: Some("y") },
    SuffixRule { suffix: "ing", min_len_after: 5, replace_with: None },
    SuffixRule { suffix: "tion", min_len_after: 5, replace_with: None },
    SuffixRule { suffix: "ment", min_len_after: 5, replace_with: None },
    SuffixRule { suffix: "ness", min_len_after: 5, replace_with: None },
    SuffixRule { suffix: "less", min_len_after: 5, replace_with: None },
    SuffixRule { suffix: "able", min_len_after: 5, replace_with: None },
    SuffixRule { suffix: "ible", min_len_after: 5, replace_with: None },
    SuffixRule { suffix: "ful", min_len_after: 4, replace_with: None },
    SuffixRule { suffix: "ed", min_len_after: 4, replace_with: None },
    SuffixRule { suffix: "ly", min_len_after: 4, replace_with: None },
    SuffixRule { suffix: "er", min_len_after: 4, replace_with: None },
    SuffixRule { suffix: "est", min_len_after: 4, replace_with: None },
];

/// Crude, order-sensitive suffix stripper. No external lexicon; stable
/// across languages (spec §4.2).
pub fn stem(token: &str) -> String {
    for rule in SUFFIX_RULES {
        if let Some(stripped) = token.strip_suffix(rule.suffix) {
            let resulting_len = stripped.len() + rule.replace_with.map_or(0, str::len);
            return if resulting_len > rule.min_len_after {
                match rule.replace_with {
                    Some(r) => format!("{stripped}{r}"),
                    None => stripped.to_string(),
                }
            } else {
                token.to_string()
            };
        }
    }
    // "s" (not "ss"): first-match rule falls through to here only when
    // none of the rules above matched the token's ending.
    if token.ends_with('s') && !token.ends_with("ss") {
        let stripped = &token[..token.len() - 1];
        return if stripped.len() > 3 {
            stripped.to_string()
        } else {
            token.to_string()
        };
    }
    token.to_string()
}

/// Tokenize text per spec §4.2: lowercase, replace non-`[a-z0-9_\-\s]`
/// with space, split on whitespace, drop empties/stopwords/length<=1,
/// then stem.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let cleaned: String = lowered
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    cleaned
        .split_whitespace()
        .filter(|t| !t.is_empty())
        .filter(|t| !is_stopword(t))
        .filter(|t| t.chars().count() > 1)
        .map(stem)
        .collect()
}

/// Chunking strategy (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkMode {
    Paragraph,
    Sentence,
    Fixed,
}

fn word_count(s: &str) -> usize {
    s.split_whitespace().count()
}

/// Chunk `text` according to `mode`. `max_tokens` bounds chunk size
/// (measured in whitespace-split words, prior to the Analyzer's own
/// tokenization); `overlap` only applies to `Fixed` mode.
pub fn chunk(text: &str, mode: ChunkMode, max_tokens: usize, overlap: usize) -> Vec<String> {
    match mode {
        ChunkMode::Paragraph => chunk_paragraph(text),
        ChunkMode::Sentence => chunk_sentence(text, max_tokens),
        ChunkMode::Fixed => chunk_fixed(text, max_tokens, overlap),
    }
}

fn chunk_paragraph(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buf: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !buf.is_empty() {
                chunks.push(buf.join("\n"));
                buf.clear();
            }
        } else {
            buf.push(line);
        }
    }
    if !buf.is_empty() {
        chunks.push(buf.join("\n"));
    }
    if chunks.is_empty() {
        vec![text.to_string()]
    } else {
        chunks
    }
}

/// Split into sentence fragments: longest maximal run of
/// non-`[.!?\n]` characters followed by a run of `[.!?\n]`.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    let is_boundary = |c: char| c == '.' || c == '!' || c == '?' || c == '\n';

    while let Some(c) = chars.next() {
        if is_boundary(c) {
            current.push(c);
            while let Some(&next) = chars.peek() {
                if is_boundary(next) {
                    current.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
            current.clear();
        } else {
            current.push(c);
        }
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    sentences
}

fn chunk_sentence(text: &str, max_tokens: usize) -> Vec<String> {
    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return vec![];
    }
    let mut chunks = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_len = 0usize;

    for sentence in sentences {
        let sentence_len = word_count(&sentence);
        if !current.is_empty() && current_len + sentence_len > max_tokens {
            chunks.push(current.join(" "));
            current = Vec::new();
            current_len = 0;
        }
        current_len += sentence_len;
        current.push(sentence);
    }
    if !current.is_empty() {
        chunks.push(current.join(" "));
    }
    chunks
}

fn chunk_fixed(text: &str, max_tokens: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || max_tokens == 0 {
        return vec![];
    }
    let step = if overlap >= max_tokens { 1 } else { max_tokens - overlap };
    let mut chunks = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + max_tokens).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end >= words.len() {
            break;
        }
        start += step;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizer_is_deterministic() {
        let text = "The quick BROWN fox jumps over the lazy dog's tail!";
        assert_eq!(tokenize(text), tokenize(text));
    }

    #[test]
    fn tokenizer_drops_stopwords_and_short_tokens() {
        let toks = tokenize("a an the of it is");
        assert!(toks.is_empty());
    }

    #[test]
    fn tokenizer_strips_suffixes_in_order() {
        assert_eq!(stem("studies"), "study");
        assert_eq!(stem("programming"), "programm");
        assert_eq!(stem("action"), "action");
        assert_eq!(stem("bridges"), "bridge");
        assert_eq!(stem("cats"), "cats");
        assert_eq!(stem("class"), "class");
        assert_eq!(stem("happiness"), "happiness");
    }

    #[test]
    fn stemming_is_idempotent_on_stemmed_forms() {
        for w in ["preference", "dark", "mode", "bridg", "allocation"] {
            let once = stem(w);
            let twice = stem(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn paragraph_chunking_splits_on_blank_lines() {
        let text = "first paragraph here\n\nsecond paragraph here";
        let chunks = chunk(text, ChunkMode::Paragraph, 100, 0);
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn paragraph_chunking_falls_back_to_whole_text() {
        let text = "no blank lines in this text at all";
        let chunks = chunk(text, ChunkMode::Paragraph, 100, 0);
        assert_eq!(chunks, vec![text.to_string()]);
    }

    #[test]
    fn fixed_chunking_slides_with_overlap() {
        let text = (0..20).map(|i| i.to_string()).collect::<Vec<_>>().join(" ");
        let chunks = chunk(&text, ChunkMode::Fixed, 10, 2);
        assert!(chunks.len() >= 2);
        // overlap: last 2 words of chunk 0 equal first 2 words of chunk 1
        let first_words: Vec<&str> = chunks[0].split_whitespace().collect();
        let second_words: Vec<&str> = chunks[1].split_whitespace().collect();
        assert_eq!(&first_words[first_words.len() - 2..], &second_words[..2]);
    }

    #[test]
    fn sentence_chunking_emits_when_over_budget() {
        let text = "One. Two. Three. Four. Five.";
        let chunks = chunk(text, ChunkMode::Sentence, 2, 0);
        assert!(chunks.len() > 1);
    }
}
