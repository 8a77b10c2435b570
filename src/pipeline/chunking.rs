//! Boundary-preserving text chunking.
//!
//! The LLM's context window cannot fit an arbitrarily long report, so extracted text is split
//! into bounded pieces before invocation. Splitting is word-atomic: a word is never divided
//! across two chunks, and joining the chunks back with single spaces reproduces the
//! whitespace-normalized input exactly.

/// Split `text` into chunks of at most `max_chars` characters without breaking words.
///
/// Words are accumulated greedily; the running size counter adds `len(word) + 1` per word, the
/// `+ 1` modeling the joining space. A chunk is closed when the next word would push the
/// counter past `max_chars` and the chunk is non-empty. A single word longer than the budget
/// still forms its own chunk rather than being dropped or split. Empty or all-whitespace input
/// yields no chunks.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_size = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if current_size + word_len + 1 > max_chars && !current.is_empty() {
            chunks.push(current.join(" "));
            current.clear();
            current.push(word);
            current_size = word_len;
        } else {
            current.push(word);
            current_size += word_len + 1;
        }
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk_text("", 100).is_empty());
        assert!(chunk_text("   \n\t ", 100).is_empty());
    }

    #[test]
    fn short_input_yields_single_chunk() {
        let chunks = chunk_text("Hemoglobin 13.5 g/dL", 100);
        assert_eq!(chunks, vec!["Hemoglobin 13.5 g/dL".to_string()]);
    }

    #[test]
    fn joined_chunks_reproduce_normalized_input() {
        let text = "Hemoglobin  13.5 g/dL (12-16)\nGlucose 95 mg/dL  (70-110)";
        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");

        for budget in [5, 12, 24, 1000] {
            let chunks = chunk_text(text, budget);
            assert_eq!(chunks.join(" "), normalized, "budget {budget}");
        }
    }

    #[test]
    fn chunk_lengths_respect_budget() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let budget = 16;
        for chunk in chunk_text(text, budget) {
            assert!(chunk.chars().count() <= budget, "chunk too long: {chunk:?}");
        }
    }

    #[test]
    fn words_are_never_split() {
        let text = "one two three four five";
        let words: Vec<&str> = text.split_whitespace().collect();
        let chunks = chunk_text(text, 9);
        for chunk in &chunks {
            for word in chunk.split_whitespace() {
                assert!(words.contains(&word), "fragment {word:?} is not an input word");
            }
        }
        let rejoined: Vec<&str> = chunks.iter().flat_map(|c| c.split_whitespace()).collect();
        assert_eq!(rejoined, words);
    }

    #[test]
    fn oversized_word_forms_its_own_chunk() {
        let chunks = chunk_text("tiny pneumonoultramicroscopicsilicovolcanoconiosis end", 10);
        assert_eq!(
            chunks,
            vec![
                "tiny".to_string(),
                "pneumonoultramicroscopicsilicovolcanoconiosis".to_string(),
                "end".to_string(),
            ]
        );
    }
}
