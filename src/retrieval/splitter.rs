use std::collections::VecDeque;

/// Recursive character splitter.
///
/// Text is split on the first separator that occurs in it; pieces still
/// longer than `chunk_size` are split again with the next separator. Small
/// pieces are merged back into chunks of at most `chunk_size` characters,
/// with up to `chunk_overlap` characters repeated between neighbours.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize, separators: Vec<String>) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
            separators,
        }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, &self.separators)
    }

    fn split_with(&self, text: &str, separators: &[String]) -> Vec<String> {
        let (separator, rest) = pick_separator(text, separators);

        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator.as_str())
                .filter(|piece| !piece.is_empty())
                .map(str::to_string)
                .collect()
        };

        let mut chunks = Vec::new();
        let mut pending: Vec<String> = Vec::new();

        for piece in pieces {
            if char_len(&piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge(&pending, &separator));
                pending.clear();
            }

            if rest.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_with(&piece, rest));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge(&pending, &separator));
        }

        chunks
    }

    fn merge(&self, pieces: &[String], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);

            if !window.is_empty() && total + sep_len + len > self.chunk_size {
                push_chunk(&mut chunks, &window, separator);

                // Drop from the front until the window fits the overlap budget
                while let Some(front) = window.front() {
                    let fits = total + sep_len + len <= self.chunk_size;
                    if total <= self.chunk_overlap && fits {
                        break;
                    }
                    total -= char_len(front);
                    window.pop_front();
                    if !window.is_empty() {
                        total -= sep_len;
                    }
                }
            }

            if !window.is_empty() {
                total += sep_len;
            }
            total += len;
            window.push_back(piece);
        }

        push_chunk(&mut chunks, &window, separator);
        chunks
    }
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self::new(
            800,
            100,
            vec![
                "\n\n".to_string(),
                "\n".to_string(),
                " ".to_string(),
                String::new(),
            ],
        )
    }
}

fn pick_separator<'a>(text: &str, separators: &'a [String]) -> (String, &'a [String]) {
    for (i, separator) in separators.iter().enumerate() {
        if separator.is_empty() || text.contains(separator.as_str()) {
            return (separator.clone(), &separators[i + 1..]);
        }
    }
    (String::new(), &[])
}

fn push_chunk(chunks: &mut Vec<String>, window: &VecDeque<&str>, separator: &str) {
    let joined = window.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn splitter(size: usize, overlap: usize) -> TextSplitter {
        TextSplitter::new(
            size,
            overlap,
            vec!["\n\n".into(), "\n".into(), " ".into(), String::new()],
        )
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = splitter(800, 100).split("employees(id, name, salary)");
        assert_eq!(chunks, vec!["employees(id, name, salary)"]);
    }

    #[test]
    fn test_paragraphs_are_kept_together() {
        let text = "Table employees: one row per employee.\n\nTable departments: one row per department.";
        let chunks = splitter(45, 0).split(text);
        assert_eq!(
            chunks,
            vec![
                "Table employees: one row per employee.",
                "Table departments: one row per department."
            ]
        );
    }

    #[test]
    fn test_chunks_respect_size() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu";
        let chunks = splitter(20, 5).split(text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 20, "chunk too long: {:?}", chunk);
        }
    }

    #[test]
    fn test_overlap_repeats_words() {
        let text = "one two three four five six seven eight";
        let chunks = splitter(14, 5).split(text);
        // Consecutive chunks share at least one word
        for pair in chunks.windows(2) {
            let last_word = pair[0].split(' ').last().unwrap();
            assert!(pair[1].contains(last_word), "{:?}", pair);
        }
    }

    #[test]
    fn test_long_word_falls_back_to_characters() {
        let chunks = splitter(4, 0).split("abcdefghij");
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }
}
