//! Fuzzy string matching utilities
//!
//! Two scorers are provided, on different scales:
//! - [`similarity`] - longest-matching-blocks ratio in `0.0..=1.0`, used for
//!   wake word detection and the "did you mean" hint
//! - [`partial_ratio`] - best-aligned-substring score in `0..=100`, used for
//!   intent matching where the pattern may be buried in a longer command
//!
//! Both are total: an empty argument scores 0.

/// A run of equal characters: `a[a_start..a_start+len] == b[b_start..b_start+len]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Block {
    a_start: usize,
    b_start: usize,
    len: usize,
}

/// Longest common run inside `a[alo..ahi]` x `b[blo..bhi]`.
///
/// Ties resolve to the earliest start in `a`, then the earliest in `b`.
fn longest_match(a: &[char], b: &[char], alo: usize, ahi: usize, blo: usize, bhi: usize) -> Block {
    let mut best = Block {
        a_start: alo,
        b_start: blo,
        len: 0,
    };
    // prev[j + 1] = length of the run ending at (i - 1, j)
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];

    for i in alo..ahi {
        for j in blo..bhi {
            if a[i] == b[j] {
                let k = prev[j] + 1;
                cur[j + 1] = k;
                if k > best.len {
                    best = Block {
                        a_start: i + 1 - k,
                        b_start: j + 1 - k,
                        len: k,
                    };
                }
            } else {
                cur[j + 1] = 0;
            }
        }
        std::mem::swap(&mut prev, &mut cur);
        cur.iter_mut().for_each(|v| *v = 0);
    }
    best
}

/// All matching blocks (Ratcliff/Obershelp), ordered by position, followed by
/// a zero-length sentinel at `(a.len(), b.len())`.
fn matching_blocks(a: &[char], b: &[char]) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut queue = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let m = longest_match(a, b, alo, ahi, blo, bhi);
        if m.len == 0 {
            continue;
        }
        if alo < m.a_start && blo < m.b_start {
            queue.push((alo, m.a_start, blo, m.b_start));
        }
        if m.a_start + m.len < ahi && m.b_start + m.len < bhi {
            queue.push((m.a_start + m.len, ahi, m.b_start + m.len, bhi));
        }
        blocks.push(m);
    }

    blocks.sort_by_key(|b| (b.a_start, b.b_start));
    blocks.push(Block {
        a_start: a.len(),
        b_start: b.len(),
        len: 0,
    });
    blocks
}

fn ratio_chars(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let matched: usize = matching_blocks(a, b).iter().map(|b| b.len).sum();
    2.0 * matched as f64 / total as f64
}

/// Normalized similarity in `0.0..=1.0`: `2 * matched / (len(a) + len(b))`
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    ratio_chars(&a, &b)
}

/// Score in `0..=100` for how well `pattern` appears somewhere inside `text`.
///
/// Each matching block between the shorter and the longer string anchors a
/// window of the longer string as wide as the shorter one; the best window
/// ratio wins.
pub fn partial_ratio(pattern: &str, text: &str) -> u8 {
    if pattern.is_empty() || text.is_empty() {
        return 0;
    }
    if pattern == text {
        return 100;
    }

    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (shorter, longer) = if p.len() <= t.len() { (&p, &t) } else { (&t, &p) };

    let mut best = 0.0f64;
    for block in matching_blocks(shorter, longer) {
        let start = block.b_start.saturating_sub(block.a_start);
        let end = (start + shorter.len()).min(longer.len());
        let window = &longer[start..end];
        let r = ratio_chars(shorter, window);
        if r > 0.995 {
            return 100;
        }
        best = best.max(r);
    }
    (best * 100.0).round() as u8
}

/// Clean text for matching: lowercase and remove non-alphabetic characters
pub fn clean_for_matching(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphabetic() || c.is_whitespace())
        .collect()
}

/// Collapse whitespace, strip surrounding punctuation and lowercase
pub fn clean_text(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_matches(|c: char| c.is_ascii_punctuation())
        .trim()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_similarity_exact() {
        assert!(approx(similarity("jarvis", "jarvis"), 1.0));
    }

    #[test]
    fn test_similarity_misheard() {
        assert!(approx(similarity("jarvs", "jarvis"), 10.0 / 11.0));
        assert!(approx(similarity("garvis", "jarvis"), 10.0 / 12.0));
        assert!(approx(similarity("jokes", "jarvis"), 4.0 / 11.0));
        assert!(approx(similarity("job", "jarvis"), 2.0 / 9.0));
    }

    #[test]
    fn test_similarity_empty() {
        assert_eq!(similarity("", "jarvis"), 0.0);
        assert_eq!(similarity("jarvis", ""), 0.0);
        assert_eq!(similarity("", ""), 0.0);
    }

    #[test]
    fn test_similarity_symmetric_for_short_words() {
        for (a, b) in [("travis", "jarvis"), ("julius", "jarvis"), ("hey", "hello")] {
            assert!(approx(similarity(a, b), similarity(b, a)));
        }
    }

    #[test]
    fn test_partial_ratio_substring() {
        assert_eq!(partial_ratio("hello", "hello world"), 100);
        assert_eq!(partial_ratio("joke", "tell me a joke"), 100);
        assert_eq!(partial_ratio("system status", "give me the system status"), 100);
    }

    #[test]
    fn test_partial_ratio_noisy() {
        assert_eq!(partial_ratio("weather", "whether"), 86);
        assert_eq!(partial_ratio("turn off", "turn on the lights"), 75);
        assert_eq!(partial_ratio("pc status", "give me the system status"), 78);
    }

    #[test]
    fn test_partial_ratio_unrelated() {
        assert_eq!(partial_ratio("hi", "tell me a joke"), 0);
        assert!(partial_ratio("hello", "asdkfj qweoiu") < 70);
    }

    #[test]
    fn test_partial_ratio_empty() {
        assert_eq!(partial_ratio("", "anything"), 0);
        assert_eq!(partial_ratio("abc", ""), 0);
    }

    #[test]
    fn test_clean_for_matching() {
        assert_eq!(clean_for_matching("Hello!"), "hello");
        assert_eq!(clean_for_matching("Hey, there!"), "hey there");
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  Open   Notepad. "), "open notepad");
        assert_eq!(clean_text("...what time?"), "what time");
        assert_eq!(clean_text(""), "");
    }
}
