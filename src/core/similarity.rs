//! Ratcliff/Obershelp sequence similarity: `2 * M / T`, where `M` counts the
//! characters in the matching blocks found by taking the longest common
//! substring and recursing on both sides of it.

/// Returns a score in `[0.0, 1.0]`; `1.0` only for identical strings.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_characters(&a, &b) as f64 / total as f64
}

fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, size) = longest_match(a, b, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        matched += size;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            pending.push((i + size, ahi, j + size, bhi));
        }
    }

    matched
}

/// Longest common substring of `a[alo..ahi]` and `b[blo..bhi]` as
/// `(start_a, start_b, len)`. Ties go to the block ending earliest in `a`,
/// then earliest in `b`.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let width = bhi - blo;
    let mut best = (alo, blo, 0);
    let mut prev = vec![0usize; width + 1];
    let mut cur = vec![0usize; width + 1];

    for i in alo..ahi {
        for j in blo..bhi {
            let col = j - blo;
            cur[col + 1] = if a[i] == b[j] { prev[col] + 1 } else { 0 };
            let run = cur[col + 1];
            if run > best.2 {
                best = (i + 1 - run, j + 1 - run, run);
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_strings() {
        assert_eq!(similarity_ratio("123 main st", "123 main st"), 1.0);
        assert_eq!(similarity_ratio("", ""), 1.0);
    }

    #[test]
    fn test_disjoint_strings() {
        assert_eq!(similarity_ratio("abc", "xyz"), 0.0);
        assert_eq!(similarity_ratio("abc", ""), 0.0);
    }

    #[test]
    fn test_known_ratios() {
        // "abcd" / "bcde": block "bcd" -> 2 * 3 / 8
        assert!((similarity_ratio("abcd", "bcde") - 0.75).abs() < 1e-9);
        // " pine rd" plus one digit of the house number -> 2 * 9 / 22
        let score = similarity_ratio("789 pine rd", "987 pine rd");
        assert!((score - 18.0 / 22.0).abs() < 1e-9);
    }

    #[test]
    fn test_ratio_is_symmetric_for_addresses() {
        let a = "1200 sonoma ave santa rosa";
        let b = "1220 sonoma ave santa rosa ca";
        assert!((similarity_ratio(a, b) - similarity_ratio(b, a)).abs() < 1e-9);
        assert!(similarity_ratio(a, b) < 1.0);
    }
}
