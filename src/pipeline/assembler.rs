//! Result assembly
//!
//! Merges per-page OCR results into one text blob with page markers.

use crate::ocr::PageResult;

/// Marker line placed before each page's text
pub fn page_marker(page_number: u32) -> String {
    format!("--- Page {} ---", page_number)
}

/// Assembled extraction for one document
#[derive(Debug, Clone, PartialEq)]
pub struct Assembly {
    pub full_text: String,
    /// Pages whose OCR succeeded
    pub page_count: u32,
    /// One entry per page, ordered by page number
    pub pages: Vec<PageResult>,
}

/// Order results by page and concatenate their text
///
/// Failed pages keep their position (marker plus empty text) but are not
/// counted. Duplicate page numbers collapse to one entry, preferring a
/// successful result.
pub fn assemble(mut results: Vec<PageResult>) -> Assembly {
    results.sort_by_key(|r| r.page_number);
    results.dedup_by(|later, kept| {
        if later.page_number != kept.page_number {
            return false;
        }
        if !kept.succeeded && later.succeeded {
            std::mem::swap(kept, later);
        }
        true
    });

    let full_text = results
        .iter()
        .map(|page| format!("{}\n{}", page_marker(page.page_number), page.text))
        .collect::<Vec<_>>()
        .join("\n\n");

    let page_count = results.iter().filter(|r| r.succeeded).count() as u32;

    Assembly {
        full_text,
        page_count,
        pages: results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permutations(items: &[u32]) -> Vec<Vec<u32>> {
        if items.len() <= 1 {
            return vec![items.to_vec()];
        }
        let mut out = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.to_vec();
            let head = rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, head);
                out.push(tail);
            }
        }
        out
    }

    #[test]
    fn test_markers_increase_for_every_order() {
        for order in permutations(&[1, 2, 3, 4, 5]) {
            let results = order
                .iter()
                .map(|&n| PageResult::succeeded(n, format!("text {}", n)))
                .collect();
            let assembly = assemble(results);

            let positions: Vec<usize> = (1..=5)
                .map(|n| assembly.full_text.find(&page_marker(n)).unwrap())
                .collect();
            assert!(positions.windows(2).all(|w| w[0] < w[1]), "order {:?}", order);

            let numbers: Vec<u32> = assembly.pages.iter().map(|p| p.page_number).collect();
            assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
        }
    }

    #[test]
    fn test_failed_pages_keep_position() {
        let assembly = assemble(vec![
            PageResult::succeeded(3, "gamma"),
            PageResult::failed(2),
            PageResult::succeeded(1, "alpha"),
        ]);

        assert_eq!(assembly.page_count, 2);
        assert_eq!(assembly.pages.len(), 3);
        assert_eq!(assembly.pages[1], PageResult::failed(2));
        assert_eq!(
            assembly.full_text,
            "--- Page 1 ---\nalpha\n\n--- Page 2 ---\n\n\n--- Page 3 ---\ngamma"
        );
    }

    #[test]
    fn test_all_failed() {
        let assembly = assemble(vec![PageResult::failed(1), PageResult::failed(2)]);

        assert_eq!(assembly.page_count, 0);
        assert_eq!(assembly.pages.len(), 2);
        assert!(assembly.full_text.contains("--- Page 2 ---"));
    }

    #[test]
    fn test_empty_input() {
        let assembly = assemble(Vec::new());
        assert_eq!(assembly.page_count, 0);
        assert!(assembly.full_text.is_empty());
        assert!(assembly.pages.is_empty());
    }

    #[test]
    fn test_duplicate_pages_prefer_success() {
        let assembly = assemble(vec![
            PageResult::failed(1),
            PageResult::succeeded(1, "retry"),
            PageResult::succeeded(2, "two"),
        ]);

        assert_eq!(assembly.pages.len(), 2);
        assert_eq!(assembly.pages[0], PageResult::succeeded(1, "retry"));
        assert_eq!(assembly.page_count, 2);
    }
}
