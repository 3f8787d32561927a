//! Delete-confirmation heuristic
//!
//! Keyword matching on dialog text. It cannot be right for every phrasing, so
//! it only gates pruning, which is also off unless configured.

use regex::Regex;
use std::sync::LazyLock;

static DELETE_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(delete|deleting|remove|removing|discard|erase|destroy|trash|permanently)\b|xóa|xoá")
        .unwrap()
});

pub fn looks_like_delete_confirmation(message: &str) -> bool {
    DELETE_KEYWORDS.is_match(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_phrasings() {
        assert!(looks_like_delete_confirmation("Are you sure you want to delete this item?"));
        assert!(looks_like_delete_confirmation("Remove 3 files?"));
        assert!(looks_like_delete_confirmation("Bạn có chắc muốn xóa?"));
        assert!(!looks_like_delete_confirmation("Save changes before leaving?"));
        assert!(!looks_like_delete_confirmation("Undeleted items restored"));
    }
}
