//! # Pagination Module
//!
//! Pure page-slicing helper plus the navigation button row shared by the
//! marker-selection and order-list keyboards.

use teloxide::types::InlineKeyboardButton;

/// Number of entries shown per keyboard page
pub const PAGE_SIZE: usize = 5;

/// Split `items` into pages of `page_size`.
///
/// Returns `(page_items, total_pages, start_idx, end_idx)`. `total_pages`
/// is always at least 1; an out-of-range `page` yields an empty slice
/// rather than an error.
pub fn paginate<T>(items: &[T], page: usize, page_size: usize) -> (&[T], usize, usize, usize) {
    let total_pages = std::cmp::max(1, items.len().div_ceil(page_size));
    let start_idx = page * page_size;
    let end_idx = std::cmp::min(start_idx + page_size, items.len());

    let page_items = if start_idx >= items.len() {
        &[]
    } else {
        &items[start_idx..end_idx]
    };

    (page_items, total_pages, start_idx, end_idx)
}

/// Build the prev / indicator / next navigation row.
///
/// Empty when everything fits on one page. The indicator button shows
/// "page/total" and fires `info_callback`, which handlers acknowledge
/// without changing state.
pub fn pagination_buttons(
    page: usize,
    total_pages: usize,
    callback_prefix: &str,
    info_callback: &str,
) -> Vec<InlineKeyboardButton> {
    if total_pages <= 1 {
        return Vec::new();
    }

    let mut nav_buttons = Vec::new();

    if page > 0 {
        nav_buttons.push(InlineKeyboardButton::callback(
            "◀️",
            format!("{}:{}", callback_prefix, page - 1),
        ));
    }

    nav_buttons.push(InlineKeyboardButton::callback(
        format!("{}/{}", page + 1, total_pages),
        info_callback.to_string(),
    ));

    if page < total_pages - 1 {
        nav_buttons.push(InlineKeyboardButton::callback(
            "▶️",
            format!("{}:{}", callback_prefix, page + 1),
        ));
    }

    nav_buttons
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paginate_empty_list_has_one_page() {
        let items: Vec<i32> = vec![];
        let (page_items, total_pages, start, end) = paginate(&items, 0, 5);
        assert!(page_items.is_empty());
        assert_eq!(total_pages, 1);
        assert_eq!(start, 0);
        assert_eq!(end, 0);
    }

    #[test]
    fn test_paginate_exact_fit() {
        let items: Vec<i32> = (0..10).collect();
        let (first, total_pages, _, _) = paginate(&items, 0, 5);
        assert_eq!(first, &[0, 1, 2, 3, 4]);
        assert_eq!(total_pages, 2);

        let (second, _, start, end) = paginate(&items, 1, 5);
        assert_eq!(second, &[5, 6, 7, 8, 9]);
        assert_eq!(start, 5);
        assert_eq!(end, 10);
    }

    #[test]
    fn test_paginate_partial_last_page() {
        let items: Vec<i32> = (0..7).collect();
        let (last, total_pages, _, _) = paginate(&items, 1, 5);
        assert_eq!(last, &[5, 6]);
        assert_eq!(total_pages, 2);
    }

    #[test]
    fn test_paginate_out_of_range_page_is_empty() {
        let items: Vec<i32> = (0..3).collect();
        let (page_items, total_pages, _, _) = paginate(&items, 5, 5);
        assert!(page_items.is_empty());
        assert_eq!(total_pages, 1);
    }

    #[test]
    fn test_paginate_reconstructs_original_order() {
        let items: Vec<i32> = (0..23).collect();
        let (_, total_pages, _, _) = paginate(&items, 0, 5);
        let mut reassembled = Vec::new();
        for page in 0..total_pages {
            let (page_items, _, _, _) = paginate(&items, page, 5);
            reassembled.extend_from_slice(page_items);
        }
        assert_eq!(reassembled, items);
    }

    #[test]
    fn test_no_nav_buttons_for_single_page() {
        assert!(pagination_buttons(0, 1, "orders_page", "orders_page_info").is_empty());
        assert!(pagination_buttons(0, 0, "orders_page", "orders_page_info").is_empty());
    }

    #[test]
    fn test_nav_buttons_first_page() {
        let buttons = pagination_buttons(0, 3, "markers_page", "markers_page_info");
        assert_eq!(buttons.len(), 2);
        assert_eq!(buttons[0].text, "1/3");
        assert_eq!(buttons[1].text, "▶️");
    }

    #[test]
    fn test_nav_buttons_middle_page() {
        let buttons = pagination_buttons(1, 3, "markers_page", "markers_page_info");
        assert_eq!(buttons.len(), 3);
        assert_eq!(buttons[0].text, "◀️");
        assert_eq!(buttons[1].text, "2/3");
        assert_eq!(buttons[2].text, "▶️");
    }

    #[test]
    fn test_nav_buttons_last_page() {
        let buttons = pagination_buttons(2, 3, "markers_page", "markers_page_info");
        assert_eq!(buttons.len(), 2);
        assert_eq!(buttons[0].text, "◀️");
        assert_eq!(buttons[1].text, "3/3");
    }
}
