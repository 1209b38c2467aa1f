//! UI builder module for creating keyboards and formatting messages

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup};
use url::Url;

use crate::crm::{Order, OrderStatus, PaymentMethod};
use crate::dialogue::OrderDraft;
use crate::localization::LocalizationManager;
use crate::pagination::{paginate, pagination_buttons, PAGE_SIZE};

/// Persistent main menu shown under the input field
pub fn main_menu_keyboard(loc: &LocalizationManager, lang: &str) -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![
            KeyboardButton::new(loc.get_message(lang, "btn-new-order", None)),
            KeyboardButton::new(loc.get_message(lang, "btn-my-orders", None)),
        ],
        vec![
            KeyboardButton::new(loc.get_message(lang, "btn-language", None)),
            KeyboardButton::new(loc.get_message(lang, "btn-help", None)),
        ],
    ])
    .resize_keyboard()
}

/// Language selection keyboard, labels stay in their own language
pub fn language_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("🇬🇧 English", "lang:en"),
        InlineKeyboardButton::callback("🇷🇺 Русский", "lang:ru"),
    ]])
}

pub fn cancel_keyboard(loc: &LocalizationManager, lang: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        loc.get_message(lang, "cancel", None),
        "cancel",
    )]])
}

/// Marker selection keyboard: one page of markers with selection ticks,
/// pagination controls, then Done and Cancel
pub fn markers_keyboard(
    draft: &OrderDraft,
    loc: &LocalizationManager,
    lang: &str,
) -> InlineKeyboardMarkup {
    let (page_markers, total_pages, _, _) =
        paginate(&draft.available_markers, draft.markers_page, PAGE_SIZE);

    let mut rows: Vec<Vec<InlineKeyboardButton>> = Vec::new();
    for marker in page_markers {
        let text = if draft.is_marker_selected(&marker.id) {
            format!("✅ {}", marker.name)
        } else {
            marker.name.clone()
        };
        rows.push(vec![InlineKeyboardButton::callback(
            text,
            format!("marker:{}", marker.id),
        )]);
    }

    let nav = pagination_buttons(
        draft.markers_page,
        total_pages,
        "markers_page",
        "markers_page_info",
    );
    if !nav.is_empty() {
        rows.push(nav);
    }

    rows.push(vec![InlineKeyboardButton::callback(
        loc.get_message(lang, "order-create-markers-done", None),
        "markers_done",
    )]);
    rows.push(vec![InlineKeyboardButton::callback(
        loc.get_message(lang, "cancel", None),
        "cancel",
    )]);

    InlineKeyboardMarkup::new(rows)
}

/// Payment method keyboard built from the CRM's active methods
pub fn payment_keyboard(
    methods: &[PaymentMethod],
    loc: &LocalizationManager,
    lang: &str,
) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = methods
        .iter()
        .map(|method| {
            vec![InlineKeyboardButton::callback(
                method.name.clone(),
                format!("payment:{}", method.id),
            )]
        })
        .collect();

    rows.push(vec![InlineKeyboardButton::callback(
        loc.get_message(lang, "cancel", None),
        "cancel",
    )]);

    InlineKeyboardMarkup::new(rows)
}

pub fn confirm_keyboard(loc: &LocalizationManager, lang: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(loc.get_message(lang, "confirm", None), "confirm"),
        InlineKeyboardButton::callback(loc.get_message(lang, "cancel", None), "cancel"),
    ]])
}

/// One page of the customer's orders, one button per order
pub fn orders_keyboard(orders: &[Order], page: usize) -> InlineKeyboardMarkup {
    let (page_orders, total_pages, _, _) = paginate(orders, page, PAGE_SIZE);

    let mut rows: Vec<Vec<InlineKeyboardButton>> = Vec::new();
    for order in page_orders {
        let title: String = order.title.chars().take(30).collect();
        rows.push(vec![InlineKeyboardButton::callback(
            format!("{} {}...", order.status.emoji(), title),
            format!("order:{}", order.id),
        )]);
    }

    let nav = pagination_buttons(page, total_pages, "orders_page", "orders_page_info");
    if !nav.is_empty() {
        rows.push(nav);
    }

    InlineKeyboardMarkup::new(rows)
}

/// Order detail actions. The delete button only appears while the CRM
/// still allows deletion for the order's status.
pub fn order_detail_keyboard(
    order_id: &str,
    status: OrderStatus,
    loc: &LocalizationManager,
    lang: &str,
) -> InlineKeyboardMarkup {
    let mut rows = vec![vec![InlineKeyboardButton::callback(
        loc.get_message(lang, "order-chat", None),
        format!("chat:{order_id}"),
    )]];

    if status.is_deletable() {
        rows.push(vec![InlineKeyboardButton::callback(
            loc.get_message(lang, "order-delete", None),
            format!("delete_order:{order_id}"),
        )]);
    }

    rows.push(vec![InlineKeyboardButton::callback(
        loc.get_message(lang, "back", None),
        "back_to_orders",
    )]);

    InlineKeyboardMarkup::new(rows)
}

pub fn delete_confirm_keyboard(
    order_id: &str,
    loc: &LocalizationManager,
    lang: &str,
) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(
            loc.get_message(lang, "delete-confirm-yes", None),
            format!("confirm_delete:{order_id}"),
        ),
        InlineKeyboardButton::callback(
            loc.get_message(lang, "delete-confirm-no", None),
            format!("order:{order_id}"),
        ),
    ]])
}

/// Exit control shown while a chat session is open
pub fn chat_keyboard(order_id: &str, loc: &LocalizationManager, lang: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        loc.get_message(lang, "exit-chat", None),
        format!("exit_chat:{order_id}"),
    )]])
}

/// Chat entry button attached to incoming support messages
pub fn enter_chat_keyboard(
    order_id: &str,
    loc: &LocalizationManager,
    lang: &str,
) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        loc.get_message(lang, "enter-chat", None),
        format!("chat:{order_id}"),
    )]])
}

/// Deep link into the CRM order page for staff alerts
pub fn staff_order_link_keyboard(
    order_url: Url,
    loc: &LocalizationManager,
    lang: &str,
) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::url(
        loc.get_message(lang, "open-order", None),
        order_url,
    )]])
}

/// Truncate to a maximum number of characters, appending an ellipsis when
/// anything was cut off
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{truncated}...")
    } else {
        text.to_string()
    }
}

/// Format a budget amount, dropping the fraction for whole numbers
pub fn format_cost(cost: f64) -> String {
    if cost.fract() == 0.0 {
        format!("{cost:.0}")
    } else {
        format!("{cost}")
    }
}

/// Build the confirmation summary shown before an order is created
pub fn build_confirmation_text(draft: &OrderDraft, loc: &LocalizationManager, lang: &str) -> String {
    let marker_names = draft.selected_marker_names();
    let markers = if marker_names.is_empty() {
        "-".to_string()
    } else {
        marker_names.join(", ")
    };

    let description = truncate_with_ellipsis(&draft.description, 100);
    let cost = format_cost(draft.cost);
    let payment = match draft.payment_method_name() {
        Some(name) => name.to_string(),
        None => loc.get_message(lang, "payment-not-specified", None),
    };

    loc.get_message_with_args(
        lang,
        "order-create-confirm",
        &[
            ("title", draft.title.as_str()),
            ("description", &description),
            ("cost", &cost),
            ("markers", &markers),
            ("payment", &payment),
        ],
    )
}

/// Build the detail view for one order
pub fn build_order_detail_text(order: &Order, loc: &LocalizationManager, lang: &str) -> String {
    let marker_names: Vec<&str> = order.markers.iter().map(|m| m.name.as_str()).collect();
    let markers = if marker_names.is_empty() {
        "-".to_string()
    } else {
        marker_names.join(", ")
    };

    let id: String = order.id.chars().take(8).collect();
    let description = truncate_with_ellipsis(&order.description, 200);
    let cost = format_cost(order.cost);
    let status = loc.get_message(lang, order.status.label_key(), None);
    let created: String = order.created_at.chars().take(10).collect();

    loc.get_message_with_args(
        lang,
        "order-details",
        &[
            ("id", id.as_str()),
            ("title", order.title.as_str()),
            ("description", &description),
            ("cost", &cost),
            ("status", &status),
            ("markers", &markers),
            ("created", &created),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crm::Marker;

    fn loc() -> LocalizationManager {
        LocalizationManager::new().unwrap()
    }

    fn order(status: OrderStatus) -> Order {
        Order {
            id: "abcdef123456".to_string(),
            title: "Website".to_string(),
            description: "A simple site".to_string(),
            cost: 500.0,
            status,
            markers: vec![],
            created_at: "2025-03-01T12:00:00.000Z".to_string(),
        }
    }

    #[test]
    fn test_truncate_with_ellipsis() {
        assert_eq!(truncate_with_ellipsis("short", 10), "short");
        assert_eq!(truncate_with_ellipsis("exactly-10", 10), "exactly-10");
        assert_eq!(truncate_with_ellipsis("0123456789x", 10), "0123456789...");
        // Multi-byte characters count as one
        assert_eq!(truncate_with_ellipsis("привет", 6), "привет");
        assert_eq!(truncate_with_ellipsis("приветик", 6), "привет...");
    }

    #[test]
    fn test_format_cost() {
        assert_eq!(format_cost(500.0), "500");
        assert_eq!(format_cost(0.0), "0");
        assert_eq!(format_cost(99.5), "99.5");
    }

    #[test]
    fn test_delete_button_only_for_deletable_statuses() {
        let loc = loc();

        for status in [OrderStatus::PendingModeration, OrderStatus::Rejected] {
            let kb = order_detail_keyboard("o1", status, &loc, "en");
            assert_eq!(kb.inline_keyboard.len(), 3, "{status:?} should offer delete");
        }

        for status in [
            OrderStatus::Approved,
            OrderStatus::InProgress,
            OrderStatus::Testing,
            OrderStatus::Completed,
            OrderStatus::Delivered,
            OrderStatus::Unknown,
        ] {
            let kb = order_detail_keyboard("o1", status, &loc, "en");
            assert_eq!(kb.inline_keyboard.len(), 2, "{status:?} must not offer delete");
        }
    }

    #[test]
    fn test_orders_keyboard_rows_and_navigation() {
        let orders: Vec<Order> = (0..7)
            .map(|i| {
                let mut o = order(OrderStatus::Approved);
                o.id = format!("order-{i}");
                o.title = format!("Order number {i}");
                o
            })
            .collect();

        let kb = orders_keyboard(&orders, 0);
        // 5 orders on the first page plus one navigation row
        assert_eq!(kb.inline_keyboard.len(), 6);
        assert_eq!(kb.inline_keyboard[0][0].text, "✅ Order number 0...");

        let kb = orders_keyboard(&orders, 1);
        assert_eq!(kb.inline_keyboard.len(), 3);
    }

    #[test]
    fn test_markers_keyboard_marks_selected() {
        let mut draft = OrderDraft::default();
        draft.available_markers = vec![
            Marker {
                id: "m1".to_string(),
                name: "Rust".to_string(),
            },
            Marker {
                id: "m2".to_string(),
                name: "Python".to_string(),
            },
        ];
        draft.toggle_marker("m2");

        let kb = markers_keyboard(&draft, &loc(), "en");
        assert_eq!(kb.inline_keyboard[0][0].text, "Rust");
        assert_eq!(kb.inline_keyboard[1][0].text, "✅ Python");
        // Done and Cancel rows close the keyboard
        assert_eq!(kb.inline_keyboard.len(), 4);
    }

    #[test]
    fn test_confirmation_text_fills_template() {
        let loc = loc();
        let mut draft = OrderDraft {
            title: "Shop".to_string(),
            description: "An online shop".to_string(),
            cost: 2500.0,
            available_markers: vec![Marker {
                id: "m1".to_string(),
                name: "Rust".to_string(),
            }],
            ..Default::default()
        };
        draft.toggle_marker("m1");

        let text = build_confirmation_text(&draft, &loc, "en");
        assert!(text.contains("<b>Title:</b> Shop"));
        assert!(text.contains("<b>Budget:</b> $2500"));
        assert!(text.contains("<b>Stack:</b> Rust"));
        assert!(text.contains("<b>Payment:</b> Not specified"));
    }

    #[test]
    fn test_confirmation_truncates_long_description() {
        let draft = OrderDraft {
            title: "t".to_string(),
            description: "x".repeat(150),
            ..Default::default()
        };

        let text = build_confirmation_text(&draft, &loc(), "en");
        assert!(text.contains(&format!("{}...", "x".repeat(100))));
        assert!(!text.contains(&"x".repeat(101)));
    }

    #[test]
    fn test_order_detail_text() {
        let loc = loc();
        let text = build_order_detail_text(&order(OrderStatus::InProgress), &loc, "en");

        assert!(text.contains("Order #abcdef12"));
        assert!(text.contains("<b>Status:</b> 🔄 In Progress"));
        assert!(text.contains("<b>Created:</b> 2025-03-01"));
        assert!(text.contains("<b>Stack:</b> -"));
    }
}
