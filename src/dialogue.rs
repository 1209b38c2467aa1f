//! Order conversation state machine shared by the message and callback
//! handlers.

use serde::{Deserialize, Serialize};
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};

use crate::crm::{Marker, PaymentMethod};

/// Data accumulated while a user assembles a new order. The marker and
/// payment catalogs are fetched once when the respective step is entered
/// and kept here so pagination and selection stay consistent even if the
/// CRM lists change mid-flow.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct OrderDraft {
    pub title: String,
    pub description: String,
    pub cost: f64,
    /// Marker ids in the order the user picked them
    pub selected_marker_ids: Vec<String>,
    pub markers_page: usize,
    pub payment_method_id: Option<String>,
    pub available_markers: Vec<Marker>,
    pub available_payment_methods: Vec<PaymentMethod>,
}

impl OrderDraft {
    /// Toggle a marker selection: deselects when present, appends when
    /// absent. Applying the same id twice restores the previous set.
    pub fn toggle_marker(&mut self, marker_id: &str) {
        if let Some(pos) = self
            .selected_marker_ids
            .iter()
            .position(|id| id == marker_id)
        {
            self.selected_marker_ids.remove(pos);
        } else {
            self.selected_marker_ids.push(marker_id.to_string());
        }
    }

    pub fn is_marker_selected(&self, marker_id: &str) -> bool {
        self.selected_marker_ids.iter().any(|id| id == marker_id)
    }

    /// Names of the selected markers in catalog order
    pub fn selected_marker_names(&self) -> Vec<&str> {
        self.available_markers
            .iter()
            .filter(|m| self.is_marker_selected(&m.id))
            .map(|m| m.name.as_str())
            .collect()
    }

    /// Display name of the chosen payment method, if one was picked and
    /// still exists in the cached catalog
    pub fn payment_method_name(&self) -> Option<&str> {
        let id = self.payment_method_id.as_deref()?;
        self.available_payment_methods
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.name.as_str())
    }
}

/// An open support-chat session for one order
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatSession {
    pub order_id: String,
    pub order_title: String,
}

/// Represents where a user currently is in the bot conversation. Exactly
/// one state is active per user at any time.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub enum ConversationState {
    #[default]
    Idle,
    AwaitingTitle,
    AwaitingDescription {
        title: String,
    },
    AwaitingCost {
        title: String,
        description: String,
    },
    SelectingMarkers {
        draft: OrderDraft,
    },
    SelectingPayment {
        draft: OrderDraft,
    },
    AwaitingConfirmation {
        draft: OrderDraft,
    },
    Chatting {
        session: ChatSession,
    },
}

/// Type alias for the order conversation dialogue
pub type OrderDialogue = Dialogue<ConversationState, InMemStorage<ConversationState>>;
