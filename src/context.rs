//! Shared application context injected into every handler.

use teloxide::types::UserId;
use tracing::error;

use crate::config::{Config, DEFAULT_LANGUAGE};
use crate::crm::CrmClient;
use crate::localization::LocalizationManager;
use crate::session::SessionStore;

/// Everything the handlers need besides the bot itself: configuration, the
/// CRM client, the per-user session store and the message catalogs. One
/// instance is built at startup and shared behind an `Arc`.
pub struct AppContext {
    pub config: Config,
    pub crm: CrmClient,
    pub sessions: SessionStore,
    pub localizer: LocalizationManager,
}

impl AppContext {
    pub fn new(config: Config, crm: CrmClient, localizer: LocalizationManager) -> Self {
        Self {
            config,
            crm,
            sessions: SessionStore::new(),
            localizer,
        }
    }

    /// Cached language for a user, or the default when nothing is cached
    pub async fn language(&self, user_id: UserId) -> String {
        self.sessions
            .language(user_id)
            .await
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
    }

    /// Language with CRM read-through: a cache hit wins, otherwise the
    /// stored preference is fetched and cached. Lookup failures fall back
    /// to the default language without caching, so a later update retries.
    pub async fn ensure_language(&self, user_id: UserId) -> String {
        if let Some(lang) = self.sessions.language(user_id).await {
            return lang;
        }

        match self.crm.get_user_language(&user_id.to_string()).await {
            Ok(Some(lang)) => {
                self.sessions.set_language(user_id, &lang).await;
                lang
            }
            Ok(None) => DEFAULT_LANGUAGE.to_string(),
            Err(e) => {
                error!(user_id = %user_id, error = %e, "Failed to fetch user language");
                DEFAULT_LANGUAGE.to_string()
            }
        }
    }

    /// True when the user has no language preference anywhere, meaning they
    /// have never completed the initial language selection
    pub async fn is_new_user(&self, user_id: UserId) -> bool {
        if self.sessions.language(user_id).await.is_some() {
            return false;
        }

        match self.crm.get_user_language(&user_id.to_string()).await {
            Ok(Some(lang)) => {
                self.sessions.set_language(user_id, &lang).await;
                false
            }
            Ok(None) => true,
            Err(e) => {
                error!(user_id = %user_id, error = %e, "Failed to fetch user language");
                true
            }
        }
    }

    /// Localized text in the user's cached language
    pub async fn text(&self, user_id: UserId, key: &str) -> String {
        let lang = self.language(user_id).await;
        self.localizer.get_message(&lang, key, None)
    }

    /// Localized text with arguments in the user's cached language
    pub async fn text_with_args(&self, user_id: UserId, key: &str, args: &[(&str, &str)]) -> String {
        let lang = self.language(user_id).await;
        self.localizer.get_message_with_args(&lang, key, args)
    }
}
