use anyhow::{anyhow, Result};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use std::collections::HashMap;
use unic_langid::LanguageIdentifier;

use crate::config::{DEFAULT_LANGUAGE, SUPPORTED_LANGUAGES};

// Message catalogs are compiled in so lookups never depend on the working
// directory of the running process.
const EN_MESSAGES: &str = include_str!("../locales/en/main.ftl");
const RU_MESSAGES: &str = include_str!("../locales/ru/main.ftl");

/// Localization manager for the CRM bot
///
/// Holds one Fluent bundle per supported language. Lookups fall back to
/// the default language and finally to the key itself, so a missing
/// translation renders as its key instead of failing the handler.
pub struct LocalizationManager {
    bundles: HashMap<String, FluentBundle<FluentResource>>,
}

impl LocalizationManager {
    /// Create a manager with all supported language bundles loaded
    pub fn new() -> Result<Self> {
        let mut bundles = HashMap::new();

        for (locale, source) in [("en", EN_MESSAGES), ("ru", RU_MESSAGES)] {
            let langid: LanguageIdentifier = locale.parse()?;
            let bundle = Self::create_bundle(&langid, source)?;
            bundles.insert(locale.to_string(), bundle);
        }

        Ok(Self { bundles })
    }

    /// Create a fluent bundle for a specific locale
    fn create_bundle(
        locale: &LanguageIdentifier,
        source: &str,
    ) -> Result<FluentBundle<FluentResource>> {
        let mut bundle = FluentBundle::new_concurrent(vec![locale.clone()]);
        // Keep placeholder output free of Unicode isolation marks
        bundle.set_use_isolating(false);

        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow!("invalid fluent resource for {locale}: {errors:?}"))?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow!("conflicting fluent messages for {locale}: {errors:?}"))?;

        Ok(bundle)
    }

    /// Get a localized message for a language code
    pub fn get_message(
        &self,
        language: &str,
        key: &str,
        args: Option<&HashMap<&str, &str>>,
    ) -> String {
        if let Some(value) = self.format_in(language, key, args) {
            return value;
        }
        if language != DEFAULT_LANGUAGE {
            if let Some(value) = self.format_in(DEFAULT_LANGUAGE, key, args) {
                return value;
            }
        }
        key.to_string()
    }

    /// Get a localized message with simple string arguments
    pub fn get_message_with_args(
        &self,
        language: &str,
        key: &str,
        args: &[(&str, &str)],
    ) -> String {
        let args_map: HashMap<&str, &str> = args.iter().cloned().collect();
        self.get_message(language, key, Some(&args_map))
    }

    /// True if the bot ships a catalog for this language code
    pub fn is_supported(language: &str) -> bool {
        SUPPORTED_LANGUAGES.contains(&language)
    }

    fn format_in(
        &self,
        language: &str,
        key: &str,
        args: Option<&HashMap<&str, &str>>,
    ) -> Option<String> {
        let bundle = self.bundles.get(language)?;
        let msg = bundle.get_message(key)?;
        let pattern = msg.value()?;

        let mut value = String::new();
        let mut errors = Vec::new();

        if let Some(args) = args {
            let fluent_args = FluentArgs::from_iter(
                args.iter().map(|(k, v)| (*k, FluentValue::from(*v))),
            );
            bundle
                .write_pattern(&mut value, pattern, Some(&fluent_args), &mut errors)
                .ok()?;
        } else {
            bundle
                .write_pattern(&mut value, pattern, None, &mut errors)
                .ok()?;
        }

        Some(value)
    }
}
