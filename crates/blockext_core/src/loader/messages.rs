//! Localized message templates for loader dialogs.
//!
//! # Responsibility
//! - Map `(locale, message id)` to a template string.
//! - Substitute `{placeholder}` tokens with call-site arguments.
//!
//! # Invariants
//! - Lookup never fails: exact locale, then base language, then English, then the id.
//! - Host-supplied templates override built-in ones.

use crate::extension::descriptor::DisplayName;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;

/// Library dialog title.
pub const MSG_CHOOSE_AN_EXTENSION: &str = "gui.extensionLibrary.chooseAnExtension";
/// Prompt text asking for a custom extension URL.
pub const MSG_EXTENSION_URL: &str = "gui.extensionLibrary.extensionUrl";
/// Replacement confirmation; takes `{name}` and `{url}`.
pub const MSG_CONFIRM_REPLACING: &str = "gui.extensionLibrary.confirmReplacingExtension";
/// Fetch failure alert; takes `{url}` and `{error}`.
pub const MSG_LOAD_FAILED: &str = "gui.extensionLibrary.loadFailed";
/// Name of the custom extension loader tile.
pub const MSG_LOADER_NAME: &str = "gui.extension.extensionLoader.name";
/// Description of the custom extension loader tile.
pub const MSG_LOADER_DESCRIPTION: &str = "gui.extension.extensionLoader.description";

const FALLBACK_LOCALE: &str = "en";

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("placeholder pattern is a valid regex")
});

const BUILTIN_TEMPLATES: &[(&str, &str, &str)] = &[
    ("en", MSG_CHOOSE_AN_EXTENSION, "Choose an Extension"),
    ("en", MSG_EXTENSION_URL, "Enter the URL of the extension"),
    (
        "en",
        MSG_CONFIRM_REPLACING,
        "Do you want to replace extension\n\nextension name: {name}\nload from: {url}",
    ),
    (
        "en",
        MSG_LOAD_FAILED,
        "Could not load the extension\n\nload from: {url}\nreason: {error}",
    ),
    ("en", MSG_LOADER_NAME, "Extension Loader"),
    ("en", MSG_LOADER_DESCRIPTION, "Load extension from internet."),
    (
        "ja",
        MSG_CONFIRM_REPLACING,
        "拡張機能を置き換えますか?\n\n拡張機能名: {name}\n読み込み元: {url}",
    ),
    ("ja", MSG_LOADER_NAME, "拡張機能を読み込む"),
    (
        "ja",
        MSG_LOADER_DESCRIPTION,
        "拡張機能をインターネットから読み込む。",
    ),
    (
        "ja-Hira",
        MSG_CONFIRM_REPLACING,
        "かくちょうきのうをおきかえますか?\n\nかくちょうきのうめい: {name}\nよみこみもと: {url}",
    ),
    ("ja-Hira", MSG_LOADER_NAME, "かくちょうきのうをよみこむ"),
    (
        "ja-Hira",
        MSG_LOADER_DESCRIPTION,
        "かくちょうきのうをインターネットからよみこむ。",
    ),
];

/// Locale-aware template store.
#[derive(Debug, Clone)]
pub struct MessageCatalog {
    locale: String,
    templates: BTreeMap<String, BTreeMap<String, String>>,
}

impl MessageCatalog {
    /// Creates a catalog with built-in templates for `locale`.
    pub fn new(locale: impl Into<String>) -> Self {
        let mut catalog = Self {
            locale: locale.into(),
            templates: BTreeMap::new(),
        };
        for (locale, id, template) in BUILTIN_TEMPLATES {
            catalog.insert(locale, id, template);
        }
        catalog
    }

    pub fn locale(&self) -> &str {
        self.locale.as_str()
    }

    pub fn insert(&mut self, locale: &str, id: &str, template: &str) {
        self.templates
            .entry(locale.to_string())
            .or_default()
            .insert(id.to_string(), template.to_string());
    }

    /// Merges host-supplied templates for one locale, overriding existing ids.
    pub fn merge<I, K, V>(&mut self, locale: &str, templates: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (id, template) in templates {
            self.insert(locale, id.as_ref(), template.as_ref());
        }
    }

    /// Returns the best template for `id` in the active locale.
    pub fn template(&self, id: &str) -> Option<&str> {
        lookup_chain(self.locale.as_str())
            .into_iter()
            .find_map(|locale| self.templates.get(locale)?.get(id))
            .map(String::as_str)
    }

    /// Formats `id` with `{name}`-style arguments; unknown tokens stay verbatim.
    pub fn format(&self, id: &str, args: &[(&str, &str)]) -> String {
        match self.template(id) {
            Some(template) => substitute(template, args),
            None => id.to_string(),
        }
    }

    /// Resolves a tile name for display.
    pub fn display_name(&self, name: &DisplayName) -> String {
        match name {
            DisplayName::Plain(value) => value.clone(),
            DisplayName::Message {
                id,
                default_message,
            } => self
                .template(id)
                .unwrap_or(default_message.as_str())
                .to_string(),
        }
    }
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self::new(FALLBACK_LOCALE)
    }
}

fn lookup_chain(locale: &str) -> Vec<&str> {
    let mut chain = vec![locale];
    if let Some((base, _)) = locale.split_once('-') {
        chain.push(base);
    }
    if !chain.contains(&FALLBACK_LOCALE) {
        chain.push(FALLBACK_LOCALE);
    }
    chain
}

fn substitute(template: &str, args: &[(&str, &str)]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let key = &caps[1];
            args.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value).to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::{MessageCatalog, MSG_CONFIRM_REPLACING, MSG_EXTENSION_URL, MSG_LOADER_NAME};
    use crate::extension::descriptor::DisplayName;

    #[test]
    fn formats_english_confirmation() {
        let catalog = MessageCatalog::new("en");
        let message = catalog.format(
            MSG_CONFIRM_REPLACING,
            &[("name", "Pen"), ("url", "https://example.com/pen.mjs")],
        );
        assert_eq!(
            message,
            "Do you want to replace extension\n\nextension name: Pen\nload from: https://example.com/pen.mjs"
        );
    }

    #[test]
    fn uses_japanese_variants() {
        let ja = MessageCatalog::new("ja");
        assert!(ja
            .format(MSG_CONFIRM_REPLACING, &[("name", "Pen"), ("url", "u")])
            .starts_with("拡張機能を置き換えますか"));

        let hira = MessageCatalog::new("ja-Hira");
        assert!(hira
            .format(MSG_CONFIRM_REPLACING, &[("name", "Pen"), ("url", "u")])
            .contains("よみこみもと: u"));
    }

    #[test]
    fn falls_back_to_base_language_then_english() {
        let mut catalog = MessageCatalog::new("ja-Hira");
        catalog.insert("ja", "custom.only.base", "ベース");
        assert_eq!(catalog.template("custom.only.base"), Some("ベース"));
        assert_eq!(
            catalog.template(MSG_EXTENSION_URL),
            Some("Enter the URL of the extension")
        );
    }

    #[test]
    fn unknown_id_and_placeholder_are_kept_verbatim() {
        let mut catalog = MessageCatalog::new("en");
        assert_eq!(catalog.format("no.such.id", &[]), "no.such.id");
        catalog.insert("en", "greet", "hello {who} from {where}");
        assert_eq!(
            catalog.format("greet", &[("who", "ada")]),
            "hello ada from {where}"
        );
    }

    #[test]
    fn host_templates_override_builtins() {
        let mut catalog = MessageCatalog::new("en");
        catalog.merge("en", [(MSG_EXTENSION_URL, "Paste a module URL")]);
        assert_eq!(catalog.template(MSG_EXTENSION_URL), Some("Paste a module URL"));
    }

    #[test]
    fn resolves_display_names() {
        let catalog = MessageCatalog::new("ja");
        assert_eq!(catalog.display_name(&DisplayName::plain("Pen")), "Pen");
        assert_eq!(
            catalog.display_name(&DisplayName::message(MSG_LOADER_NAME, "Extension Loader")),
            "拡張機能を読み込む"
        );
        assert_eq!(
            catalog.display_name(&DisplayName::message("missing.id", "Fallback")),
            "Fallback"
        );
    }
}
