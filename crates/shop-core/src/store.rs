//! # Store Configuration
//!
//! Storefront branding: categories, social links and contact details.
//! Loaded from `config/store.toml`.

use serde::{Deserialize, Serialize};

/// A product category shown in navigation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Display name (e.g., "Face Powder")
    pub name: String,

    /// URL slug, matched against product `category` metadata
    pub slug: String,

    /// Optional hero image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Category {
    pub fn new(name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slug: slug.into(),
            image: None,
        }
    }
}

/// Social profile links
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLinks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facebook: Option<String>,
}

/// Customer-facing contact details
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
}

/// Store-wide configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub categories: Vec<Category>,

    #[serde(default)]
    pub social: SocialLinks,

    #[serde(default)]
    pub contact: Contact,
}

impl StoreConfig {
    /// Load from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Builder: add a category
    pub fn with_category(mut self, category: Category) -> Self {
        self.categories.push(category);
        self
    }

    /// Get a category by slug
    pub fn category(&self, slug: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.slug == slug)
    }

    pub fn has_category(&self, slug: &str) -> bool {
        self.category(slug).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STORE_TOML: &str = r#"
[[categories]]
name = "Face Powder"
slug = "face-powder"

[[categories]]
name = "Blush & Bronzer"
slug = "blush-bronzer"
image = "/images/accessories.jpg"

[social]
x = "https://x.com/asianpowder"

[contact]
email = "support@asianpowder.com"
phone = "+1 (555) 279-3337"
address = "Los Angeles, CA, USA"
"#;

    #[test]
    fn test_parse_store_config() {
        let config = StoreConfig::from_toml(STORE_TOML).unwrap();

        assert_eq!(config.categories.len(), 2);
        assert!(config.has_category("face-powder"));
        assert!(!config.has_category("eye-shadow"));
        assert_eq!(
            config.category("blush-bronzer").and_then(|c| c.image.as_deref()),
            Some("/images/accessories.jpg")
        );
        assert_eq!(config.social.facebook, None);
        assert_eq!(config.contact.email, "support@asianpowder.com");
    }

    #[test]
    fn test_empty_config() {
        let config = StoreConfig::from_toml("").unwrap();
        assert!(config.categories.is_empty());
    }
}
