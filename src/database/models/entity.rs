use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One field declaration on a page. The type is carried as an open string
/// ("Text", "File", ...); unknown spellings are treated as text downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub field_name: String,
    pub field_type: String,
}

impl FieldDef {
    pub fn is_file(&self) -> bool {
        self.field_type == "File"
    }
}

/// An administrator-defined page: a record type with a generated storage
/// collection and URL slug.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub id: Uuid,
    pub name: String,
    pub collection_key: String,
    pub url_slug: String,
    pub fields: Vec<FieldDef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lower-case `name` and replace whitespace runs with `separator`.
/// Pure: two names produce the same slug iff they are equal ignoring case
/// and whitespace.
pub fn slugify(name: &str, separator: char) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_whitespace = false;
    for c in name.trim().chars() {
        if c.is_whitespace() {
            in_whitespace = true;
            continue;
        }
        if in_whitespace && !out.is_empty() {
            out.push(separator);
        }
        in_whitespace = false;
        for lower in c.to_lowercase() {
            out.push(lower);
        }
    }
    out
}

/// Storage collection identifier for a page name ("Contact Form" -> "contact_form")
pub fn collection_key(name: &str) -> String {
    slugify(name, '_')
}

/// Public routing key for a page name ("Contact Form" -> "/contact-form")
pub fn url_slug(name: &str) -> String {
    format!("/{}", slugify(name, '-'))
}

/// Normalize a caller-supplied slug: lower-cased, exactly one leading slash.
pub fn normalize_slug(raw: &str) -> String {
    format!("/{}", raw.trim_start_matches('/').to_lowercase())
}

/// Registry identity for a page's runtime schema, stable across whitespace
/// in the display name ("Contact Form" -> "dynamic:ContactForm").
pub fn model_identity(name: &str) -> String {
    let stripped: String = name.chars().filter(|c| !c.is_whitespace()).collect();
    format!("dynamic:{}", stripped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_is_deterministic() {
        assert_eq!(slugify("Contact Form", '-'), "contact-form");
        assert_eq!(slugify("Contact Form", '_'), "contact_form");
        assert_eq!(slugify("  Blog   Posts  ", '-'), "blog-posts");
        assert_eq!(slugify("single", '-'), "single");
    }

    #[test]
    fn slugs_collide_iff_case_whitespace_insensitive_equal() {
        assert_eq!(slugify("Contact Form", '-'), slugify("contact   FORM", '-'));
        assert_ne!(slugify("Contact Form", '-'), slugify("Contact Forms", '-'));
    }

    #[test]
    fn derived_keys_for_contact_form() {
        assert_eq!(collection_key("Contact Form"), "contact_form");
        assert_eq!(url_slug("Contact Form"), "/contact-form");
    }

    #[test]
    fn normalize_slug_is_idempotent() {
        assert_eq!(normalize_slug("Contact-Form"), "/contact-form");
        assert_eq!(normalize_slug("/contact-form"), "/contact-form");
        assert_eq!(normalize_slug(&normalize_slug("Contact-Form")), "/contact-form");
    }

    #[test]
    fn model_identity_strips_whitespace() {
        assert_eq!(model_identity("Contact Form"), "dynamic:ContactForm");
        assert_eq!(model_identity("ContactForm"), "dynamic:ContactForm");
    }
}
